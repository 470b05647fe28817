//! Domain models for lab report analysis.

mod comparison;
mod patient;
mod record;

pub use comparison::*;
pub use patient::*;
pub use record::*;
