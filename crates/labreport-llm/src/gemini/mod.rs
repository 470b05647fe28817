//! Gemini `generateContent` wire format and configuration.
//!
//! The HTTP engine itself lives behind the `gemini` feature; request
//! building and response parsing are always available.

#[cfg(feature = "gemini")]
mod client;

#[cfg(feature = "gemini")]
pub use client::GeminiEngine;

use labreport_core::engine::{AnalysisFault, AnalysisResult};
use labreport_core::models::{AnalysisRecord, FilePayload, PatientInfo};
use serde::{Deserialize, Serialize};

use crate::prompts::{build_analysis_prompt, build_comparison_prompt};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Accepted when `GEMINI_API_KEY` is unset.
pub const ENV_API_KEY_FALLBACK: &str = "API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";

/// Returned when the model answers an analysis with no text.
pub const ANALYSIS_FALLBACK: &str = "无法生成分析结果，请重试。";
/// Returned when the model answers a comparison with no text.
pub const COMPARISON_FALLBACK: &str = "无法生成对比结果。";

/// Gemini connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("no .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self {
            api_key: non_blank(ENV_API_KEY).or_else(|| non_blank(ENV_API_KEY_FALLBACK)),
            ..Self::default()
        };
        if let Some(model) = non_blank(ENV_MODEL) {
            config.model = model;
        }
        if let Some(base_url) = non_blank(ENV_BASE_URL) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config
    }

    /// The API key, or [`AnalysisFault::NotConfigured`].
    pub fn require_api_key(&self) -> AnalysisResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AnalysisFault::NotConfigured(format!("{} is not set", ENV_API_KEY))
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

// =========================================================================
// Wire types
// =========================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Either a text part or an inline file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Inline part carrying the file's raw base64 body.
    pub fn file(file: &FilePayload) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: file.mime_type.clone(),
                data: file.base64_body().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Build the fault for a non-success HTTP response.
pub fn api_fault(status: u16, body: &str) -> AnalysisFault {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    AnalysisFault::Api { status, message }
}

/// Request interpreting report files: one inline part per file, then the prompt.
pub fn analysis_request(
    files: &[FilePayload],
    patient_info: Option<&PatientInfo>,
    temperature: f32,
) -> GenerateContentRequest {
    let mut parts: Vec<Part> = files.iter().map(Part::file).collect();
    parts.push(Part::text(build_analysis_prompt(patient_info)));
    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig { temperature },
    }
}

/// Text-only request comparing two stored interpretations.
pub fn comparison_request(
    older: &AnalysisRecord,
    newer: &AnalysisRecord,
    temperature: f32,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part::text(build_comparison_prompt(older, newer))],
        }],
        generation_config: GenerationConfig { temperature },
    }
}
