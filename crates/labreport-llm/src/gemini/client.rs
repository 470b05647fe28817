//! HTTP analysis engine backed by Gemini.

use std::time::Duration;

use async_trait::async_trait;
use labreport_core::engine::{AnalysisEngine, AnalysisFault, AnalysisResult};
use labreport_core::models::{AnalysisRecord, FilePayload, PatientInfo};
use reqwest::Client;

use super::{
    analysis_request, api_fault, comparison_request, GeminiConfig, GenerateContentRequest,
    GenerateContentResponse, ANALYSIS_FALLBACK, COMPARISON_FALLBACK,
};

/// [`AnalysisEngine`] calling the Gemini `generateContent` endpoint.
///
/// Each call is a single request; failures are reported, never retried.
pub struct GeminiEngine {
    client: Client,
    config: GeminiConfig,
}

impl GeminiEngine {
    /// Build an engine. A missing API key is reported on first use.
    pub fn new(config: GeminiConfig) -> AnalysisResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisFault::NotConfigured(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> AnalysisResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> AnalysisResult<GenerateContentResponse> {
        let api_key = self.config.require_api_key()?;

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AnalysisFault::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), model = %self.config.model, "Gemini request rejected");
            return Err(api_fault(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisFault::Failed(format!("unreadable response: {}", e)))
    }
}

#[async_trait]
impl AnalysisEngine for GeminiEngine {
    async fn analyze(
        &self,
        files: &[FilePayload],
        patient_info: Option<&PatientInfo>,
    ) -> AnalysisResult<String> {
        tracing::debug!(files = files.len(), model = %self.config.model, "requesting analysis");
        let request = analysis_request(files, patient_info, self.config.temperature);
        let response = self.generate(&request).await?;
        Ok(response
            .text()
            .unwrap_or_else(|| ANALYSIS_FALLBACK.to_string()))
    }

    async fn compare(
        &self,
        older: &AnalysisRecord,
        newer: &AnalysisRecord,
    ) -> AnalysisResult<String> {
        tracing::debug!(older = older.id(), newer = newer.id(), "requesting comparison");
        let request = comparison_request(older, newer, self.config.temperature);
        let response = self.generate(&request).await?;
        Ok(response
            .text()
            .unwrap_or_else(|| COMPARISON_FALLBACK.to_string()))
    }
}
