//! External enrichment client
//!
//! Optional reasoning service consulted for an additive adaptation term.
//! Treated as strictly optional: every transport, status, or decode failure
//! maps to `EnrichmentUnavailable`, which the adaptation engine recovers
//! from via the deterministic fallback. The HTTP client carries its own
//! request timeout in addition to the engine-level bound.

use crate::adaptation::context::{ContextSnapshot, RecentSignals};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kirtan_common::adaptation::KeyCenter;
use kirtan_common::config::EnrichmentConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Additive term returned by the enrichment service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentTerm {
    /// Added to the rule-table tempo; the result is re-clamped
    pub tempo_shift_bpm: i32,
    pub key_suggestion: Option<KeyCenter>,
    /// Added to guidance intensity, result clamped to [0, 1]
    pub guidance_bias: Option<f64>,
    /// Service's self-reported confidence in [0, 1]
    pub confidence: f64,
}

/// Port for the external reasoning service
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Request an enrichment term; errors are recovered by the caller.
    async fn enrich(
        &self,
        snapshot: &ContextSnapshot,
        recent: &RecentSignals,
    ) -> Result<EnrichmentTerm>;
}

/// HTTP-backed enrichment provider
pub struct HttpEnrichmentClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpEnrichmentClient {
    /// Build a client from configuration; `None` when enrichment is disabled.
    pub fn from_config(config: &EnrichmentConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .ok()?;
        Some(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for HttpEnrichmentClient {
    async fn enrich(
        &self,
        snapshot: &ContextSnapshot,
        recent: &RecentSignals,
    ) -> Result<EnrichmentTerm> {
        let url = format!("{}/v1/enrich", self.base_url);
        debug!(url = %url, model = %self.model, "Requesting enrichment term");

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "context": snapshot,
                "recent": recent,
            }))
            .send()
            .await
            .map_err(|e| Error::EnrichmentUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::EnrichmentUnavailable(format!(
                "Service returned {}",
                response.status()
            )));
        }

        let term: EnrichmentTerm = response
            .json()
            .await
            .map_err(|e| Error::EnrichmentUnavailable(format!("Bad response body: {e}")))?;

        debug!(
            tempo_shift = term.tempo_shift_bpm,
            confidence = term.confidence,
            "Enrichment term received"
        );
        Ok(term)
    }
}
