//! Context fusion and accompaniment adaptation
//!
//! `ContextFusion` merges explicit, biometric, and environment input into
//! one normalized snapshot. `AdaptationPolicy` is a pure rule table from
//! (snapshot, recent session signals, optional enrichment term) to a
//! decision. `AdaptationEngine` wraps the optional external enrichment call
//! in a hard timeout; an adaptation request never fails and never blocks
//! indefinitely on the external dependency.

mod context;
mod enrichment;
mod policy;

pub use context::{
    BiometricConfidence, BiometricInput, ContextFusion, ContextSnapshot, EnvironmentInput,
    ExplicitInput, RecentSignals,
};
pub use enrichment::{EnrichmentProvider, EnrichmentTerm, HttpEnrichmentClient};
pub use policy::AdaptationPolicy;

use kirtan_common::adaptation::AdaptationDecision;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Orchestrates one adaptation request: optional enrichment under a hard
/// timeout, then the deterministic rule table.
pub struct AdaptationEngine {
    provider: Option<Arc<dyn EnrichmentProvider>>,
    timeout: Duration,
}

impl AdaptationEngine {
    /// Engine with no external enrichment; every decision is rule-table only.
    pub fn rule_table_only() -> Self {
        Self {
            provider: None,
            timeout: Duration::from_millis(0),
        }
    }

    /// Engine that consults an enrichment provider, bounded by `timeout`.
    pub fn with_provider(provider: Arc<dyn EnrichmentProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// Compute a decision. Infallible by contract: enrichment failure or
    /// timeout degrades to the fallback path, tagged `source=fallback`.
    pub async fn decide(
        &self,
        snapshot: &ContextSnapshot,
        recent: &RecentSignals,
    ) -> AdaptationDecision {
        let term = match &self.provider {
            Some(provider) => {
                match tokio::time::timeout(self.timeout, provider.enrich(snapshot, recent)).await
                {
                    Ok(Ok(term)) => Some(term),
                    Ok(Err(e)) => {
                        warn!(error = %e, "Enrichment failed; using fallback rules");
                        None
                    }
                    Err(_) => {
                        warn!(timeout_ms = self.timeout.as_millis() as u64, "Enrichment timed out");
                        None
                    }
                }
            }
            None => None,
        };

        AdaptationPolicy::decide(snapshot, recent, term.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use kirtan_common::adaptation::DecisionSource;

    struct FailingProvider;

    #[async_trait]
    impl EnrichmentProvider for FailingProvider {
        async fn enrich(
            &self,
            _snapshot: &ContextSnapshot,
            _recent: &RecentSignals,
        ) -> Result<EnrichmentTerm> {
            Err(Error::EnrichmentUnavailable("connection refused".into()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EnrichmentProvider for SlowProvider {
        async fn enrich(
            &self,
            _snapshot: &ContextSnapshot,
            _recent: &RecentSignals,
        ) -> Result<EnrichmentTerm> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(EnrichmentTerm {
                tempo_shift_bpm: 12,
                key_suggestion: None,
                guidance_bias: None,
                confidence: 1.0,
            })
        }
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let engine =
            AdaptationEngine::with_provider(Arc::new(FailingProvider), Duration::from_millis(100));
        let decision = engine
            .decide(&ContextSnapshot::default(), &RecentSignals::default())
            .await;
        assert_eq!(decision.source, DecisionSource::Fallback);
        assert!(decision.tempo_bpm >= 48 && decision.tempo_bpm <= 128);
    }

    #[tokio::test]
    async fn test_provider_timeout_falls_back() {
        let engine =
            AdaptationEngine::with_provider(Arc::new(SlowProvider), Duration::from_millis(50));
        let decision = engine
            .decide(&ContextSnapshot::default(), &RecentSignals::default())
            .await;
        assert_eq!(decision.source, DecisionSource::Fallback);
    }

    #[tokio::test]
    async fn test_rule_table_only_engine_never_consults_anything() {
        let decision = AdaptationEngine::rule_table_only()
            .decide(&ContextSnapshot::default(), &RecentSignals::default())
            .await;
        assert_eq!(decision.source, DecisionSource::Fallback);
        assert_eq!(decision.tempo_bpm, 72);
    }
}
