//! The screening pipeline.
//!
//! Sanitizer → SQL → NoSQL → command → prototype → SSRF → CSRF. Each stage
//! returns `Result<_, ClassifiedError>` and the first error ends the run.
//! Detectors, the SSRF guard and CSRF verification inspect the trees as
//! received. The sanitized trees are only what the request is rewritten to.

use std::sync::Arc;
use std::time::Instant;

use super::csrf::{CsrfManager, InMemoryTokenStore};
use super::detectors::{
    command_injection_protection, nosql_injection_protection, prototype_pollution_protection,
    sql_injection_protection,
};
use super::patterns::{PatternSet, SharedPatterns};
use super::ssrf::SsrfGuard;
use crate::config::GuardConfig;
use crate::error::ClassifiedError;
use crate::observability::metrics;
use crate::payload::{ensure_depth, sanitize, RequestView};

/// Stage toggles and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub sanitize: bool,
    pub max_depth: usize,
    pub ssrf: bool,
    pub csrf: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            sanitize: config.pipeline.sanitize,
            max_depth: config.pipeline.max_depth,
            ssrf: config.ssrf.enabled,
            csrf: config.csrf.is_enabled(config.environment),
        }
    }
}

pub struct SecurityPipeline {
    settings: PipelineSettings,
    patterns: SharedPatterns,
    ssrf: SsrfGuard,
    csrf: Option<Arc<CsrfManager>>,
}

impl SecurityPipeline {
    pub fn new(
        settings: PipelineSettings,
        patterns: SharedPatterns,
        ssrf: SsrfGuard,
        csrf: Option<Arc<CsrfManager>>,
    ) -> Self {
        let csrf = if settings.csrf { csrf } else { None };
        Self {
            settings,
            patterns,
            ssrf,
            csrf,
        }
    }

    /// Pipeline with the system resolver and an in-memory token store.
    pub fn from_config(config: &GuardConfig) -> Result<Self, regex::Error> {
        let patterns = SharedPatterns::new(PatternSet::from_config(&config.patterns)?);
        let csrf = Arc::new(CsrfManager::new(
            Arc::new(InMemoryTokenStore::new()),
            &config.csrf,
        ));
        Ok(Self::new(
            PipelineSettings::from_config(config),
            patterns,
            SsrfGuard::system(config.ssrf.resolve_dns),
            Some(csrf),
        ))
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    pub fn patterns(&self) -> &SharedPatterns {
        &self.patterns
    }

    /// The token manager, when verification is enabled.
    pub fn csrf(&self) -> Option<&Arc<CsrfManager>> {
        self.csrf.as_ref()
    }

    /// Run every stage over a request view.
    ///
    /// Returns the sanitized view when the request may proceed.
    pub async fn screen(&self, view: &RequestView) -> Result<RequestView, ClassifiedError> {
        let start = Instant::now();
        let result = self.run_stages(view).await;
        metrics::record_screen_duration(start);
        result
    }

    async fn run_stages(&self, view: &RequestView) -> Result<RequestView, ClassifiedError> {
        for (_, tree) in view.sources() {
            ensure_depth(tree, self.settings.max_depth)?;
        }

        let sanitized = if self.settings.sanitize {
            RequestView {
                query: sanitize(&view.query),
                body: sanitize(&view.body),
                path_params: sanitize(&view.path_params),
                ..view.clone()
            }
        } else {
            view.clone()
        };

        // One snapshot for the whole request, even across a reload.
        let patterns = self.patterns.load();

        // Sanitizing first would erase `$`, shell metacharacters and
        // forbidden keys before their detectors could see them.
        sql_injection_protection(view, &patterns)?;
        nosql_injection_protection(view, &patterns)?;
        command_injection_protection(view, &patterns)?;
        prototype_pollution_protection(view, &patterns)?;

        if self.settings.ssrf {
            self.ssrf.guard(view, &patterns).await?;
        }

        if let Some(csrf) = &self.csrf {
            csrf.verify_token(view).await?;
        }

        Ok(sanitized)
    }
}
