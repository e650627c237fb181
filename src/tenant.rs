use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::info;

use crate::engine::{CandidateScope, Engine};
use crate::limits::*;
use crate::notify::NotifyHub;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("university name too long")]
    NameTooLong,
    #[error("invalid university name {0:?}")]
    InvalidName(String),
    #[error("too many universities")]
    TooMany,
}

/// Manages per-university engines. Each university gets its own Engine and
/// notify hub; the university slug comes from the connection handshake.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    scope: CandidateScope,
}

impl TenantManager {
    pub fn new(scope: CandidateScope) -> Self {
        Self {
            engines: DashMap::new(),
            scope,
        }
    }

    /// Get or lazily create the engine for a university.
    pub fn get_or_create(&self, slug: &str) -> Result<Arc<Engine>, TenantError> {
        if let Some(engine) = self.engines.get(slug) {
            return Ok(engine.value().clone());
        }
        if slug.len() > MAX_TENANT_NAME_LEN {
            return Err(TenantError::NameTooLong);
        }
        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(TenantError::InvalidName(slug.to_string()));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(TenantError::TooMany);
        }

        let engine = self
            .engines
            .entry(slug.to_string())
            .or_insert_with(|| {
                info!(university = slug, "university engine created");
                Arc::new(Engine::new(Arc::new(NotifyHub::new()), self.scope))
            })
            .value()
            .clone();
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    pub fn get(&self, slug: &str) -> Option<Arc<Engine>> {
        self.engines.get(slug).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
