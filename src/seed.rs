use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::engine::EngineError;
use crate::model::{Booking, Room};
use crate::tenant::{TenantError, TenantManager};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing seed data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("university {slug}: {source}")]
    Tenant {
        slug: String,
        source: TenantError,
    },
    #[error("university {slug}: {source}")]
    Engine {
        slug: String,
        source: EngineError,
    },
}

/// Room directory and SIS-synced schedule per university.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub universities: Vec<UniversitySeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniversitySeed {
    pub slug: String,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub universities: usize,
    pub rooms: usize,
    pub bookings: usize,
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Register rooms, then import bookings as-is (no conflict check).
    pub async fn apply(self, tenants: &TenantManager) -> Result<SeedSummary, SeedError> {
        let mut summary = SeedSummary::default();
        for uni in self.universities {
            let slug = uni.slug;
            let engine = tenants
                .get_or_create(&slug)
                .map_err(|source| SeedError::Tenant {
                    slug: slug.clone(),
                    source,
                })?;
            let engine_err = |source| SeedError::Engine {
                slug: slug.clone(),
                source,
            };

            let rooms = uni.rooms.len();
            for room in uni.rooms {
                engine.add_room(room).map_err(engine_err)?;
            }
            let bookings = engine
                .import_bookings(uni.bookings)
                .await
                .map_err(engine_err)?;

            info!(university = %slug, rooms, bookings, "seed applied");
            summary.universities += 1;
            summary.rooms += rooms;
            summary.bookings += bookings;
        }
        Ok(summary)
    }
}
