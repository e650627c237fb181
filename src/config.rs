use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::engine::CandidateScope;
use crate::limits::MAX_SERIES_HORIZON_DAYS;

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 7411;
const DEFAULT_PASSWORD: &str = "roomslot";
const DEFAULT_MAX_CONNECTIONS: usize = 256;
const DEFAULT_SERIES_HORIZON_DAYS: u32 = 365;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Server settings, read once from `ROOMSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub password: String,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub seed_file: Option<PathBuf>,
    pub candidate_scope: CandidateScope,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank counts as unset.
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let horizon = match get("ROOMSLOT_SERIES_HORIZON_DAYS") {
            Some(v) => parse_value::<u32>("ROOMSLOT_SERIES_HORIZON_DAYS", v)?,
            None => DEFAULT_SERIES_HORIZON_DAYS,
        }
        .min(MAX_SERIES_HORIZON_DAYS);

        let candidate_scope = match get("ROOMSLOT_CANDIDATE_SCOPE").as_deref() {
            None | Some("first-date") => CandidateScope::FirstDate,
            Some("series") => CandidateScope::Series {
                horizon_days: horizon,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "ROOMSLOT_CANDIDATE_SCOPE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            bind: get("ROOMSLOT_BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
            port: match get("ROOMSLOT_PORT") {
                Some(v) => parse_value("ROOMSLOT_PORT", v)?,
                None => DEFAULT_PORT,
            },
            password: lookup("ROOMSLOT_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.into()),
            max_connections: match get("ROOMSLOT_MAX_CONNECTIONS") {
                Some(v) => parse_value("ROOMSLOT_MAX_CONNECTIONS", v)?,
                None => DEFAULT_MAX_CONNECTIONS,
            },
            metrics_port: get("ROOMSLOT_METRICS_PORT")
                .map(|v| parse_value("ROOMSLOT_METRICS_PORT", v))
                .transpose()?,
            seed_file: get("ROOMSLOT_SEED_FILE").map(PathBuf::from),
            candidate_scope,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_value<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}
