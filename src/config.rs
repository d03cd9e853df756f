//! Settings loaded from environment variables.
//!
//! Credentials are validated once at startup; a missing key is a fatal
//! `Configuration` error, never a per-request failure.

use crate::error::{PickyError, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct Settings {
    pub notion_api_key: String,
    pub notion_database_id: String,
    pub google_maps_api_key: String,
    pub max_recommendations: usize,
    pub default_search_radius_km: f64,
    pub session_ttl_secs: u64,
    pub sync_interval_secs: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            notion_api_key: required("NOTION_API_KEY")?,
            notion_database_id: required("NOTION_DATABASE_ID")?,
            google_maps_api_key: required("GOOGLE_MAPS_API_KEY")?,
            max_recommendations: parsed_or("MAX_RECOMMENDATIONS", 10)?,
            default_search_radius_km: parsed_or("DEFAULT_SEARCH_RADIUS_KM", 25.0)?,
            session_ttl_secs: parsed_or("SESSION_TTL_SECS", 1800)?,
            sync_interval_secs: parsed_or("SYNC_INTERVAL_SECS", 3600)?,
        })
    }

    /// Redacted summary for the `config://status` resource.
    pub fn summary(&self) -> Value {
        json!({
            "notion_configured": !self.notion_api_key.is_empty()
                && !self.notion_database_id.is_empty(),
            "google_maps_configured": !self.google_maps_api_key.is_empty(),
            "max_recommendations": self.max_recommendations,
            "default_search_radius_km": self.default_search_radius_km,
            "session_ttl_secs": self.session_ttl_secs,
        })
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PickyError::Configuration(format!(
            "missing required environment variable {name}"
        ))),
    }
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            PickyError::Configuration(format!("could not parse {name}={raw}"))
        }),
        Err(_) => Ok(default),
    }
}
