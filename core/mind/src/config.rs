use anyhow::{Context, Result};
use daylife_composer::Addresses;
use std::path::PathBuf;
use std::time::Duration;

/// Run-level settings for the scheduler and its pipelines
#[derive(Debug, Clone)]
pub struct MindConfig {
    pub output_dir: PathBuf,
    /// How long the scheduler waits for each day before giving up on it
    pub join_timeout: Duration,
    /// Country code used for holiday names in formatted dates
    pub country: String,
    pub addresses: Addresses,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            join_timeout: Duration::from_secs(3600),
            country: "CN".to_string(),
            addresses: Addresses::default(),
        }
    }
}

impl MindConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let output_dir = std::env::var("DAYLIFE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let join_timeout = match std::env::var("DAYLIFE_JOIN_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("DAYLIFE_JOIN_TIMEOUT_SECS is not a number: {}", raw))?,
            ),
            Err(_) => defaults.join_timeout,
        };

        Ok(Self {
            output_dir,
            join_timeout,
            country: std::env::var("DAYLIFE_COUNTRY").unwrap_or(defaults.country),
            addresses: Addresses {
                home: std::env::var("DAYLIFE_HOME_ADDRESS").unwrap_or_default(),
                work: std::env::var("DAYLIFE_WORK_ADDRESS").unwrap_or_default(),
            },
        })
    }
}
