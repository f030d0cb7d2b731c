//! Service configuration

use crate::detection::DetectionConfig;
use crate::error::CardScanError;
use crate::{Result, ScanResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Configuration of the full pipeline
    pub detection: DetectionConfig,
    /// Configuration of the reduced pass run after a failure or timeout
    pub fallback: DetectionConfig,
    /// Inputs above this many bytes are rejected before decoding
    pub max_input_bytes: usize,
    pub image_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    /// Bound on each face detection and background removal call
    pub collaborator_timeout_ms: u64,
    /// Images processed concurrently within a batch
    pub batch_concurrency: usize,
    pub session_capacity: usize,
    pub session_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            fallback: DetectionConfig::basic(),
            max_input_bytes: 15 * 1024 * 1024,
            image_timeout_ms: 30_000,
            fallback_timeout_ms: 15_000,
            collaborator_timeout_ms: 5_000,
            batch_concurrency: 3,
            session_capacity: 256,
            session_ttl_secs: 3_600,
        }
    }
}

impl ServiceConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: ServiceConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ScanResult<()> {
        self.detection.validate()?;
        self.fallback.validate()?;
        if self.max_input_bytes == 0 {
            return Err(CardScanError::InvalidConfig(
                "max_input_bytes must be positive".into(),
            ));
        }
        if self.image_timeout_ms == 0 || self.fallback_timeout_ms == 0 {
            return Err(CardScanError::InvalidConfig("timeouts must be positive".into()));
        }
        if self.batch_concurrency == 0 || self.session_capacity == 0 {
            return Err(CardScanError::InvalidConfig(
                "batch_concurrency and session_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
