//! Converter availability report.

use tracing::{debug, warn};

use crate::converter::Converter;
use crate::format::TargetFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub available: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub converter_tool: ToolStatus,
    pub supported_formats: Vec<&'static str>,
    pub max_file_size_mb: u64,
}

impl HealthReport {
    /// Query the converter version and build a report.
    ///
    /// Never fails: an unreachable or misbehaving tool yields
    /// [`HealthStatus::Degraded`].
    pub async fn probe(converter: &dyn Converter, max_file_size_mb: u64) -> Self {
        let converter_tool = match converter.version().await {
            Ok(version) => {
                debug!(%version, "converter available");
                ToolStatus { available: true, version: Some(version) }
            }
            Err(e) => {
                warn!(error = %e, "converter version query failed");
                ToolStatus { available: false, version: None }
            }
        };

        let status = if converter_tool.available {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            converter_tool,
            supported_formats: TargetFormat::supported(),
            max_file_size_mb,
        }
    }
}
