//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for audioconv-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Durable root for converted artifacts (default: `/app/output`).
    pub output_dir: PathBuf,

    /// Scratch root for in-flight uploads
    /// (default: `<system temp>/audio_converter`).
    pub temp_dir: PathBuf,

    /// Converter executable, looked up on `PATH` when not absolute.
    pub ffmpeg_path: PathBuf,

    /// Upload size limit in MiB.
    pub max_file_size_mb: u64,

    /// Wall-clock budget for a single conversion.
    pub convert_timeout: Duration,

    /// Budget for the `-version` probe behind `/health`.
    pub health_timeout: Duration,

    /// Converter processes allowed to run at once.
    pub max_concurrent_conversions: usize,

    /// Origin used for `download_url` instead of the request's `Host`
    /// header, e.g. `https://convert.example.com`.
    pub public_base_url: Option<String>,

    /// Comma-separated CORS origin allow-list; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            bind_address: env_or(&lookup, "AUDIOCONV_BIND", "0.0.0.0:8000"),
            output_dir: lookup("AUDIOCONV_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/app/output")),
            temp_dir: lookup("AUDIOCONV_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("audio_converter")),
            ffmpeg_path: PathBuf::from(env_or(&lookup, "AUDIOCONV_FFMPEG_PATH", "ffmpeg")),
            max_file_size_mb: parse_env(&lookup, "AUDIOCONV_MAX_FILE_SIZE_MB", 100),
            convert_timeout: Duration::from_secs(parse_env(&lookup, "AUDIOCONV_CONVERT_TIMEOUT_SECS", 300)),
            health_timeout: Duration::from_secs(parse_env(&lookup, "AUDIOCONV_HEALTH_TIMEOUT_SECS", 5)),
            max_concurrent_conversions: parse_env(&lookup, "AUDIOCONV_MAX_CONCURRENT", default_parallelism)
                .max(1),
            public_base_url: lookup("AUDIOCONV_PUBLIC_BASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_owned())
                .filter(|v| !v.is_empty()),
            cors_allowed_origins: lookup("AUDIOCONV_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_docs: lookup("AUDIOCONV_ENABLE_DOCS").map(|v| is_truthy(&v)).unwrap_or(true),
            log_level: env_or(&lookup, "AUDIOCONV_LOG", "info"),
            log_json: lookup("AUDIOCONV_LOG_JSON").map(|v| is_truthy(&v)).unwrap_or(false),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(move |k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.bind_address, "0.0.0.0:8000");
        assert_eq!(cfg.output_dir, PathBuf::from("/app/output"));
        assert!(cfg.temp_dir.ends_with("audio_converter"));
        assert_eq!(cfg.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(cfg.max_file_size_mb, 100);
        assert_eq!(cfg.max_file_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(cfg.convert_timeout, Duration::from_secs(300));
        assert_eq!(cfg.health_timeout, Duration::from_secs(5));
        assert!(cfg.max_concurrent_conversions >= 1);
        assert!(cfg.public_base_url.is_none());
        assert!(cfg.enable_docs);
        assert!(!cfg.log_json);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config_from(&[
            ("AUDIOCONV_MAX_FILE_SIZE_MB", "5"),
            ("AUDIOCONV_CONVERT_TIMEOUT_SECS", "30"),
            ("AUDIOCONV_MAX_CONCURRENT", "0"),
            ("AUDIOCONV_PUBLIC_BASE_URL", "https://convert.example.com/"),
            ("AUDIOCONV_ENABLE_DOCS", "false"),
            ("AUDIOCONV_LOG_JSON", "TRUE"),
        ]);
        assert_eq!(cfg.max_file_size_mb, 5);
        assert_eq!(cfg.convert_timeout, Duration::from_secs(30));
        assert_eq!(cfg.max_concurrent_conversions, 1);
        assert_eq!(cfg.public_base_url.as_deref(), Some("https://convert.example.com"));
        assert!(!cfg.enable_docs);
        assert!(cfg.log_json);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let cfg = config_from(&[("AUDIOCONV_MAX_FILE_SIZE_MB", "lots")]);
        assert_eq!(cfg.max_file_size_mb, 100);
    }
}
