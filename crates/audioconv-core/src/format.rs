use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::ConvertError;

/// Media type served for anything outside the supported set.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Formats the service can produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Mp3,
    Ogg,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 2] = [TargetFormat::Mp3, TargetFormat::Ogg];

    /// Parse a client-supplied format name.
    ///
    /// Matching is exact (`"mp3"`, `"ogg"`); anything else yields
    /// [`ConvertError::UnsupportedFormat`].
    pub fn parse(requested: &str) -> Result<Self, ConvertError> {
        TargetFormat::from_str(requested).map_err(|_| ConvertError::UnsupportedFormat {
            requested: requested.to_owned(),
            supported: Self::supported().join(", "),
        })
    }

    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.extension()).collect()
    }

    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Mp3 => "mp3",
            TargetFormat::Ogg => "ogg",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            TargetFormat::Mp3 => "audio/mpeg",
            TargetFormat::Ogg => "audio/ogg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        TargetFormat::from_str(ext).ok()
    }
}

/// Media type for a stored file, derived from its extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(TargetFormat::from_extension)
        .map(TargetFormat::media_type)
        .unwrap_or(OCTET_STREAM)
}

/// How the converted artifact reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Artifact bytes in the response body.
    Inline,
    /// JSON descriptor with a download URL.
    #[default]
    Linked,
}

impl DeliveryMode {
    pub fn from_download_flag(download: bool) -> Self {
        if download {
            DeliveryMode::Inline
        } else {
            DeliveryMode::Linked
        }
    }

    /// Parse the form-encoded `download` flag.
    ///
    /// Accepts the usual boolean spellings; returns `None` for anything else.
    pub fn parse_flag(raw: &str) -> Option<Self> {
        let download = match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            _ => return None,
        };
        Some(Self::from_download_flag(download))
    }
}
