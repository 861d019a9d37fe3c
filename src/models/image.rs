use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub identifier: String,
    pub local_path: Option<PathBuf>,
    pub source_uri: Option<String>,
}

impl ImageRecord {
    pub fn local(identifier: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            local_path: Some(path.into()),
            source_uri: None,
        }
    }

    pub fn remote(identifier: impl Into<String>, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            local_path: Some(path.into()),
            source_uri: Some(source.into()),
        }
    }

    // A record is only handed out while its backing file is still on disk
    pub fn is_available(&self) -> bool {
        self.local_path.as_deref().map_or(false, Path::is_file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveStatus {
    Ready,
    Processing,
    NotFound,
}

impl ResolveStatus {
    /// HTTP status code the front end answers with for this state.
    pub fn http_code(self) -> u16 {
        match self {
            ResolveStatus::Ready => 200,
            ResolveStatus::Processing => 202,
            ResolveStatus::NotFound => 404,
        }
    }
}

/// Structured referent as handed over by the request layer; the first
/// descriptor names the image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Referent {
    pub descriptors: Vec<String>,
}

impl Referent {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            descriptors: vec![identifier.into()],
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.descriptors.first().map(String::as_str)
    }
}

// Response wrapper for the status endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub identifier: String,
    pub status: ResolveStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_front_end_mapping() {
        assert_eq!(ResolveStatus::Ready.http_code(), 200);
        assert_eq!(ResolveStatus::Processing.http_code(), 202);
        assert_eq!(ResolveStatus::NotFound.http_code(), 404);
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&ResolveStatus::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }

    #[test]
    fn record_without_file_is_unavailable() {
        let record = ImageRecord::local("missing", "/definitely/not/here.jp2");
        assert!(!record.is_available());

        let bare = ImageRecord {
            identifier: "bare".to_string(),
            local_path: None,
            source_uri: None,
        };
        assert!(!bare.is_available());
    }

    #[test]
    fn referent_uses_first_descriptor() {
        let referent = Referent {
            descriptors: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(referent.identifier(), Some("first"));
        assert_eq!(Referent::default().identifier(), None);
    }
}
