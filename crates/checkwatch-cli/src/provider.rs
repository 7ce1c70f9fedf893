//! Check provider reading a JSON payload from disk on every poll.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use checkwatch_core::{Check, CheckProvider, CheckSet, FetchError, RevisionKey};
use serde::Deserialize;

/// Accepts `{"checks": [...]}` or a bare `[...]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Wrapped(CheckSet),
    Bare(Vec<Check>),
}

impl From<Payload> for CheckSet {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Wrapped(set) => set,
            Payload::Bare(checks) => CheckSet::new(checks),
        }
    }
}

/// Parse a check payload.
pub fn parse_checks(raw: &str) -> Result<CheckSet, FetchError> {
    let payload: Payload = serde_json::from_str(raw)?;
    Ok(payload.into())
}

/// Read and parse a check payload file.
pub async fn read_checks(path: &Path) -> Result<CheckSet, FetchError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FetchError::Unavailable(format!("{}: {e}", path.display())))?;
    parse_checks(&raw)
}

/// Serves the same file for every revision; whatever writes the file decides
/// what the checks look like.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CheckProvider for JsonFileProvider {
    async fn fetch_checks(&self, revision: &RevisionKey) -> Result<CheckSet, FetchError> {
        tracing::debug!(revision = %revision, path = %self.path.display(), "reading checks");
        read_checks(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkwatch_core::CheckStatus;

    const WRAPPED: &str = r#"{"checks": [
        {"id": "build", "status": "success", "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:02:00Z"}
    ]}"#;

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = parse_checks(WRAPPED).unwrap();
        assert_eq!(wrapped.checks.len(), 1);
        assert_eq!(wrapped.checks[0].decode_status(), Ok(CheckStatus::Success));

        let bare = parse_checks(
            r#"[{"id": "t", "status": "pending", "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(bare.checks[0].id, "t");
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_checks("{\"checks\": 3}"),
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_rereads_file_each_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");
        std::fs::write(&path, r#"{"checks": []}"#).unwrap();

        let provider = JsonFileProvider::new(&path);
        let revision = RevisionKey::new("org/app", "abc");
        assert!(provider.fetch_checks(&revision).await.unwrap().checks.is_empty());

        std::fs::write(&path, WRAPPED).unwrap();
        assert_eq!(provider.fetch_checks(&revision).await.unwrap().checks.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = JsonFileProvider::new(dir.path().join("nope.json"));
        let err = provider
            .fetch_checks(&RevisionKey::new("org/app", "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }
}
