//! Workflow and schema document loading.
//!
//! Documents are read into a `serde_json::Value` without any shape checks;
//! a malformed workflow must still reach the validator. YAML files are
//! converted to the same value model as JSON.

use std::path::{Path, PathBuf};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
}

/// On-disk encoding of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml` and `.yml` are YAML; everything else is treated as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Parse `content` in the given format. `path` is only used for errors.
pub fn parse_document(content: &str, format: DocumentFormat, path: &Path) -> Result<Value, DocumentError> {
    match format {
        DocumentFormat::Json => serde_json::from_str(content).map_err(|source| DocumentError::Json {
            path: path.to_path_buf(),
            source,
        }),
        DocumentFormat::Yaml => {
            serde_yaml_ng::from_str(content).map_err(|source| DocumentError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Read a workflow document from disk.
pub async fn load_document(path: &Path) -> Result<Value, DocumentError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let value = parse_document(&content, DocumentFormat::from_path(path), path)?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "loaded workflow document");
    Ok(value)
}

/// Read the optional schema document. `None` selects the basic tier.
pub async fn load_schema(path: Option<&Path>) -> Result<Option<Value>, DocumentError> {
    match path {
        Some(path) => load_document(path).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("wf.yaml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("wf.YML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("wf.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("workflow")), DocumentFormat::Json);
    }

    #[tokio::test]
    async fn loads_json_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wf.json");
        tokio::fs::write(&path, r#"{"nodes": [{"id": "n1"}], "edges": []}"#)
            .await
            .unwrap();

        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc, json!({"nodes": [{"id": "n1"}], "edges": []}));
    }

    #[tokio::test]
    async fn yaml_matches_json_value_model() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wf.yaml");
        tokio::fs::write(
            &path,
            "workflow_id: wf-demo\nnodes:\n  - id: n1\n    kind: search\n    timeout: 30\nedges: []\n",
        )
        .await
        .unwrap();

        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc["workflow_id"], "wf-demo");
        assert_eq!(doc["nodes"][0]["timeout"], 30);
        assert!(doc["edges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_object_roots_still_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("list.json");
        tokio::fs::write(&path, "[1, 2, 3]").await.unwrap();
        assert!(load_document(&path).await.unwrap().is_array());
    }

    #[tokio::test]
    async fn syntax_errors_name_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        tokio::fs::write(&path, "{ nope").await.unwrap();
        let err = load_document(&path).await.unwrap_err();
        assert!(matches!(err, DocumentError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn absent_schema_is_none() {
        assert!(load_schema(None).await.unwrap().is_none());

        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("schema.json");
        assert!(matches!(
            load_schema(Some(&missing)).await,
            Err(DocumentError::Read { .. })
        ));
    }
}
