//! `flowgate fingerprint`.

use std::path::Path;

use anyhow::{Context, Result};

use flowgate_core::execution::ExecutorRegistry;
use flowgate_infra::document::load_document;

use crate::state::AppState;

pub async fn fingerprint(state: &AppState, document: &Path, json: bool) -> Result<()> {
    let doc = load_document(document)
        .await
        .with_context(|| format!("Failed to load workflow {}", document.display()))?;
    let id = state.service(ExecutorRegistry::new()).fingerprint(&doc)?;

    if json {
        let declared = doc
            .get("integrity_id")
            .or_else(|| doc.get("ssot_id"))
            .and_then(|v| v.as_str());
        let out = serde_json::json!({
            "integrity_id": id,
            "declared": declared,
            "matches": declared.map(|d| d == id),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{id}");
    }
    Ok(())
}
