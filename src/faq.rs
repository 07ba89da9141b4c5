//! Frequently asked questions shown under every page render

use crate::error::AssistantError;
use crate::models::FaqItem;
use crate::Result;
use std::path::Path;

/// Read the FAQ file. It is re-read on every render so edits show up without a restart.
pub async fn load_faq(path: &Path) -> Result<Vec<FaqItem>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AssistantError::Faq(format!("cannot read {}: {}", path.display(), e)))?;

    serde_json::from_str(&raw)
        .map_err(|e| AssistantError::Faq(format!("malformed {}: {}", path.display(), e)))
}
