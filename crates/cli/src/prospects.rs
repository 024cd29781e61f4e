//! File-backed prospect source.
//!
//! Resolves a campaign's prospect-list reference to
//! `<root>/<list_id>.json`, a JSON array of prospect records. The
//! production deployment swaps this for the object-storage loader.

use std::path::PathBuf;

use async_trait::async_trait;

use engine::models::ProspectRecord;
use engine::{EngineError, ProspectSource};

pub struct FsProspectSource {
    root: PathBuf,
}

impl FsProspectSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ProspectSource for FsProspectSource {
    async fn fetch(&self, list_id: &str) -> Result<Vec<ProspectRecord>, EngineError> {
        if list_id.contains(['/', '\\']) {
            return Err(EngineError::Validation(format!(
                "invalid prospect list id: {list_id}"
            )));
        }
        let path = self.root.join(format!("{list_id}.json"));
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| EngineError::NotFound(format!("prospect list {list_id}")))?;
        serde_json::from_str(&content).map_err(|err| {
            EngineError::Validation(format!("prospect list {list_id} is malformed: {err}"))
        })
    }
}
