//! Filesystem-backed CounterStore implementation
//!
//! One JSON document per agent, replaced atomically on every save.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StateError, StorageError};
use crate::schema::AgentDocument;
use crate::storage_traits::{CounterStore, StorageResult};

const DOC_EXTENSION: &str = "json";

/// Filesystem-backed counter store: one JSON document per agent.
///
/// Layout: `<root>/<encoded agent id>.json`. Agent ids are percent-encoded
/// outside `[A-Za-z0-9._~-]` so any name maps to a single safe file name.
pub struct FsCounterStore {
    root: PathBuf,
}

impl FsCounterStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> crate::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            StateError::DataDir(format!("failed to create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, agent_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_agent_id(agent_id), DOC_EXTENSION))
    }
}

#[async_trait]
impl CounterStore for FsCounterStore {
    async fn load(&self, agent_id: &str) -> StorageResult<Option<AgentDocument>> {
        let path = self.doc_path(agent_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::CorruptDocument {
                agent_id: agent_id.to_string(),
                reason: e.to_string(),
            })?;
        AgentDocument::from_value(agent_id, value).map(Some)
    }

    async fn save(&self, doc: &AgentDocument) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let path = self.doc_path(&doc.agent_id);
        let root = self.root.clone();

        // Atomic write: temp file in the same directory, then rename over the old document.
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut tmp = NamedTempFile::new_in(&root)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Backend(format!("write task failed: {e}")))??;

        debug!(agent_id = %doc.agent_id, "agent document written");
        Ok(())
    }

    async fn list_agents(&self) -> StorageResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut agents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION) {
                continue;
            }
            if let Some(agent) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_agent_id)
            {
                agents.push(agent);
            }
        }
        agents.sort();
        Ok(agents)
    }
}

fn encode_agent_id(agent_id: &str) -> String {
    urlencoding::encode(agent_id).into_owned()
}

fn decode_agent_id(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|name| name.into_owned())
}
