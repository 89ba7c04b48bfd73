//! Durable registry snapshot.
//!
//! Lets an interception point pick up its tab bindings and route
//! snapshots again after a restart. Holds no application data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::RouterResult;
use crate::routing::RoutePattern;

/// Serializable copy of both registry maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySnapshot {
    /// Tab id to consumer id.
    pub clients: BTreeMap<String, String>,
    /// Consumer id to route snapshot.
    pub routes: BTreeMap<String, Vec<RoutePattern>>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.routes.is_empty()
    }
}

/// JSON file holding the latest [`RegistrySnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, or `None` when no file exists yet.
    pub fn load(&self) -> RouterResult<Option<RegistrySnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let snapshot: RegistrySnapshot = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %self.path.display(),
            clients = snapshot.clients.len(),
            consumers = snapshot.routes.len(),
            "Loaded registry snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Replace the file with `snapshot`.
    ///
    /// Writes a sibling `.tmp` file and renames it over the target.
    pub fn save(&self, snapshot: &RegistrySnapshot) -> RouterResult<()> {
        let staging = self.staging_path();
        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        std::fs::rename(&staging, &self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            clients = snapshot.clients.len(),
            consumers = snapshot.routes.len(),
            "Saved registry snapshot"
        );
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
