// # File Port Store
//
// File-based implementation of PortStore.
//
// ## Purpose
//
// Lets the agent run against an exported view of the network plane, e.g. a
// periodic dump written by another process. The file is re-read on every
// query, so changes show up in the next reconciliation cycle without a
// restart.
//
// ## Corruption Handling
//
// - A file that fails to parse is reported once per change with a warning
// - Queries fall back to the last snapshot that parsed
// - With no good snapshot yet, queries fail with `Error::PortStore`
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "networks": [{ "id": "n1", "tenant_id": "t1" }],
//   "ports": [{ "id": "p1", "network_id": "n1", "host": "h1" }],
//   "segments": [{ "id": "s1", "network_id": "n1", "network_type": "vlan",
//                  "segmentation_id": 100, "physical_network": "physnet1" }],
//   "binding_levels": [{ "port_id": "p1", "host": "h1", "level": 0,
//                        "driver": "f5ml2", "segment_id": "s1" }]
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use super::memory_store::PortSnapshot;
use crate::Error;
use crate::config::{AgentConfig, PortStoreConfig};
use crate::model::{BindingLevel, Network, Port, PortFilter, Segment};
use crate::traits::{PortStore, PortStoreFactory};

/// Snapshot file format version
const SNAPSHOT_FILE_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: String,
    #[serde(flatten)]
    snapshot: PortSnapshot,
}

/// File-backed, read-only port store
///
/// # Example
///
/// ```rust,no_run
/// use f5_agent_core::FilePortStore;
/// use f5_agent_core::PortStore;
/// use f5_agent_core::model::PortFilter;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FilePortStore::new("/var/lib/f5-agent/ports.json");
///     let ports = store.list_ports(&PortFilter::for_host("lb-host-1")).await?;
///     println!("{} ports bound here", ports.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FilePortStore {
    path: PathBuf,
    last_good: RwLock<Option<PortSnapshot>>,
}

impl FilePortStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_good: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<PortSnapshot, Error> {
        let read = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::port_store(format!("cannot read {}: {}", self.path.display(), e))
        });

        let parsed = read.and_then(|content| {
            serde_json::from_str::<SnapshotFile>(&content).map_err(|e| {
                Error::port_store(format!("corrupted snapshot {}: {}", self.path.display(), e))
            })
        });

        match parsed {
            Ok(file) => {
                if file.version != SNAPSHOT_FILE_VERSION {
                    tracing::warn!(
                        "Snapshot {} has version {}, expected {}",
                        self.path.display(),
                        file.version,
                        SNAPSHOT_FILE_VERSION
                    );
                }
                *self.last_good.write().await = Some(file.snapshot.clone());
                Ok(file.snapshot)
            }
            Err(e) => match self.last_good.read().await.clone() {
                Some(previous) => {
                    tracing::warn!("{}; using last good snapshot", e);
                    Ok(previous)
                }
                None => Err(e),
            },
        }
    }
}

#[async_trait]
impl PortStore for FilePortStore {
    async fn list_ports(&self, filter: &PortFilter) -> Result<Vec<Port>, Error> {
        Ok(self.load().await?.ports(filter))
    }

    async fn get_network(&self, network_id: &str) -> Result<Option<Network>, Error> {
        Ok(self.load().await?.network(network_id))
    }

    async fn get_binding_levels(
        &self,
        port_id: &str,
        host: &str,
    ) -> Result<Vec<BindingLevel>, Error> {
        Ok(self.load().await?.binding_levels(port_id, host))
    }

    async fn get_segment_by_id(&self, segment_id: &str) -> Result<Option<Segment>, Error> {
        Ok(self.load().await?.segment(segment_id))
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for the file-backed port store
pub struct FilePortStoreFactory;

impl PortStoreFactory for FilePortStoreFactory {
    fn create(&self, config: &AgentConfig) -> Result<Box<dyn PortStore>, Error> {
        match &config.port_store {
            PortStoreConfig::File { path } => Ok(Box::new(FilePortStore::new(path))),
            other => Err(Error::config(format!(
                "file port store cannot be built from '{}' configuration",
                other.type_name()
            ))),
        }
    }
}
