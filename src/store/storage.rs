//! Pluggable persistence backends: asset-id → serialized record, plus the
//! directory tree and next-id files.

use crate::core::{Result, StoreError};
use crate::persist::envelope::Persistable;
use crate::persist::portable;
use crate::store::asset::Asset;
use crate::store::permissions::Permissions;
use crate::store::tree::{self, Directory, SharedDirectory};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

pub trait AssetStorage: Send + Sync {
    fn save_asset(&self, asset: &Asset) -> Result<()>;
    fn load_asset(&self, asset_id: i64) -> Result<Asset>;
    fn delete_asset(&self, asset_id: i64) -> Result<()>;

    fn load_tree(&self) -> Result<SharedDirectory>;
    fn save_tree(&self, root: &SharedDirectory) -> Result<()>;

    fn load_next_id(&self) -> Result<i64>;
    fn save_next_id(&self, next_id: i64) -> Result<()>;
}

/// First asset id handed out by a fresh store.
pub const FIRST_ID: i64 = 100_000;

/// Permissions of a freshly initialized root directory.
pub fn default_root_permissions() -> Permissions {
    Permissions::new("root", Some("system"), Some(0o775.into())).expect("static mode")
}

pub fn empty_root() -> SharedDirectory {
    Directory::shared(Some(default_root_permissions()))
}

const TREE_FILENAME: &str = "directory";
const ID_FILENAME: &str = "nextId";

/// One JSON file per asset id below a base directory, plus
/// `directory.json` and `nextId.json`.
pub struct FileStorage {
    base_directory: PathBuf,
}

impl FileStorage {
    /// `base` may be portable (`[]/store`) or a host path; the directory is
    /// created when missing.
    pub fn new(base: &str) -> Result<Self> {
        let base_directory = portable::to_local(base)?;
        if !base_directory.exists() {
            std::fs::create_dir_all(&base_directory)?;
        }
        Ok(Self { base_directory })
    }

    fn filename(&self, name: &str) -> PathBuf {
        self.base_directory.join(format!("{}.json", name))
    }

    /// Write-temp-then-rename, so a crashed write never leaves a truncated
    /// record.
    fn write_atomic(&self, name: &str, payload: &str) -> Result<()> {
        let mut file = tempfile::NamedTempFile::new_in(&self.base_directory)
            .map_err(|e| StoreError::Backend(format!("temp file: {}", e)))?;
        file.write_all(payload.as_bytes())?;
        file.persist(self.filename(name))
            .map_err(|e| StoreError::Backend(format!("persist {}: {}", name, e)))?;
        Ok(())
    }

    fn read_json(&self, name: &str) -> Result<JsonValue> {
        let text = std::fs::read_to_string(self.filename(name))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl AssetStorage for FileStorage {
    fn save_asset(&self, asset: &Asset) -> Result<()> {
        let packed = serde_json::to_string_pretty(&asset.to_envelope()?)?;
        self.write_atomic(&asset.get_id().to_string(), &packed)
    }

    fn load_asset(&self, asset_id: i64) -> Result<Asset> {
        let node = self.read_json(&asset_id.to_string()).map_err(|_| {
            StoreError::NotFound(format!("no stored asset with id {}", asset_id))
        })?;
        crate::persist::standard().decode(&node)?.into_asset()
    }

    fn delete_asset(&self, asset_id: i64) -> Result<()> {
        match std::fs::remove_file(self.filename(&asset_id.to_string())) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_tree(&self) -> Result<SharedDirectory> {
        match self.read_json(TREE_FILENAME) {
            Ok(node) => {
                let root = tree::directory_from_json(&node)?;
                tree::resolve_hard_links(&root);
                Ok(root)
            }
            Err(err) => {
                tracing::info!(error = %err, "no directory file, starting with an empty root");
                Ok(empty_root())
            }
        }
    }

    fn save_tree(&self, root: &SharedDirectory) -> Result<()> {
        let node = tree::directory_to_json(root)?;
        self.write_atomic(TREE_FILENAME, &serde_json::to_string_pretty(&node)?)
    }

    fn load_next_id(&self) -> Result<i64> {
        match self.read_json(ID_FILENAME) {
            Ok(node) => node.as_i64().ok_or_else(|| {
                StoreError::Serialization(format!("invalid next id: {}", node))
            }),
            Err(err) => {
                tracing::info!(error = %err, "no next-id file, starting at the first id");
                Ok(FIRST_ID)
            }
        }
    }

    fn save_next_id(&self, next_id: i64) -> Result<()> {
        self.write_atomic(ID_FILENAME, &next_id.to_string())
    }
}

/// In-memory backend holding the same serialized forms the file backend
/// writes; used by tests and ephemeral stores.
#[derive(Default)]
pub struct MemoryStorage {
    assets: Mutex<HashMap<i64, String>>,
    tree: Mutex<Option<String>>,
    next_id: Mutex<Option<i64>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssetStorage for MemoryStorage {
    fn save_asset(&self, asset: &Asset) -> Result<()> {
        let packed = serde_json::to_string(&asset.to_envelope()?)?;
        self.assets
            .lock()
            .expect("storage lock")
            .insert(asset.get_id(), packed);
        Ok(())
    }

    fn load_asset(&self, asset_id: i64) -> Result<Asset> {
        let packed = self
            .assets
            .lock()
            .expect("storage lock")
            .get(&asset_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("no stored asset with id {}", asset_id)))?;
        crate::persist::standard().from_transport(&packed)?.into_asset()
    }

    fn delete_asset(&self, asset_id: i64) -> Result<()> {
        self.assets.lock().expect("storage lock").remove(&asset_id);
        Ok(())
    }

    fn load_tree(&self) -> Result<SharedDirectory> {
        match self.tree.lock().expect("storage lock").as_ref() {
            Some(packed) => {
                let node: JsonValue = serde_json::from_str(packed)?;
                let root = tree::directory_from_json(&node)?;
                tree::resolve_hard_links(&root);
                Ok(root)
            }
            None => Ok(empty_root()),
        }
    }

    fn save_tree(&self, root: &SharedDirectory) -> Result<()> {
        let node = tree::directory_to_json(root)?;
        *self.tree.lock().expect("storage lock") = Some(serde_json::to_string(&node)?);
        Ok(())
    }

    fn load_next_id(&self) -> Result<i64> {
        Ok(self.next_id.lock().expect("storage lock").unwrap_or(FIRST_ID))
    }

    fn save_next_id(&self, next_id: i64) -> Result<()> {
        *self.next_id.lock().expect("storage lock") = Some(next_id);
        Ok(())
    }
}
