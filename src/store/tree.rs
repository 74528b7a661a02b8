//! The directory tree: nested name→entry mappings whose leaves are asset
//! ids, active-asset references, and links.
//!
//! A directory owns its optional permission record, serialized under the
//! distinguished empty-string key. Hard links share another directory's
//! mapping; symbolic links hold a store path that traversal follows.

use crate::core::{Result, StoreError};
use crate::path::TreePath;
use crate::persist::envelope::{Decoded, Persistable, SourceLocator};
use crate::store::permissions::Permissions;
use crate::store::reference::ActiveRef;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Key of a directory's own permission record in serialized form.
pub const PERMISSIONS_KEY: &str = "";

pub type SharedDirectory = Arc<RwLock<Directory>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SymLink {
    pub path: String,
    pub permissions: Option<Permissions>,
}

impl SymLink {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            permissions: None,
        }
    }
}

impl Persistable for SymLink {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/store/tree.rs", "SymLink")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        let permissions = match &self.permissions {
            Some(p) => p.to_envelope()?,
            None => JsonValue::Null,
        };
        Ok(json!({ "path": self.path, "permissions": permissions }))
    }
}

/// A shared view of another directory. Persisted by path only; the shared
/// mapping is re-established after the tree is loaded.
#[derive(Debug, Clone)]
pub struct HardLink {
    pub path: String,
    pub target: SharedDirectory,
}

/// The persisted form of a hard link, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct HardLinkRecord {
    pub path: String,
}

impl Persistable for HardLink {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/store/tree.rs", "HardLink")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        Ok(json!({ "path": self.path }))
    }
}

#[derive(Clone)]
pub enum DirEntry {
    Directory(SharedDirectory),
    AssetId(i64),
    Active(ActiveRef),
    Link(SymLink),
    HardLink(HardLink),
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_) | Self::HardLink(_))
    }

    /// The directory behind this entry, following a hard link's shared
    /// mapping.
    pub fn as_directory(&self) -> Option<SharedDirectory> {
        match self {
            Self::Directory(dir) => Some(Arc::clone(dir)),
            Self::HardLink(link) => Some(Arc::clone(&link.target)),
            _ => None,
        }
    }

    /// The entry's own permissions: a directory's `""` record, a
    /// permission-bearing reference's own record, otherwise none. For hard
    /// links the shared directory's own record prevails.
    pub fn own_permissions(&self) -> Option<Permissions> {
        match self {
            Self::Directory(dir) => dir.read().expect("directory lock").permissions.clone(),
            Self::HardLink(link) => link.target.read().expect("directory lock").permissions.clone(),
            Self::Active(active) => active.permissions().cloned(),
            Self::Link(link) => link.permissions.clone(),
            Self::AssetId(_) => None,
        }
    }
}

impl std::fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(_) => write!(f, "Directory"),
            Self::AssetId(id) => write!(f, "AssetId({})", id),
            Self::Active(active) => write!(f, "Active({})", active.asset_id()),
            Self::Link(link) => write!(f, "SymLink({})", link.path),
            Self::HardLink(link) => write!(f, "HardLink({})", link.path),
        }
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    pub permissions: Option<Permissions>,
    entries: BTreeMap<String, DirEntry>,
}

impl Directory {
    pub fn new(permissions: Option<Permissions>) -> Self {
        Self {
            permissions,
            entries: BTreeMap::new(),
        }
    }

    pub fn shared(permissions: Option<Permissions>) -> SharedDirectory {
        Arc::new(RwLock::new(Self::new(permissions)))
    }

    pub fn get(&self, name: &str) -> Option<DirEntry> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: DirEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        self.entries.remove(name)
    }

    /// Child names in order. The permissions key is not a child and never
    /// shows up here.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialize a directory tree into the persisted mapping form.
pub fn directory_to_json(dir: &SharedDirectory) -> Result<JsonValue> {
    let guard = dir.read().expect("directory lock");
    let mut map = JsonMap::new();

    if let Some(permissions) = &guard.permissions {
        map.insert(PERMISSIONS_KEY.to_string(), permissions.to_envelope()?);
    }

    for name in guard.names() {
        let entry = guard.get(&name).expect("iterating own names");
        let node = match entry {
            DirEntry::Directory(sub) => directory_to_json(&sub)?,
            DirEntry::AssetId(id) => json!(id),
            DirEntry::Active(active) => active.to_envelope()?,
            DirEntry::Link(link) => link.to_envelope()?,
            DirEntry::HardLink(link) => link.to_envelope()?,
        };
        map.insert(name, node);
    }
    Ok(JsonValue::Object(map))
}

/// Rebuild a directory tree from its persisted form. Hard links come back
/// with placeholder targets; run [`resolve_hard_links`] on the full tree
/// afterwards.
pub fn directory_from_json(value: &JsonValue) -> Result<SharedDirectory> {
    let registry = crate::persist::standard();
    let map = value.as_object().ok_or_else(|| {
        StoreError::Serialization("directory node must be a mapping".to_string())
    })?;

    let permissions = match map.get(PERMISSIONS_KEY) {
        Some(node) => Some(registry.decode(node)?.into_permissions()?),
        None => None,
    };
    let dir = Directory::shared(permissions);

    for (name, node) in map {
        if name == PERMISSIONS_KEY {
            continue;
        }
        let entry = match node {
            JsonValue::Number(n) => DirEntry::AssetId(n.as_i64().ok_or_else(|| {
                StoreError::Serialization(format!("invalid asset id: {}", n))
            })?),
            JsonValue::Object(obj) if obj.contains_key(crate::persist::envelope::OBJECT_SOURCE_KEY) => {
                match registry.decode(node)? {
                    Decoded::ActiveRef(active) => DirEntry::Active(active),
                    Decoded::SymLink(link) => DirEntry::Link(link),
                    Decoded::HardLink(record) => DirEntry::HardLink(HardLink {
                        path: record.path,
                        target: Directory::shared(None),
                    }),
                    other => {
                        return Err(StoreError::Serialization(format!(
                            "unexpected directory entry of kind {}",
                            other.kind()
                        )))
                    }
                }
            }
            JsonValue::Object(_) => DirEntry::Directory(directory_from_json(node)?),
            other => {
                return Err(StoreError::Serialization(format!(
                    "invalid directory entry: {}",
                    other
                )))
            }
        };
        dir.write().expect("directory lock").insert(name.clone(), entry);
    }
    Ok(dir)
}

/// Re-establish the shared mappings of hard links after a tree load. A
/// dangling link keeps its empty placeholder and is logged.
pub fn resolve_hard_links(root: &SharedDirectory) {
    let mut links = Vec::new();
    collect_hard_links(root, &mut links);

    for (holder, name, path) in links {
        match lookup_directory(root, &path) {
            Some(target) => {
                let mut guard = holder.write().expect("directory lock");
                guard.insert(name, DirEntry::HardLink(HardLink { path, target }));
            }
            None => tracing::warn!(path = %path, "dangling hard link"),
        }
    }
}

fn collect_hard_links(dir: &SharedDirectory, out: &mut Vec<(SharedDirectory, String, String)>) {
    let guard = dir.read().expect("directory lock");
    for name in guard.names() {
        match guard.get(&name).expect("iterating own names") {
            DirEntry::HardLink(link) => out.push((Arc::clone(dir), name, link.path)),
            DirEntry::Directory(sub) => collect_hard_links(&sub, out),
            _ => {}
        }
    }
}

/// Plain (permission-free) walk used for link resolution.
fn lookup_directory(root: &SharedDirectory, path: &str) -> Option<SharedDirectory> {
    let tree_path = TreePath::parse(path).ok()?;
    let mut current = Arc::clone(root);
    for component in tree_path.components() {
        let name = component.as_key()?;
        let entry = current.read().expect("directory lock").get(name)?;
        current = match entry {
            DirEntry::Directory(sub) => sub,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a directory as the listing record of `read_directory`: ordered
/// children with name, mode column, owner, group, and a directory flag.
pub fn directory_listing(
    path: &TreePath,
    dir: &Directory,
    effective: Option<&Permissions>,
) -> Result<JsonValue> {
    let own = dir.permissions.as_ref().or(effective);

    let mut contents = Vec::new();
    for name in dir.names() {
        let entry = dir.get(&name).expect("iterating own names");
        let entry_permissions = entry.own_permissions();
        let shown = entry_permissions.as_ref().or(own);
        contents.push(match shown {
            Some(permissions) => json!({
                "name": name,
                "rights": permissions.mode_string(),
                "user": permissions.user_name(),
                "group": permissions.group_name(),
                "dir": entry.is_directory(),
            }),
            None => json!({
                "name": name,
                "rights": "---------",
                "user": JsonValue::Null,
                "group": JsonValue::Null,
                "dir": entry.is_directory(),
            }),
        });
    }

    Ok(json!({
        "path": path.to_string(),
        "permissions": match own {
            Some(permissions) => permissions.to_envelope()?,
            None => JsonValue::Null,
        },
        "contents": contents,
    }))
}
