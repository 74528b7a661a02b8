//! The asset store: a POSIX-flavored directory tree whose leaves resolve
//! into assets.
//!
//! Traversal is permission-gated at every step: entering a directory takes
//! `x` on the effective permissions, reading a listing takes `r`, and
//! creating or replacing entries takes `w` on the parent, with the sticky
//! bit restricting overwrites of existing entries to their owners.

use crate::action::builtin::read_dir::ReadDir;
use crate::action::{ArgMap, INNER_GET};
use crate::core::{CallResult, Result, StoreError};
use crate::path::{PathComponent, TreePath};
use crate::store::asset::{Asset, SharedAsset, UNASSIGNED_ID};
use crate::store::context::UpdateContext;
use crate::store::permissions::{Mode, Permissions};
use crate::store::reference::ActiveRef;
use crate::store::storage::{self, AssetStorage};
use crate::store::tree::{self, DirEntry, Directory, SharedDirectory};
use lru::LruCache;
use serde_json::{json, Value as JsonValue};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

/// Upper bound on symbolic-link hops during one acquisition.
const MAX_LINK_DEPTH: usize = 32;

/// Missing permissions on a node grant access.
const ALLOW_ACCESS_BY_DEFAULT: bool = true;

const ID_CACHE_CAPACITY: usize = 1024;

struct StoreState {
    root: SharedDirectory,
    cache: LruCache<i64, SharedAsset>,
    next_id: i64,
}

pub struct AssetStore {
    storage: Box<dyn AssetStorage>,
    state: RwLock<StoreState>,
    /// Serializes tree mutations (store/remove/mkdir) against each other.
    /// Readers go lock-free at this level; the per-directory locks keep
    /// them consistent against the single active writer.
    mutation: std::sync::Mutex<()>,
}

/// Where a permission-gated traversal ended up.
enum ResolvedNode {
    Directory {
        dir: SharedDirectory,
        effective: Option<Permissions>,
    },
    Asset {
        id: i64,
    },
    Active {
        reference: ActiveRef,
        extras: Vec<String>,
        effective: Option<Permissions>,
    },
}

impl AssetStore {
    pub fn new(storage: Box<dyn AssetStorage>) -> Self {
        Self {
            storage,
            state: RwLock::new(StoreState {
                root: storage_root(),
                cache: LruCache::new(NonZeroUsize::new(ID_CACHE_CAPACITY).expect("nonzero")),
                next_id: storage::FIRST_ID,
            }),
            mutation: std::sync::Mutex::new(()),
        }
    }

    /// Read the directory tree and the id counter from the backend.
    pub fn load(&self) -> Result<()> {
        let root = self.storage.load_tree()?;
        {
            // the root directory always carries a permission entry
            let mut guard = root.write().expect("directory lock");
            if guard.permissions.is_none() {
                guard.permissions = Some(storage::default_root_permissions());
            }
        }
        let next_id = self.storage.load_next_id()?;
        let mut state = self.state.write().expect("store lock");
        state.root = root;
        state.next_id = next_id;
        Ok(())
    }

    /// Write the directory tree and the id counter back to the backend.
    pub fn save(&self) -> Result<()> {
        let (root, next_id) = {
            let state = self.state.read().expect("store lock");
            (Arc::clone(&state.root), state.next_id)
        };
        self.storage.save_tree(&root)?;
        self.storage.save_next_id(next_id)
    }

    pub fn root(&self) -> SharedDirectory {
        Arc::clone(&self.state.read().expect("store lock").root)
    }

    fn allocate_id(&self) -> i64 {
        let mut state = self.state.write().expect("store lock");
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    pub fn next_id(&self) -> i64 {
        self.state.read().expect("store lock").next_id
    }

    fn may_execute(&self, context: &UpdateContext, permissions: Option<&Permissions>) -> bool {
        match permissions {
            Some(permissions) => context.permission_granted(permissions, "x"),
            None => ALLOW_ACCESS_BY_DEFAULT,
        }
    }

    fn may_read(&self, context: &UpdateContext, permissions: Option<&Permissions>) -> bool {
        match permissions {
            Some(permissions) => context.permission_granted(permissions, "r"),
            None => ALLOW_ACCESS_BY_DEFAULT,
        }
    }

    fn parse_store_path(&self, path: &str) -> Result<TreePath> {
        // bracketed sequence indices have no meaning in the store tree
        if path.contains('[') {
            return Err(StoreError::InvalidArgument(format!(
                "invalid path: \"{}\"",
                path
            )));
        }
        TreePath::parse(path)
    }

    /// Permission-gated descent from the root. Follows symbolic links with
    /// a bounded depth and stops early on an active-asset mount, returning
    /// the unconsumed components as extras.
    fn resolve(&self, context: &UpdateContext, path: &TreePath) -> Result<ResolvedNode> {
        let mut current_path = path.clone();
        let mut link_depth = 0;

        'traversal: loop {
            let mut current_dir = self.root();
            let mut effective = current_dir.read().expect("directory lock").permissions.clone();

            let components = current_path.components().to_vec();
            for (i, component) in components.iter().enumerate() {
                let PathComponent::Key(name) = component else {
                    return Err(StoreError::InvalidArgument(format!(
                        "invalid path: \"{}\"",
                        current_path
                    )));
                };

                if !self.may_execute(context, effective.as_ref()) {
                    return Err(StoreError::PermissionDenied(format!(
                        "permission to enter \"{}\" is denied",
                        current_path.slice(0..i)
                    )));
                }

                let entry = current_dir
                    .read()
                    .expect("directory lock")
                    .get(name)
                    .ok_or_else(|| {
                        StoreError::NotFound(format!(
                            "path not found: \"{}\"",
                            current_path.slice(0..i + 1)
                        ))
                    })?;

                if let Some(own) = entry.own_permissions() {
                    effective = Some(own);
                }

                match entry {
                    DirEntry::Directory(_) | DirEntry::HardLink(_) => {
                        current_dir = entry.as_directory().expect("directory entry");
                    }
                    DirEntry::AssetId(id) => {
                        if i + 1 == components.len() {
                            return Ok(ResolvedNode::Asset { id });
                        }
                        return Err(StoreError::NotFound(format!(
                            "path continues past an asset: \"{}\"",
                            current_path
                        )));
                    }
                    DirEntry::Active(reference) => {
                        let extras = components[i + 1..]
                            .iter()
                            .map(ToString::to_string)
                            .collect();
                        return Ok(ResolvedNode::Active {
                            reference,
                            extras,
                            effective,
                        });
                    }
                    DirEntry::Link(link) => {
                        link_depth += 1;
                        if link_depth > MAX_LINK_DEPTH {
                            return Err(StoreError::InvalidArgument(format!(
                                "symlink depth exceeded at \"{}\"",
                                current_path
                            )));
                        }
                        let target = self.parse_store_path(&link.path)?;
                        current_path =
                            target.join(&current_path.slice(i + 1..components.len()));
                        continue 'traversal;
                    }
                }
            }

            return Ok(ResolvedNode::Directory {
                dir: current_dir,
                effective,
            });
        }
    }

    /// Load an asset by id through the cache, falling back to the backend.
    pub fn acquire_by_id(&self, asset_id: i64) -> Result<SharedAsset> {
        {
            let mut state = self.state.write().expect("store lock");
            if let Some(asset) = state.cache.get(&asset_id) {
                return Ok(Arc::clone(asset));
            }
        }

        let asset = Arc::new(self.storage.load_asset(asset_id)?);
        self.state
            .write()
            .expect("store lock")
            .cache
            .put(asset_id, Arc::clone(&asset));
        Ok(asset)
    }

    /// Resolve a path into an asset: a stored record, an active asset with
    /// inner-access extras stamped in, or a synthesized directory-listing
    /// asset for directories.
    pub fn acquire(&self, context: &UpdateContext, path: &str) -> Result<SharedAsset> {
        let tree_path = self.parse_store_path(path)?;
        match self.resolve(context, &tree_path)? {
            ResolvedNode::Directory { effective, .. } => {
                let mut args = ArgMap::new();
                args.insert("path".to_string(), json!(tree_path.to_string()));
                let mut virtual_asset =
                    Asset::new(Arc::new(ReadDir::new())).with_args(args);
                if let Some(permissions) = effective {
                    virtual_asset = virtual_asset.with_permissions(permissions);
                }
                Ok(virtual_asset.into_shared())
            }
            ResolvedNode::Asset { id } => self.acquire_by_id(id),
            ResolvedNode::Active {
                reference,
                extras,
                effective,
            } => self.acquire_active(context, path, reference, extras, effective),
        }
    }

    fn acquire_active(
        &self,
        context: &UpdateContext,
        path: &str,
        reference: ActiveRef,
        extras: Vec<String>,
        effective: Option<Permissions>,
    ) -> Result<SharedAsset> {
        let asset = self.acquire_by_id(reference.asset_id())?;
        if extras.is_empty() {
            return Ok(asset);
        }

        let gate = reference.permissions().cloned().or(effective);
        if !self.may_execute(context, gate.as_ref()) {
            return Err(StoreError::PermissionDenied(format!(
                "permission to execute denied: \"{}\"",
                path
            )));
        }

        let cloned = asset.clone_asset();
        cloned.set_arg(INNER_GET, json!(extras));
        Ok(cloned.into_shared())
    }

    /// Write gate of a directory: `w` on the effective permissions, plus
    /// owner-only overwrite of existing entries when the sticky bit is set.
    fn may_write_directory(
        &self,
        context: &UpdateContext,
        effective: Option<&Permissions>,
        dir: &SharedDirectory,
        key: &str,
    ) -> Result<bool> {
        let Some(permissions) = effective else {
            return Ok(ALLOW_ACCESS_BY_DEFAULT);
        };

        if !context.permission_granted(permissions, "w") {
            return Ok(false);
        }

        let existing = dir.read().expect("directory lock").get(key);
        if let Some(entry) = existing {
            if permissions.get_bit("t", "*") {
                let owner_permissions = match &entry {
                    DirEntry::AssetId(id) => self
                        .acquire_by_id(*id)
                        .ok()
                        .and_then(|asset| asset.permissions()),
                    other => other.own_permissions(),
                };
                let owner = owner_permissions.unwrap_or_else(|| permissions.clone());
                return Ok(owner.user_name() == context.get_user());
            }
        }
        Ok(true)
    }

    /// Splice `entry` in at `path`, materializing missing intermediate
    /// directories. Every materialization and the final write are gated.
    fn set_node(&self, context: &UpdateContext, path: &TreePath, entry: DirEntry) -> Result<()> {
        let _writer = self.mutation.lock().expect("mutation lock");

        if path.is_empty() {
            return Err(StoreError::PermissionDenied(
                "root can not be assigned".to_string(),
            ));
        }

        let mut current_dir = self.root();
        let mut effective = current_dir.read().expect("directory lock").permissions.clone();

        let components = path.components();
        for (i, component) in components[..components.len() - 1].iter().enumerate() {
            let PathComponent::Key(name) = component else {
                return Err(StoreError::InvalidArgument(format!(
                    "invalid path: \"{}\"",
                    path
                )));
            };

            let existing = current_dir.read().expect("directory lock").get(name);
            let next_dir = match existing {
                Some(entry) => {
                    if !self.may_execute(context, effective.as_ref()) {
                        return Err(StoreError::PermissionDenied(format!(
                            "not allowed to enter \"{}\"",
                            path.slice(0..i + 1)
                        )));
                    }
                    entry.as_directory().ok_or_else(|| {
                        StoreError::TypeMismatch(format!(
                            "\"{}\" is not a directory",
                            path.slice(0..i + 1)
                        ))
                    })?
                }
                None => {
                    if !self.may_write_directory(context, effective.as_ref(), &current_dir, name)? {
                        return Err(StoreError::PermissionDenied(format!(
                            "permission to create \"{}\" denied",
                            name
                        )));
                    }
                    let fresh = Directory::shared(None);
                    current_dir
                        .write()
                        .expect("directory lock")
                        .insert(name.clone(), DirEntry::Directory(Arc::clone(&fresh)));
                    fresh
                }
            };

            let own = next_dir.read().expect("directory lock").permissions.clone();
            if let Some(own) = own {
                effective = Some(own);
            }
            current_dir = next_dir;
        }

        let Some(PathComponent::Key(key)) = components.last() else {
            return Err(StoreError::InvalidArgument(format!(
                "invalid path: \"{}\"",
                path
            )));
        };

        if !self.may_write_directory(context, effective.as_ref(), &current_dir, key)? {
            return Err(StoreError::PermissionDenied(format!(
                "no write permission for \"{}\"",
                path
            )));
        }
        current_dir
            .write()
            .expect("directory lock")
            .insert(key.clone(), entry);
        Ok(())
    }

    /// Register an asset (allocating an id and writing the backend record)
    /// and, when a path is given, mount it in the tree. Inner-access-aware
    /// actions mount as active assets unless explicitly suppressed.
    pub fn store(
        &self,
        context: &UpdateContext,
        asset: &SharedAsset,
        path: Option<&str>,
        accept_inner_access: Option<bool>,
        mode: Option<Mode>,
    ) -> Result<()> {
        if asset.get_id() == UNASSIGNED_ID {
            asset.set_id(self.allocate_id());
        }

        if let Some(mode) = mode.clone() {
            asset.set_permissions(context.make_permissions(Some(mode))?);
        }

        self.storage.save_asset(asset)?;

        let Some(path) = path else {
            return Ok(());
        };
        let tree_path = self.parse_store_path(path)?;

        if accept_inner_access != Some(false) && asset.accepts_inner_access() {
            let permissions = match mode {
                Some(mode) => Some(context.make_permissions(Some(mode))?),
                None => None,
            };
            let reference = ActiveRef::new(asset.get_id(), permissions);
            self.set_node(context, &tree_path, DirEntry::Active(reference))?;
        } else {
            self.set_node(context, &tree_path, DirEntry::AssetId(asset.get_id()))?;
        }
        self.state
            .write()
            .expect("store lock")
            .cache
            .put(asset.get_id(), Arc::clone(asset));
        Ok(())
    }

    /// Create an empty directory at `path` with permissions derived from
    /// `mode`.
    pub fn mkdir(&self, context: &UpdateContext, path: &str, mode: Option<Mode>) -> Result<()> {
        let tree_path = self.parse_store_path(path)?;
        if tree_path.is_empty() {
            return Err(StoreError::InvalidArgument("path is not valid".to_string()));
        }

        let permissions = match mode {
            Some(mode) => Some(context.make_permissions(Some(mode))?),
            None => None,
        };
        let directory = Directory::shared(permissions);
        self.set_node(context, &tree_path, DirEntry::Directory(directory))
    }

    /// Place a symbolic link at `path` pointing to `target`.
    pub fn link(&self, context: &UpdateContext, path: &str, target: &str) -> Result<()> {
        let tree_path = self.parse_store_path(path)?;
        self.parse_store_path(target)?;
        self.set_node(context, &tree_path, DirEntry::Link(tree::SymLink::new(target)))
    }

    /// Place a hard link at `path` sharing the directory at `target`.
    pub fn hard_link(&self, context: &UpdateContext, path: &str, target: &str) -> Result<()> {
        let tree_path = self.parse_store_path(path)?;
        let target_path = self.parse_store_path(target)?;
        let ResolvedNode::Directory { dir, .. } = self.resolve(context, &target_path)? else {
            return Err(StoreError::TypeMismatch(format!(
                "hard link target is not a directory: \"{}\"",
                target
            )));
        };
        self.set_node(
            context,
            &tree_path,
            DirEntry::HardLink(tree::HardLink {
                path: target.to_string(),
                target: dir,
            }),
        )
    }

    /// Unmount the entry at `path`. The stored record is kept in the
    /// backend; the id cache forgets the asset so later id acquisitions
    /// re-read the backend.
    pub fn remove(&self, context: &UpdateContext, path: &str) -> Result<()> {
        let _writer = self.mutation.lock().expect("mutation lock");

        let tree_path = self.parse_store_path(path)?;
        if tree_path.is_empty() {
            return Err(StoreError::InvalidArgument(
                "root directory can not be removed".to_string(),
            ));
        }

        let parent_path = tree_path.parent().expect("non-empty path");
        let ResolvedNode::Directory { dir, effective } = self.resolve(context, &parent_path)?
        else {
            return Err(StoreError::NotFound(format!(
                "\"{}\" is not a directory",
                parent_path
            )));
        };

        let key = tree_path
            .last()
            .and_then(PathComponent::as_key)
            .ok_or_else(|| {
                StoreError::InvalidArgument(format!("invalid path: \"{}\"", path))
            })?;

        if !dir.read().expect("directory lock").contains(key) {
            return Err(StoreError::NotFound(format!("path not found: \"{}\"", path)));
        }
        if !self.may_write_directory(context, effective.as_ref(), &dir, key)? {
            return Err(StoreError::PermissionDenied(format!(
                "no write permission for \"{}\"",
                path
            )));
        }

        let removed = dir.write().expect("directory lock").remove(key);
        match removed {
            Some(DirEntry::AssetId(id)) => {
                self.state.write().expect("store lock").cache.pop(&id);
            }
            Some(DirEntry::Active(reference)) => {
                self.state
                    .write()
                    .expect("store lock")
                    .cache
                    .pop(&reference.asset_id());
            }
            _ => {}
        }
        Ok(())
    }

    /// Ordered listing of a directory's children. Requires `r`.
    pub fn read_directory(&self, context: &UpdateContext, path: &str) -> Result<JsonValue> {
        let tree_path = self.parse_store_path(path)?;
        let ResolvedNode::Directory { dir, effective } = self.resolve(context, &tree_path)?
        else {
            return Err(StoreError::TypeMismatch(format!(
                "\"{}\" is not a directory",
                path
            )));
        };

        if !self.may_read(context, effective.as_ref()) {
            return Err(StoreError::PermissionDenied("read access denied".to_string()));
        }

        let guard = dir.read().expect("directory lock");
        tree::directory_listing(&tree_path, &guard, effective.as_ref())
    }

    /// Acquire, update, and hand back the result in one call.
    pub fn query(&self, context: &mut UpdateContext, path: &str, kwargs: ArgMap) -> CallResult {
        match self.acquire(context, path) {
            Ok(asset) => {
                let updated = asset.update(context, kwargs);
                updated
                    .get_result()
                    .unwrap_or_else(|| CallResult::error("update produced no result"))
            }
            Err(err) => CallResult::from_store_error(&err, "acquire failed"),
        }
    }
}

fn storage_root() -> SharedDirectory {
    storage::empty_root()
}
