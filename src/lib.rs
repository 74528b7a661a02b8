// ============================================================================
// AssetVault Library
// ============================================================================

pub mod action;
pub mod core;
pub mod identity;
pub mod path;
pub mod persist;
pub mod store;
pub mod update;
pub mod web;

// Re-export main types for convenience
pub use crate::core::{try_call, CallError, CallResult, Result, Schema, StoreError};
pub use action::{
    Action, ActionMount, ActionRegistry, ArgMap, DispatchTable, Help, ParamType, VariantSpec,
};
pub use identity::{Entity, UserRegistry, WILDCARD};
pub use path::ops::{path_del, path_get, path_get_required, path_get_with, path_iter, path_set};
pub use path::{PathComponent, TreePath};
pub use persist::{Decoded, Persistable, PersistRegistry, SourceLocator};
pub use store::{
    ActionBinding, ActiveRef, Asset, AssetReference, AssetStorage, AssetStore, DirEntry,
    Directory, FileStorage, MemoryStorage, Mode, Permissions, SharedAsset, SharedRegistry,
    SymLink, UpdateContext, FIRST_ID, UNASSIGNED_ID,
};
pub use web::{Gateway, GatewayConfig};

/// The demo identity set: three users, a system group, and a team that is
/// part of the developers group, with bob on the team.
pub fn bootstrap_entities(registry: &mut UserRegistry) {
    for name in ["root", "alice", "bob", "charly", "system", "team", "developers"] {
        let _ = registry.make_entity(name);
    }

    // all team members are devs
    registry.add_layer_to_entity("root", "system");
    registry.add_layer_to_entity("team", "developers");

    // bob is a member of the team
    registry.add_layer_to_entity("bob", "team");
}
