pub mod asset;
pub mod context;
pub mod permissions;
pub mod reference;
pub mod storage;
pub mod store;
pub mod tree;

pub use asset::{ActionBinding, Asset, SharedAsset, UNASSIGNED_ID};
pub use context::{SharedRegistry, UpdateContext};
pub use permissions::{Mode, Permissions};
pub use reference::{ActiveRef, AssetReference};
pub use storage::{AssetStorage, FileStorage, MemoryStorage, FIRST_ID};
pub use store::AssetStore;
pub use tree::{DirEntry, Directory, HardLink, SharedDirectory, SymLink};
