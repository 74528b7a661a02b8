//! Portable paths: `[]/store/data` means "store/data below the project
//! root", `[HOME]/...` is anchored in the user's home directory. Portable
//! forms are what gets persisted; translation to a host path happens at
//! resolution time, so stored state moves between installations.

use crate::core::{Result, StoreError};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

lazy_static! {
    static ref PROJECT_ROOT: RwLock<PathBuf> = RwLock::new(default_root());
}

fn default_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(default_root)
}

/// Re-anchor the `[]` prefix, normally once at startup.
pub fn set_project_root(root: impl Into<PathBuf>) {
    let mut guard = PROJECT_ROOT.write().expect("project root lock");
    *guard = root.into();
}

pub fn project_root() -> PathBuf {
    PROJECT_ROOT.read().expect("project root lock").clone()
}

/// Translate a portable path into a host path. Non-portable input (no
/// bracketed prefix) passes through unchanged.
pub fn to_local(portable: &str) -> Result<PathBuf> {
    if !portable.starts_with('[') {
        return Ok(PathBuf::from(portable));
    }

    let end = portable.find(']').ok_or_else(|| {
        StoreError::InvalidArgument(format!("unmatched '[' in portable path: {}", portable))
    })?;
    let prefix = &portable[1..end];
    let rest = portable[end + 1..].trim_start_matches('/');

    let base = match prefix {
        "" => project_root(),
        "HOME" => home_dir(),
        other => {
            return Err(StoreError::InvalidArgument(format!(
                "unknown portable prefix: [{}]",
                other
            )))
        }
    };
    Ok(base.join(rest))
}

/// Translate a host path below the project root into its portable form.
/// Already-portable input passes through unchanged.
pub fn to_portable(path: &Path) -> Result<String> {
    let text = path.to_string_lossy();
    if text.starts_with('[') {
        return Ok(text.into_owned());
    }

    let root = project_root();
    let relative = path.strip_prefix(&root).map_err(|_| {
        StoreError::InvalidArgument(format!(
            "{} is not within the project root {}",
            path.display(),
            root.display()
        ))
    })?;
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Ok(format!("[]/{}", joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_round_trip() {
        let root = project_root();
        let local = to_local("[]/store/data").unwrap();
        assert_eq!(local, root.join("store/data"));
        assert_eq!(to_portable(&local).unwrap(), "[]/store/data");
    }

    #[test]
    fn test_plain_paths_pass_through() {
        assert_eq!(to_local("/tmp/x").unwrap(), PathBuf::from("/tmp/x"));
        assert_eq!(to_portable(Path::new("[]/a")).unwrap(), "[]/a");
    }

    #[test]
    fn test_unknown_prefix_is_rejected() {
        assert!(to_local("[EE]/lib").is_err());
        assert!(to_local("[broken/lib").is_err());
    }
}
