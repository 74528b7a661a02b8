//! POSIX-style permission records: owner, optional group, and a map of
//! `<right>:<entity>` bits. Rights are `r`, `w`, `x`, plus `s` (setuid) and
//! `t` (sticky), both tracked on the `*` entity.

use crate::core::{Result, StoreError};
use crate::identity::UserRegistry;
use crate::persist::envelope::{Persistable, SourceLocator};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

pub type RightsMap = BTreeMap<String, bool>;

/// A mode argument: raw octal bits or an octal string of up to four digits
/// (special | user | group | other).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Bits(u32),
    Text(String),
}

impl Mode {
    pub fn bits(&self) -> Result<u32> {
        match self {
            Self::Bits(bits) => Ok(*bits),
            Self::Text(text) => {
                let digits = text.strip_prefix("0o").unwrap_or(text);
                u32::from_str_radix(digits, 8).map_err(|_| {
                    StoreError::InvalidArgument(format!("not an octal mode: \"{}\"", text))
                })
            }
        }
    }
}

impl From<u32> for Mode {
    fn from(bits: u32) -> Self {
        Self::Bits(bits)
    }
}

impl From<&str> for Mode {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Mode {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Permissions {
    user_name: String,
    group_name: Option<String>,
    permissions: RightsMap,
}

fn decode_digit(digit: u32) -> (bool, bool, bool) {
    (digit & 4 != 0, digit & 2 != 0, digit & 1 != 0)
}

impl Permissions {
    /// Build a permission record. Without a mode, owner and group start
    /// with full rights and no entry exists for others.
    ///
    /// Use [`Permissions::make`] where a registry is at hand, so owner and
    /// group names are validated.
    pub fn new(
        user: impl Into<String>,
        group: Option<&str>,
        mode: Option<Mode>,
    ) -> Result<Self> {
        let mut this = Self {
            user_name: user.into(),
            group_name: group.map(str::to_string),
            permissions: RightsMap::new(),
        };

        match mode {
            Some(mode) => this.chmod(mode)?,
            None => {
                this.set_rights_for(&this.user_name.clone(), true, true, true);
                if let Some(group) = this.group_name.clone() {
                    this.set_rights_for(&group, true, true, true);
                }
            }
        }
        Ok(this)
    }

    /// Validated construction: owner and group must be known entities.
    pub fn make(
        registry: &UserRegistry,
        user: &str,
        group: Option<&str>,
        mode: Option<Mode>,
    ) -> Result<Self> {
        if !registry.is_known_entity(user) {
            return Err(StoreError::InvalidArgument(format!(
                "invalid user name: {}",
                user
            )));
        }
        if let Some(group) = group {
            if !registry.is_known_entity(group) {
                return Err(StoreError::InvalidArgument(format!(
                    "invalid group name: {}",
                    group
                )));
            }
        }
        Self::new(user, group, mode)
    }

    /// Reconstruction from persisted parts.
    pub fn from_parts(
        user: impl Into<String>,
        group: Option<String>,
        permissions: RightsMap,
    ) -> Self {
        Self {
            user_name: user.into(),
            group_name: group,
            permissions,
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn rights(&self) -> &RightsMap {
        &self.permissions
    }

    fn set_rights_for(&mut self, entity: &str, r: bool, w: bool, x: bool) {
        self.permissions.insert(format!("r:{}", entity), r);
        self.permissions.insert(format!("w:{}", entity), w);
        self.permissions.insert(format!("x:{}", entity), x);
    }

    /// Apply an octal mode: special | user | group | other. The special
    /// digit drives `s:*` and `t:*`; its group bit is ignored.
    pub fn chmod(&mut self, mode: impl Into<Mode>) -> Result<()> {
        let bits = mode.into().bits()?;

        let special = (bits >> 9) & 0b111;
        let (u_r, u_w, u_x) = decode_digit((bits >> 6) & 0b111);
        let (g_r, g_w, g_x) = decode_digit((bits >> 3) & 0b111);
        let (o_r, o_w, o_x) = decode_digit(bits & 0b111);

        let user = self.user_name.clone();
        self.set_rights_for(&user, u_r, u_w, u_x);
        if let Some(group) = self.group_name.clone() {
            self.set_rights_for(&group, g_r, g_w, g_x);
        }
        self.set_rights_for("*", o_r, o_w, o_x);

        if special != 0 {
            let (s, _, t) = decode_digit(special);
            self.permissions.insert("s:*".to_string(), s);
            self.permissions.insert("t:*".to_string(), t);
        }
        Ok(())
    }

    fn migrate_rights(&mut self, from: Option<&str>, to: &str) {
        let (r, w, x) = match from {
            Some(old) => (
                self.permissions.remove(&format!("r:{}", old)).unwrap_or(true),
                self.permissions.remove(&format!("w:{}", old)).unwrap_or(true),
                self.permissions.remove(&format!("x:{}", old)).unwrap_or(true),
            ),
            None => (true, true, true),
        };
        self.permissions.insert(format!("r:{}", to), r);
        self.permissions.insert(format!("w:{}", to), w);
        self.permissions.insert(format!("x:{}", to), x);
    }

    /// Rename the owner, carrying the owner bits over.
    pub fn chown(&mut self, new_user: impl Into<String>) {
        let new_user = new_user.into();
        let old = self.user_name.clone();
        self.migrate_rights(Some(&old), &new_user);
        self.user_name = new_user;
    }

    /// Rename (or introduce) the group, carrying the group bits over.
    pub fn chgrp(&mut self, new_group: impl Into<String>) {
        let new_group = new_group.into();
        let old = self.group_name.clone();
        self.migrate_rights(old.as_deref(), &new_group);
        self.group_name = Some(new_group);
    }

    pub fn set_permission(&mut self, right: &str, entity: &str, value: bool) {
        self.permissions.insert(format!("{}:{}", right, entity), value);
    }

    pub fn get_bit(&self, right: &str, entity: &str) -> bool {
        self.permissions
            .get(&format!("{}:{}", right, entity))
            .copied()
            .unwrap_or(false)
    }

    /// The rights query. Grants iff
    /// - the entity is the owner, the owner bit is set, and the registry
    ///   still grants the owner that right; or
    /// - the group bit is set, the entity (transitively) inherits from the
    ///   group, and the registry grants the group that right; or
    /// - the `*` bit is set and the registry grants `*` that right.
    pub fn is_right_granted(&self, registry: &UserRegistry, entity: &str, right: &str) -> bool {
        if !registry.is_known_entity(entity) {
            return false; // no access for unknown entities
        }

        if entity == self.user_name
            && self.get_bit(right, &self.user_name)
            && registry.has_right(&self.user_name, right)
        {
            return true;
        }

        if let Some(group) = self.group_name.as_deref() {
            if self.get_bit(right, group)
                && registry.inherits_from(entity, group)
                && registry.has_right(group, right)
            {
                return true;
            }
        }

        registry.has_right("*", right) && self.get_bit(right, "*")
    }

    /// Nine-character `rwxrwxrwx` listing plus `+` when rights outside
    /// those nine exist, then owner and group.
    pub fn short_repr(&self) -> String {
        let mut tested = 0;
        let mut out = String::new();

        let mut flags_for = |name: Option<&str>| {
            for right in ["r", "w", "x"] {
                let flag = match name
                    .and_then(|n| self.permissions.get(&format!("{}:{}", right, n)))
                {
                    Some(true) => {
                        tested += 1;
                        right
                    }
                    Some(false) => {
                        tested += 1;
                        "-"
                    }
                    None => "-",
                };
                out.push_str(flag);
            }
        };

        flags_for(Some(&self.user_name));
        flags_for(self.group_name.as_deref());
        flags_for(Some("*"));

        if self.permissions.len() > tested {
            out.push('+');
        }
        out.push(' ');
        out.push_str(&self.user_name);
        out.push(' ');
        out.push_str(self.group_name.as_deref().unwrap_or("-"));
        out
    }

    /// Just the mode column of [`short_repr`](Self::short_repr).
    pub fn mode_string(&self) -> String {
        self.short_repr()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

impl Persistable for Permissions {
    fn source(&self) -> SourceLocator {
        SourceLocator::new("[]/src/store/permissions.rs", "Permissions")
    }

    fn ctor_params(&self) -> Result<JsonValue> {
        Ok(json!({
            "user": self.user_name,
            "group": self.group_name,
            "mode": self.permissions,
        }))
    }
}

/// Decoder counterpart of [`Persistable`] for [`Permissions`]: the `mode`
/// parameter may be a rights map (the normal persisted form) or an octal
/// value.
pub fn permissions_from_params(params: &JsonValue) -> Result<Permissions> {
    let user = params
        .get("user")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| StoreError::Serialization("Permissions params missing user".to_string()))?;
    let group = params
        .get("group")
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    match params.get("mode") {
        Some(JsonValue::Object(map)) => {
            let rights = map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_bool().unwrap_or(false)))
                .collect();
            Ok(Permissions::from_parts(user, group, rights))
        }
        Some(JsonValue::Number(n)) => Permissions::new(
            user,
            group.as_deref(),
            Some(Mode::Bits(n.as_u64().unwrap_or(0) as u32)),
        ),
        Some(JsonValue::String(text)) => {
            Permissions::new(user, group.as_deref(), Some(Mode::Text(text.clone())))
        }
        _ => Permissions::new(user, group.as_deref(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chmod_octal_bits() {
        let mut perm = Permissions::new("alice", Some("developers"), None).unwrap();
        perm.chmod(0o755).unwrap();

        assert!(perm.get_bit("r", "alice") && perm.get_bit("w", "alice") && perm.get_bit("x", "alice"));
        assert!(perm.get_bit("r", "developers") && !perm.get_bit("w", "developers"));
        assert!(perm.get_bit("r", "*") && !perm.get_bit("w", "*") && perm.get_bit("x", "*"));
    }

    #[test]
    fn test_chmod_string_with_special_digit() {
        let mut perm = Permissions::new("bob", Some("devs"), None).unwrap();
        perm.chmod("1775").unwrap();
        assert!(perm.get_bit("t", "*"));
        assert!(!perm.get_bit("s", "*"));
        assert!(perm.get_bit("w", "devs"));
        assert!(!perm.get_bit("w", "*"));
    }

    #[test]
    fn test_chown_migrates_bits() {
        let mut perm = Permissions::new("alice", Some("devs"), Some(Mode::Bits(0o744))).unwrap();
        perm.chown("bob");
        assert!(!perm.rights().contains_key("r:alice"));
        assert!(perm.get_bit("r", "bob") && perm.get_bit("w", "bob") && perm.get_bit("x", "bob"));
    }

    #[test]
    fn test_chgrp_without_prior_group_defaults_to_full() {
        let mut perm = Permissions::new("alice", None, None).unwrap();
        perm.chgrp("developers");
        assert!(perm.get_bit("r", "developers"));
        assert!(perm.get_bit("w", "developers"));
        assert!(perm.get_bit("x", "developers"));
    }

    #[test]
    fn test_short_repr_with_extended_bits() {
        // 0o5775: owner rwx, group rwx, others r-x, plus s/t extended keys
        let perm = Permissions::new("bob", Some("developers"), Some(Mode::Bits(0o5775))).unwrap();
        assert_eq!(perm.short_repr(), "rwxrwxr-x+ bob developers");
    }

    #[test]
    fn test_invalid_mode_string() {
        let mut perm = Permissions::new("alice", None, None).unwrap();
        assert!(perm.chmod("9x9").is_err());
    }
}
