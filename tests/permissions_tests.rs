/// Permission record tests
///
/// chmod/chown/chgrp behavior, rights queries against the identity
/// registry, and mode-bit derivation.
use assetvault::{bootstrap_entities, Mode, Permissions, UserRegistry};

fn registry() -> UserRegistry {
    let mut registry = UserRegistry::new();
    bootstrap_entities(&mut registry);
    registry
}

#[test]
fn test_initialization_without_mode() {
    let registry = registry();
    let perm = Permissions::make(&registry, "alice", Some("developers"), None).unwrap();

    for right in ["r", "w", "x"] {
        assert!(perm.get_bit(right, "alice"));
        assert!(perm.get_bit(right, "developers"));
    }
    // no entry for others until a mode assigns one
    assert!(!perm.rights().contains_key("r:*"));
}

#[test]
fn test_unknown_owner_or_group_is_rejected() {
    let registry = registry();
    assert!(Permissions::make(&registry, "nobody", None, None).is_err());
    assert!(Permissions::make(&registry, "alice", Some("ghosts"), None).is_err());
}

#[test]
fn test_chmod_bit_derivation() {
    let registry = registry();
    let mut perm = Permissions::make(&registry, "alice", Some("developers"), None).unwrap();
    perm.chmod(0o755).unwrap();

    // owner rwx
    assert!(perm.is_right_granted(&registry, "alice", "r"));
    assert!(perm.is_right_granted(&registry, "alice", "w"));
    assert!(perm.is_right_granted(&registry, "alice", "x"));
    // others r-x through the wildcard entity
    assert!(perm.is_right_granted(&registry, "charly", "r"));
    assert!(!perm.is_right_granted(&registry, "charly", "w"));
    assert!(perm.is_right_granted(&registry, "charly", "x"));
}

#[test]
fn test_chmod_with_octal_string() {
    let registry = registry();
    let mut perm = Permissions::make(&registry, "alice", Some("developers"), None).unwrap();
    perm.chmod("644").unwrap();

    assert!(perm.get_bit("r", "alice") && perm.get_bit("w", "alice"));
    assert!(!perm.get_bit("x", "alice"));
    assert!(perm.get_bit("r", "developers") && !perm.get_bit("w", "developers"));
    assert!(perm.get_bit("r", "*") && !perm.get_bit("w", "*"));
}

#[test]
fn test_group_membership_is_transitive() {
    let registry = registry();
    let perm = Permissions::make(
        &registry,
        "alice",
        Some("developers"),
        Some(Mode::Bits(0o775)),
    )
    .unwrap();

    // bob is in team, team is in developers
    assert!(perm.is_right_granted(&registry, "bob", "w"));
    // charly holds no group, only others apply
    assert!(!perm.is_right_granted(&registry, "charly", "w"));
    assert!(perm.is_right_granted(&registry, "charly", "r"));
    // unknown entities get nothing
    assert!(!perm.is_right_granted(&registry, "unknown", "r"));
}

#[test]
fn test_registry_revocation_beats_mode_bits() {
    let mut registry = registry();
    let perm = Permissions::make(
        &registry,
        "alice",
        Some("developers"),
        Some(Mode::Bits(0o700)),
    )
    .unwrap();

    assert!(perm.is_right_granted(&registry, "alice", "w"));
    // the owner bit stays set, but the registry no longer grants the right
    registry.revoke_right("alice", "w");
    assert!(!perm.is_right_granted(&registry, "alice", "w"));
    assert!(perm.is_right_granted(&registry, "alice", "r"));
}

#[test]
fn test_grant_revoke_monotonicity() {
    let mut registry = registry();
    registry.revoke_right("alice", "w");
    // revoking one right leaves the others untouched
    assert!(registry.has_right("alice", "r"));
    assert!(registry.has_right("alice", "x"));
    registry.grant_right("alice", "w");
    assert!(registry.has_right("alice", "r"));
    assert!(registry.has_right("alice", "w"));
}

#[test]
fn test_chown_migrates_owner_bits() {
    let registry = registry();
    let mut perm =
        Permissions::make(&registry, "alice", Some("developers"), Some(0o744.into())).unwrap();
    perm.chown("bob");

    assert!(!perm.rights().contains_key("r:alice"));
    assert_eq!(perm.user_name(), "bob");
    assert!(perm.get_bit("r", "bob") && perm.get_bit("w", "bob") && perm.get_bit("x", "bob"));
}

#[test]
fn test_chgrp_migrates_group_bits() {
    let registry = registry();
    let mut perm =
        Permissions::make(&registry, "alice", Some("developers"), Some(0o740.into())).unwrap();
    perm.chgrp("team");

    assert!(!perm.rights().contains_key("r:developers"));
    assert_eq!(perm.group_name(), Some("team"));
    assert!(perm.get_bit("r", "team"));
    assert!(!perm.get_bit("w", "team"));
}

#[test]
fn test_set_permission_for_arbitrary_entity() {
    let registry = registry();
    let mut perm = Permissions::make(&registry, "alice", Some("developers"), None).unwrap();

    perm.set_permission("r", "developers", false);
    assert!(!perm.get_bit("r", "developers"));

    perm.set_permission("r", "jane", true);
    assert!(perm.get_bit("r", "jane"));
}

#[test]
fn test_sticky_and_setuid_bits() {
    let registry = registry();
    let mut perm = Permissions::make(&registry, "alice", Some("developers"), None).unwrap();
    perm.chmod("1775").unwrap();
    assert!(perm.get_bit("t", "*"));
    assert!(!perm.get_bit("s", "*"));

    perm.chmod(0o4755).unwrap();
    assert!(perm.get_bit("s", "*"));
    assert!(!perm.get_bit("t", "*"));
}

#[test]
fn test_short_repr() {
    // the special digit adds s/t keys beyond the nine rwx bits, hence '+'
    let perm = Permissions::new("bob", Some("developers"), Some(Mode::Bits(0o5775))).unwrap();
    assert_eq!(perm.short_repr(), "rwxrwxr-x+ bob developers");

    let plain = Permissions::new("bob", Some("developers"), Some(Mode::Bits(0o754))).unwrap();
    assert_eq!(plain.short_repr(), "rwxr-xr-- bob developers");
}
