/// Identity registry tests
///
/// Layered credential inheritance, guard layers, identity frames on the
/// update context, and entity metadata.
mod common;

use assetvault::persist::{standard, Persistable};
use assetvault::{bootstrap_entities, UserRegistry, WILDCARD};
use common::{context_for, demo_registry, memory_store};
use serde_json::json;

fn registry() -> UserRegistry {
    let mut registry = UserRegistry::new();
    bootstrap_entities(&mut registry);
    registry
}

#[test]
fn test_every_new_entity_inherits_the_wildcard() {
    let mut registry = UserRegistry::new();
    let entity = registry.make_entity("fresh").unwrap();
    assert!(entity.inherits_directly_from(WILDCARD));
    assert!(registry.inherits_from("fresh", WILDCARD));
}

#[test]
fn test_entities_always_hold_their_own_rights() {
    let registry = registry();
    for name in ["root", "alice", "bob", "team"] {
        for right in ["r", "w", "x"] {
            assert!(registry.has_right(name, right), "{} misses {}", name, right);
        }
    }
}

#[test]
fn test_inherited_rights_appear_in_the_effective_view() {
    let registry = registry();
    let bob = registry.get_entity("bob").unwrap();

    // team's and developers' own keys are visible through the layers
    assert_eq!(bob.effective_credential("r:team"), Some(true));
    assert_eq!(bob.effective_credential("w:developers"), Some(true));
    assert_eq!(bob.effective_credential("r:charly"), None);
}

#[test]
fn test_layer_changes_rematerialize_transitively() {
    let mut registry = registry();

    // revoking a right on the group shows through the whole chain
    registry.revoke_right("developers", "w");
    let bob = registry.get_entity("bob").unwrap();
    assert_eq!(bob.effective_credential("w:developers"), Some(false));

    registry.grant_right("developers", "w");
    let bob = registry.get_entity("bob").unwrap();
    assert_eq!(bob.effective_credential("w:developers"), Some(true));
}

#[test]
fn test_guard_layer_takes_precedence() {
    let mut registry = registry();
    let _ = registry.make_entity("lockdown");
    registry.revoke_right("lockdown", "w");

    // a guard layer is consulted before every other inherited layer;
    // bob's own keys still win
    registry.add_guard_layer_to_entity("bob", "lockdown");
    let bob = registry.get_entity("bob").unwrap();
    assert_eq!(bob.effective_credential("w:lockdown"), Some(false));
    assert!(bob.has_credential("w"));
}

#[test]
fn test_remove_layer_drops_inherited_keys() {
    let mut registry = registry();
    registry.remove_layer_from_entity("bob", "team");

    let bob = registry.get_entity("bob").unwrap();
    assert_eq!(bob.effective_credential("r:team"), None);
    assert!(!registry.inherits_from("bob", "developers"));
}

#[test]
fn test_entity_metadata_accessors() {
    let mut registry = registry();
    {
        let mut alice = registry.remove_entity("alice").unwrap();
        alice.set_fullname("Alice Liddell").set_email("alice@example.org");
        alice.set_umask(0o022);
        alice.set_meta("shell", json!("/bin/zsh"));
        assert_eq!(alice.fullname(), Some("Alice Liddell"));
        assert_eq!(alice.email(), Some("alice@example.org"));
        assert_eq!(alice.umask(), Some(0o022));
        assert_eq!(alice.get_meta("shell"), Some(&json!("/bin/zsh")));
    }
}

#[test]
fn test_identity_stack_push_pop() {
    let store = memory_store();
    let registry = demo_registry();
    let mut ctx = context_for(&store, &registry, "bob", "team");

    assert_eq!(ctx.get_user(), "bob");
    ctx.push_identity("root", "system");
    assert_eq!(ctx.get_user(), "root");
    assert_eq!(ctx.get_group(), "system");
    assert_eq!(ctx.real_user(), "bob");

    let popped = ctx.pop_identity().unwrap();
    assert_eq!(popped, ("root".to_string(), "system".to_string()));
    assert_eq!(ctx.get_user(), "bob");

    // the base frame stays
    assert!(ctx.pop_identity().is_err());
}

#[test]
fn test_registry_envelope_preserves_inheritance() {
    let registry = registry();
    let envelope = registry.to_envelope().unwrap();
    let decoded = standard()
        .decode(&envelope)
        .unwrap()
        .into_registry()
        .unwrap();

    assert!(decoded.inherits_from("bob", "team"));
    let bob = decoded.get_entity("bob").unwrap();
    assert_eq!(bob.effective_credential("r:team"), Some(true));
}
