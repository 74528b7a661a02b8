/// Persistence tests
///
/// Envelope round-trips for permissions, registries, and full asset
/// records; opaque preservation of unknown classes; file-backend reload.
mod common;

use assetvault::action::builtin::read_dir::ReadDir;
use assetvault::persist::{standard, Decoded, Persistable, OBJECT_SOURCE_KEY};
use assetvault::{
    bootstrap_entities, ActionRegistry, ArgMap, Asset, AssetReference, AssetStore, CallResult,
    FileStorage, Mode, Permissions, UserRegistry,
};
use common::{context_for, demo_registry, memory_store};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, RwLock};

#[test]
fn test_permissions_envelope_round_trip() {
    let perm = Permissions::new("bob", Some("developers"), Some(Mode::Bits(0o5775))).unwrap();
    let envelope = perm.to_envelope().unwrap();

    let decoded = standard().decode(&envelope).unwrap().into_permissions().unwrap();
    assert_eq!(decoded.short_repr(), "rwxrwxr-x+ bob developers");
    assert_eq!(decoded, perm);
}

#[test]
fn test_envelope_shape() {
    let perm = Permissions::new("alice", None, None).unwrap();
    let envelope = perm.to_envelope().unwrap();

    let source = envelope[OBJECT_SOURCE_KEY].as_array().unwrap();
    assert_eq!(source.len(), 4);
    assert!(source[0].as_str().unwrap().starts_with("[]/"));
    assert_eq!(source[1], json!("Permissions"));
    assert!(source[2].is_string());
    assert!(source[3].is_object());
}

#[test]
fn test_registry_envelope_round_trip() {
    let mut registry = UserRegistry::new();
    bootstrap_entities(&mut registry);

    let envelope = registry.to_envelope().unwrap();
    let decoded = standard().decode(&envelope).unwrap().into_registry().unwrap();

    assert!(decoded.is_known_entity("bob"));
    assert!(decoded.inherits_from("bob", "developers"));
    assert!(decoded.has_right("alice", "w"));
    // the wildcard entity survives
    assert!(decoded.is_known_entity("*"));
}

#[test]
fn test_asset_envelope_round_trip() {
    let mut args = ArgMap::new();
    args.insert("path".to_string(), json!("somewhere"));

    let asset = Asset::new(Arc::new(ReadDir::new()))
        .with_args(args)
        .with_permissions(Permissions::new("root", Some("system"), Some(0o775.into())).unwrap())
        .with_updater("make");
    asset.set_id(123_456);
    asset.set_meta("make_phony", json!(true)).unwrap();
    asset.add_dependencies(vec![
        AssetReference::by_id(100_001),
        AssetReference::by_path("bin.ls").named("lister"),
    ]);
    asset.set_result(CallResult::valid(json!({"ok": true})));

    let envelope = asset.to_envelope().unwrap();
    let decoded = standard().decode(&envelope).unwrap().into_asset().unwrap();

    assert_eq!(decoded.get_id(), 123_456);
    assert_eq!(decoded.updater(), "make");
    assert!(decoded.is_phony());
    assert_eq!(decoded.action_args()["path"], json!("somewhere"));
    assert_eq!(decoded.permissions().unwrap().user_name(), "root");
    assert_eq!(decoded.dependencies().len(), 2);
    assert_eq!(
        decoded.get_dependency_by_name("lister").unwrap(),
        AssetReference::by_path("bin.ls").named("lister")
    );
    assert_eq!(
        decoded.get_result().unwrap().get_result(JsonValue::Null),
        json!({"ok": true})
    );
    assert_eq!(
        decoded.creation_date().timestamp_millis(),
        asset.creation_date().timestamp_millis()
    );
}

#[test]
fn test_error_result_round_trip() {
    let asset = Asset::new(Arc::new(ReadDir::new()));
    asset.set_result(CallResult::error("something broke"));

    let envelope = asset.to_envelope().unwrap();
    let decoded = standard().decode(&envelope).unwrap().into_asset().unwrap();

    let result = decoded.get_result().unwrap();
    assert!(result.is_error());
    assert_eq!(result.error_info().unwrap().message, "something broke");
}

#[test]
fn test_unknown_action_class_is_preserved() {
    // a record whose action class this build does not know
    let envelope = json!({
        (OBJECT_SOURCE_KEY): [
            "[]/src/store/asset.rs", "Asset", "0.1.0",
            {
                "action": {
                    (OBJECT_SOURCE_KEY): [
                        "[]/plugins/vanished.rs", "VanishedAction", "9.9",
                        {"knob": 42}
                    ]
                },
                "action_args": {},
                "local_id": 100_777,
                "updater": "basic",
                "meta": {},
            }
        ]
    });

    let decoded = standard().decode(&envelope).unwrap().into_asset().unwrap();
    let re_encoded = decoded.to_envelope().unwrap();
    // the unknown class travels through untouched
    assert_eq!(
        re_encoded[OBJECT_SOURCE_KEY][3]["action"],
        envelope[OBJECT_SOURCE_KEY][3]["action"]
    );

    // running it reports the missing factory instead of guessing
    let store = memory_store();
    let registry = demo_registry();
    let mut ctx = context_for(&store, &registry, "root", "system");
    let shared = decoded.into_shared();
    shared.set_permissions(Permissions::new("root", Some("system"), Some(0o775.into())).unwrap());
    let updated = shared.update(&mut ctx, ArgMap::new());
    assert_eq!(
        updated.get_result().unwrap().error_info().unwrap().exception,
        "ReloadFailed"
    );
}

#[test]
fn test_unknown_top_level_class_decodes_to_opaque() {
    let envelope = json!({
        (OBJECT_SOURCE_KEY): ["[]/lost.rs", "Lost", "1.0", {"payload": [1, 2, 3]}]
    });
    match standard().decode(&envelope).unwrap() {
        Decoded::Opaque(opaque) => {
            assert_eq!(opaque.class_name, "Lost");
            assert_eq!(opaque.to_envelope().unwrap(), envelope);
        }
        other => panic!("expected opaque, got {}", other.kind()),
    }
}

#[test]
fn test_stateful_action_persists_its_state() {
    common::register_test_factories();
    let store = memory_store();
    let registry = demo_registry();
    let mut ctx = context_for(&store, &registry, "root", "system");

    let stamper = Asset::new(Arc::new(common::PrefixAction::new(">> "))).into_shared();
    store
        .store(&ctx, &stamper, Some("bin.stamp"), None, Some("755".into()))
        .unwrap();

    // drop the live instance and force a backend read
    store.remove(&ctx, "bin.stamp").unwrap();
    let reloaded = store.acquire_by_id(stamper.get_id()).unwrap();

    let mut args = ArgMap::new();
    args.insert("text".to_string(), json!("hello"));
    let result = reloaded.update(&mut ctx, args).get_result().unwrap();
    assert_eq!(result.get_result(JsonValue::Null), json!(">> hello"));
}

#[test]
fn test_nothing_sentinel() {
    let node = assetvault::persist::nothing_envelope();
    assert!(matches!(standard().decode(&node).unwrap(), Decoded::Nothing));
}

#[test]
fn test_file_backend_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().to_str().unwrap().to_string();

    let mut registry = UserRegistry::new();
    bootstrap_entities(&mut registry);
    let registry = Arc::new(RwLock::new(registry));

    // first life: mount the builtin surface and save
    {
        let store = Arc::new(AssetStore::new(Box::new(FileStorage::new(&base).unwrap())));
        store.load().unwrap();
        let ctx = context_for(&store, &registry, "root", "system");
        ActionRegistry::standard().create_registered(&ctx).unwrap();
        store.save().unwrap();
    }

    assert!(dir.path().join("directory.json").exists());
    assert!(dir.path().join("nextId.json").exists());

    // second life: reload and use the persisted tree
    let store = Arc::new(AssetStore::new(Box::new(FileStorage::new(&base).unwrap())));
    store.load().unwrap();
    assert!(store.next_id() > assetvault::FIRST_ID);

    let mut ctx = context_for(&store, &registry, "root", "system");
    let ls = store.acquire(&ctx, "bin.ls").unwrap();
    let result = ls.update(&mut ctx, ArgMap::new()).get_result().unwrap();
    let listing = result.get_result(JsonValue::Null);
    let names: Vec<&str> = listing["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"bin"));
    assert!(names.contains(&"www"));
}
