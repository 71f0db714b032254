use crate::error::{ErrorKind, RegistryError};
use crate::profile_store::{Identity, Profile, ProfileStore};

const T0: u64 = 1_700_000_000;

fn identity(value: &str) -> Identity {
    Identity::new(value)
}

fn create_test_store() -> ProfileStore {
    let mut store = ProfileStore::new();
    store
        .create_profile(&identity("addr-alice"), "ipfs://alice-v1", "alice", T0)
        .unwrap();
    store
}

#[test]
fn test_create_profile_sets_all_fields() {
    let store = create_test_store();
    let profile = store.profile(&identity("addr-alice")).unwrap();

    assert_eq!(profile.identity, identity("addr-alice"));
    assert_eq!(profile.handle, "alice");
    assert_eq!(profile.content_pointer, "ipfs://alice-v1");
    assert_eq!(profile.created_at, T0);
    assert_eq!(profile.updated_at, T0);
    assert_eq!(profile.view_count, 0);

    assert_eq!(store.profile_count(), 1);
    assert_eq!(store.roster(), &[identity("addr-alice")]);
}

#[test]
fn test_create_rejects_second_profile_for_identity() {
    let mut store = create_test_store();
    let err = store
        .create_profile(&identity("addr-alice"), "ipfs://other", "alice2", T0 + 1)
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::ProfileExists {
            identity: "addr-alice".to_string()
        }
    );
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(store.profile_count(), 1);
}

#[test]
fn test_create_rejects_taken_handle() {
    let mut store = create_test_store();
    let err = store
        .create_profile(&identity("addr-bob"), "ipfs://bob", "alice", T0 + 1)
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::HandleTaken {
            handle: "alice".to_string()
        }
    );
    assert!(!store.contains(&identity("addr-bob")));
}

#[test]
fn test_create_handle_length_bounds() {
    let mut store = ProfileStore::new();

    let err = store
        .create_profile(&identity("a"), "ipfs://x", "ab", T0)
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::HandleTooShort {
            handle: "ab".to_string(),
            length: 2
        }
    );

    let long = "a".repeat(21);
    let err = store
        .create_profile(&identity("a"), "ipfs://x", &long, T0)
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::HandleTooLong {
            handle: long.clone(),
            length: 21
        }
    );

    // Exactly 20 valid characters succeeds
    let max = "a".repeat(20);
    store
        .create_profile(&identity("a"), "ipfs://x", &max, T0)
        .unwrap();
    assert_eq!(store.profile(&identity("a")).unwrap().handle, max);
}

#[test]
fn test_create_rejects_invalid_characters() {
    let mut store = ProfileStore::new();
    let err = store
        .create_profile(&identity("a"), "ipfs://x", "ab!", T0)
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::HandleInvalidChars {
            handle: "ab!".to_string()
        }
    );
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_create_rejects_empty_content_pointer() {
    let mut store = ProfileStore::new();
    let err = store
        .create_profile(&identity("a"), "", "alice", T0)
        .unwrap_err();
    assert_eq!(err, RegistryError::EmptyContentPointer);
}

#[test]
fn test_create_check_order_charset_before_existence() {
    // Caller already has a profile AND offers a malformed handle; the
    // charset failure is reported first per the documented order.
    let mut store = create_test_store();
    let err = store
        .create_profile(&identity("addr-alice"), "ipfs://x", "x!y", T0 + 1)
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::HandleInvalidChars {
            handle: "x!y".to_string()
        }
    );
}

#[test]
fn test_create_check_order_existence_before_pointer() {
    let mut store = create_test_store();
    let err = store
        .create_profile(&identity("addr-alice"), "", "fresh-handle", T0 + 1)
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::ProfileExists {
            identity: "addr-alice".to_string()
        }
    );
}

#[test]
fn test_create_check_order_length_before_taken() {
    // "ab" is both too short and unclaimed; length is checked first
    let mut store = create_test_store();
    let err = store
        .create_profile(&identity("addr-bob"), "ipfs://bob", "ab", T0 + 1)
        .unwrap_err();
    assert!(matches!(err, RegistryError::HandleTooShort { .. }));
}

#[test]
fn test_failed_create_leaves_no_partial_state() {
    let mut store = create_test_store();
    store
        .create_profile(&identity("addr-bob"), "", "bobby", T0 + 1)
        .unwrap_err();

    // Handle must not have been reserved by the failed attempt
    assert!(store.is_handle_available("bobby"));
    assert!(!store.contains(&identity("addr-bob")));
    assert_eq!(store.roster().len(), 1);
}

#[test]
fn test_update_content_returns_previous_pointer() {
    let mut store = create_test_store();
    let previous = store
        .update_content(&identity("addr-alice"), "ipfs://alice-v2", T0 + 10)
        .unwrap();

    assert_eq!(previous, "ipfs://alice-v1");

    let profile = store.profile(&identity("addr-alice")).unwrap();
    assert_eq!(profile.content_pointer, "ipfs://alice-v2");
    assert_eq!(profile.created_at, T0);
    assert_eq!(profile.updated_at, T0 + 10);
    // Handle and views untouched
    assert_eq!(profile.handle, "alice");
    assert_eq!(profile.view_count, 0);
}

#[test]
fn test_update_content_requires_existing_profile() {
    let mut store = ProfileStore::new();
    let err = store
        .update_content(&identity("ghost"), "ipfs://x", T0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_update_content_rejects_empty_pointer() {
    let mut store = create_test_store();
    let err = store
        .update_content(&identity("addr-alice"), "", T0 + 1)
        .unwrap_err();
    assert_eq!(err, RegistryError::EmptyContentPointer);
    // Pointer unchanged
    assert_eq!(
        store.profile(&identity("addr-alice")).unwrap().content_pointer,
        "ipfs://alice-v1"
    );
}

#[test]
fn test_timestamps_never_regress() {
    let mut store = create_test_store();
    // Wall clock stepping backwards must not break created_at <= updated_at
    store
        .update_content(&identity("addr-alice"), "ipfs://alice-v2", T0 - 100)
        .unwrap();
    let profile = store.profile(&identity("addr-alice")).unwrap();
    assert!(profile.created_at <= profile.updated_at);
}

#[test]
fn test_override_content_allows_empty_pointer() {
    let mut store = create_test_store();
    let previous = store
        .override_content(&identity("addr-alice"), "", T0 + 5)
        .unwrap();

    assert_eq!(previous, "ipfs://alice-v1");
    let profile = store.profile(&identity("addr-alice")).unwrap();
    assert_eq!(profile.content_pointer, "");
    assert_eq!(profile.updated_at, T0 + 5);
}

#[test]
fn test_override_content_requires_existing_profile() {
    let mut store = ProfileStore::new();
    let err = store
        .override_content(&identity("ghost"), "ipfs://x", T0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_record_view_counts_from_zero() {
    let mut store = create_test_store();

    for expected in 1..=5u64 {
        let count = store.record_view(&identity("addr-alice")).unwrap();
        assert_eq!(count, expected);
    }

    assert_eq!(store.profile(&identity("addr-alice")).unwrap().view_count, 5);
    assert_eq!(store.running_view_total(), 5);
}

#[test]
fn test_record_view_missing_profile_changes_nothing() {
    let mut store = create_test_store();
    store.record_view(&identity("addr-alice")).unwrap();

    let err = store.record_view(&identity("ghost")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(store.running_view_total(), 1);
    assert_eq!(store.profile_count(), 1);
}

#[test]
fn test_lookup_by_handle() {
    let store = create_test_store();
    let profile = store.profile_by_handle("alice").unwrap();
    assert_eq!(profile.identity, identity("addr-alice"));

    let err = store.profile_by_handle("nobody").unwrap_err();
    assert_eq!(
        err,
        RegistryError::HandleNotFound {
            handle: "nobody".to_string()
        }
    );
}

#[test]
fn test_handle_availability() {
    let store = create_test_store();

    assert!(!store.is_handle_available("alice")); // claimed
    assert!(store.is_handle_available("ALICE")); // case-sensitive, distinct
    assert!(store.is_handle_available("bob-2024"));
    assert!(!store.is_handle_available("ab")); // too short
    assert!(!store.is_handle_available(&"a".repeat(21))); // too long
    assert!(!store.is_handle_available("bad handle")); // charset
}

#[test]
fn test_handle_bijection_holds_after_many_operations() {
    let mut store = ProfileStore::new();
    for i in 0..20 {
        let id = identity(&format!("addr-{i}"));
        store
            .create_profile(&id, &format!("ipfs://cid-{i}"), &format!("user-{i}"), T0 + i)
            .unwrap();
    }
    store.record_view(&identity("addr-3")).unwrap();
    store
        .update_content(&identity("addr-7"), "ipfs://new", T0 + 100)
        .unwrap();

    // Every roster identity's handle resolves back to that identity
    for id in store.roster() {
        let handle = store.handle_of(id).unwrap().to_string();
        let resolved = store.profile_by_handle(&handle).unwrap();
        assert_eq!(&resolved.identity, id);
    }
    assert_eq!(store.roster().len(), 20);
}

#[test]
fn test_restore_round_trip() {
    let mut store = create_test_store();
    store
        .create_profile(&identity("addr-bob"), "ipfs://bob", "bob", T0 + 1)
        .unwrap();
    store.record_view(&identity("addr-bob")).unwrap();
    store.record_view(&identity("addr-bob")).unwrap();

    let profiles: Vec<Profile> = store.profiles_in_roster_order().cloned().collect();
    let restored = ProfileStore::restore(profiles).unwrap();

    assert_eq!(restored.profile_count(), 2);
    assert_eq!(restored.roster(), store.roster());
    assert_eq!(restored.running_view_total(), 2);
    assert_eq!(
        restored.profile(&identity("addr-bob")).unwrap().view_count,
        2
    );
    assert!(!restored.is_handle_available("alice"));
}

#[test]
fn test_restore_rejects_duplicate_handle() {
    let base = Profile {
        identity: identity("addr-a"),
        handle: "alice".to_string(),
        content_pointer: "ipfs://a".to_string(),
        created_at: T0,
        updated_at: T0,
        view_count: 0,
    };
    let mut dup = base.clone();
    dup.identity = identity("addr-b");

    let err = ProfileStore::restore(vec![base, dup]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_restore_rejects_inverted_timestamps() {
    let profile = Profile {
        identity: identity("addr-a"),
        handle: "alice".to_string(),
        content_pointer: "ipfs://a".to_string(),
        created_at: T0 + 10,
        updated_at: T0,
        view_count: 0,
    };

    let err = ProfileStore::restore(vec![profile]).unwrap_err();
    assert_eq!(
        err,
        RegistryError::TimestampOrder {
            identity: "addr-a".to_string()
        }
    );
}
