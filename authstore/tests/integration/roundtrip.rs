//! Round-trip, uniqueness, and update-none properties.

use authstore::{
    AccessTokenSigningKey, AuthRecipeUser, EmailPasswordStore, EmailPasswordUser,
    EmailVerificationStore, EmailVerificationToken, JwtSigningKey, KeyValueEntry, KeyValueStore,
    RecipeId, SessionInfo, SessionStore, SigningKeyStore, StorageError, ThirdPartyStore,
    ThirdPartyUser, UserIdMapping, UserIdMappingStore, UserMetadataStore, UserStore,
};
use serde_json::json;
use serial_test::serial;

use crate::common;

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_insert_then_get_returns_identical_user() {
    let storage = common::fresh_storage().await;
    let user = EmailPasswordUser::new("round@example.com", "$argon2id$v=19$hash");

    let mut uow = storage.begin().await.unwrap();
    EmailPasswordStore::insert_user(&mut uow, &user).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let read = EmailPasswordStore::get_user_by_id(&mut uow, &user.user_id)
        .await
        .unwrap()
        .expect("user must exist after commit");
    uow.rollback().await.unwrap();

    // Field-for-field identical
    assert_eq!(read, user);
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_duplicate_email_conflicts_and_keeps_one_row() {
    let storage = common::fresh_storage().await;
    let first = EmailPasswordUser::new("dup@example.com", "hash-1");
    let second = EmailPasswordUser::new("dup@example.com", "hash-2");

    let mut uow = storage.begin().await.unwrap();
    EmailPasswordStore::insert_user(&mut uow, &first).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let err = EmailPasswordStore::insert_user(&mut uow, &second)
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected Conflict, got {err:?}");
    match &err {
        StorageError::Conflict { constraint } => assert!(constraint.contains("email")),
        _ => unreachable!(),
    }
    uow.rollback().await.unwrap();

    // Exactly one row persisted, and it is the first writer's
    let mut uow = storage.begin().await.unwrap();
    let read = EmailPasswordStore::get_user_by_email(&mut uow, "dup@example.com")
        .await
        .unwrap()
        .unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(read.user_id, first.user_id);
    assert_eq!(read.password_hash, "hash-1");
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_update_missing_row_returns_not_found() {
    let storage = common::fresh_storage().await;

    let mut uow = storage.begin().await.unwrap();
    let err = EmailPasswordStore::update_password_hash(
        &mut uow,
        "00000000-0000-4000-8000-000000000000",
        "new-hash",
    )
    .await
    .unwrap_err();
    uow.rollback().await.unwrap();

    assert!(err.is_not_found(), "expected NotFound, got {err:?}");
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_uncommitted_insert_is_invisible_after_rollback() {
    let storage = common::fresh_storage().await;
    let user = EmailPasswordUser::new("ghost@example.com", "hash");

    let mut uow = storage.begin().await.unwrap();
    EmailPasswordStore::insert_user(&mut uow, &user).await.unwrap();
    uow.rollback().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let read = EmailPasswordStore::get_user_by_id(&mut uow, &user.user_id)
        .await
        .unwrap();
    uow.rollback().await.unwrap();
    assert!(read.is_none());
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_thirdparty_provider_pair_is_unique() {
    let storage = common::fresh_storage().await;
    let first = ThirdPartyUser::new("google", "g-1", "tp@example.com");
    let second = ThirdPartyUser::new("google", "g-1", "other@example.com");

    let mut uow = storage.begin().await.unwrap();
    ThirdPartyStore::insert_user(&mut uow, &first).await.unwrap();
    let err = ThirdPartyStore::insert_user(&mut uow, &second)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    uow.rollback().await.unwrap();

    // Same provider, different provider user id is fine
    let third = ThirdPartyUser::new("google", "g-2", "tp2@example.com");
    let mut uow = storage.begin().await.unwrap();
    ThirdPartyStore::insert_user(&mut uow, &first).await.unwrap();
    ThirdPartyStore::insert_user(&mut uow, &third).await.unwrap();
    uow.commit().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_session_round_trip_preserves_blobs() {
    let storage = common::fresh_storage().await;
    let session = SessionInfo::new(
        "00000000-0000-4000-8000-000000000001",
        "rt-hash-1",
        json!({"device": "laptop", "ips": ["10.0.0.1"]}),
        json!({"sub": "user-1", "roles": ["admin"]}),
        4_102_444_800_000,
    );

    let mut uow = storage.begin().await.unwrap();
    SessionStore::insert(&mut uow, &session).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let read = SessionStore::get(&mut uow, &session.session_handle)
        .await
        .unwrap()
        .unwrap();
    uow.rollback().await.unwrap();

    assert_eq!(read, session);
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_metadata_set_updates_in_place() {
    let storage = common::fresh_storage().await;
    let user_id = "00000000-0000-4000-8000-000000000002";

    let mut uow = storage.begin().await.unwrap();
    UserMetadataStore::set(&mut uow, user_id, &json!({"theme": "dark"}))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    UserMetadataStore::set(&mut uow, user_id, &json!({"theme": "light"}))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let read = UserMetadataStore::get(&mut uow, user_id).await.unwrap().unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(read.user_metadata, json!({"theme": "light"}));
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_keyvalue_set_then_get() {
    let storage = common::fresh_storage().await;
    let entry = KeyValueEntry::new("feature_flag", "enabled");

    let mut uow = storage.begin().await.unwrap();
    KeyValueStore::set(&mut uow, &entry).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let read = KeyValueStore::get(&mut uow, "feature_flag").await.unwrap().unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(read, entry);
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_userid_mapping_both_sides_unique() {
    let storage = common::fresh_storage().await;
    let user = AuthRecipeUser::new(
        "00000000-0000-4000-8000-000000000003",
        RecipeId::EmailPassword,
    );
    let other = AuthRecipeUser::new(
        "00000000-0000-4000-8000-000000000004",
        RecipeId::EmailPassword,
    );

    let mut uow = storage.begin().await.unwrap();
    UserStore::insert(&mut uow, &user).await.unwrap();
    UserStore::insert(&mut uow, &other).await.unwrap();
    UserIdMappingStore::insert(
        &mut uow,
        &UserIdMapping::new(&user.user_id, "ext-1", None),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    // Same external id for another user conflicts
    let mut uow = storage.begin().await.unwrap();
    let err = UserIdMappingStore::insert(
        &mut uow,
        &UserIdMapping::new(&other.user_id, "ext-1", None),
    )
    .await
    .unwrap_err();
    assert!(err.is_conflict());
    uow.rollback().await.unwrap();

    // A mapping for an unindexed user is an UnknownParent failure
    let mut uow = storage.begin().await.unwrap();
    let err = UserIdMappingStore::insert(
        &mut uow,
        &UserIdMapping::new("00000000-0000-4000-8000-0000000000ff", "ext-2", None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StorageError::UnknownParent { .. }));
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_signing_keys_list_newest_first() {
    let storage = common::fresh_storage().await;

    let mut uow = storage.begin().await.unwrap();
    let mut old = JwtSigningKey::new("kid-old", "material-old", "RS256");
    old.created_at = 1_000;
    let mut new = JwtSigningKey::new("kid-new", "material-new", "RS256");
    new.created_at = 2_000;
    SigningKeyStore::insert_jwt_key(&mut uow, &old).await.unwrap();
    SigningKeyStore::insert_jwt_key(&mut uow, &new).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let keys = SigningKeyStore::list_jwt_keys(&mut uow).await.unwrap();
    uow.rollback().await.unwrap();

    let ids: Vec<&str> = keys.iter().map(|k| k.key_id.as_str()).collect();
    assert_eq!(ids, vec!["kid-new", "kid-old"]);
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_access_token_keys_since_and_sweep() {
    let storage = common::fresh_storage().await;

    let mut uow = storage.begin().await.unwrap();
    for (created_at_time, value) in [(100, "k1"), (200, "k2"), (300, "k3")] {
        let mut key = AccessTokenSigningKey::new(value);
        key.created_at_time = created_at_time;
        SigningKeyStore::insert_access_token_key(&mut uow, &key).await.unwrap();
    }
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    let recent = SigningKeyStore::list_access_token_keys_since(&mut uow, 200)
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].created_at_time, 200);

    let removed = SigningKeyStore::delete_access_token_keys_before(&mut uow, 200)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    uow.commit().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_email_verification_flow() {
    let storage = common::fresh_storage().await;
    let user_id = "00000000-0000-4000-8000-000000000005";
    let email = "verify@example.com";

    let mut uow = storage.begin().await.unwrap();
    EmailVerificationStore::insert_token(
        &mut uow,
        &EmailVerificationToken::new(user_id, email, "ev-token-1", 4_102_444_800_000),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    // Consume: lock outstanding tokens, mark verified, drop tokens
    let mut uow = storage.begin().await.unwrap();
    let tokens = EmailVerificationStore::list_tokens_locked(&mut uow, user_id, email)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 1);
    EmailVerificationStore::mark_email_verified(&mut uow, user_id, email)
        .await
        .unwrap();
    EmailVerificationStore::delete_tokens(&mut uow, user_id, email)
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    assert!(
        EmailVerificationStore::is_email_verified(&mut uow, user_id, email)
            .await
            .unwrap()
    );
    // Marking twice is a Conflict, i.e. "already verified"
    let err = EmailVerificationStore::mark_email_verified(&mut uow, user_id, email)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_user_counts_per_recipe() {
    let storage = common::fresh_storage().await;

    let mut uow = storage.begin().await.unwrap();
    for (suffix, recipe) in [
        ("10", RecipeId::EmailPassword),
        ("11", RecipeId::EmailPassword),
        ("12", RecipeId::ThirdParty),
    ] {
        let user = AuthRecipeUser::new(
            format!("00000000-0000-4000-8000-0000000000{suffix}"),
            recipe,
        );
        UserStore::insert(&mut uow, &user).await.unwrap();
    }
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    assert_eq!(UserStore::count(&mut uow).await.unwrap(), 3);
    assert_eq!(
        UserStore::count_for_recipes(&mut uow, &[RecipeId::EmailPassword])
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        UserStore::count_for_recipes(&mut uow, &[RecipeId::Passwordless])
            .await
            .unwrap(),
        0
    );
    uow.rollback().await.unwrap();
}
