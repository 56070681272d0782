//! Cascade-delete properties: removing a parent atomically removes every
//! dependent child row.

use authstore::{
    AuthRecipeUser, EmailPasswordStore, EmailPasswordUser, PasswordResetToken, PasswordlessCode,
    PasswordlessDevice, PasswordlessStore, RecipeId, StorageError, UserIdMapping,
    UserIdMappingStore, UserRolesStore, UserStore,
};
use serial_test::serial;

use crate::common;

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_deleting_device_removes_its_codes() {
    let storage = common::fresh_storage().await;
    let device = PasswordlessDevice::new("device-hash-1", None, None, "salt-1");
    let code_a = PasswordlessCode::new("device-hash-1", "link-hash-a");
    let code_b = PasswordlessCode::new("device-hash-1", "link-hash-b");

    let mut uow = storage.begin().await.unwrap();
    PasswordlessStore::insert_device(&mut uow, &device).await.unwrap();
    PasswordlessStore::insert_code(&mut uow, &code_a).await.unwrap();
    PasswordlessStore::insert_code(&mut uow, &code_b).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    PasswordlessStore::delete_device(&mut uow, "device-hash-1")
        .await
        .unwrap();
    uow.commit().await.unwrap();

    // Every child key now reads as not-found
    let mut uow = storage.begin().await.unwrap();
    assert!(
        PasswordlessStore::get_code(&mut uow, &code_a.code_id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        PasswordlessStore::get_code_by_link_code_hash(&mut uow, "link-hash-b")
            .await
            .unwrap()
            .is_none()
    );
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_code_insert_for_missing_device_is_unknown_parent() {
    let storage = common::fresh_storage().await;
    let orphan = PasswordlessCode::new("no-such-device", "link-hash-x");

    let mut uow = storage.begin().await.unwrap();
    let err = PasswordlessStore::insert_code(&mut uow, &orphan)
        .await
        .unwrap_err();
    uow.rollback().await.unwrap();

    assert!(matches!(err, StorageError::UnknownParent { .. }));
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_deleting_user_removes_reset_tokens() {
    let storage = common::fresh_storage().await;
    let user = EmailPasswordUser::new("cascade@example.com", "hash");

    let mut uow = storage.begin().await.unwrap();
    EmailPasswordStore::insert_user(&mut uow, &user).await.unwrap();
    EmailPasswordStore::insert_password_reset_token(
        &mut uow,
        &PasswordResetToken::new(&user.user_id, "reset-tok-1", 4_102_444_800_000),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    EmailPasswordStore::delete_user(&mut uow, &user.user_id)
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    assert!(
        EmailPasswordStore::get_password_reset_token(&mut uow, "reset-tok-1")
            .await
            .unwrap()
            .is_none()
    );
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_deleting_role_removes_permissions_and_assignments() {
    let storage = common::fresh_storage().await;
    let user_id = "00000000-0000-4000-8000-000000000020";

    let mut uow = storage.begin().await.unwrap();
    UserRolesStore::create_role(&mut uow, "admin").await.unwrap();
    UserRolesStore::add_permission_to_role(&mut uow, "admin", "users:read")
        .await
        .unwrap();
    UserRolesStore::add_permission_to_role(&mut uow, "admin", "users:write")
        .await
        .unwrap();
    UserRolesStore::assign_role_to_user(&mut uow, user_id, "admin")
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    UserRolesStore::delete_role(&mut uow, "admin").await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    assert!(
        UserRolesStore::list_permissions_for_role(&mut uow, "admin")
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        UserRolesStore::list_roles_for_user(&mut uow, user_id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(!UserRolesStore::role_exists(&mut uow, "admin").await.unwrap());
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_permission_for_missing_role_is_unknown_parent() {
    let storage = common::fresh_storage().await;

    let mut uow = storage.begin().await.unwrap();
    let err = UserRolesStore::add_permission_to_role(&mut uow, "ghost-role", "users:read")
        .await
        .unwrap_err();
    uow.rollback().await.unwrap();

    assert!(matches!(err, StorageError::UnknownParent { .. }));
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_deleting_indexed_user_removes_mapping() {
    let storage = common::fresh_storage().await;
    let user = AuthRecipeUser::new(
        "00000000-0000-4000-8000-000000000021",
        RecipeId::ThirdParty,
    );

    let mut uow = storage.begin().await.unwrap();
    UserStore::insert(&mut uow, &user).await.unwrap();
    UserIdMappingStore::insert(
        &mut uow,
        &UserIdMapping::new(&user.user_id, "legacy-21", None),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    UserStore::delete(&mut uow, &user.user_id).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = storage.begin().await.unwrap();
    assert!(
        UserIdMappingStore::get_by_external_id(&mut uow, "legacy-21")
            .await
            .unwrap()
            .is_none()
    );
    uow.rollback().await.unwrap();
}
