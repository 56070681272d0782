//! Lock exclusion: concurrent locked-read-then-update sequences on the
//! same row serialize on the row lock.

use std::time::Duration;

use authstore::{AuthStorage, PasswordlessDevice, PasswordlessStore, SessionInfo, SessionStore};
use serde_json::json;
use serial_test::serial;

use crate::common;

fn test_session(user_suffix: &str) -> SessionInfo {
    SessionInfo::new(
        format!("00000000-0000-4000-8000-0000000000{user_suffix}"),
        "hash-one",
        json!({}),
        json!({}),
        4_102_444_800_000,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_locked_reads_serialize_refresh_rotation() {
    let storage = common::fresh_storage().await;
    let session = test_session("30");
    let handle = session.session_handle.clone();

    let mut uow = storage.begin().await.unwrap();
    SessionStore::insert(&mut uow, &session).await.unwrap();
    uow.commit().await.unwrap();

    // First unit of work takes the row lock
    let mut holder = storage.begin().await.unwrap();
    let locked = SessionStore::get_locked(&mut holder, &handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locked.refresh_token_hash_2, "hash-one");

    // Second unit of work must block at its locked read
    let waiter_storage = storage.clone();
    let waiter_handle = handle.clone();
    let waiter = tokio::spawn(async move {
        let mut uow = waiter_storage.begin().await.unwrap();
        let observed = SessionStore::get_locked(&mut uow, &waiter_handle)
            .await
            .unwrap()
            .unwrap();
        uow.rollback().await.unwrap();
        observed.refresh_token_hash_2
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        !waiter.is_finished(),
        "second locker returned while the lock was still held"
    );

    // Rotate and commit; only now may the second locker proceed, and it
    // observes the committed rotation
    SessionStore::update_refresh_token_hash(&mut holder, &handle, "hash-two", 4_102_444_800_000)
        .await
        .unwrap();
    holder.commit().await.unwrap();

    let observed = waiter.await.unwrap();
    assert_eq!(observed, "hash-two");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_lock_wait_beyond_window_times_out() {
    let mut config = common::test_config();
    config.table_prefix = format!("itlk{}_", std::process::id());
    config.lock_timeout = Duration::from_millis(200);
    let storage = AuthStorage::connect(&config).unwrap();
    storage.create_tables().await.unwrap();

    let session = test_session("31");
    let handle = session.session_handle.clone();

    let mut uow = storage.begin().await.unwrap();
    SessionStore::insert(&mut uow, &session).await.unwrap();
    uow.commit().await.unwrap();

    let mut holder = storage.begin().await.unwrap();
    SessionStore::get_locked(&mut holder, &handle)
        .await
        .unwrap()
        .unwrap();

    // The second locker gives up once the configured wait window expires
    let mut blocked = storage.begin().await.unwrap();
    let err = SessionStore::get_locked(&mut blocked, &handle)
        .await
        .unwrap_err();
    assert!(err.is_lock_timeout(), "expected LockTimeout, got {err:?}");

    // Per contract: roll the whole unit of work back, retry from scratch
    blocked.rollback().await.unwrap();
    holder.rollback().await.unwrap();

    let mut retry = storage.begin().await.unwrap();
    assert!(
        SessionStore::get_locked(&mut retry, &handle)
            .await
            .unwrap()
            .is_some()
    );
    retry.rollback().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_failed_attempt_increments_serialize() {
    let storage = common::fresh_storage().await;
    let device = PasswordlessDevice::new("locked-device", None, None, "salt");

    let mut uow = storage.begin().await.unwrap();
    PasswordlessStore::insert_device(&mut uow, &device).await.unwrap();
    uow.commit().await.unwrap();

    // Two concurrent wrong-OTP submissions, each doing a locked read then
    // an increment in its own unit of work
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let storage = storage.clone();
        tasks.push(tokio::spawn(async move {
            let mut uow = storage.begin().await.unwrap();
            let device = PasswordlessStore::get_device_locked(&mut uow, "locked-device")
                .await
                .unwrap()
                .unwrap();
            PasswordlessStore::increment_failed_attempts(&mut uow, &device.device_id_hash)
                .await
                .unwrap();
            uow.commit().await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Neither increment was lost
    let mut uow = storage.begin().await.unwrap();
    let device = PasswordlessStore::get_device(&mut uow, "locked-device")
        .await
        .unwrap()
        .unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(device.failed_attempts, 2);
}
