//! Keyset pagination stability over the user index.

use authstore::{
    AuthRecipeUser, PageBoundary, RecipeId, SortOrder, StorageError, UserStore,
};
use serial_test::serial;

use crate::common;

// Lexically ordered 36-character ids standing in for A < B < C < D
const ID_A: &str = "00000000-0000-4000-8000-0000000000aa";
const ID_B: &str = "00000000-0000-4000-8000-0000000000bb";
const ID_C: &str = "00000000-0000-4000-8000-0000000000cc";
const ID_D: &str = "00000000-0000-4000-8000-0000000000dd";

async fn seed_users(storage: &authstore::AuthStorage) {
    let rows = [(ID_A, 10), (ID_B, 20), (ID_C, 20), (ID_D, 30)];

    let mut uow = storage.begin().await.unwrap();
    for (user_id, time_joined) in rows {
        let user =
            AuthRecipeUser::with_time_joined(user_id, RecipeId::EmailPassword, time_joined);
        UserStore::insert(&mut uow, &user).await.unwrap();
    }
    uow.commit().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_descending_pages_are_stable_across_ties() {
    let storage = common::fresh_storage().await;
    seed_users(&storage).await;

    // First page: no boundary
    let mut uow = storage.begin().await.unwrap();
    let first = UserStore::list(&mut uow, SortOrder::Desc, None, 2).await.unwrap();
    uow.rollback().await.unwrap();

    let ids: Vec<&str> = first.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec![ID_D, ID_C]);
    assert_eq!(first[0].time_joined, 30);
    assert_eq!(first[1].time_joined, 20);

    // Second page from the last row's (order, tie-break) pair: the other
    // time_joined=20 row comes first, then the oldest row
    let boundary = PageBoundary::new(first[1].time_joined, first[1].user_id.clone());
    let mut uow = storage.begin().await.unwrap();
    let second = UserStore::list(&mut uow, SortOrder::Desc, Some(&boundary), 2)
        .await
        .unwrap();
    uow.rollback().await.unwrap();

    let ids: Vec<&str> = second.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec![ID_B, ID_A]);

    // Third page is empty, which is a valid result, not an error
    let boundary = PageBoundary::new(second[1].time_joined, second[1].user_id.clone());
    let mut uow = storage.begin().await.unwrap();
    let third = UserStore::list(&mut uow, SortOrder::Desc, Some(&boundary), 2)
        .await
        .unwrap();
    uow.rollback().await.unwrap();
    assert!(third.is_empty());
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_ascending_pages_mirror_descending() {
    let storage = common::fresh_storage().await;
    seed_users(&storage).await;

    let mut uow = storage.begin().await.unwrap();
    let first = UserStore::list(&mut uow, SortOrder::Asc, None, 3).await.unwrap();
    uow.rollback().await.unwrap();

    let ids: Vec<&str> = first.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec![ID_A, ID_B, ID_C]);

    let boundary = PageBoundary::new(20, ID_C);
    let mut uow = storage.begin().await.unwrap();
    let rest = UserStore::list(&mut uow, SortOrder::Asc, Some(&boundary), 3)
        .await
        .unwrap();
    uow.rollback().await.unwrap();

    let ids: Vec<&str> = rest.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec![ID_D]);
}

#[tokio::test]
#[serial]
#[ignore] // Requires running PostgreSQL
async fn test_invalid_order_token_fails_before_querying() {
    // Parsing the direction token is the caller's first step; it fails
    // without any storage round trip
    let err = "sideways".parse::<SortOrder>().unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));

    // And a bad limit is rejected before the query executes too
    let storage = common::fresh_storage().await;
    let mut uow = storage.begin().await.unwrap();
    let err = UserStore::list(&mut uow, SortOrder::Asc, None, 0)
        .await
        .unwrap_err();
    uow.rollback().await.unwrap();
    assert!(matches!(err, StorageError::InvalidArgument(_)));
}
