use crate::storage::{
    Keyset, PageBoundary, SortOrder, StorageError, UnitOfWork, ensure_affected, tables,
    validate_limit, validate_table_schema,
};

use super::types::{AuthRecipeUser, RecipeId};

/// Repository for the recipe-agnostic user index.
pub struct UserStore;

impl UserStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let table = uow.table(tables::AUTH_USERS);
        let pkey = uow.constraint(tables::AUTH_USERS, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                user_id VARCHAR(36) NOT NULL,
                recipe_id VARCHAR(128) NOT NULL,
                time_joined BIGINT NOT NULL,
                CONSTRAINT {pkey} PRIMARY KEY (user_id)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        // Listing is keyset-paginated over (time_joined, user_id)
        let index = uow.index(tables::AUTH_USERS, "pagination");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {index} ON {table} (time_joined, user_id)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub(crate) async fn validate_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        validate_table_schema(
            uow,
            tables::AUTH_USERS,
            &[
                ("user_id", "character varying"),
                ("recipe_id", "character varying"),
                ("time_joined", "bigint"),
            ],
        )
        .await
    }

    /// Insert an index row. Fails with Conflict when the user id is
    /// already indexed.
    pub async fn insert(
        uow: &mut UnitOfWork<'_>,
        user: &AuthRecipeUser,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::AUTH_USERS);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, recipe_id, time_joined) VALUES ($1, $2, $3)"
        ))
        .bind(&user.user_id)
        .bind(&user.recipe_id)
        .bind(user.time_joined)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Option<AuthRecipeUser>, StorageError> {
        let table = uow.table(tables::AUTH_USERS);

        sqlx::query_as::<_, AuthRecipeUser>(&format!(
            "SELECT user_id, recipe_id, time_joined FROM {table} WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Delete an index row. Mappings referencing the user cascade in the
    /// same transaction; per-recipe rows are removed by their own stores
    /// inside the caller's unit of work.
    pub async fn delete(uow: &mut UnitOfWork<'_>, user_id: &str) -> Result<(), StorageError> {
        let table = uow.table(tables::AUTH_USERS);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Keyset-paginated listing ordered by join time with the user id as
    /// tie-break. The boundary pair is the last row of the previous page;
    /// rows strictly after it are returned. An empty page is a valid
    /// result.
    pub async fn list(
        uow: &mut UnitOfWork<'_>,
        order: SortOrder,
        boundary: Option<&PageBoundary>,
        limit: i64,
    ) -> Result<Vec<AuthRecipeUser>, StorageError> {
        validate_limit(limit)?;

        let table = uow.table(tables::AUTH_USERS);
        let keyset = Keyset {
            order_col: "time_joined",
            tie_col: "user_id",
            order,
        };

        let sql = match boundary {
            Some(_) => format!(
                "SELECT user_id, recipe_id, time_joined FROM {table} WHERE {} {} LIMIT $3",
                keyset.boundary_predicate(1),
                keyset.order_by()
            ),
            None => format!(
                "SELECT user_id, recipe_id, time_joined FROM {table} {} LIMIT $1",
                keyset.order_by()
            ),
        };

        let mut query = sqlx::query_as::<_, AuthRecipeUser>(&sql);
        if let Some(boundary) = boundary {
            query = query.bind(boundary.order_value).bind(&boundary.tie_break);
        }
        query
            .bind(limit)
            .fetch_all(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)
    }

    pub async fn count(uow: &mut UnitOfWork<'_>) -> Result<i64, StorageError> {
        let table = uow.table(tables::AUTH_USERS);

        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)
    }

    pub async fn count_for_recipes(
        uow: &mut UnitOfWork<'_>,
        recipes: &[RecipeId],
    ) -> Result<i64, StorageError> {
        let table = uow.table(tables::AUTH_USERS);
        let recipe_ids: Vec<String> = recipes.iter().map(|r| r.as_str().to_string()).collect();

        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE recipe_id = ANY($1)"
        ))
        .bind(&recipe_ids)
        .fetch_one(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }
}
