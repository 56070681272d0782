//! Deployed-schema validation against `information_schema`.

use sqlx::Row;

use super::errors::StorageError;
use super::uow::UnitOfWork;

/// Validates that a deployed table matches the expected column set.
///
/// Missing tables or columns and type mismatches are deployment failures
/// and surface as [`StorageError::Fatal`]; extra columns only log a
/// warning.
pub(crate) async fn validate_table_schema(
    uow: &mut UnitOfWork<'_>,
    logical: &str,
    expected_columns: &[(&str, &str)],
) -> Result<(), StorageError> {
    let table_name = uow.catalog().physical(logical);
    let schema = uow.catalog().schema().map(str::to_string);

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_name = $1
              AND table_schema = COALESCE($2::text, current_schema())
        )",
    )
    .bind(&table_name)
    .bind(&schema)
    .fetch_one(uow.conn())
    .await
    .map_err(StorageError::from_sqlx)?;

    if !table_exists {
        return Err(StorageError::fatal_msg(format!(
            "schema validation failed: table '{table_name}' does not exist"
        )));
    }

    let rows = sqlx::query(
        "SELECT column_name, data_type FROM information_schema.columns
         WHERE table_name = $1
           AND table_schema = COALESCE($2::text, current_schema())
         ORDER BY column_name",
    )
    .bind(&table_name)
    .bind(&schema)
    .fetch_all(uow.conn())
    .await
    .map_err(StorageError::from_sqlx)?;

    let actual_columns: Vec<(String, String)> = rows
        .iter()
        .map(|row| (row.get("column_name"), row.get("data_type")))
        .collect();

    for (expected_name, expected_type) in expected_columns {
        match actual_columns.iter().find(|(name, _)| name == expected_name) {
            Some((_, actual_type)) if actual_type == expected_type => {}
            Some((_, actual_type)) => {
                return Err(StorageError::fatal_msg(format!(
                    "schema validation failed: column '{expected_name}' of '{table_name}' has type '{actual_type}' but expected '{expected_type}'"
                )));
            }
            None => {
                return Err(StorageError::fatal_msg(format!(
                    "schema validation failed: missing column '{expected_name}' in '{table_name}'"
                )));
            }
        }
    }

    for (actual_name, _) in &actual_columns {
        if !expected_columns.iter().any(|(name, _)| name == actual_name) {
            tracing::warn!("extra column '{}' found in table '{}'", actual_name, table_name);
        }
    }

    Ok(())
}
