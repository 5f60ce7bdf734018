use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseManager};
use crate::erasure::error::StoreError;
use crate::erasure::planner::Selector;

/// Relational rows owned by a target
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Non-null values of `column` across rows matched by the selector
    async fn select_values(
        &self,
        collection: &str,
        selector: &Selector,
        target_id: Uuid,
        column: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Delete rows matched by the selector; zero is not an error
    async fn delete_rows(
        &self,
        collection: &str,
        selector: &Selector,
        target_id: Uuid,
    ) -> Result<u64, StoreError>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Render the WHERE clause for a selector; the target id is always `$1`
pub fn where_clause(selector: &Selector) -> Result<String, DatabaseError> {
    match selector {
        Selector::Direct { column } => Ok(format!(
            "{}::text = $1::text",
            DatabaseManager::quote_identifier(column)?
        )),
        Selector::Identity { key } => Ok(format!(
            "{}::text = $1::text",
            DatabaseManager::quote_identifier(key)?
        )),
        Selector::Via {
            column,
            parent,
            parent_key,
            parent_selector,
        } => Ok(format!(
            "{} IN (SELECT {} FROM {} WHERE {})",
            DatabaseManager::quote_identifier(column)?,
            DatabaseManager::quote_identifier(parent_key)?,
            DatabaseManager::quote_identifier(parent)?,
            where_clause(parent_selector)?
        )),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn select_values(
        &self,
        collection: &str,
        selector: &Selector,
        target_id: Uuid,
        column: &str,
    ) -> Result<Vec<String>, StoreError> {
        let column = DatabaseManager::quote_identifier(column)?;
        let sql = format!(
            "SELECT {col}::text FROM {table} WHERE {filter} AND {col} IS NOT NULL",
            col = column,
            table = DatabaseManager::quote_identifier(collection)?,
            filter = where_clause(selector)?
        );
        debug!(collection, sql = %sql, "selecting object references");

        let values: Vec<String> = sqlx::query_scalar(&sql)
            .bind(target_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }

    async fn delete_rows(
        &self,
        collection: &str,
        selector: &Selector,
        target_id: Uuid,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            DatabaseManager::quote_identifier(collection)?,
            where_clause(selector)?
        );
        debug!(collection, sql = %sql, "deleting rows");

        let result = sqlx::query(&sql).bind(target_id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_selector_compares_target_id() {
        let sql = where_clause(&Selector::Direct {
            column: "client_id".into(),
        })
        .unwrap();
        assert_eq!(sql, "\"client_id\"::text = $1::text");
    }

    #[test]
    fn via_selector_nests_subqueries() {
        let selector = Selector::Via {
            column: "ticket_id".into(),
            parent: "project_tickets".into(),
            parent_key: "id".into(),
            parent_selector: Box::new(Selector::Via {
                column: "project_id".into(),
                parent: "client_projects".into(),
                parent_key: "id".into(),
                parent_selector: Box::new(Selector::Direct {
                    column: "client_id".into(),
                }),
            }),
        };
        assert_eq!(
            where_clause(&selector).unwrap(),
            "\"ticket_id\" IN (SELECT \"id\" FROM \"project_tickets\" WHERE \
             \"project_id\" IN (SELECT \"id\" FROM \"client_projects\" WHERE \
             \"client_id\"::text = $1::text))"
        );
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let selector = Selector::Direct {
            column: "id = id OR 1".into(),
        };
        assert!(where_clause(&selector).is_err());
    }
}
