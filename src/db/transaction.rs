/*!
 * Transaction Helper Utilities
 *
 * Read-validate-write sequences on the category hierarchy run through these helpers so the
 * validation snapshot and the write share one transaction.
 */

use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, IsolationLevel,
    TransactionError, TransactionTrait,
};
use tracing::{debug, warn};

/// Isolation level to request for `backend`.
///
/// SQLite does not accept an isolation level per transaction; its writers are already serialized.
pub fn serializable_isolation(backend: DbBackend) -> Option<IsolationLevel> {
    match backend {
        DbBackend::Sqlite => None,
        _ => Some(IsolationLevel::Serializable),
    }
}

/// Execute `f` within a serializable database transaction
///
/// Commits when `f` returns `Ok`, rolls back otherwise. The error returned by `f` is passed
/// through unchanged so domain errors survive the rollback.
///
/// # Example
///
/// ```rust,ignore
/// let moved = with_serializable_transaction(&db, move |txn| {
///     Box::pin(async move {
///         let snapshot = category::Entity::find().all(txn).await?;
///         // validate against snapshot, then write through txn
///         Ok(snapshot.len())
///     })
/// })
/// .await?;
/// ```
pub async fn with_serializable_transaction<F, T, E>(
    db: &DatabaseConnection,
    f: F,
) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: std::error::Error + From<DbErr> + Send,
{
    let isolation = serializable_isolation(db.get_database_backend());
    let start = std::time::Instant::now();

    debug!(?isolation, "Starting database transaction");
    counter!("marketplace_db.transaction.started", 1);

    let result = db.transaction_with_config(f, isolation, None).await;

    let elapsed = start.elapsed();
    histogram!("marketplace_db.transaction.duration", elapsed);

    match &result {
        Ok(_) => {
            counter!("marketplace_db.transaction.committed", 1);
            debug!("Transaction committed in {:?}", elapsed);
        }
        Err(_) => {
            counter!("marketplace_db.transaction.rolled_back", 1);
            warn!("Transaction rolled back after {:?}", elapsed);
        }
    }

    result.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, DbConfig};
    use crate::errors::ServiceError;
    use sea_orm::Statement;

    async fn scratch_db() -> DatabaseConnection {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .expect("in-memory sqlite");
        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            "CREATE TABLE scratch (id INTEGER PRIMARY KEY)".to_string(),
        ))
        .await
        .expect("create scratch table");
        db
    }

    async fn scratch_rows(db: &DatabaseConnection) -> usize {
        db.query_all(Statement::from_string(
            DbBackend::Sqlite,
            "SELECT id FROM scratch".to_string(),
        ))
        .await
        .expect("select")
        .len()
    }

    #[test]
    fn sqlite_skips_isolation_level() {
        assert!(serializable_isolation(DbBackend::Sqlite).is_none());
        assert!(matches!(
            serializable_isolation(DbBackend::Postgres),
            Some(IsolationLevel::Serializable)
        ));
    }

    #[tokio::test]
    async fn commits_on_success() {
        let db = scratch_db().await;

        let value = with_serializable_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO scratch (id) VALUES (1)".to_string(),
                ))
                .await?;
                Ok::<_, ServiceError>(42)
            })
        })
        .await
        .expect("transaction commits");

        assert_eq!(value, 42);
        assert_eq!(scratch_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn rolls_back_and_preserves_domain_error() {
        let db = scratch_db().await;

        let result: Result<(), ServiceError> = with_serializable_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO scratch (id) VALUES (1)".to_string(),
                ))
                .await?;
                Err::<(), ServiceError>(ServiceError::SelfParent(1))
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::SelfParent(1))));
        assert_eq!(scratch_rows(&db).await, 0);
    }
}
