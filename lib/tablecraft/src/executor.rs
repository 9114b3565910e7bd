//! The seam to whatever actually runs SQL.

use async_trait::async_trait;

/// Runs one raw SQL statement against a storage engine.
///
/// Backends implement this for their connection pools; the DDL compiler only
/// ever calls it sequentially.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute `sql`, returning the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64, Self::Error>;
}

#[async_trait]
impl<T: StatementExecutor + ?Sized> StatementExecutor for &T {
    type Error = T::Error;

    async fn execute(&self, sql: &str) -> Result<u64, Self::Error> {
        (**self).execute(sql).await
    }
}
