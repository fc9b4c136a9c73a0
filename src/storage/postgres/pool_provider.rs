//! Read/write pool routing.
//!
//! Point reads and list queries go to [`PoolProvider::read`], which may be a
//! replica. Transactions, and therefore every conditional update, go to
//! [`PoolProvider::write`]. A stale replica read is harmless for lifecycle
//! events: the version check on the primary turns it into a
//! `ConcurrentModification`.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub trait PoolProvider: Clone + Send + Sync + 'static {
    /// Pool for reads that tolerate replica lag.
    fn read(&self) -> &PgPool;

    /// Primary pool for transactions and writes.
    fn write(&self) -> &PgPool;
}

/// A single pool serves both roles.
impl PoolProvider for PgPool {
    fn read(&self) -> &PgPool {
        self
    }

    fn write(&self) -> &PgPool {
        self
    }
}

/// Test pools whose read side refuses writes.
///
/// The replica pool connects to the same database with
/// `default_transaction_read_only = on`, so a write routed through
/// [`PoolProvider::read`] fails loudly in tests.
#[derive(Clone, Debug)]
pub struct TestDbPools {
    primary: PgPool,
    replica: PgPool,
}

impl TestDbPools {
    pub async fn new(pool: PgPool) -> Result<Self, sqlx::Error> {
        let replica = PgPoolOptions::new()
            .max_connections(pool.options().get_max_connections())
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET default_transaction_read_only = on")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(pool.connect_options().as_ref().clone())
            .await?;

        Ok(Self {
            primary: pool,
            replica,
        })
    }
}

impl PoolProvider for TestDbPools {
    fn read(&self) -> &PgPool {
        &self.replica
    }

    fn write(&self) -> &PgPool {
        &self.primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn read_pool_rejects_writes(pool: PgPool) {
        let pools = TestDbPools::new(pool).await.unwrap();

        sqlx::query("CREATE TEMP TABLE scratch (id INT)")
            .execute(pools.write())
            .await
            .expect("write pool should allow DDL");

        let err = sqlx::query("CREATE TEMP TABLE scratch_ro (id INT)")
            .execute(pools.read())
            .await
            .unwrap_err()
            .to_string();
        assert!(
            err.contains("read-only") || err.contains("cannot execute"),
            "unexpected error: {err}"
        );
    }
}
