//! Module-contributed schema migrations.

use crate::{Database, StoreError, StoreResult};

/// Migration definition for modules
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

const LEDGER: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    );
"#;

impl Database {
    /// Apply every migration not yet recorded in `schema_migrations`, in the
    /// order given. Each migration runs in its own transaction together with
    /// its ledger row. Returns how many were applied.
    pub async fn run_migrations(&self, migrations: &[(String, Migration)]) -> StoreResult<usize> {
        self.timed("migrations.ledger", sqlx::raw_sql(LEDGER).execute(self.pool()))
            .await?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let already: i64 = self
                .timed(
                    "migrations.lookup",
                    sqlx::query_scalar(
                        "SELECT COUNT(*) FROM schema_migrations WHERE module = ? AND id = ?",
                    )
                    .bind(module.as_str())
                    .bind(migration.id)
                    .fetch_one(self.pool()),
                )
                .await?;
            if already > 0 {
                tracing::debug!(module = %module, id = migration.id, "migration already applied");
                continue;
            }

            self.apply(module, migration)
                .await
                .map_err(|source| StoreError::Migration {
                    module: module.clone(),
                    id: migration.id.to_string(),
                    source: Box::new(source),
                })?;

            tracing::info!(module = %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    async fn apply(&self, module: &str, migration: &Migration) -> StoreResult<()> {
        let mut tx = self.timed("migrations.begin", self.pool().begin()).await?;
        self.timed("migrations.up", sqlx::raw_sql(migration.up).execute(&mut *tx))
            .await?;
        self.timed(
            "migrations.record",
            sqlx::query("INSERT INTO schema_migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx),
        )
        .await?;
        self.timed("migrations.commit", tx.commit()).await
    }
}
