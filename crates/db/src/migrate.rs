//! Migration ledger.
//!
//! Modules contribute `Migration`s; each one runs at most once per database,
//! inside its own transaction, and is recorded in `_migrations`.

use sqlx::Connection;

use crate::{Database, PersistenceError};

/// Migration definition for modules
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

const LEDGER_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

impl Database {
    /// Apply every pending `(module, migration)` pair in the given order.
    ///
    /// Returns the number of migrations applied by this call.
    pub async fn run_migrations(
        &self,
        migrations: &[(String, Migration)],
    ) -> Result<usize, PersistenceError> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(LEDGER_DDL).execute(&mut *conn).await?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let mut tx = conn.begin().await?;

            let seen: Option<(String,)> =
                sqlx::query_as("SELECT id FROM _migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if seen.is_some() {
                tx.rollback().await?;
                continue;
            }

            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .map_err(|source| PersistenceError::Migration {
                    module: module.clone(),
                    id: migration.id.to_string(),
                    source,
                })?;

            sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            applied += 1;
            tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> Vec<(String, Migration)> {
        vec![(
            "widgets".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE widget (id INTEGER PRIMARY KEY); CREATE INDEX widget_id ON widget(id);",
            },
        )]
    }

    #[tokio::test]
    async fn applies_pending_migrations_once() {
        let db = Database::connect_in_memory().await.unwrap();

        assert_eq!(db.run_migrations(&widgets()).await.unwrap(), 1);
        assert_eq!(db.run_migrations(&widgets()).await.unwrap(), 0);

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(names.contains(&"_migrations"));
        assert!(names.contains(&"widget"));
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Database::connect_in_memory().await.unwrap();
        let broken = vec![(
            "broken".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE oops (",
            },
        )];

        let err = db.run_migrations(&broken).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Migration { ref module, .. } if module == "broken"));

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
