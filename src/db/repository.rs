use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::error::Result;

use super::schema::SCHEMA;

/// Local key/value store. Nothing in here is sent to the backend.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM settings WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    /// Write several settings in one transaction.
    pub async fn set_settings(&self, entries: Vec<(String, String)>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (key, value) in &entries {
                    tx.execute(
                        r#"INSERT INTO settings (key, value) VALUES (?1, ?2)
                           ON CONFLICT(key) DO UPDATE SET
                               value = excluded.value,
                               updated_at = datetime('now')"#,
                        params![key, value],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upserts_and_reads_settings() {
        let repo = Repository::in_memory().await.unwrap();
        assert_eq!(repo.get_setting("missing").await.unwrap(), None);

        repo.set_settings(vec![("a".to_string(), "1".to_string())])
            .await
            .unwrap();
        repo.set_settings(vec![("a".to_string(), "2".to_string())])
            .await
            .unwrap();
        assert_eq!(repo.get_setting("a").await.unwrap().as_deref(), Some("2"));
    }
}
