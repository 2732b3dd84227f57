//! Admin settings storage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::Setting;

/// Key/value settings store.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn all(&self) -> Result<Vec<Setting>>;
    async fn upsert(&self, key: &str, value: Option<String>) -> Result<Setting>;
}

/// Settings store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn all(&self) -> Result<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn upsert(&self, key: &str, value: Option<String>) -> Result<Setting> {
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            RETURNING key, value, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(setting)
    }
}

/// Settings store held in memory, for tests.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    inner: RwLock<BTreeMap<String, Setting>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn all(&self) -> Result<Vec<Setting>> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn upsert(&self, key: &str, value: Option<String>) -> Result<Setting> {
        let setting = Setting {
            key: key.to_string(),
            value,
            updated_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .insert(key.to_string(), setting.clone());
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_overwrites_and_all_is_sorted() {
        let store = InMemorySettingsStore::new();
        store
            .upsert("opening_hours", Some("07:30-18:00".into()))
            .await
            .unwrap();
        store.upsert("capacity", Some("24".into())).await.unwrap();
        store.upsert("capacity", Some("30".into())).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key, "capacity");
        assert_eq!(all[0].value.as_deref(), Some("30"));
    }
}
