use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ProfileProvider;

/// Reads the `resource_profiles` table maintained by the profile service.
#[derive(Clone)]
pub struct PgProfiles {
    pool: PgPool,
}

impl PgProfiles {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileProvider for PgProfiles {
    async fn capacity(&self, resource_id: Uuid) -> anyhow::Result<Option<i32>> {
        let max: Option<Option<i32>> = sqlx::query_scalar(
            "SELECT max_concurrent_sessions FROM resource_profiles WHERE user_id = $1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(max.flatten())
    }

    async fn is_resource(&self, user_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM resource_profiles WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn default_timezone(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        let tz: Option<Option<String>> =
            sqlx::query_scalar("SELECT timezone FROM resource_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(tz.flatten())
    }
}

/// In-process profile table for development and tests.
#[derive(Default)]
pub struct StaticProfiles {
    resources: RwLock<HashSet<Uuid>>,
    capacity: RwLock<HashMap<Uuid, i32>>,
    timezone: RwLock<HashMap<Uuid, String>>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_resource(&self, resource_id: Uuid) {
        self.resources.write().await.insert(resource_id);
    }

    pub async fn set_capacity(&self, resource_id: Uuid, max_concurrent_sessions: i32) {
        self.register_resource(resource_id).await;
        self.capacity.write().await.insert(resource_id, max_concurrent_sessions);
    }

    pub async fn set_timezone(&self, user_id: Uuid, timezone: impl Into<String>) {
        self.timezone.write().await.insert(user_id, timezone.into());
    }
}

#[async_trait]
impl ProfileProvider for StaticProfiles {
    async fn capacity(&self, resource_id: Uuid) -> anyhow::Result<Option<i32>> {
        Ok(self.capacity.read().await.get(&resource_id).copied())
    }

    async fn is_resource(&self, user_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.resources.read().await.contains(&user_id))
    }

    async fn default_timezone(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        Ok(self.timezone.read().await.get(&user_id).cloned())
    }
}
