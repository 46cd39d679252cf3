use crate::error::{DatabaseError, Result};
use crate::store::SessionStore;
use async_trait::async_trait;
use devtrust_models::{NewSession, Session};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed session store.
///
/// Relies on the partial unique index over (`user_id`, `device_stable_id`)
/// `WHERE is_active` so that the upsert is a single atomic statement.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn upsert(&self, new_session: &NewSession) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                user_id, device_stable_id, device_fingerprint,
                operating_system, screen_resolution, platform,
                device_type, browser_name,
                ip_hash, city, country, mfa_enabled, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (user_id, device_stable_id) WHERE is_active
            DO UPDATE SET
                device_fingerprint = EXCLUDED.device_fingerprint,
                operating_system   = EXCLUDED.operating_system,
                screen_resolution  = EXCLUDED.screen_resolution,
                platform           = EXCLUDED.platform,
                device_type        = EXCLUDED.device_type,
                browser_name       = EXCLUDED.browser_name,
                ip_hash            = EXCLUDED.ip_hash,
                city               = COALESCE(EXCLUDED.city, sessions.city),
                country            = COALESCE(EXCLUDED.country, sessions.country),
                mfa_enabled        = EXCLUDED.mfa_enabled,
                last_activity      = NOW(),
                expires_at         = EXCLUDED.expires_at
            RETURNING *
            "#,
        )
        .bind(new_session.user_id)
        .bind(&new_session.device_stable_id)
        .bind(&new_session.device_fingerprint)
        .bind(&new_session.operating_system)
        .bind(&new_session.screen_resolution)
        .bind(&new_session.platform)
        .bind(&new_session.device_type)
        .bind(&new_session.browser_name)
        .bind(&new_session.ip_hash)
        .bind(&new_session.city)
        .bind(&new_session.country)
        .bind(new_session.mfa_enabled)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND is_active
            ORDER BY last_activity DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn find(&self, user_id: Uuid, device_stable_id: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND device_stable_id = $2
            ORDER BY is_active DESC, last_activity DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(device_stable_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn touch(&self, user_id: Uuid, device_stable_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions SET last_activity = NOW()
            WHERE user_id = $1 AND device_stable_id = $2 AND is_active
            "#,
        )
        .bind(user_id)
        .bind(device_stable_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, user_id: Uuid, device_stable_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET is_active = FALSE, last_activity = NOW()
            WHERE user_id = $1 AND device_stable_id = $2 AND is_active
            "#,
        )
        .bind(user_id)
        .bind(device_stable_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn trust(&self, user_id: Uuid, device_stable_id: &str) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions SET is_trusted = TRUE, last_activity = NOW()
            WHERE user_id = $1 AND device_stable_id = $2 AND is_active
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(device_stable_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("session", device_stable_id))?;

        Ok(session)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = FALSE WHERE expires_at < NOW() AND is_active",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn normalize(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                operating_system = CASE WHEN TRIM(operating_system) = '' THEN 'Unknown'
                                        ELSE operating_system END,
                browser_name     = CASE WHEN TRIM(browser_name) = '' THEN 'Unknown'
                                        ELSE browser_name END,
                device_type      = CASE WHEN TRIM(device_type) = '' THEN 'desktop'
                                        ELSE device_type END,
                city             = NULLIF(TRIM(city), ''),
                country          = NULLIF(TRIM(country), '')
            WHERE TRIM(operating_system) = ''
               OR TRIM(browser_name) = ''
               OR TRIM(device_type) = ''
               OR TRIM(city) = ''
               OR TRIM(country) = ''
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
