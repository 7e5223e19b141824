//! Outcome control repository.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use binopt_core::domain::OutcomeControl;
use binopt_core::traits::ControlStore;

use crate::models::OutcomeControlRow;

/// Repository for admin outcome overrides.
#[derive(Debug, Clone)]
pub struct PgControlStore {
    pool: PgPool,
}

impl PgControlStore {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ControlStore for PgControlStore {
    async fn get_active(&self, user_id: Uuid) -> Result<Option<OutcomeControl>> {
        let row = sqlx::query_as::<_, OutcomeControlRow>(
            r#"
            SELECT user_id, control_type, is_active, notes, created_at, updated_at
            FROM outcome_controls
            WHERE user_id = $1 AND is_active
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OutcomeControl::try_from).transpose()
    }

    async fn upsert(&self, control: &OutcomeControl) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outcome_controls
                (user_id, control_type, is_active, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET control_type = EXCLUDED.control_type,
                is_active = EXCLUDED.is_active,
                notes = EXCLUDED.notes,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(control.user_id)
        .bind(control.control_type.as_str())
        .bind(control.is_active)
        .bind(&control.notes)
        .bind(control.created_at)
        .bind(control.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
