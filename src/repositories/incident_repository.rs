use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::incident::{Incident, IncidentSeverity, ResolutionAction};
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct IncidentRepository {
    pool: PgPool,
}

impl IncidentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        trip_id: Uuid,
        driver_id: Uuid,
        description: String,
        severity: IncidentSeverity,
    ) -> AppResult<Incident> {
        let incident = sqlx::query_as::<_, Incident>(
            r#"
            INSERT INTO trip_incidents
                (id, trip_id, driver_id, description, severity, reported_at, resolved)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trip_id)
        .bind(driver_id)
        .bind(description)
        .bind(severity)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error creating incident: {}", e)))?;

        Ok(incident)
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Incident>> {
        let incident = sqlx::query_as::<_, Incident>(
            "SELECT * FROM trip_incidents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error finding incident: {}", e)))?;

        Ok(incident)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Incident> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Incident", id))
    }

    pub async fn find_open_by_trip(&self, trip_id: Uuid) -> AppResult<Vec<Incident>> {
        let incidents = sqlx::query_as::<_, Incident>(
            "SELECT * FROM trip_incidents WHERE trip_id = $1 AND resolved = FALSE ORDER BY reported_at",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error listing incidents: {}", e)))?;

        Ok(incidents)
    }

    pub async fn resolve(
        &self,
        id: Uuid,
        action: ResolutionAction,
        note: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> AppResult<Incident> {
        let incident = sqlx::query_as::<_, Incident>(
            r#"
            UPDATE trip_incidents
            SET resolved = TRUE,
                resolution_action = $2,
                resolution_note = $3,
                resolved_at = $4
            WHERE id = $1 AND resolved = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(action)
        .bind(note)
        .bind(resolved_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error resolving incident: {}", e)))?;

        incident.ok_or_else(|| {
            AppError::InvalidTransition(format!("incident {} is already resolved", id))
        })
    }
}
