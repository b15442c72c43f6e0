//! Repositorio de asignaciones
//!
//! Concentra las escrituras multi-entidad del despacho. Cada operación es
//! una transacción: bloquea las filas de driver/vehicle (FOR UPDATE),
//! re-valida el solape dentro de la transacción y aplica guardas
//! optimistas de versión sobre los trips, de modo que dos asignaciones
//! concurrentes sobre el mismo recurso no puedan confirmarse ambas.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::assignment::{Assignment, BusyWindow};
use crate::models::driver::Driver;
use crate::models::trip::{TimeWindow, Trip};
use crate::models::vehicle::Vehicle;
use crate::utils::errors::{AppError, AppResult};

/// Fallo al confirmar una asignación dentro de la transacción.
#[derive(Debug)]
pub enum CommitFailure {
    /// Otra transacción tocó una fila primero (guarda de versión). El
    /// llamante recarga y reintenta una vez antes de rendirse.
    Contention { trip_id: Uuid },
    /// Solape real detectado en la re-validación.
    Conflict {
        resource: String,
        blocking_trip_id: Uuid,
    },
    Db(AppError),
}

impl From<sqlx::Error> for CommitFailure {
    fn from(e: sqlx::Error) -> Self {
        CommitFailure::Db(AppError::DatabaseError(e.to_string()))
    }
}

/// Plan de confirmación ya validado por el motor de asignación.
pub struct AssignmentCommit<'a> {
    pub driver: &'a Driver,
    pub vehicle: &'a Vehicle,
    /// Trips a asignar; los no-ops idempotentes ya fueron excluidos.
    pub trips: Vec<&'a Trip>,
    pub note: Option<String>,
    pub now: DateTime<Utc>,
}

pub struct AssignmentRepository {
    pool: PgPool,
}

impl AssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_active_by_trip(&self, trip_id: Uuid) -> AppResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM trip_assignments WHERE trip_id = $1 AND removed_at IS NULL",
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error finding assignment: {}", e)))?;

        Ok(assignment)
    }

    /// Ventanas ocupadas de un conductor: trips ASSIGNED/ONGOING con
    /// asignación activa. Sin efectos secundarios; se usa tanto para el
    /// ranking como para la re-validación al confirmar.
    pub async fn busy_windows_for_driver(
        &self,
        driver_id: Uuid,
        exclude_trip: Option<Uuid>,
    ) -> AppResult<Vec<BusyWindow>> {
        let rows = sqlx::query_as::<_, (Uuid, DateTime<Utc>, DateTime<Utc>)>(
            r#"
            SELECT t.id, t.window_start, t.window_end
            FROM trip_assignments a
            JOIN trips t ON t.id = a.trip_id
            WHERE a.driver_id = $1
              AND a.removed_at IS NULL
              AND t.status IN ('assigned', 'ongoing')
              AND ($2::uuid IS NULL OR t.id <> $2::uuid)
            "#,
        )
        .bind(driver_id)
        .bind(exclude_trip)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error loading driver windows: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(trip_id, start, end)| BusyWindow {
                trip_id,
                window: TimeWindow { start, end },
            })
            .collect())
    }

    pub async fn busy_windows_for_vehicle(
        &self,
        vehicle_id: Uuid,
        exclude_trip: Option<Uuid>,
    ) -> AppResult<Vec<BusyWindow>> {
        let rows = sqlx::query_as::<_, (Uuid, DateTime<Utc>, DateTime<Utc>)>(
            r#"
            SELECT t.id, t.window_start, t.window_end
            FROM trip_assignments a
            JOIN trips t ON t.id = a.trip_id
            WHERE a.vehicle_id = $1
              AND a.removed_at IS NULL
              AND t.status IN ('assigned', 'ongoing')
              AND ($2::uuid IS NULL OR t.id <> $2::uuid)
            "#,
        )
        .bind(vehicle_id)
        .bind(exclude_trip)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error loading vehicle windows: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(trip_id, start, end)| BusyWindow {
                trip_id,
                window: TimeWindow { start, end },
            })
            .collect())
    }

    /// Carga de trabajo de un conductor: asignaciones activas cuyas
    /// salidas caen en [from, to).
    pub async fn driver_workload(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM trip_assignments a
            JOIN trips t ON t.id = a.trip_id
            WHERE a.driver_id = $1
              AND a.removed_at IS NULL
              AND t.status IN ('assigned', 'ongoing')
              AND t.window_start >= $2
              AND t.window_start < $3
            "#,
        )
        .bind(driver_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error counting workload: {}", e)))?;

        Ok(count)
    }

    /// Confirmar una asignación validada. Toda la operación es atómica:
    /// si cualquier paso falla no queda estado parcial.
    pub async fn commit_assignment(
        &self,
        commit: &AssignmentCommit<'_>,
    ) -> Result<(), CommitFailure> {
        let mut tx = self.pool.begin().await?;

        // Serializar escritores concurrentes sobre los mismos recursos
        sqlx::query("SELECT id FROM drivers WHERE id = $1 FOR UPDATE")
            .bind(commit.driver.id)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("SELECT id FROM vehicles WHERE id = $1 FOR UPDATE")
            .bind(commit.vehicle.id)
            .fetch_one(&mut *tx)
            .await?;

        // Re-validar disponibilidad ya con los locks tomados
        for trip in &commit.trips {
            if let Some(blocking) = Self::blocking_trip_for_driver(
                &mut tx,
                commit.driver.id,
                &trip.window(),
                trip.id,
            )
            .await?
            {
                return Err(CommitFailure::Conflict {
                    resource: format!("driver {}", commit.driver.id),
                    blocking_trip_id: blocking,
                });
            }
            if let Some(blocking) = Self::blocking_trip_for_vehicle(
                &mut tx,
                commit.vehicle.id,
                &trip.window(),
                trip.id,
            )
            .await?
            {
                return Err(CommitFailure::Conflict {
                    resource: format!("vehicle {}", commit.vehicle.id),
                    blocking_trip_id: blocking,
                });
            }
        }

        // Pasar cada trip a ASSIGNED con guarda optimista
        for trip in &commit.trips {
            let result = sqlx::query(
                r#"
                UPDATE trips
                SET status = 'assigned', version = version + 1
                WHERE id = $1 AND status = 'scheduled' AND version = $2
                "#,
            )
            .bind(trip.id)
            .bind(trip.version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CommitFailure::Contention { trip_id: trip.id });
            }

            sqlx::query(
                r#"
                INSERT INTO trip_assignments
                    (id, trip_id, driver_id, vehicle_id, role, note, assigned_at)
                VALUES ($1, $2, $3, $4, 'main', $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(trip.id)
            .bind(commit.driver.id)
            .bind(commit.vehicle.id)
            .bind(commit.note.as_deref())
            .bind(commit.now)
            .execute(&mut *tx)
            .await?;
        }

        // Ocupar los recursos solo si alguna ventana cubre el momento
        // actual; si la ventana es futura el recurso queda reservado pero
        // sigue AVAILABLE hasta que llegue.
        let window_is_current = commit
            .trips
            .iter()
            .any(|t| t.window().covers(commit.now));
        if window_is_current {
            sqlx::query(
                "UPDATE drivers SET status = 'on_trip', version = version + 1 \
                 WHERE id = $1 AND status = 'available'",
            )
            .bind(commit.driver.id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "UPDATE vehicles SET status = 'in_use', version = version + 1 \
                 WHERE id = $1 AND status = 'available'",
            )
            .bind(commit.vehicle.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Desasignar un trip: retira los registros activos (historial
    /// inmutable), devuelve el trip a SCHEDULED y libera los recursos que
    /// no tengan otra asignación activa. Devuelve las asignaciones
    /// retiradas; vacío significa que no había nada asignado.
    pub async fn unassign_trip(&self, trip: &Trip, reason: &str) -> AppResult<Vec<Assignment>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let active = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM trip_assignments WHERE trip_id = $1 AND removed_at IS NULL FOR UPDATE",
        )
        .bind(trip.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error loading assignments: {}", e)))?;

        if active.is_empty() {
            return Ok(vec![]);
        }

        sqlx::query(
            r#"
            UPDATE trip_assignments
            SET removed_at = $2, removed_reason = $3
            WHERE trip_id = $1 AND removed_at IS NULL
            "#,
        )
        .bind(trip.id)
        .bind(Utc::now())
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error retiring assignments: {}", e)))?;

        sqlx::query(
            r#"
            UPDATE trips
            SET status = 'scheduled', version = version + 1
            WHERE id = $1 AND status = 'assigned'
            "#,
        )
        .bind(trip.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error resetting trip: {}", e)))?;

        for assignment in &active {
            Self::release_driver_if_idle(&mut tx, assignment.driver_id).await?;
            Self::release_vehicle_if_idle(&mut tx, assignment.vehicle_id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(active)
    }

    /// Registrar la aceptación del conductor. Idempotente: una segunda
    /// aceptación conserva el primer timestamp.
    pub async fn mark_accepted(&self, assignment_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE trip_assignments SET accepted_at = COALESCE(accepted_at, $2) WHERE id = $1",
        )
        .bind(assignment_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error accepting assignment: {}", e)))?;

        Ok(())
    }

    /// ASSIGNED -> ONGOING con guarda de versión; ocupa driver y vehicle.
    pub async fn mark_started(&self, trip: &Trip, assignment: &Assignment) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'ongoing', version = version + 1
            WHERE id = $1 AND status = 'assigned' AND version = $2
            "#,
        )
        .bind(trip.id)
        .bind(trip.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error starting trip: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "trip {} is no longer in ASSIGNED state",
                trip.id
            )));
        }

        sqlx::query("UPDATE drivers SET status = 'on_trip', version = version + 1 WHERE id = $1")
            .bind(assignment.driver_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error updating driver: {}", e)))?;

        sqlx::query("UPDATE vehicles SET status = 'in_use', version = version + 1 WHERE id = $1")
            .bind(assignment.vehicle_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error updating vehicle: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// ONGOING -> COMPLETED; libera los recursos que queden sin otra
    /// asignación activa.
    pub async fn mark_completed(&self, trip: &Trip, assignment: &Assignment) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'completed', version = version + 1
            WHERE id = $1 AND status = 'ongoing' AND version = $2
            "#,
        )
        .bind(trip.id)
        .bind(trip.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error completing trip: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "trip {} is no longer in ONGOING state",
                trip.id
            )));
        }

        Self::release_driver_if_idle(&mut tx, assignment.driver_id).await?;
        Self::release_vehicle_if_idle(&mut tx, assignment.vehicle_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// SCHEDULED/ASSIGNED -> CANCELLED; retira asignaciones activas.
    pub async fn cancel_trip(&self, trip: &Trip, reason: &str) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'cancelled', version = version + 1
            WHERE id = $1 AND status IN ('scheduled', 'assigned') AND version = $2
            "#,
        )
        .bind(trip.id)
        .bind(trip.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error cancelling trip: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "trip {} cannot be cancelled from status {}",
                trip.id,
                trip.status.as_str()
            )));
        }

        let active = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM trip_assignments WHERE trip_id = $1 AND removed_at IS NULL FOR UPDATE",
        )
        .bind(trip.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error loading assignments: {}", e)))?;

        if !active.is_empty() {
            sqlx::query(
                r#"
                UPDATE trip_assignments
                SET removed_at = $2, removed_reason = $3
                WHERE trip_id = $1 AND removed_at IS NULL
                "#,
            )
            .bind(trip.id)
            .bind(Utc::now())
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error retiring assignments: {}", e)))?;

            for assignment in &active {
                Self::release_driver_if_idle(&mut tx, assignment.driver_id).await?;
                Self::release_vehicle_if_idle(&mut tx, assignment.vehicle_id).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Reabrir el despacho de un trip tras un incidente con reemplazo:
    /// ASSIGNED/ONGOING -> SCHEDULED, retira las asignaciones activas y
    /// libera los recursos. El trip vuelve a la cola de pendientes.
    pub async fn reopen_trip(&self, trip: &Trip, reason: &str) -> AppResult<Vec<Assignment>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'scheduled', version = version + 1
            WHERE id = $1 AND status IN ('assigned', 'ongoing') AND version = $2
            "#,
        )
        .bind(trip.id)
        .bind(trip.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error reopening trip: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "trip {} cannot be reopened from status {}",
                trip.id,
                trip.status.as_str()
            )));
        }

        let active = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM trip_assignments WHERE trip_id = $1 AND removed_at IS NULL FOR UPDATE",
        )
        .bind(trip.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error loading assignments: {}", e)))?;

        if !active.is_empty() {
            sqlx::query(
                r#"
                UPDATE trip_assignments
                SET removed_at = $2, removed_reason = $3
                WHERE trip_id = $1 AND removed_at IS NULL
                "#,
            )
            .bind(trip.id)
            .bind(Utc::now())
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error retiring assignments: {}", e)))?;

            for assignment in &active {
                Self::release_driver_if_idle(&mut tx, assignment.driver_id).await?;
                Self::release_vehicle_if_idle(&mut tx, assignment.vehicle_id).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(active)
    }

    async fn blocking_trip_for_driver(
        tx: &mut Transaction<'_, Postgres>,
        driver_id: Uuid,
        window: &TimeWindow,
        exclude_trip: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT t.id
            FROM trip_assignments a
            JOIN trips t ON t.id = a.trip_id
            WHERE a.driver_id = $1
              AND a.removed_at IS NULL
              AND t.status IN ('assigned', 'ongoing')
              AND t.id <> $2
              AND t.window_start < $3
              AND t.window_end > $4
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .bind(exclude_trip)
        .bind(window.end)
        .bind(window.start)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn blocking_trip_for_vehicle(
        tx: &mut Transaction<'_, Postgres>,
        vehicle_id: Uuid,
        window: &TimeWindow,
        exclude_trip: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT t.id
            FROM trip_assignments a
            JOIN trips t ON t.id = a.trip_id
            WHERE a.vehicle_id = $1
              AND a.removed_at IS NULL
              AND t.status IN ('assigned', 'ongoing')
              AND t.id <> $2
              AND t.window_start < $3
              AND t.window_end > $4
            LIMIT 1
            "#,
        )
        .bind(vehicle_id)
        .bind(exclude_trip)
        .bind(window.end)
        .bind(window.start)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn release_driver_if_idle(
        tx: &mut Transaction<'_, Postgres>,
        driver_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE drivers
            SET status = 'available', version = version + 1
            WHERE id = $1
              AND status = 'on_trip'
              AND NOT EXISTS (
                  SELECT 1 FROM trip_assignments a
                  JOIN trips t ON t.id = a.trip_id
                  WHERE a.driver_id = $1
                    AND a.removed_at IS NULL
                    AND t.status IN ('assigned', 'ongoing')
              )
            "#,
        )
        .bind(driver_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error releasing driver: {}", e)))?;

        Ok(())
    }

    async fn release_vehicle_if_idle(
        tx: &mut Transaction<'_, Postgres>,
        vehicle_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE vehicles
            SET status = 'available', version = version + 1
            WHERE id = $1
              AND status = 'in_use'
              AND NOT EXISTS (
                  SELECT 1 FROM trip_assignments a
                  JOIN trips t ON t.id = a.trip_id
                  WHERE a.vehicle_id = $1
                    AND a.removed_at IS NULL
                    AND t.status IN ('assigned', 'ongoing')
              )
            "#,
        )
        .bind(vehicle_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error releasing vehicle: {}", e)))?;

        Ok(())
    }
}
