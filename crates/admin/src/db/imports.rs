//! Metasync import bookkeeping and catalog writes.
//!
//! [`ImportRepository`] owns `api_config`, `import_schedules`,
//! `import_history` and `sync_control`. [`CatalogWriter`] upserts the
//! normalised vehicles and parts an import produces.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use desguace_core::{
    ApiConfig, ImportHistory, ImportHistoryId, ImportSchedule, ImportScheduleId, ImportStatus,
    ImportType,
};

use crate::services::normalize::{PartRecord, VehicleRecord, VehicleSummary};

use super::{RepositoryError, require_affected};

const SCHEDULE_COLUMNS: &str = "id, import_type, frequency, start_time, is_active, last_run, \
     next_run, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, import_type, status, is_full_import, total_items, \
     processed_items, new_items, updated_items, error_count, errors, start_time, end_time";

/// Most error messages kept on one history row.
pub const MAX_STORED_ERRORS: usize = 100;

/// Where an incremental import resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct SyncPosition {
    pub last_sync_date: Option<DateTime<Utc>>,
    pub last_id: i64,
}

/// Whether an upsert created or refreshed a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    const fn from_inserted(inserted: bool) -> Self {
        if inserted { Self::Inserted } else { Self::Updated }
    }
}

/// Counters reported while an import runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportProgress {
    pub total_items: i32,
    pub processed_items: i32,
    pub new_items: i32,
    pub updated_items: i32,
    pub error_count: i32,
}

/// Repository for import configuration, schedules and history.
pub struct ImportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImportRepository<'a> {
    /// Create a new import repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // ===== API config =====

    /// The single `api_config` row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the seeded row is missing.
    pub async fn api_config(&self) -> Result<ApiConfig, RepositoryError> {
        sqlx::query_as::<_, ApiConfig>(
            "SELECT api_key, company_id, channel, active FROM api_config WHERE id = 1",
        )
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption("api_config row missing".to_owned()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn save_api_config(&self, config: &ApiConfig) -> Result<ApiConfig, RepositoryError> {
        let saved = sqlx::query_as::<_, ApiConfig>(
            r"
            INSERT INTO api_config (id, api_key, company_id, channel, active)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                api_key = EXCLUDED.api_key,
                company_id = EXCLUDED.company_id,
                channel = EXCLUDED.channel,
                active = EXCLUDED.active,
                updated_at = NOW()
            RETURNING api_key, company_id, channel, active
            ",
        )
        .bind(&config.api_key)
        .bind(config.company_id)
        .bind(&config.channel)
        .bind(config.active)
        .fetch_one(self.pool)
        .await?;
        Ok(saved)
    }

    // ===== Schedules =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn schedules(&self) -> Result<Vec<ImportSchedule>, RepositoryError> {
        let schedules = sqlx::query_as::<_, ImportSchedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM import_schedules ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(schedules)
    }

    /// Active schedules whose next run is due.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_schedules(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ImportSchedule>, RepositoryError> {
        let schedules = sqlx::query_as::<_, ImportSchedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM import_schedules \
             WHERE is_active = TRUE AND next_run IS NOT NULL AND next_run <= $1 \
             ORDER BY next_run"
        ))
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(schedules)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_schedule(
        &self,
        import_type: ImportType,
        frequency: &str,
        start_time: Option<&str>,
        is_active: bool,
        next_run: DateTime<Utc>,
    ) -> Result<ImportSchedule, RepositoryError> {
        let schedule = sqlx::query_as::<_, ImportSchedule>(&format!(
            "INSERT INTO import_schedules (import_type, frequency, start_time, is_active, next_run) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(import_type)
        .bind(frequency)
        .bind(start_time)
        .bind(is_active)
        .bind(next_run)
        .fetch_one(self.pool)
        .await?;
        Ok(schedule)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown schedule.
    pub async fn update_schedule(
        &self,
        id: ImportScheduleId,
        frequency: &str,
        start_time: Option<&str>,
        is_active: bool,
        next_run: DateTime<Utc>,
    ) -> Result<ImportSchedule, RepositoryError> {
        sqlx::query_as::<_, ImportSchedule>(&format!(
            "UPDATE import_schedules SET frequency = $2, start_time = $3, is_active = $4, \
             next_run = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(id)
        .bind(frequency)
        .bind(start_time)
        .bind(is_active)
        .bind(next_run)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown schedule.
    pub async fn delete_schedule(&self, id: ImportScheduleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM import_schedules WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// Record a run and move the schedule forward.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown schedule.
    pub async fn mark_schedule_run(
        &self,
        id: ImportScheduleId,
        ran_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE import_schedules SET last_run = $2, next_run = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ran_at)
        .bind(next_run)
        .execute(self.pool)
        .await?;
        require_affected(result.rows_affected())
    }

    // ===== History =====

    /// Open a history row in `running` state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn start_history(
        &self,
        import_type: ImportType,
        is_full_import: bool,
    ) -> Result<ImportHistory, RepositoryError> {
        let history = sqlx::query_as::<_, ImportHistory>(&format!(
            "INSERT INTO import_history (import_type, status, is_full_import) \
             VALUES ($1, 'running', $2) RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(import_type)
        .bind(is_full_import)
        .fetch_one(self.pool)
        .await?;
        Ok(history)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: ImportHistoryId) -> Result<Option<ImportHistory>, RepositoryError> {
        let history = sqlx::query_as::<_, ImportHistory>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM import_history WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(history)
    }

    /// Most recent runs first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_history(&self, limit: i64) -> Result<Vec<ImportHistory>, RepositoryError> {
        let history = sqlx::query_as::<_, ImportHistory>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM import_history ORDER BY start_time DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(history)
    }

    /// Overwrite the counters and append `new_errors`, capped at
    /// [`MAX_STORED_ERRORS`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_progress(
        &self,
        id: ImportHistoryId,
        progress: ImportProgress,
        new_errors: &[String],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE import_history SET
                total_items = $2,
                processed_items = $3,
                new_items = $4,
                updated_items = $5,
                error_count = $6,
                errors = (errors || $7::TEXT[])[1:$8]
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(progress.total_items)
        .bind(progress.processed_items)
        .bind(progress.new_items)
        .bind(progress.updated_items)
        .bind(progress.error_count)
        .bind(new_errors)
        .bind(i32::try_from(MAX_STORED_ERRORS).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Close a run with a terminal status. A run already closed (for example
    /// cancelled) keeps its status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn finish_history(
        &self,
        id: ImportHistoryId,
        status: ImportStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE import_history SET status = $2, end_time = NOW() \
             WHERE id = $1 AND status IN ('pending', 'running', 'paused')",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Mark a run as cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown run and
    /// `RepositoryError::Conflict` if the run already finished.
    pub async fn cancel_history(&self, id: ImportHistoryId) -> Result<ImportHistory, RepositoryError> {
        let Some(current) = self.history(id).await? else {
            return Err(RepositoryError::NotFound);
        };
        if current.status.is_finished() {
            return Err(RepositoryError::Conflict("import already finished".to_owned()));
        }
        self.finish_history(id, ImportStatus::Cancelled).await?;
        self.history(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Close runs left open by a crash or restart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn fail_orphaned_runs(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE import_history SET status = 'failed', end_time = NOW(), \
             errors = array_append(errors, 'Importación interrumpida por reinicio del servidor') \
             WHERE status IN ('pending', 'running', 'paused')",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ===== Sync control =====

    /// Resume point for `import_type`; defaults to the beginning.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sync_position(&self, import_type: ImportType) -> Result<SyncPosition, RepositoryError> {
        let position = sqlx::query_as::<_, SyncPosition>(
            "SELECT last_sync_date, last_id FROM sync_control WHERE import_type = $1",
        )
        .bind(import_type)
        .fetch_optional(self.pool)
        .await?;
        Ok(position.unwrap_or(SyncPosition { last_sync_date: None, last_id: 0 }))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn save_sync_position(
        &self,
        import_type: ImportType,
        position: SyncPosition,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO sync_control (import_type, last_sync_date, last_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (import_type) DO UPDATE SET
                last_sync_date = EXCLUDED.last_sync_date,
                last_id = EXCLUDED.last_id
            ",
        )
        .bind(import_type)
        .bind(position.last_sync_date)
        .bind(position.last_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

/// Writes imported catalog rows.
pub struct CatalogWriter<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogWriter<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a vehicle keyed by `id_local`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_vehicle(&self, v: &VehicleRecord) -> Result<UpsertOutcome, RepositoryError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r"
            INSERT INTO vehicles (id_local, id_empresa, marca, modelo, version, anyo, descripcion,
                                  combustible, bastidor, matricula, color, kilometraje, potencia,
                                  puertas, imagenes, activo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, TRUE)
            ON CONFLICT (id_local) DO UPDATE SET
                id_empresa = EXCLUDED.id_empresa,
                marca = EXCLUDED.marca,
                modelo = EXCLUDED.modelo,
                version = EXCLUDED.version,
                anyo = EXCLUDED.anyo,
                descripcion = EXCLUDED.descripcion,
                combustible = EXCLUDED.combustible,
                bastidor = EXCLUDED.bastidor,
                matricula = EXCLUDED.matricula,
                color = EXCLUDED.color,
                kilometraje = EXCLUDED.kilometraje,
                potencia = EXCLUDED.potencia,
                puertas = EXCLUDED.puertas,
                imagenes = EXCLUDED.imagenes,
                activo = TRUE,
                updated_at = NOW()
            RETURNING (xmax = 0)
            ",
        )
        .bind(v.id_local)
        .bind(v.id_empresa)
        .bind(&v.marca)
        .bind(&v.modelo)
        .bind(&v.version)
        .bind(v.anyo)
        .bind(&v.descripcion)
        .bind(&v.combustible)
        .bind(&v.bastidor)
        .bind(&v.matricula)
        .bind(&v.color)
        .bind(v.kilometraje)
        .bind(v.potencia)
        .bind(v.puertas)
        .bind(&v.imagenes)
        .fetch_one(self.pool)
        .await?;
        Ok(UpsertOutcome::from_inserted(inserted))
    }

    /// Insert or refresh a part keyed by `ref_local`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_part(&self, p: &PartRecord) -> Result<UpsertOutcome, RepositoryError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r"
            INSERT INTO parts (ref_local, id_empresa, id_vehiculo, vehicle_marca, vehicle_modelo,
                               vehicle_version, vehicle_anyo, combustible, cod_familia,
                               descripcion_familia, cod_articulo, descripcion_articulo,
                               ref_principal, anyo_inicio, anyo_fin, precio, peso, observaciones,
                               reserva, situacion, imagenes, activo, disponible_api)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, TRUE)
            ON CONFLICT (ref_local) DO UPDATE SET
                id_empresa = EXCLUDED.id_empresa,
                id_vehiculo = EXCLUDED.id_vehiculo,
                vehicle_marca = EXCLUDED.vehicle_marca,
                vehicle_modelo = EXCLUDED.vehicle_modelo,
                vehicle_version = EXCLUDED.vehicle_version,
                vehicle_anyo = EXCLUDED.vehicle_anyo,
                combustible = EXCLUDED.combustible,
                cod_familia = EXCLUDED.cod_familia,
                descripcion_familia = EXCLUDED.descripcion_familia,
                cod_articulo = EXCLUDED.cod_articulo,
                descripcion_articulo = EXCLUDED.descripcion_articulo,
                ref_principal = EXCLUDED.ref_principal,
                anyo_inicio = EXCLUDED.anyo_inicio,
                anyo_fin = EXCLUDED.anyo_fin,
                precio = EXCLUDED.precio,
                peso = EXCLUDED.peso,
                observaciones = EXCLUDED.observaciones,
                reserva = EXCLUDED.reserva,
                situacion = EXCLUDED.situacion,
                imagenes = EXCLUDED.imagenes,
                activo = EXCLUDED.activo,
                disponible_api = TRUE,
                updated_at = NOW()
            RETURNING (xmax = 0)
            ",
        )
        .bind(p.ref_local)
        .bind(p.id_empresa)
        .bind(p.id_vehiculo)
        .bind(&p.vehicle_marca)
        .bind(&p.vehicle_modelo)
        .bind(&p.vehicle_version)
        .bind(p.vehicle_anyo)
        .bind(&p.combustible)
        .bind(&p.cod_familia)
        .bind(&p.descripcion_familia)
        .bind(&p.cod_articulo)
        .bind(&p.descripcion_articulo)
        .bind(&p.ref_principal)
        .bind(p.anyo_inicio)
        .bind(p.anyo_fin)
        .bind(p.precio)
        .bind(p.peso)
        .bind(&p.observaciones)
        .bind(p.reserva)
        .bind(&p.situacion)
        .bind(&p.imagenes)
        .bind(p.activo)
        .fetch_one(self.pool)
        .await?;
        Ok(UpsertOutcome::from_inserted(inserted))
    }

    /// Local vehicles for the given Metasync IDs, keyed by `id_local`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn vehicle_map(
        &self,
        id_locals: &[i64],
    ) -> Result<HashMap<i64, VehicleSummary>, RepositoryError> {
        if id_locals.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, VehicleSummary>(
            "SELECT id_local, marca, modelo, version, anyo, combustible FROM vehicles \
             WHERE id_local = ANY($1)",
        )
        .bind(id_locals)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|v| (v.id_local, v)).collect())
    }

    /// Recount parts per vehicle. Active means `activo` with a positive
    /// price; total means `activo`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn recompute_vehicle_counts(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE vehicles v SET
                active_parts_count = COALESCE(c.active, 0),
                total_parts_count = COALESCE(c.total, 0),
                updated_at = NOW()
            FROM vehicles v2
            LEFT JOIN (
                SELECT id_vehiculo,
                       COUNT(*) FILTER (WHERE precio > 0)::INTEGER AS active,
                       COUNT(*)::INTEGER AS total
                FROM parts
                WHERE activo = TRUE
                GROUP BY id_vehiculo
            ) c ON c.id_vehiculo = v2.id_local
            WHERE v.id = v2.id
              AND (v.active_parts_count IS DISTINCT FROM COALESCE(c.active, 0)
                   OR v.total_parts_count IS DISTINCT FROM COALESCE(c.total, 0))
            ",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
