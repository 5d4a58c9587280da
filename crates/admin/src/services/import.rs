//! Background Metasync imports.
//!
//! [`ImportService::start`] opens a history row and spawns the run. The run
//! pages through each feed, normalises and upserts every item, and writes
//! its counters after each batch. Cancellation is cooperative: the flag is
//! checked between batches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::Instrument;

use desguace_core::{ImportHistory, ImportHistoryId, ImportStatus, ImportType};

use crate::db::{
    CatalogWriter, ImportProgress, ImportRepository, RepositoryError, SyncPosition, UpsertOutcome,
};
use crate::services::metasync::{
    self, Feed, MAX_BATCH_SIZE, MetasyncClient, MetasyncError, PageRequest,
};
use crate::services::normalize::{self, VehicleSummary};

/// Items requested per page.
pub const BATCH_SIZE: u32 = MAX_BATCH_SIZE;

/// Per-item error messages kept from one batch.
const MAX_ERRORS_PER_BATCH: usize = 20;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("API de Metasync no configurada")]
    NotConfigured,

    #[error("ya hay una importación de tipo {0} en curso")]
    AlreadyRunning(ImportType),

    #[error(transparent)]
    Metasync(#[from] MetasyncError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Feeds an import type reads, in order.
#[must_use]
pub const fn feeds_for(import_type: ImportType) -> &'static [Feed] {
    match import_type {
        ImportType::Vehicles => &[Feed::Vehicles],
        ImportType::Parts => &[Feed::Parts],
        ImportType::All => &[Feed::Vehicles, Feed::Parts],
    }
}

const fn sync_type(feed: Feed) -> ImportType {
    match feed {
        Feed::Vehicles => ImportType::Vehicles,
        Feed::Parts => ImportType::Parts,
    }
}

/// The `fecha` a full import sends.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |dt| dt.and_utc())
}

/// Where paging starts. Incremental runs resume from the last sync date
/// with a fresh cursor, since `fecha` already bounds the change feed.
#[must_use]
pub fn starting_point(full: bool, position: SyncPosition) -> (DateTime<Utc>, i64) {
    if full {
        return (epoch(), 0);
    }
    (position.last_sync_date.unwrap_or_else(epoch), 0)
}

// ===== Registry =====

struct RunningImport {
    history_id: ImportHistoryId,
    cancelled: Arc<AtomicBool>,
}

/// Imports currently running in this process.
#[derive(Default)]
pub struct ImportRegistry {
    running: Mutex<HashMap<ImportType, RunningImport>>,
}

impl ImportRegistry {
    fn overlaps(a: ImportType, b: ImportType) -> bool {
        a == b || a == ImportType::All || b == ImportType::All
    }

    /// Claim `import_type`. Fails if it or an overlapping type is running.
    ///
    /// The type stays claimed until the returned guard is dropped.
    fn claim(
        self: &Arc<Self>,
        import_type: ImportType,
        history_id: ImportHistoryId,
    ) -> Result<ImportClaim, ImportError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(busy) = running.keys().find(|t| Self::overlaps(**t, import_type)) {
            return Err(ImportError::AlreadyRunning(*busy));
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        running.insert(
            import_type,
            RunningImport { history_id, cancelled: Arc::clone(&cancelled) },
        );
        Ok(ImportClaim {
            registry: Arc::clone(self),
            import_type,
            cancelled,
        })
    }

    fn release(&self, import_type: ImportType) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&import_type);
    }

    /// Whether `import_type` or an overlapping type is running.
    #[must_use]
    pub fn is_busy(&self, import_type: ImportType) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .any(|t| Self::overlaps(*t, import_type))
    }

    /// Flag a run for cancellation. Returns whether it was running here.
    fn cancel(&self, history_id: ImportHistoryId) -> bool {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running
            .values()
            .find(|r| r.history_id == history_id)
            .inspect(|r| r.cancelled.store(true, Ordering::SeqCst))
            .is_some()
    }
}

/// A claimed import type, released on drop even if the run panics.
struct ImportClaim {
    registry: Arc<ImportRegistry>,
    import_type: ImportType,
    cancelled: Arc<AtomicBool>,
}

impl ImportClaim {
    fn cancelled(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl Drop for ImportClaim {
    fn drop(&mut self) {
        self.registry.release(self.import_type);
    }
}

// ===== Service =====

/// Starts and cancels imports.
#[derive(Clone)]
pub struct ImportService {
    pool: PgPool,
    http: reqwest::Client,
    base_url: String,
    registry: Arc<ImportRegistry>,
}

impl ImportService {
    #[must_use]
    pub fn new(pool: PgPool, http: reqwest::Client, base_url: String) -> Self {
        Self {
            pool,
            http,
            base_url,
            registry: Arc::new(ImportRegistry::default()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ImportRegistry {
        &self.registry
    }

    /// Start an import in the background and return its history row.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::NotConfigured` without a usable API config and
    /// `ImportError::AlreadyRunning` if an overlapping import is running.
    pub async fn start(
        &self,
        import_type: ImportType,
        full: bool,
    ) -> Result<ImportHistory, ImportError> {
        let repo = ImportRepository::new(&self.pool);
        let config = repo.api_config().await?;
        let client = MetasyncClient::new(self.http.clone(), &self.base_url, config)
            .map_err(|_| ImportError::NotConfigured)?;

        if self.registry.is_busy(import_type) {
            return Err(ImportError::AlreadyRunning(import_type));
        }
        let history = repo.start_history(import_type, full).await?;
        let claim = match self.registry.claim(import_type, history.id) {
            Ok(claim) => claim,
            Err(e) => {
                repo.finish_history(history.id, ImportStatus::Cancelled).await?;
                return Err(e);
            }
        };

        let run = ImportRun {
            pool: self.pool.clone(),
            client,
            history_id: history.id,
            cancelled: claim.cancelled(),
            progress: ImportProgress::default(),
        };
        let span = tracing::info_span!(
            "import",
            history_id = history.id.as_i32(),
            import_type = %import_type,
            full
        );
        tokio::spawn(
            async move {
                let _claim = claim;
                run.execute(import_type, full).await;
            }
            .instrument(span),
        );

        tracing::info!(history_id = history.id.as_i32(), %import_type, full, "Import started");
        Ok(history)
    }

    /// Cancel a run. The background task stops after its current batch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown run and
    /// `RepositoryError::Conflict` if it already finished.
    pub async fn cancel(&self, id: ImportHistoryId) -> Result<ImportHistory, ImportError> {
        let history = ImportRepository::new(&self.pool).cancel_history(id).await?;
        let was_running = self.registry.cancel(id);
        tracing::info!(history_id = id.as_i32(), was_running, "Import cancelled");
        Ok(history)
    }
}

// ===== Run =====

enum FeedOutcome {
    Done { last_id: i64 },
    Cancelled,
}

struct ImportRun {
    pool: PgPool,
    client: MetasyncClient,
    history_id: ImportHistoryId,
    cancelled: Arc<AtomicBool>,
    progress: ImportProgress,
}

impl ImportRun {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn execute(mut self, import_type: ImportType, full: bool) {
        let pool = self.pool.clone();
        let repo = ImportRepository::new(&pool);
        let status = match self.run_feeds(import_type, full).await {
            Ok(true) => ImportStatus::Completed,
            Ok(false) => ImportStatus::Cancelled,
            Err(e) => {
                tracing::error!(error = %e, "Import failed");
                self.progress.error_count += 1;
                if let Err(e) = repo
                    .record_progress(self.history_id, self.progress, &[e.to_string()])
                    .await
                {
                    tracing::warn!(error = %e, "Failed to record import error");
                }
                ImportStatus::Failed
            }
        };
        if let Err(e) = repo.finish_history(self.history_id, status).await {
            tracing::error!(error = %e, "Failed to close import history");
        }
        tracing::info!(
            %status,
            processed = self.progress.processed_items,
            new = self.progress.new_items,
            updated = self.progress.updated_items,
            errors = self.progress.error_count,
            "Import finished"
        );
    }

    /// Returns `false` when the run was cancelled.
    async fn run_feeds(&mut self, import_type: ImportType, full: bool) -> Result<bool, ImportError> {
        for feed in feeds_for(import_type) {
            let started_at = Utc::now();
            let position = ImportRepository::new(&self.pool)
                .sync_position(sync_type(*feed))
                .await?;
            let (since, last_id) = starting_point(full, position);

            match self.run_feed(*feed, since, last_id).await? {
                FeedOutcome::Cancelled => return Ok(false),
                FeedOutcome::Done { last_id } => {
                    if *feed == Feed::Parts {
                        let updated = CatalogWriter::new(&self.pool).recompute_vehicle_counts().await?;
                        tracing::info!(vehicles = updated, "Vehicle part counts recomputed");
                    }
                    ImportRepository::new(&self.pool)
                        .save_sync_position(
                            sync_type(*feed),
                            SyncPosition { last_sync_date: Some(started_at), last_id },
                        )
                        .await?;
                }
            }
        }
        Ok(true)
    }

    async fn run_feed(
        &mut self,
        feed: Feed,
        since: DateTime<Utc>,
        mut last_id: i64,
    ) -> Result<FeedOutcome, ImportError> {
        loop {
            if self.is_cancelled() {
                return Ok(FeedOutcome::Cancelled);
            }
            let page = PageRequest { feed, since, last_id, batch_size: BATCH_SIZE };
            let response = self.client.fetch(&page).await?;
            let batch = metasync::items(&response, feed);

            let errors = match feed {
                Feed::Vehicles => self.import_vehicles(batch).await?,
                Feed::Parts => self.import_parts(&response, batch).await?,
            };
            ImportRepository::new(&self.pool)
                .record_progress(self.history_id, self.progress, &errors)
                .await?;

            let next = metasync::next_last_id(&response, feed);
            tracing::debug!(feed = feed.endpoint(), batch = batch.len(), last_id, ?next, "Batch imported");
            if metasync::is_exhausted(batch.len(), last_id, next) {
                return Ok(FeedOutcome::Done { last_id: next.unwrap_or(last_id).max(last_id) });
            }
            last_id = next.unwrap_or(last_id);
        }
    }

    fn count(&mut self, outcome: Result<UpsertOutcome, String>, errors: &mut Vec<String>) {
        self.progress.total_items += 1;
        match outcome {
            Ok(UpsertOutcome::Inserted) => {
                self.progress.processed_items += 1;
                self.progress.new_items += 1;
            }
            Ok(UpsertOutcome::Updated) => {
                self.progress.processed_items += 1;
                self.progress.updated_items += 1;
            }
            Err(message) => {
                self.progress.error_count += 1;
                if errors.len() < MAX_ERRORS_PER_BATCH {
                    errors.push(message);
                }
            }
        }
    }

    async fn import_vehicles(&mut self, batch: &[Value]) -> Result<Vec<String>, ImportError> {
        let company_id = self.client.company_id();
        let pool = self.pool.clone();
        let writer = CatalogWriter::new(&pool);
        let mut errors = Vec::new();
        for raw in batch {
            let outcome = match normalize::normalize_vehicle(raw, company_id) {
                Ok(vehicle) => writer
                    .upsert_vehicle(&vehicle)
                    .await
                    .map_err(|e| format!("vehículo {}: {e}", vehicle.id_local)),
                Err(e) => Err(e.to_string()),
            };
            self.count(outcome, &mut errors);
        }
        Ok(errors)
    }

    async fn import_parts(&mut self, response: &Value, batch: &[Value]) -> Result<Vec<String>, ImportError> {
        let company_id = self.client.company_id();
        let pool = self.pool.clone();
        let writer = CatalogWriter::new(&pool);

        let batch_vehicles: HashMap<i64, VehicleSummary> = metasync::items(response, Feed::Vehicles)
            .iter()
            .filter_map(|raw| normalize::normalize_vehicle(raw, company_id).ok())
            .map(|v| (v.id_local, v.summary()))
            .collect();

        let mut wanted: Vec<i64> = batch
            .iter()
            .filter_map(|raw| raw.get("idVehiculo").and_then(Value::as_i64))
            .filter(|id| *id > 0 && !batch_vehicles.contains_key(id))
            .collect();
        wanted.sort_unstable();
        wanted.dedup();
        let local_vehicles = writer.vehicle_map(&wanted).await?;

        let mut errors = Vec::new();
        for raw in batch {
            let outcome = match normalize::normalize_part(raw, company_id, &batch_vehicles, &local_vehicles) {
                Ok(part) => writer
                    .upsert_part(&part)
                    .await
                    .map_err(|e| format!("pieza {}: {e}", part.ref_local)),
                Err(e) => Err(e.to_string()),
            };
            self.count(outcome, &mut errors);
        }
        Ok(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, TimeZone};

    use super::*;

    #[test]
    fn test_all_imports_vehicles_before_parts() {
        assert_eq!(feeds_for(ImportType::All), &[Feed::Vehicles, Feed::Parts]);
        assert_eq!(feeds_for(ImportType::Parts), &[Feed::Parts]);
    }

    #[test]
    fn test_full_import_starts_from_1900() {
        let position = SyncPosition {
            last_sync_date: Some(Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap()),
            last_id: 5000,
        };
        let (since, last_id) = starting_point(true, position);
        assert_eq!(since.year(), 1900);
        assert_eq!(last_id, 0);
    }

    #[test]
    fn test_incremental_import_resumes_from_last_sync() {
        let synced = Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap();
        let position = SyncPosition { last_sync_date: Some(synced), last_id: 5000 };
        assert_eq!(starting_point(false, position), (synced, 0));

        let never = SyncPosition { last_sync_date: None, last_id: 0 };
        assert_eq!(starting_point(false, never).0, epoch());
    }

    #[test]
    fn test_registry_rejects_overlapping_runs() {
        let registry = Arc::new(ImportRegistry::default());
        let vehicles = registry.claim(ImportType::Vehicles, ImportHistoryId::new(1)).unwrap();

        assert!(matches!(
            registry.claim(ImportType::Vehicles, ImportHistoryId::new(2)),
            Err(ImportError::AlreadyRunning(ImportType::Vehicles))
        ));
        assert!(registry.claim(ImportType::All, ImportHistoryId::new(3)).is_err());
        let parts = registry.claim(ImportType::Parts, ImportHistoryId::new(4)).unwrap();

        assert!(registry.cancel(ImportHistoryId::new(1)));
        assert!(vehicles.cancelled().load(Ordering::SeqCst));
        assert!(!registry.cancel(ImportHistoryId::new(99)));

        drop(vehicles);
        assert!(registry.is_busy(ImportType::All));
        drop(parts);
        assert!(!registry.is_busy(ImportType::All));
    }

    #[tokio::test]
    async fn test_panicking_run_releases_its_type() {
        let registry = Arc::new(ImportRegistry::default());
        let claim = registry.claim(ImportType::Parts, ImportHistoryId::new(7)).unwrap();

        let task = tokio::spawn(async move {
            let _claim = claim;
            panic!("metasync payload broke the run");
        });
        assert!(task.await.unwrap_err().is_panic());

        assert!(!registry.is_busy(ImportType::Parts));
        assert!(registry.claim(ImportType::All, ImportHistoryId::new(8)).is_ok());
    }
}
