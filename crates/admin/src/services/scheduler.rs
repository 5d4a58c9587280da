//! Recurring imports.
//!
//! Frequencies are strings such as `30m`, `12h`, `1d` or `2w`. A schedule
//! runs at its `HH:MM` anchor and then every interval after it.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone, Utc};
use regex::Regex;
use sqlx::PgPool;

use desguace_core::{ImportSchedule, ImportType};

use crate::db::{ImportRepository, RepositoryError};
use crate::services::import::{ImportError, ImportService};

/// How often due schedules are checked.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Largest accepted frequency value.
pub const MAX_FREQUENCY_VALUE: i64 = 168;

static FREQUENCY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+)([mhdw])$").ok());

/// Schedules seeded into an empty table. All start inactive.
pub const DEFAULT_SCHEDULES: &[(ImportType, &str, &str)] = &[
    (ImportType::Vehicles, "12h", "02:00"),
    (ImportType::Parts, "12h", "02:30"),
    (ImportType::All, "24h", "01:00"),
];

/// Interval of a frequency string, or `None` if it is malformed or out of
/// range.
#[must_use]
pub fn parse_frequency(frequency: &str) -> Option<TimeDelta> {
    let caps = FREQUENCY.as_ref()?.captures(frequency.trim())?;
    let value: i64 = caps.get(1)?.as_str().parse().ok()?;
    if !(1..=MAX_FREQUENCY_VALUE).contains(&value) {
        return None;
    }
    match caps.get(2)?.as_str() {
        "m" => TimeDelta::try_minutes(value),
        "h" => TimeDelta::try_hours(value),
        "d" => TimeDelta::try_days(value),
        "w" => TimeDelta::try_weeks(value),
        _ => None,
    }
}

/// Parse an `HH:MM` anchor.
#[must_use]
pub fn parse_start_time(start_time: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(start_time.trim(), "%H:%M").ok()
}

/// Next run after `now`: today at `start_time`, advanced by the interval
/// until it is in the future. Without a start time the interval is added to
/// `now`; without a valid frequency the next run is an hour away.
#[must_use]
pub fn next_run<Tz: TimeZone>(
    frequency: &str,
    start_time: Option<&str>,
    now: &DateTime<Tz>,
) -> DateTime<Utc> {
    let now_utc = now.with_timezone(&Utc);
    let Some(interval) = parse_frequency(frequency) else {
        return now_utc + TimeDelta::hours(1);
    };

    let anchor = start_time
        .and_then(parse_start_time)
        .and_then(|time| now.timezone().from_local_datetime(&now.date_naive().and_time(time)).earliest());
    let Some(anchor) = anchor else {
        return now_utc + interval;
    };

    let mut next = anchor.with_timezone(&Utc);
    if next <= now_utc {
        let behind = (now_utc - next).num_seconds();
        let step = interval.num_seconds().max(1);
        let steps = behind / step + 1;
        next += TimeDelta::seconds(step * steps);
    }
    next
}

/// Next run in server local time.
#[must_use]
pub fn next_run_from_now(frequency: &str, start_time: Option<&str>) -> DateTime<Utc> {
    next_run(frequency, start_time, &Local::now())
}

/// Insert [`DEFAULT_SCHEDULES`] when no schedule exists. Returns how many
/// were inserted.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn seed_default_schedules(pool: &PgPool) -> Result<usize, RepositoryError> {
    let repo = ImportRepository::new(pool);
    if !repo.schedules().await?.is_empty() {
        return Ok(0);
    }
    for (import_type, frequency, start_time) in DEFAULT_SCHEDULES {
        let next = next_run_from_now(frequency, Some(start_time));
        repo.create_schedule(*import_type, frequency, Some(start_time), false, next)
            .await?;
    }
    tracing::info!(count = DEFAULT_SCHEDULES.len(), "Default import schedules created");
    Ok(DEFAULT_SCHEDULES.len())
}

/// Background loop that starts due imports.
pub struct Scheduler {
    pool: PgPool,
    imports: ImportService,
}

impl Scheduler {
    #[must_use]
    pub const fn new(pool: PgPool, imports: ImportService) -> Self {
        Self { pool, imports }
    }

    /// Spawn the loop on the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        if let Err(e) = seed_default_schedules(&self.pool).await {
            tracing::error!(error = %e, "Failed to seed import schedules");
        }
        tracing::info!(interval_secs = TICK_INTERVAL.as_secs(), "Import scheduler started");

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!(error = %e, "Scheduler tick failed");
            }
        }
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        let repo = ImportRepository::new(&self.pool);
        for schedule in repo.due_schedules(now).await? {
            self.run_schedule(&repo, &schedule, now).await?;
        }
        Ok(())
    }

    async fn run_schedule(
        &self,
        repo: &ImportRepository<'_>,
        schedule: &ImportSchedule,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let import_type = schedule.import_type;
        if self.imports.registry().is_busy(import_type) {
            tracing::info!(schedule_id = schedule.id.as_i32(), %import_type, "Import already running, skipping");
            return Ok(());
        }

        match self.imports.start(import_type, false).await {
            Ok(history) => {
                tracing::info!(
                    schedule_id = schedule.id.as_i32(),
                    history_id = history.id.as_i32(),
                    %import_type,
                    "Scheduled import started"
                );
            }
            Err(ImportError::AlreadyRunning(_)) => return Ok(()),
            Err(e) => {
                tracing::warn!(schedule_id = schedule.id.as_i32(), error = %e, "Scheduled import failed to start");
            }
        }

        let next = next_run_from_now(&schedule.frequency, schedule.start_time.as_deref());
        repo.mark_schedule_run(schedule.id, now, next).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency("30m"), Some(TimeDelta::minutes(30)));
        assert_eq!(parse_frequency("12h"), Some(TimeDelta::hours(12)));
        assert_eq!(parse_frequency("1d"), Some(TimeDelta::days(1)));
        assert_eq!(parse_frequency("2w"), Some(TimeDelta::weeks(2)));
        assert_eq!(parse_frequency("168h"), Some(TimeDelta::hours(168)));
        assert_eq!(parse_frequency("169h"), None);
        assert_eq!(parse_frequency("0h"), None);
        assert_eq!(parse_frequency("12"), None);
        assert_eq!(parse_frequency("12x"), None);
        assert_eq!(parse_frequency("every 12h"), None);
    }

    #[test]
    fn test_next_run_later_today() {
        assert_eq!(next_run("12h", Some("02:00"), &at(1, 0)), at(2, 0));
    }

    #[test]
    fn test_next_run_advances_past_now() {
        // 02:00 has passed; 14:00 has not.
        assert_eq!(next_run("12h", Some("02:00"), &at(9, 30)), at(14, 0));
        // Exactly at the anchor counts as passed.
        assert_eq!(next_run("12h", Some("02:00"), &at(2, 0)), at(14, 0));
        assert_eq!(
            next_run("24h", Some("01:00"), &at(23, 0)),
            Utc.with_ymd_and_hms(2025, 3, 11, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_fallbacks() {
        assert_eq!(next_run("nonsense", Some("02:00"), &at(9, 0)), at(10, 0));
        assert_eq!(next_run("30m", None, &at(9, 0)), at(9, 30));
        assert_eq!(next_run("30m", Some("25:99"), &at(9, 0)), at(9, 30));
    }

    #[test]
    fn test_default_schedules() {
        assert_eq!(DEFAULT_SCHEDULES.len(), 3);
        assert!(DEFAULT_SCHEDULES.iter().all(|(_, f, t)| {
            parse_frequency(f).is_some() && parse_start_time(t).is_some()
        }));
    }
}
