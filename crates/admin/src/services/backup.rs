//! SQL backups of the `public` schema.
//!
//! A backup is a plain `.sql` script: every table is dropped and recreated
//! from `information_schema.columns`, and small tables also get their rows
//! as `INSERT` statements. Restores pipe the script through `psql`.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Tables with at most this many rows get their data dumped.
pub const MAX_ROWS_FOR_DATA: i64 = 100;
/// Rows dumped per table.
pub const MAX_INSERTS_PER_TABLE: i64 = 50;

const FILE_PREFIX: &str = "backup-database-";
const CHUNK_SIZE: usize = 64 * 1024;

static BACKUP_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^backup-database-[0-9-]+$").ok());

static NEXTVAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"nextval\('([^']+)'::regclass\)").ok());

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid backup id")]
    InvalidId,

    #[error("backup not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("psql failed: {0}")]
    Restore(String),
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub size_formatted: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ColumnInfo {
    column_name: String,
    data_type: String,
    udt_name: String,
    character_maximum_length: Option<i32>,
    is_nullable: String,
    column_default: Option<String>,
}

impl ColumnInfo {
    fn sql_type(&self) -> String {
        match self.data_type.as_str() {
            "ARRAY" => format!("{}[]", self.udt_name.trim_start_matches('_')),
            "USER-DEFINED" => self.udt_name.clone(),
            other => match self.character_maximum_length {
                Some(len) => format!("{other}({len})"),
                None => other.to_owned(),
            },
        }
    }

    fn definition(&self) -> String {
        let mut def = format!("  {} {}", quote_ident(&self.column_name), self.sql_type());
        if self.is_nullable == "NO" {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &self.column_default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }
}

/// Creates, lists, streams, deletes and restores backups.
#[derive(Clone)]
pub struct BackupService {
    dir: PathBuf,
    database_url: SecretString,
}

impl BackupService {
    #[must_use]
    pub const fn new(dir: PathBuf, database_url: SecretString) -> Self {
        Self { dir, database_url }
    }

    /// Path of a backup after validating its id.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::InvalidId` for anything but a well-formed id.
    pub fn path_for(&self, id: &str) -> Result<PathBuf, BackupError> {
        if !is_valid_id(id) {
            return Err(BackupError::InvalidId);
        }
        Ok(self.dir.join(format!("{id}.sql")))
    }

    async fn existing_path(&self, id: &str) -> Result<PathBuf, BackupError> {
        let path = self.path_for(id)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(BackupError::NotFound),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackupError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Dump the database to a new file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the catalog
    /// cannot be read or the file cannot be written.
    pub async fn create(&self, pool: &PgPool) -> Result<BackupInfo, BackupError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let now = Utc::now();
        let id = format!("{FILE_PREFIX}{}", now.format("%Y%m%d-%H%M%S"));
        let script = dump_schema(pool, now).await?;

        let path = self.dir.join(format!("{id}.sql"));
        tokio::fs::write(&path, script.as_bytes()).await?;
        let size = tokio::fs::metadata(&path).await?.len();

        tracing::info!(backup_id = %id, size, "Backup created");
        Ok(BackupInfo {
            filename: format!("{id}.sql"),
            id,
            size,
            size_formatted: format_file_size(size),
            created_at: now,
        })
    }

    /// Backups newest first. A missing directory means no backups.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Io` if the directory cannot be read.
    pub async fn list(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = filename.strip_suffix(".sql") else {
                continue;
            };
            if filename.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let created_at = meta
                .created()
                .or_else(|_| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            backups.push(BackupInfo {
                id: id.to_owned(),
                filename: filename.clone(),
                size: meta.len(),
                size_formatted: format_file_size(meta.len()),
                created_at,
            });
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Open a backup for download as a stream of chunks.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::InvalidId` or `BackupError::NotFound`.
    pub async fn open(
        &self,
        id: &str,
    ) -> Result<(String, impl Stream<Item = Result<Vec<u8>, io::Error>> + use<>), BackupError> {
        let path = self.existing_path(id).await?;
        let mut file = tokio::fs::File::open(&path).await?;
        let stream = try_stream! {
            let mut buf = vec![0_u8; CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield buf[..n].to_vec();
            }
        };
        Ok((format!("{id}.sql"), stream))
    }

    /// # Errors
    ///
    /// Returns `BackupError::InvalidId` or `BackupError::NotFound`.
    pub async fn delete(&self, id: &str) -> Result<(), BackupError> {
        let path = self.existing_path(id).await?;
        tokio::fs::remove_file(path).await?;
        tracing::info!(backup_id = %id, "Backup deleted");
        Ok(())
    }

    /// Pipe a backup into `psql` against the configured database.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Restore` with psql's stderr if it exits non-zero.
    pub async fn restore(&self, id: &str) -> Result<(), BackupError> {
        let path = self.existing_path(id).await?;
        let mut script = tokio::fs::File::open(&path).await?;

        let mut child = tokio::process::Command::new("psql")
            .arg(self.database_url.expose_secret())
            .arg("--quiet")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::io::copy(&mut script, &mut stdin).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(BackupError::Restore(stderr));
        }
        tracing::warn!(backup_id = %id, "Database restored from backup");
        Ok(())
    }
}

/// Whether `id` names a backup file and nothing else.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    BACKUP_ID.as_ref().is_some_and(|re| re.is_match(id))
}

/// Human-readable size with base 1024.
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }
    #[allow(clippy::cast_precision_loss)]
    let bytes = bytes as f64;
    let mut unit = 0;
    let mut value = bytes;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    let mut text = format!("{rounded:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{text} {}", UNITS[unit])
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// `{"a","b"}` array literal for a JSON array.
fn array_literal(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_owned(),
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            other => other.to_string(),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

/// Render a `row_to_json` value as a SQL literal for a column of `data_type`.
fn sql_value(value: &Value, data_type: Option<&str>) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_owned(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_literal(s),
        Value::Array(items) if data_type == Some("ARRAY") => quote_literal(&array_literal(items)),
        other => quote_literal(&other.to_string()),
    }
}

async fn dump_schema(pool: &PgPool, now: DateTime<Utc>) -> Result<String, BackupError> {
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT table_name::TEXT FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name",
    )
    .fetch_all(pool)
    .await?;

    let mut out = format!(
        "-- Desguace Murcia database backup\n-- Created at {}\n-- Tables: {}\n\n",
        now.to_rfc3339(),
        tables.len()
    );

    for table in &tables {
        dump_table(pool, table, &mut out).await?;
    }

    out.push_str(&format!("-- Backup completed at {}\n", Utc::now().to_rfc3339()));
    Ok(out)
}

async fn dump_table(pool: &PgPool, table: &str, out: &mut String) -> Result<(), BackupError> {
    let columns = sqlx::query_as::<_, ColumnInfo>(
        r"
        SELECT column_name::TEXT, data_type::TEXT, udt_name::TEXT,
               character_maximum_length::INTEGER, is_nullable::TEXT, column_default::TEXT
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name = $1
        ORDER BY ordinal_position
        ",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let ident = quote_ident(table);
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {ident}"))
        .fetch_one(pool)
        .await?;

    out.push_str(&format!("-- Table: {table} ({count} rows)\n"));
    out.push_str(&format!("DROP TABLE IF EXISTS {ident} CASCADE;\n"));
    if let Some(re) = NEXTVAL.as_ref() {
        for column in &columns {
            if let Some(default) = &column.column_default
                && let Some(seq) = re.captures(default).and_then(|c| c.get(1))
            {
                out.push_str(&format!("CREATE SEQUENCE IF NOT EXISTS {};\n", seq.as_str()));
            }
        }
    }
    let defs: Vec<String> = columns.iter().map(ColumnInfo::definition).collect();
    out.push_str(&format!("CREATE TABLE {ident} (\n{}\n);\n\n", defs.join(",\n")));

    if count == 0 || count > MAX_ROWS_FOR_DATA {
        return Ok(());
    }

    let types: HashMap<&str, &str> = columns
        .iter()
        .map(|c| (c.column_name.as_str(), c.data_type.as_str()))
        .collect();
    let rows = sqlx::query_scalar::<_, Value>(&format!(
        "SELECT row_to_json(t) FROM {ident} t LIMIT {MAX_INSERTS_PER_TABLE}"
    ))
    .fetch_all(pool)
    .await?;

    for row in rows {
        let Value::Object(fields) = row else { continue };
        let names: Vec<String> = fields.keys().map(|k| quote_ident(k)).collect();
        let values: Vec<String> = fields
            .iter()
            .map(|(k, v)| sql_value(v, types.get(k.as_str()).copied()))
            .collect();
        out.push_str(&format!(
            "INSERT INTO {ident} ({}) VALUES ({});\n",
            names.join(", "),
            values.join(", ")
        ));
    }
    out.push('\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_258_291), "1.2 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn test_backup_ids() {
        assert!(is_valid_id("backup-database-20250301-120000"));
        assert!(!is_valid_id("backup-database-../../etc/passwd"));
        assert!(!is_valid_id("backup-database-2025.sql"));
        assert!(!is_valid_id("other-20250301"));
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let service = BackupService::new(PathBuf::from("/tmp/backups"), SecretString::from("postgres://x"));
        assert!(matches!(service.path_for("../secret"), Err(BackupError::InvalidId)));
        assert_eq!(
            service.path_for("backup-database-20250301-120000").ok(),
            Some(PathBuf::from("/tmp/backups/backup-database-20250301-120000.sql"))
        );
    }

    #[test]
    fn test_sql_values_are_escaped() {
        assert_eq!(sql_value(&json!(null), None), "NULL");
        assert_eq!(sql_value(&json!("O'Brien"), Some("text")), "'O''Brien'");
        assert_eq!(sql_value(&json!(12.5), Some("numeric")), "12.5");
        assert_eq!(sql_value(&json!(true), Some("boolean")), "TRUE");
        assert_eq!(sql_value(&json!({"a": 1}), Some("jsonb")), "'{\"a\":1}'");
        assert_eq!(
            sql_value(&json!(["x", "y'z"]), Some("ARRAY")),
            "'{\"x\",\"y''z\"}'"
        );
    }

    #[test]
    fn test_column_definition() {
        let column = ColumnInfo {
            column_name: "id".into(),
            data_type: "integer".into(),
            udt_name: "int4".into(),
            character_maximum_length: None,
            is_nullable: "NO".into(),
            column_default: Some("nextval('parts_id_seq'::regclass)".into()),
        };
        assert_eq!(
            column.definition(),
            "  \"id\" integer NOT NULL DEFAULT nextval('parts_id_seq'::regclass)"
        );
        let array = ColumnInfo {
            column_name: "imagenes".into(),
            data_type: "ARRAY".into(),
            udt_name: "_text".into(),
            character_maximum_length: None,
            is_nullable: "NO".into(),
            column_default: None,
        };
        assert_eq!(array.sql_type(), "text[]");
    }
}
