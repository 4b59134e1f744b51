//! Audit trail for guarded request handling.
//!
//! Every rejected input and every external program invocation is recorded as
//! a structured JSON event, one object per line (JSON Lines). Rejections
//! carry the reason code and the value's length, never the raw value.
//!
//! # Rotation
//!
//! [`FileAuditLogger`] renames the file with a timestamp suffix once it
//! exceeds [`MAX_LOG_SIZE`] and starts a fresh one.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default path for the audit log file.
pub const AUDIT_LOG_PATH: &str = "/var/lib/safeguard/audit.log";

/// Maximum audit log file size before rotation (10 MB).
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A request parameter failed validation and was turned away.
    InputRejected,
    /// An external program was invoked on behalf of a request.
    CommandExecuted,
    /// The product catalog was queried on behalf of a request.
    CatalogSearch,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InputRejected => "input_rejected",
            Self::CommandExecuted => "command_executed",
            Self::CatalogSearch => "catalog_search",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    /// Correlates the event with the request's tracing span.
    pub request_id: Uuid,
    pub action: AuditAction,
    /// Endpoint that handled the request, e.g. `/dns`.
    pub endpoint: String,
    pub result: AuditResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn new(
        request_id: Uuid,
        action: AuditAction,
        endpoint: impl Into<String>,
        result: AuditResult,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id,
            action,
            endpoint: endpoint.into(),
            result,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// A rejected parameter. Only the reason code and the value's length are
    /// kept.
    pub fn rejected(
        request_id: Uuid,
        endpoint: impl Into<String>,
        field: &str,
        reason: &str,
        raw_len: usize,
    ) -> Self {
        Self::new(request_id, AuditAction::InputRejected, endpoint, AuditResult::Failure)
            .with_details(format!("field={} reason={} len={}", field, reason, raw_len))
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} on {} ({})",
            self.timestamp.to_rfc3339(),
            self.request_id,
            self.action,
            self.endpoint,
            self.result,
        )?;
        if let Some(ref details) = self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AuditLogger trait
// ---------------------------------------------------------------------------

/// Audit log backend. Must be callable from many request tasks at once.
///
/// Failures to persist are logged and swallowed; auditing never fails the
/// request being audited.
pub trait AuditLogger: Send + Sync {
    fn log_event(&self, event: &AuditEvent);
}

// ---------------------------------------------------------------------------
// FileAuditLogger
// ---------------------------------------------------------------------------

/// JSON Lines audit file with size-based rotation.
pub struct FileAuditLogger {
    log_path: PathBuf,
    max_size: u64,
    /// `None` after a failed rotation; reopened lazily on the next event.
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileAuditLogger {
    /// Open `log_path` for appending, creating parent directories as needed.
    pub fn new(log_path: &Path) -> Result<Self, AuditError> {
        Self::with_max_size(log_path, MAX_LOG_SIZE)
    }

    pub fn with_max_size(log_path: &Path, max_size: u64) -> Result<Self, AuditError> {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!(path = %parent.display(), "Created audit log directory");
            }
        }

        let file = open_append(log_path)?;
        Ok(Self {
            log_path: log_path.to_path_buf(),
            max_size,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Rename the current file to `<path>.<timestamp>` once it reaches the
    /// size limit. Returns `true` if a rotation happened.
    fn maybe_rotate(&self, guard: &mut Option<BufWriter<File>>) -> Result<bool, AuditError> {
        let len = match fs::metadata(&self.log_path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(false),
        };
        if len < self.max_size {
            return Ok(false);
        }

        if let Some(ref mut w) = guard {
            let _ = w.flush();
        }
        *guard = None;

        let rotated = PathBuf::from(format!(
            "{}.{}",
            self.log_path.display(),
            Utc::now().format("%Y%m%dT%H%M%S%.fZ")
        ));
        fs::rename(&self.log_path, &rotated)?;
        info!(old = %rotated.display(), "Rotated audit log");

        *guard = Some(BufWriter::new(open_append(&self.log_path)?));
        Ok(true)
    }
}

fn open_append(path: &Path) -> Result<File, AuditError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn write_line(writer: &mut BufWriter<File>, event: &AuditEvent) -> Result<(), AuditError> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl AuditLogger for FileAuditLogger {
    fn log_event(&self, event: &AuditEvent) {
        let mut guard = self.writer.lock().unwrap_or_else(|poisoned| {
            error!("Audit logger mutex poisoned, recovering");
            poisoned.into_inner()
        });

        if let Err(e) = self.maybe_rotate(&mut guard) {
            warn!(error = %e, "Failed to rotate audit log");
        }

        if guard.is_none() {
            match open_append(&self.log_path) {
                Ok(file) => *guard = Some(BufWriter::new(file)),
                Err(e) => {
                    error!(error = %e, event = %event, "Failed to open audit log, event lost");
                    return;
                }
            }
        }

        if let Some(ref mut writer) = *guard {
            if let Err(e) = write_line(writer, event) {
                error!(error = %e, event = %event, "Failed to write audit event");
            }
        }
    }
}

impl fmt::Debug for FileAuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAuditLogger")
            .field("log_path", &self.log_path)
            .field("max_size", &self.max_size)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// NullAuditLogger
// ---------------------------------------------------------------------------

/// Discards every event. Used when auditing is switched off.
#[derive(Debug, Clone, Default)]
pub struct NullAuditLogger;

impl AuditLogger for NullAuditLogger {
    fn log_event(&self, _event: &AuditEvent) {}
}

// ---------------------------------------------------------------------------
// InMemoryAuditLogger
// ---------------------------------------------------------------------------

/// Keeps events in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct InMemoryAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log_event(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejected_event_omits_raw_value() {
        let id = Uuid::new_v4();
        let event = AuditEvent::rejected(id, "/dns", "hostname", "INVALID_CHARACTERS", 15);
        assert_eq!(event.action, AuditAction::InputRejected);
        assert_eq!(event.result, AuditResult::Failure);
        assert_eq!(
            event.details.as_deref(),
            Some("field=hostname reason=INVALID_CHARACTERS len=15")
        );
        assert_eq!(event.request_id, id);
    }

    #[test]
    fn test_event_display() {
        let event = AuditEvent::new(
            Uuid::nil(),
            AuditAction::CommandExecuted,
            "/dns",
            AuditResult::Success,
        )
        .with_details("nslookup example.com");
        let display = event.to_string();
        assert!(display.contains("command_executed"));
        assert!(display.contains("/dns"));
        assert!(display.contains("success"));
        assert!(display.ends_with(": nslookup example.com"));
    }

    #[test]
    fn test_event_json_shape() {
        let event = AuditEvent::new(
            Uuid::nil(),
            AuditAction::CatalogSearch,
            "/search",
            AuditResult::Success,
        );
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "catalog_search");
        assert_eq!(json["result"], "success");
        assert_eq!(json["endpoint"], "/search");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_file_logger_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("audit.log");
        let logger = FileAuditLogger::new(&path).unwrap();

        logger.log_event(&AuditEvent::rejected(Uuid::new_v4(), "/dns", "hostname", "MISSING", 0));
        logger.log_event(&AuditEvent::new(
            Uuid::new_v4(),
            AuditAction::CommandExecuted,
            "/dns",
            AuditResult::Success,
        ));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.action, AuditAction::InputRejected);
        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.result, AuditResult::Success);
    }

    #[test]
    fn test_file_logger_rotates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let logger = FileAuditLogger::with_max_size(&path, 64).unwrap();

        for _ in 0..4 {
            logger.log_event(&AuditEvent::new(
                Uuid::new_v4(),
                AuditAction::CommandExecuted,
                "/dns",
                AuditResult::Success,
            ));
        }

        let rotated = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("audit.log."))
            .count();
        assert!(rotated >= 1, "expected at least one rotated file");
        assert!(path.exists());
    }

    #[test]
    fn test_in_memory_logger() {
        let logger = InMemoryAuditLogger::new();
        assert!(logger.is_empty());
        logger.log_event(&AuditEvent::rejected(Uuid::nil(), "/dns", "hostname", "MISSING", 0));
        assert_eq!(logger.len(), 1);
        assert_eq!(logger.events()[0].endpoint, "/dns");
    }

    #[test]
    fn test_null_logger_discards() {
        let event = AuditEvent::rejected(Uuid::nil(), "/dns", "hostname", "MISSING", 0);
        NullAuditLogger.log_event(&event);
    }
}
