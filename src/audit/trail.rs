use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{Local, Utc};

use super::{AuditEvent, AuditSink};

/// Render one audit line: `<timestamp> - <message>`.
pub fn format_line(event: &AuditEvent) -> String {
    format!("{} - {}", Utc::now().to_rfc3339(), event)
}

/// Appends audit lines to `<dir>/ResourceTagUpdate_<YYYYMMDD>.log`.
pub struct FileAuditTrail {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditTrail {
    /// Open (or create) today's log file under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let path = dir.join(format!(
            "ResourceTagUpdate_{}.log",
            Local::now().format("%Y%m%d")
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log: {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditTrail {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(event = event.label(), "{}", event);
        let line = format_line(event);
        let written = match self.file.lock() {
            Ok(mut file) => writeln!(file, "{}", line),
            Err(poisoned) => writeln!(poisoned.into_inner(), "{}", line),
        };
        if let Err(e) = written {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write audit line");
        }
    }
}

/// Mirrors events to `tracing` only.
#[derive(Debug, Default)]
pub struct TracingAuditTrail;

/// Open today's file trail under `dir`. When the directory cannot be
/// written, warn and record through `tracing` so the run still goes ahead.
pub fn open_or_trace(dir: &Path) -> Arc<dyn AuditSink> {
    match FileAuditTrail::open(dir) {
        Ok(trail) => {
            tracing::debug!(path = %trail.path().display(), "Writing audit log");
            Arc::new(trail)
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "Audit log unavailable; logging events only");
            Arc::new(TracingAuditTrail)
        }
    }
}

impl AuditSink for TracingAuditTrail {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(event = event.label(), "{}", event);
    }
}

/// Keeps events in memory. Used by tests and by callers that want to show
/// the trail of a single run.
#[derive(Debug, Default)]
pub struct MemoryAuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.events().iter().map(AuditEvent::label).collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl AuditSink for MemoryAuditTrail {
    fn record(&self, event: &AuditEvent) {
        tracing::debug!(event = event.label(), "{}", event);
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
