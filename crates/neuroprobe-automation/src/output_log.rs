// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Append-only experiment log.
//!
//! Records are `[category, timestamp, event, device_id, ...fields]` tuples.
//! Nothing in the drive layer reads them back.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Record category for drive commands and outcomes
pub const CATEGORY_AUTOMATION: &str = "automation";
/// Record category for echoed device positions
pub const CATEGORY_POSITION: &str = "position";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub device_id: String,
    pub fields: Vec<String>,
}

impl LogRecord {
    pub fn new(category: &str, event: &str, device_id: &str) -> Self {
        Self {
            category: category.to_string(),
            timestamp: Utc::now(),
            event: event.to_string(),
            device_id: device_id.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, value: impl ToString) -> Self {
        self.fields.push(value.to_string());
        self
    }

    /// Flatten to the tagged tuple form
    pub fn to_tuple(&self) -> Vec<String> {
        let mut tuple = vec![
            self.category.clone(),
            self.timestamp.to_rfc3339(),
            self.event.clone(),
            self.device_id.clone(),
        ];
        tuple.extend(self.fields.iter().cloned());
        tuple
    }
}

/// Output log sink
pub trait OutputLog: Send + Sync {
    /// Append one record; sinks handle their own write failures
    fn append(&self, record: LogRecord);
}

/// Emits each record as a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutputLog;

impl OutputLog for TracingOutputLog {
    fn append(&self, record: LogRecord) {
        info!(
            target: "neuroprobe-automation",
            category = %record.category,
            device_id = %record.device_id,
            "{} {}",
            record.event,
            record.fields.join(",")
        );
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryOutputLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryOutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records whose event name matches
    pub fn events(&self, event: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.event == event)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl OutputLog for MemoryOutputLog {
    fn append(&self, record: LogRecord) {
        self.records.lock().push(record);
    }
}

/// Writes one JSON object per line
pub struct JsonLinesOutputLog {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesOutputLog {
    /// Open `path` for appending, creating it if needed
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl OutputLog for JsonLinesOutputLog {
    fn append(&self, record: LogRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(target: "neuroprobe-automation", "Failed to encode log record: {}", e);
                return;
            }
        };
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            warn!(target: "neuroprobe-automation", "Failed to write log record: {}", e);
        }
    }
}
