//! Run-statistics snapshots.
//!
//! `Device::execute` returns an [`ExecutionStats`]; callers that want a
//! machine-readable record of the last run persist it here as JSON.
//! Writes are atomic (write to .tmp then rename) to avoid torn reads by
//! anything polling the file.

use std::path::Path;

use crate::device::ExecutionStats;

/// Best-effort atomic snapshot write; failures are ignored, a snapshot
/// is never worth failing a run over.
pub fn write_snapshot(stats: &ExecutionStats, path: &Path) {
    if let Ok(json) = serde_json::to_string_pretty(stats) {
        let tmp = path.with_extension("tmp");
        if std::fs::write(&tmp, &json).is_ok() {
            let _ = std::fs::rename(&tmp, path);
        }
    }
}

/// Read back the latest snapshot. Returns None if the file doesn't exist
/// or doesn't parse (e.g. no run has happened yet).
pub fn read_snapshot(path: &Path) -> Option<ExecutionStats> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
