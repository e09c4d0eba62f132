//! Reporting hook
//!
//! The change detector hands every computed [`DiffResult`] to a
//! [`ChangeReporter`] before the new snapshot is saved. A reporter error
//! aborts the run and the previous snapshot stays in place, so the same
//! changes are reported again on the next run.

use crate::error::{Result, SnapdiffError};
use crate::types::{ChangeStats, DiffResult, FileRecord, ModifiedEntry, RenamedEntry};
use serde::Serialize;
use std::io::Write;

/// Consumer of a run's changes
pub trait ChangeReporter {
    /// Receive the classification of one run
    fn report(&mut self, result: &DiffResult) -> Result<()>;
}

impl<F> ChangeReporter for F
where
    F: FnMut(&DiffResult) -> Result<()>,
{
    fn report(&mut self, result: &DiffResult) -> Result<()> {
        self(result)
    }
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl ChangeReporter for NoOpReporter {
    fn report(&mut self, _result: &DiffResult) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    stats: ChangeStats,
    added: &'a [FileRecord],
    modified: &'a [ModifiedEntry],
    deleted: &'a [FileRecord],
    renamed: &'a [RenamedEntry],
}

/// Writes each result as pretty-printed JSON with a `stats` block
#[derive(Debug)]
pub struct JsonReporter<W: Write> {
    writer: W,
}

impl<W: Write> JsonReporter<W> {
    /// Reporter writing to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ChangeReporter for JsonReporter<W> {
    fn report(&mut self, result: &DiffResult) -> Result<()> {
        let report = JsonReport {
            stats: result.stats(),
            added: &result.added,
            modified: &result.modified,
            deleted: &result.deleted,
            renamed: &result.renamed,
        };
        serde_json::to_writer_pretty(&mut self.writer, &report)
            .map_err(|e| SnapdiffError::reporter(format!("failed to write JSON report: {e}")))?;
        writeln!(self.writer).map_err(|e| SnapdiffError::reporter(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| SnapdiffError::reporter(e.to_string()))
    }
}
