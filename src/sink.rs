use std::io::Write;

use anyhow::{Context, Result};

use crate::types::AggregateRecord;

/// Destination for aggregate records, one per memory configuration, emitted
/// as soon as each configuration finishes.
pub trait ResultSink {
    fn emit(&mut self, record: &AggregateRecord) -> Result<()>;
}

/// Writes each record as one JSON line and flushes immediately so partial
/// results survive a later failure.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonlSink<W> {
    fn emit(&mut self, record: &AggregateRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        writeln!(self.writer, "{line}").context("Failed to write record")?;
        self.writer.flush().context("Failed to flush record")?;
        Ok(())
    }
}

/// Keeps records in memory, for the summary table and for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<AggregateRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AggregateRecord] {
        &self.records
    }
}

impl ResultSink for MemorySink {
    fn emit(&mut self, record: &AggregateRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
