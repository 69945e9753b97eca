//! Result sinks.
//!
//! A sink is constructed by the caller and driven through an explicit
//! `open -> write -> flush -> close` lifecycle.

use std::io::Write;

use crate::error::ReconError;
use crate::model::{ReconMeta, ReconReport};

pub trait ResultSink {
    fn open(&mut self, meta: &ReconMeta) -> Result<(), ReconError>;
    fn write(&mut self, report: &ReconReport) -> Result<(), ReconError>;
    fn flush(&mut self) -> Result<(), ReconError>;
    fn close(&mut self) -> Result<(), ReconError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Created,
    Open,
    Closed,
}

fn require_open(state: SinkState, op: &str) -> Result<(), ReconError> {
    match state {
        SinkState::Open => Ok(()),
        SinkState::Created => Err(ReconError::Sink(format!("{op} before open"))),
        SinkState::Closed => Err(ReconError::Sink(format!("{op} after close"))),
    }
}

/// Writes the report as pretty-printed JSON.
pub struct JsonSink<W: Write> {
    out: W,
    state: SinkState,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        JsonSink {
            out,
            state: SinkState::Created,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn open(&mut self, _meta: &ReconMeta) -> Result<(), ReconError> {
        if self.state != SinkState::Created {
            return Err(ReconError::Sink("open called twice".into()));
        }
        self.state = SinkState::Open;
        Ok(())
    }

    fn write(&mut self, report: &ReconReport) -> Result<(), ReconError> {
        require_open(self.state, "write")?;
        serde_json::to_writer_pretty(&mut self.out, report)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReconError> {
        require_open(self.state, "flush")?;
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReconError> {
        require_open(self.state, "close")?;
        self.out.flush()?;
        self.state = SinkState::Closed;
        Ok(())
    }
}

/// Human-readable summary: counts plus the first few differing keys.
pub struct SummarySink<W: Write> {
    out: W,
    state: SinkState,
    max_listed: usize,
}

impl<W: Write> SummarySink<W> {
    pub fn new(out: W) -> Self {
        SummarySink {
            out,
            state: SinkState::Created,
            max_listed: 10,
        }
    }

    pub fn max_listed(mut self, n: usize) -> Self {
        self.max_listed = n;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for SummarySink<W> {
    fn open(&mut self, meta: &ReconMeta) -> Result<(), ReconError> {
        if self.state != SinkState::Created {
            return Err(ReconError::Sink("open called twice".into()));
        }
        self.state = SinkState::Open;
        writeln!(
            self.out,
            "{} ({} strategy, keys: {})",
            meta.config_name,
            meta.strategy,
            meta.primary_keys.join(", ")
        )?;
        Ok(())
    }

    fn write(&mut self, report: &ReconReport) -> Result<(), ReconError> {
        require_open(self.state, "write")?;
        let s = &report.summary;
        writeln!(self.out, "  source rows:     {}", s.source_rows)?;
        writeln!(self.out, "  reference rows:  {}", s.reference_rows)?;
        writeln!(
            self.out,
            "  matched:         {} ({} identical, {} differing)",
            s.matched, s.identical, s.differing
        )?;
        writeln!(self.out, "  source only:     {}", s.source_only)?;
        writeln!(self.out, "  reference only:  {}", s.reference_only)?;
        if s.source_duplicates + s.reference_duplicates > 0 {
            writeln!(
                self.out,
                "  duplicate keys collapsed: {} source, {} reference",
                s.source_duplicates, s.reference_duplicates
            )?;
        }

        for pair in report.result.differing().take(self.max_listed) {
            let fields: Vec<String> = pair
                .differences
                .iter()
                .map(|(name, d)| format!("{name}: {} -> {}", d.source, d.reference))
                .collect();
            writeln!(self.out, "  ~ {}  {}", pair.key, fields.join("; "))?;
        }
        if s.differing > self.max_listed {
            writeln!(self.out, "  ... {} more differing", s.differing - self.max_listed)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReconError> {
        require_open(self.state, "flush")?;
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReconError> {
        require_open(self.state, "close")?;
        self.out.flush()?;
        self.state = SinkState::Closed;
        Ok(())
    }
}

/// Drive a sink through its full lifecycle for one report.
pub fn emit<S: ResultSink + ?Sized>(sink: &mut S, report: &ReconReport) -> Result<(), ReconError> {
    sink.open(&report.meta)?;
    sink.write(report)?;
    sink.flush()?;
    sink.close()
}
