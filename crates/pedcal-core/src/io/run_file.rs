//! JSON run files: geometry plus a recorded event stream.
//!
//! A run file is the portable stand-in for a DAQ connection; the CLI feeds
//! one to the calibration driver. Shape:
//!
//! ```json
//! {
//!   "geometry": { "planes": [ { "xMin": 0, "xMax": 3, "yMin": 0, "yMax": 0 } ] },
//!   "maxRecords": 1000,
//!   "events": [
//!     { "frame": { "eventNumber": 0, "planes": [[10.0, 10.0, 10.0, 10.0]] } },
//!     { "missingCollection": { "eventNumber": 1 } }
//!   ]
//! }
//! ```
//!
//! Plane arrays follow the geometry's detector order. The end-of-range marker
//! is implicit at the end of the event list; an explicit `"endOfRange"` entry
//! cuts the stream short of the remaining events.

use super::{MemoryFrameSource, SourceEvent};
use crate::domain::{CalResult, CalibError, PlaneSamples, TelescopeFrame, TelescopeGeometry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFile {
    pub geometry: TelescopeGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<u64>,
    pub events: Vec<RunEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    Frame {
        event_number: u64,
        planes: Vec<Vec<f64>>,
    },
    #[serde(rename_all = "camelCase")]
    MissingCollection { event_number: u64 },
    EndOfRange,
}

impl RunFile {
    /// Turn the recorded events into a rewindable frame source. The implicit
    /// end-of-range marker is appended unless the list already ends in one.
    pub fn into_source(self) -> MemoryFrameSource {
        let mut events: Vec<SourceEvent> = self
            .events
            .into_iter()
            .map(|event| match event {
                RunEvent::Frame {
                    event_number,
                    planes,
                } => SourceEvent::Frame(TelescopeFrame {
                    event_number,
                    planes: planes
                        .into_iter()
                        .enumerate()
                        .map(|(detector, samples)| PlaneSamples { detector, samples })
                        .collect(),
                }),
                RunEvent::MissingCollection { event_number } => {
                    SourceEvent::MissingCollection { event_number }
                }
                RunEvent::EndOfRange => SourceEvent::EndOfRange,
            })
            .collect();
        if events.last() != Some(&SourceEvent::EndOfRange) {
            events.push(SourceEvent::EndOfRange);
        }
        let source = MemoryFrameSource::from_events(events);
        match self.max_records {
            Some(budget) => source.with_budget(budget),
            None => source,
        }
    }
}

pub fn read_run_file(path: &Path) -> CalResult<RunFile> {
    let text = fs::read_to_string(path).map_err(|source| {
        CalibError::io_system(
            "IO.RUN_FILE_READ",
            format!("failed to read run file '{}': {}", path.display(), source),
        )
    })?;
    serde_json::from_str(&text).map_err(|source| {
        CalibError::configuration(
            "INPUT.RUN_FILE_PARSE",
            format!("failed to parse run file '{}': {}", path.display(), source),
        )
    })
}
