//! Frame-source seam and persistence adapters.

pub mod ascii;
pub mod run_file;

use crate::domain::{CalResult, TelescopeFrame};

/// One record of the frame stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Frame(TelescopeFrame),
    /// The source has an event at this position but cannot supply its raw
    /// collection; recoverable, skipped with a warning.
    MissingCollection { event_number: u64 },
    /// End-of-range marker, distinct from ordinary frames.
    EndOfRange,
}

/// Sequential frame supplier consumed by the loop controller.
pub trait FrameSource {
    fn next_event(&mut self) -> CalResult<Option<SourceEvent>>;

    /// Restart the stream from the beginning of the event range. Issued by
    /// the calibration driver between passes only.
    fn rewind(&mut self) -> CalResult<()>;

    /// Total number of events the source can deliver across all passes, when
    /// bounded (the steering-level record limit of the legacy system).
    fn event_budget(&self) -> Option<u64> {
        None
    }
}

/// In-memory source over a fixed event list, used by tests and the run-file
/// front-end. `next_event` returns `None` once the list is exhausted; a list
/// that does not end in [`SourceEvent::EndOfRange`] therefore simulates a
/// stream that dies mid-pass.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    events: Vec<SourceEvent>,
    cursor: usize,
    budget: Option<u64>,
}

impl MemoryFrameSource {
    /// Source over `frames` with an end-of-range marker appended.
    pub fn new(frames: Vec<TelescopeFrame>) -> Self {
        let mut events: Vec<SourceEvent> = frames.into_iter().map(SourceEvent::Frame).collect();
        events.push(SourceEvent::EndOfRange);
        Self::from_events(events)
    }

    /// Source over a raw event list, exactly as given.
    pub fn from_events(events: Vec<SourceEvent>) -> Self {
        Self {
            events,
            cursor: 0,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = Some(budget);
        self
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_event(&mut self) -> CalResult<Option<SourceEvent>> {
        let event = self.events.get(self.cursor).cloned();
        if event.is_some() {
            self.cursor += 1;
        }
        Ok(event)
    }

    fn rewind(&mut self) -> CalResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn event_budget(&self) -> Option<u64> {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameSource, MemoryFrameSource, SourceEvent};
    use crate::domain::{PlaneSamples, TelescopeFrame};

    fn one_frame(event_number: u64) -> TelescopeFrame {
        TelescopeFrame {
            event_number,
            planes: vec![PlaneSamples {
                detector: 0,
                samples: vec![1.0],
            }],
        }
    }

    #[test]
    fn memory_source_appends_end_of_range_and_rewinds() {
        let mut source = MemoryFrameSource::new(vec![one_frame(0), one_frame(1)]);
        assert!(matches!(
            source.next_event().unwrap(),
            Some(SourceEvent::Frame(_))
        ));
        assert!(matches!(
            source.next_event().unwrap(),
            Some(SourceEvent::Frame(_))
        ));
        assert_eq!(source.next_event().unwrap(), Some(SourceEvent::EndOfRange));
        assert_eq!(source.next_event().unwrap(), None);

        source.rewind().unwrap();
        assert!(matches!(
            source.next_event().unwrap(),
            Some(SourceEvent::Frame(frame)) if frame.event_number == 0
        ));
    }

    #[test]
    fn budget_defaults_to_unbounded() {
        let source = MemoryFrameSource::new(vec![one_frame(0)]);
        assert_eq!(source.event_budget(), None);
        assert_eq!(source.with_budget(7).event_budget(), Some(7));
    }
}
