//! The calibration pass state machine.
//!
//! One controller instance owns all run state: the per-detector accumulator
//! banks, baseline/noise snapshots, the status table, the hit counters, and
//! the event/loop counters. Frames are pushed in one at a time; the returned
//! [`FrameFlow`] tells the driver whether to keep feeding, note a skipped
//! frame, or rewind the source for the next pass. Fatal conditions come back
//! as errors and recoverable ones never do.

use crate::common::config::CalibrationConfig;
use crate::domain::{
    CalResult, CalibError, CalibrationRecord, DetectorCalibration, PixelBounds, PixelStatus,
    PlaneSamples, TelescopeFrame, TelescopeGeometry,
};
use crate::engine::common_mode::{self, CommonModeCuts, CommonModeOutcome};
use crate::engine::masking;
use crate::engine::observer::CalibrationObserver;
use crate::io::{FrameSource, SourceEvent};
use crate::stats::bank::{AccumulatorBank, PassSeed, bank_for};
use tracing::{info, warn};

/// Current pass of the calibration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    RawPass,
    CommonModePass(u32),
    RefinementPass,
    Done,
}

/// Why a frame contributed nothing to the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BeforeFirstEvent,
    CommonModeRejected,
    MissingCollection,
}

/// Per-frame processing outcome handed back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFlow {
    Continue,
    Skipped(SkipReason),
    /// The pass is finished. With `rewind: true` the source must be rewound
    /// to the start of the event range before feeding the next pass; with
    /// `rewind: false` the calibration record is ready.
    PassComplete { rewind: bool },
}

struct DetectorState {
    bounds: PixelBounds,
    bank: Box<dyn AccumulatorBank>,
    pedestal: Vec<f64>,
    noise: Vec<f64>,
    status: Vec<PixelStatus>,
    hit_counter: Vec<u32>,
}

pub struct CalibrationController {
    config: CalibrationConfig,
    detectors: Vec<DetectorState>,
    state: LoopState,
    loop_index: u32,
    event_index: u64,
    frames_in_pass: u64,
    skipped_common_mode: u64,
    skipped_missing: u64,
    record: Option<CalibrationRecord>,
}

impl CalibrationController {
    pub fn new(geometry: &TelescopeGeometry, config: CalibrationConfig) -> CalResult<Self> {
        config.validate()?;
        let detectors = geometry
            .planes
            .iter()
            .map(|&bounds| {
                let pixel_count = bounds.pixel_count();
                DetectorState {
                    bounds,
                    bank: bank_for(config.algorithm, pixel_count),
                    pedestal: vec![0.0; pixel_count],
                    noise: vec![0.0; pixel_count],
                    status: vec![PixelStatus::Good; pixel_count],
                    hit_counter: if config.enable_refinement_pass {
                        vec![0; pixel_count]
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();
        Ok(Self {
            config,
            detectors,
            state: LoopState::RawPass,
            loop_index: 0,
            event_index: 0,
            frames_in_pass: 0,
            skipped_common_mode: 0,
            skipped_missing: 0,
            record: None,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Zero-based index of the pass in flight (raw pass = 0).
    pub fn loop_index(&self) -> u32 {
        self.loop_index
    }

    pub fn total_loops(&self) -> u32 {
        self.config.loop_count()
    }

    /// (detector, frame) pairs dropped because the common-mode estimate was
    /// rejected.
    pub fn skipped_common_mode(&self) -> u64 {
        self.skipped_common_mode
    }

    /// Events dropped because the source could not supply their raw data.
    pub fn skipped_missing(&self) -> u64 {
        self.skipped_missing
    }

    pub fn record(&self) -> Option<&CalibrationRecord> {
        self.record.as_ref()
    }

    pub fn into_record(self) -> CalResult<CalibrationRecord> {
        self.record.ok_or_else(|| {
            CalibError::internal(
                "RUN.RECORD_PENDING",
                "calibration record requested before the final pass completed",
            )
        })
    }

    /// Feed one source event to the pass in flight.
    pub fn process_event(
        &mut self,
        event: SourceEvent,
        observer: &mut dyn CalibrationObserver,
    ) -> CalResult<FrameFlow> {
        if self.state == LoopState::Done {
            return Err(CalibError::internal(
                "RUN.AFTER_DONE",
                "received an event after the calibration finished",
            ));
        }
        match event {
            SourceEvent::EndOfRange => self.finish_pass(observer),
            SourceEvent::MissingCollection { event_number } => {
                warn!(event = event_number, "no raw data available for this event");
                self.skipped_missing += 1;
                Ok(FrameFlow::Skipped(SkipReason::MissingCollection))
            }
            SourceEvent::Frame(frame) => self.process_frame(&frame, observer),
        }
    }

    fn process_frame(
        &mut self,
        frame: &TelescopeFrame,
        observer: &mut dyn CalibrationObserver,
    ) -> CalResult<FrameFlow> {
        if let Some(last_event) = self.config.last_event
            && self.event_index >= last_event
        {
            return self.finish_pass(observer);
        }
        if self.event_index < self.config.first_event {
            self.event_index += 1;
            return Ok(FrameFlow::Skipped(SkipReason::BeforeFirstEvent));
        }
        if self.event_index % 10 == 0 {
            info!(
                event = frame.event_number,
                total = self.event_index,
                loop_index = self.loop_index,
                "processing event"
            );
        }

        let flow = match self.state {
            LoopState::RawPass => self.accumulate_raw(frame),
            LoopState::CommonModePass(_) => self.accumulate_corrected(frame, observer),
            LoopState::RefinementPass => self.count_firing(frame),
            LoopState::Done => unreachable!("checked in process_event"),
        }?;
        self.event_index += 1;
        if flow == FrameFlow::Continue {
            self.frames_in_pass += 1;
        }
        Ok(flow)
    }

    fn checked_plane_index(&self, plane: &PlaneSamples) -> CalResult<usize> {
        let Some(detector) = self.detectors.get(plane.detector) else {
            return Err(CalibError::internal(
                "RUN.DETECTOR_INDEX",
                format!(
                    "frame references detector {} but the geometry has {} planes",
                    plane.detector,
                    self.detectors.len()
                ),
            ));
        };
        if plane.samples.len() != detector.status.len() {
            return Err(CalibError::internal(
                "RUN.PLANE_SHAPE",
                format!(
                    "detector {} expects {} samples per frame, got {}",
                    plane.detector,
                    detector.status.len(),
                    plane.samples.len()
                ),
            ));
        }
        Ok(plane.detector)
    }

    fn accumulate_raw(&mut self, frame: &TelescopeFrame) -> CalResult<FrameFlow> {
        for plane in &frame.planes {
            let index = self.checked_plane_index(plane)?;
            let detector = &mut self.detectors[index];
            for (pixel, &value) in plane.samples.iter().enumerate() {
                detector.bank.update(pixel, value);
            }
        }
        Ok(FrameFlow::Continue)
    }

    fn accumulate_corrected(
        &mut self,
        frame: &TelescopeFrame,
        observer: &mut dyn CalibrationObserver,
    ) -> CalResult<FrameFlow> {
        let cuts = CommonModeCuts {
            hit_rejection_cut: self.config.hit_rejection_cut,
            max_rejected_pixels: self.config.max_rejected_pixels_per_frame,
        };
        let mut accepted_any = false;
        for plane in &frame.planes {
            let index = self.checked_plane_index(plane)?;
            let outcome = {
                let detector = &self.detectors[index];
                common_mode::estimate(
                    &plane.samples,
                    &detector.pedestal,
                    &detector.noise,
                    &detector.status,
                    &cuts,
                )
            };
            match outcome {
                CommonModeOutcome::Accepted { value, .. } => {
                    observer.common_mode(index, self.loop_index, value);
                    let detector = &mut self.detectors[index];
                    for (pixel, &sample) in plane.samples.iter().enumerate() {
                        if detector.status[pixel].is_good() {
                            detector.bank.update(pixel, sample - value);
                        }
                    }
                    accepted_any = true;
                }
                CommonModeOutcome::Rejected {
                    hit_pixels,
                    eligible_pixels,
                } => {
                    warn!(
                        event = frame.event_number,
                        detector = index,
                        hit_pixels,
                        eligible_pixels,
                        "skipping frame: common-mode estimate rejected"
                    );
                    self.skipped_common_mode += 1;
                }
            }
        }
        Ok(if accepted_any {
            FrameFlow::Continue
        } else {
            FrameFlow::Skipped(SkipReason::CommonModeRejected)
        })
    }

    fn count_firing(&mut self, frame: &TelescopeFrame) -> CalResult<FrameFlow> {
        let half_cut = 0.5 * self.config.hit_rejection_cut;
        for plane in &frame.planes {
            let index = self.checked_plane_index(plane)?;
            let detector = &mut self.detectors[index];
            for (pixel, &sample) in plane.samples.iter().enumerate() {
                if detector.status[pixel].is_good()
                    && sample - detector.pedestal[pixel] > half_cut * detector.noise[pixel]
                {
                    detector.hit_counter[pixel] += 1;
                }
            }
        }
        Ok(FrameFlow::Continue)
    }

    fn finish_pass(&mut self, observer: &mut dyn CalibrationObserver) -> CalResult<FrameFlow> {
        match self.state {
            LoopState::RawPass | LoopState::CommonModePass(_) => {
                for detector in &mut self.detectors {
                    detector.pedestal = detector.bank.pedestal();
                    detector.noise = detector.bank.noise();
                }
                for (index, detector) in self.detectors.iter_mut().enumerate() {
                    let masked = masking::mask_noisy_pixels(
                        self.config.bad_pixel_algorithm,
                        self.config.bad_pixel_mask_cut,
                        &detector.noise,
                        &mut detector.status,
                    );
                    info!(
                        detector = index,
                        masked,
                        loop_index = self.loop_index,
                        "accumulation pass finished"
                    );
                }
                for (index, detector) in self.detectors.iter().enumerate() {
                    observer.pass_statistics(
                        self.loop_index,
                        index,
                        &detector.pedestal,
                        &detector.noise,
                        &detector.status,
                    );
                }
                self.advance_after_accumulation_pass()
            }
            LoopState::RefinementPass => {
                let frames = self.frames_in_pass;
                for (index, detector) in self.detectors.iter_mut().enumerate() {
                    if frames > 0 {
                        for (pixel, &hits) in detector.hit_counter.iter().enumerate() {
                            observer.firing_frequency(
                                index,
                                pixel,
                                f64::from(hits) / frames as f64,
                            );
                        }
                    }
                    let masked = masking::mask_firing_pixels(
                        &detector.hit_counter,
                        frames,
                        self.config.refinement_firing_frequency,
                        &mut detector.status,
                    );
                    info!(detector = index, masked, "refinement pass finished");
                }
                self.loop_index += 1;
                self.finish_run()
            }
            LoopState::Done => Err(CalibError::internal(
                "RUN.AFTER_DONE",
                "end-of-range after the calibration finished",
            )),
        }
    }

    fn advance_after_accumulation_pass(&mut self) -> CalResult<FrameFlow> {
        self.loop_index += 1;
        self.event_index = 0;
        self.frames_in_pass = 0;

        let next_iteration = match self.state {
            LoopState::RawPass => 1,
            LoopState::CommonModePass(k) => k + 1,
            _ => unreachable!("only accumulation passes advance here"),
        };
        if next_iteration <= self.config.common_mode_iterations {
            for detector in &mut self.detectors {
                detector.bank.begin_pass(PassSeed::Previous {
                    pedestal: &detector.pedestal,
                    noise: &detector.noise,
                });
            }
            self.state = LoopState::CommonModePass(next_iteration);
            Ok(FrameFlow::PassComplete { rewind: true })
        } else if self.config.enable_refinement_pass {
            self.state = LoopState::RefinementPass;
            Ok(FrameFlow::PassComplete { rewind: true })
        } else {
            self.finish_run()
        }
    }

    fn finish_run(&mut self) -> CalResult<FrameFlow> {
        self.state = LoopState::Done;
        self.record = Some(CalibrationRecord {
            detectors: self
                .detectors
                .iter()
                .enumerate()
                .map(|(index, detector)| DetectorCalibration {
                    detector: index,
                    bounds: detector.bounds,
                    pedestal: detector.pedestal.clone(),
                    noise: detector.noise.clone(),
                    status: detector.status.clone(),
                })
                .collect(),
        });
        Ok(FrameFlow::PassComplete { rewind: false })
    }
}

/// Drive a full calibration: feed every pass from the source, rewinding it
/// between passes, and return the final record.
///
/// The source running dry before the configured pass sequence completes is
/// the early-termination condition and aborts the whole calibration.
pub fn run_calibration<S: FrameSource + ?Sized>(
    geometry: &TelescopeGeometry,
    config: CalibrationConfig,
    source: &mut S,
    observer: &mut dyn CalibrationObserver,
) -> CalResult<CalibrationRecord> {
    config.check_event_budget(source.event_budget())?;
    let mut controller = CalibrationController::new(geometry, config)?;
    loop {
        let Some(event) = source.next_event()? else {
            return Err(CalibError::incomplete(
                "RUN.SOURCE_EXHAUSTED",
                format!(
                    "frame source ended during loop {} of {}; calibration is incomplete",
                    controller.loop_index(),
                    controller.total_loops()
                ),
            ));
        };
        match controller.process_event(event, observer)? {
            FrameFlow::Continue | FrameFlow::Skipped(_) => {}
            FrameFlow::PassComplete { rewind: true } => source.rewind()?,
            FrameFlow::PassComplete { rewind: false } => break,
        }
    }
    info!(
        skipped_common_mode = controller.skipped_common_mode(),
        skipped_missing = controller.skipped_missing(),
        "calibration finished"
    );
    controller.into_record()
}
