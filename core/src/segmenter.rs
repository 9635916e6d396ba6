//! Bevegelsessegmentering: NotMoving → Moving → Exercising, per kroppsplassering.
//!
//! Hvert fulle vindu gir en `DeciderState` (dominant akse, spektral topp,
//! hastighet og strekning). Tilstandsmaskinen bruker den til å åpne og lukke
//! øvelsesblokker. Korte vinduer bufres og klassifiseres aldri.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::buffer::{SampleBuffer, Window};
use crate::config::SegmenterConfig;
use crate::spectrum::{analyze, DeciderState, MotionIntegrator};
use crate::telemetry::METRICS;
use crate::types::{Axis, Location, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementState {
    NotMoving,
    Moving,
    Exercising,
}

/// Hendelser fra segmenteringen. `BlockStarted` har med vinduet som utløste
/// overgangen, slik at blokken kan starte med de samplene.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    StateChanged {
        location: Location,
        from: MovementState,
        to: MovementState,
        at: f64,
    },
    BlockStarted {
        location: Location,
        at: f64,
        window: Window,
    },
    BlockEnded {
        location: Location,
        at: f64,
    },
}

#[derive(Debug, Clone)]
struct Track {
    buffer: SampleBuffer,
    state: MovementState,
    integrator: MotionIntegrator,
    axis: Option<Axis>,
    consistent_windows: usize,
    dwell_windows: usize,
    last_decision: Option<DeciderState>,
    last_end: Option<f64>,
}

impl Track {
    fn new(location: Location, cfg: &SegmenterConfig) -> Self {
        Self {
            buffer: SampleBuffer::new(location, cfg.window_size, cfg.window_step),
            state: MovementState::NotMoving,
            integrator: MotionIntegrator::default(),
            axis: None,
            consistent_windows: 0,
            dwell_windows: 0,
            last_decision: None,
            last_end: None,
        }
    }

    fn enter(&mut self, to: MovementState, at: f64, events: &mut Vec<SegmentEvent>) {
        let from = self.state;
        self.state = to;
        self.integrator.reset();
        self.consistent_windows = 0;
        self.dwell_windows = 0;
        events.push(SegmentEvent::StateChanged {
            location: self.buffer.location(),
            from,
            to,
            at,
        });
    }
}

pub struct MotionSegmenter {
    config: SegmenterConfig,
    sample_rate_hz: f64,
    tracks: BTreeMap<Location, Track>,
}

impl MotionSegmenter {
    pub fn new(config: SegmenterConfig, sample_rate_hz: f64) -> Self {
        Self {
            config,
            sample_rate_hz,
            tracks: BTreeMap::new(),
        }
    }

    pub fn state(&self, location: Location) -> MovementState {
        self.tracks
            .get(&location)
            .map_or(MovementState::NotMoving, |t| t.state)
    }

    /// Siste beslutningsgrunnlag for plasseringen (None før første hele vindu).
    pub fn last_decision(&self, location: Location) -> Option<DeciderState> {
        self.tracks.get(&location).and_then(|t| t.last_decision)
    }

    /// Tar imot ett sample fra `location`. Bare akselerometer-samples brukes.
    pub fn push_sample(&mut self, sample: Sample, location: Location) -> Vec<SegmentEvent> {
        let mut events = Vec::new();
        if sample.acceleration().is_none() {
            return events;
        }
        let cfg = &self.config;
        let track = self
            .tracks
            .entry(location)
            .or_insert_with(|| Track::new(location, cfg));
        track.buffer.push(sample);

        while let Some(window) = track.buffer.next_window() {
            METRICS.windows_segmented.inc();
            decide(track, window, &self.config, self.sample_rate_hz, &mut events);
        }
        events
    }

    /// Slutt på strømmen: lukker åpne blokker og tømmer bufferne.
    pub fn finish(&mut self) -> Vec<SegmentEvent> {
        let mut events = Vec::new();
        for (location, track) in self.tracks.iter_mut() {
            let at = track.last_end.unwrap_or(0.0);
            if track.state == MovementState::Exercising {
                info!("blokk avsluttet ved strømslutt ({location:?})");
                events.push(SegmentEvent::BlockEnded {
                    location: *location,
                    at,
                });
            }
            if track.state != MovementState::NotMoving {
                track.enter(MovementState::NotMoving, at, &mut events);
            }
            track.buffer.clear();
        }
        events
    }
}

fn decide(
    track: &mut Track,
    window: Window,
    cfg: &SegmenterConfig,
    fallback_hz: f64,
    events: &mut Vec<SegmentEvent>,
) {
    let values = window.accelerations();
    let rate = window.sample_rate(fallback_hz);
    let Some((axis, peak, periodicity)) = analyze(&values, rate) else {
        return;
    };
    let at = window.end();
    track.last_end = Some(at);

    if track.axis != Some(axis) {
        track.integrator.reset();
        track.axis = Some(axis);
    }

    let series: Vec<(f64, f64)> = window
        .samples
        .iter()
        .filter_map(|s| s.acceleration().map(|a| (s.t, a.along(axis))))
        .collect();
    let offset = series.iter().map(|(_, a)| a).sum::<f64>() / series.len() as f64;
    let fresh = series.len().saturating_sub(cfg.window_step + 1);
    track
        .integrator
        .integrate(&series[fresh..], offset, cfg.integrator_leak);

    let decision = DeciderState {
        dominant_axis: axis,
        peak,
        periodicity,
        velocity: track.integrator.velocity(),
        distance: track.integrator.distance(),
    };
    track.last_decision = Some(decision);

    let active = peak.power >= cfg.movement_power_threshold;
    let periodic = active
        && periodicity >= cfg.periodicity_threshold
        && peak.frequency >= cfg.min_exercise_hz
        && peak.frequency <= cfg.max_exercise_hz;
    let bounded =
        decision.velocity.abs() <= cfg.max_velocity && decision.distance.abs() <= cfg.max_distance;

    debug!(
        "vindu {} {:?}: akse={:?} f={:.2}Hz p={:.3} per={:.2} v={:.3} d={:.3} ({:?})",
        window.seq,
        window.location,
        axis,
        peak.frequency,
        peak.power,
        periodicity,
        decision.velocity,
        decision.distance,
        track.state
    );

    match track.state {
        MovementState::NotMoving => {
            if active {
                track.enter(MovementState::Moving, at, events);
            }
        }
        MovementState::Moving => {
            if !active {
                track.enter(MovementState::NotMoving, at, events);
                return;
            }
            if periodic && bounded {
                track.consistent_windows += 1;
            } else {
                track.consistent_windows = 0;
            }
            if track.consistent_windows >= cfg.min_consistent_windows {
                track.enter(MovementState::Exercising, at, events);
                info!("øvelsesblokk startet ({:?}) ved {:.2}s", window.location, at);
                events.push(SegmentEvent::BlockStarted {
                    location: window.location,
                    at,
                    window,
                });
            }
        }
        MovementState::Exercising => {
            if periodic {
                track.dwell_windows = 0;
                return;
            }
            track.dwell_windows += 1;
            if track.dwell_windows >= cfg.exit_dwell_windows {
                info!("øvelsesblokk avsluttet ({:?}) ved {:.2}s", window.location, at);
                events.push(SegmentEvent::BlockEnded {
                    location: window.location,
                    at,
                });
                let to = if active {
                    MovementState::Moving
                } else {
                    MovementState::NotMoving
                };
                track.enter(to, at, events);
            }
        }
    }
}
