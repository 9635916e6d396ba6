//! Repetisjonsestimat fra den periodiske strukturen i signalet.
//!
//! Dominant akse (høyest varians) glattes med et bakoverskuende glidende
//! snitt, og hver endring klassifiseres som opp- eller nedsteg mot et støygulv. En repetisjon er én
//! hel syklus (to vendinger) med utslag over `min_amplitude`.
//!
//! Alt er kausalt: samme prefiks gir samme tilstand, så estimatet kan aldri
//! gå ned når flere samples legges til.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::buffer::accelerations;
use crate::config::RepetitionConfig;
use crate::types::{Axis, Sample};

/// Karakteristisk profil for en periode av et signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeriodicProfile {
    /// Antall endringer over støygulvet
    pub total_steps: u32,
    pub upward_steps: u32,
    pub downward_steps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionEstimate {
    pub repetitions: u32,
    /// Aksen det ble telt på
    pub axis: Axis,
    pub profile: PeriodicProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// Teller vendinger med hysterese, ett sample av gangen.
#[derive(Debug, Clone)]
struct ReversalCounter {
    min_amplitude: f64,
    direction: Option<Direction>,
    extreme: f64,
    low: f64,
    high: f64,
    reversals: u32,
}

impl ReversalCounter {
    fn new(min_amplitude: f64) -> Self {
        Self {
            min_amplitude,
            direction: None,
            extreme: 0.0,
            low: f64::INFINITY,
            high: f64::NEG_INFINITY,
            reversals: 0,
        }
    }

    fn push(&mut self, v: f64) {
        match self.direction {
            None => {
                self.low = self.low.min(v);
                self.high = self.high.max(v);
                if v - self.low >= self.min_amplitude {
                    self.direction = Some(Direction::Up);
                    self.extreme = v;
                } else if self.high - v >= self.min_amplitude {
                    self.direction = Some(Direction::Down);
                    self.extreme = v;
                }
            }
            Some(Direction::Up) => {
                if v > self.extreme {
                    self.extreme = v;
                } else if self.extreme - v >= self.min_amplitude {
                    self.reversals += 1;
                    self.direction = Some(Direction::Down);
                    self.extreme = v;
                }
            }
            Some(Direction::Down) => {
                if v < self.extreme {
                    self.extreme = v;
                } else if v - self.extreme >= self.min_amplitude {
                    self.reversals += 1;
                    self.direction = Some(Direction::Up);
                    self.extreme = v;
                }
            }
        }
    }
}

/// Bakoverskuende glidende snitt, ett sample av gangen.
#[derive(Debug, Clone)]
struct TrailingMean {
    window: usize,
    recent: VecDeque<f64>,
    sum: f64,
}

impl TrailingMean {
    fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            recent: VecDeque::new(),
            sum: 0.0,
        }
    }

    fn push(&mut self, x: f64) -> f64 {
        self.recent.push_back(x);
        self.sum += x;
        if self.recent.len() > self.window {
            if let Some(old) = self.recent.pop_front() {
                self.sum -= old;
            }
        }
        self.sum / self.recent.len() as f64
    }
}

/// Løpende tilstand for én akse: varians (Welford), glatting, profil og vendinger.
#[derive(Debug, Clone)]
struct AxisTrack {
    n: usize,
    mean: f64,
    m2: f64,
    smoother: TrailingMean,
    last_smooth: Option<f64>,
    profile: PeriodicProfile,
    counter: ReversalCounter,
}

impl AxisTrack {
    fn new(config: &RepetitionConfig) -> Self {
        Self {
            n: 0,
            mean: 0.0,
            m2: 0.0,
            smoother: TrailingMean::new(config.smoothing_window),
            last_smooth: None,
            profile: PeriodicProfile::default(),
            counter: ReversalCounter::new(config.min_amplitude),
        }
    }

    fn push(&mut self, raw: f64, noise_floor: f64) {
        self.n += 1;
        let d = raw - self.mean;
        self.mean += d / self.n as f64;
        self.m2 += d * (raw - self.mean);

        let v = self.smoother.push(raw);
        if let Some(prev) = self.last_smooth.replace(v) {
            let delta = v - prev;
            if delta.abs() >= noise_floor {
                self.profile.total_steps += 1;
                if delta > 0.0 {
                    self.profile.upward_steps += 1;
                } else {
                    self.profile.downward_steps += 1;
                }
            }
        }
        self.counter.push(v);
    }

    fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }
}

pub struct RepetitionEstimator {
    config: RepetitionConfig,
}

impl Default for RepetitionEstimator {
    fn default() -> Self {
        Self::new(RepetitionConfig::default())
    }
}

impl RepetitionEstimator {
    pub fn new(config: RepetitionConfig) -> Self {
        Self { config }
    }

    /// Antall repetisjoner i akselerometer-samplene.
    pub fn estimate(&self, samples: &[Sample]) -> u32 {
        self.estimate_detailed(samples)
            .map_or(0, |e| e.repetitions)
    }

    /// Estimat med akse og profil. `None` med færre enn to samples.
    ///
    /// Aksen er den med høyest varians. Den låses når den første hele syklusen
    /// er fullført på den; før det er estimatet 0. Låsen gjør at estimatet ikke
    /// kan falle når en annen akse senere får høyere varians.
    pub fn estimate_detailed(&self, samples: &[Sample]) -> Option<RepetitionEstimate> {
        let values = accelerations(samples);
        if values.len() < 2 {
            return None;
        }

        let mut tracks = [
            AxisTrack::new(&self.config),
            AxisTrack::new(&self.config),
            AxisTrack::new(&self.config),
        ];
        let mut locked: Option<usize> = None;
        for v in &values {
            for (track, axis) in tracks.iter_mut().zip(Axis::ALL) {
                track.push(v.along(axis), self.config.noise_floor);
            }
            if locked.is_none() {
                let dominant = dominant_track(&tracks);
                if tracks[dominant].counter.reversals >= 2 {
                    locked = Some(dominant);
                }
            }
        }

        let (idx, repetitions) = match locked {
            Some(i) => (i, tracks[i].counter.reversals / 2),
            None => (dominant_track(&tracks), 0),
        };
        Some(RepetitionEstimate {
            repetitions,
            axis: Axis::ALL[idx],
            profile: tracks[idx].profile,
        })
    }
}

/// Sporet med høyest varians; ved likhet vinner første akse.
fn dominant_track(tracks: &[AxisTrack; 3]) -> usize {
    (1..tracks.len()).fold(0, |best, i| {
        if tracks[i].variance() > tracks[best].variance() {
            i
        } else {
            best
        }
    })
}
