//! Buffer av tidsordnede samples per kroppsplassering, og vinduene som skjæres ut av den.

use std::collections::VecDeque;

use crate::types::{Axis, Location, Sample, Vec3};

/// Sammenhengende utsnitt av samples fra én plassering. Eier sine samples
/// (kopi ut av bufferet), så bufferet kan gå videre uten aliasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub seq: u64,
    pub location: Location,
    pub samples: Vec<Sample>,
}

impl Window {
    pub fn new(seq: u64, location: Location, samples: Vec<Sample>) -> Self {
        Self { seq, location, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.samples.first().map_or(0.0, |s| s.t)
    }

    pub fn end(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.t)
    }

    pub fn accelerations(&self) -> Vec<Vec3> {
        accelerations(&self.samples)
    }

    /// Signal langs én akse (akselerometer-samples).
    pub fn axis(&self, axis: Axis) -> Vec<f64> {
        self.samples
            .iter()
            .filter_map(|s| s.acceleration())
            .map(|a| a.along(axis))
            .collect()
    }

    /// Samplerate fra tidsstemplene, eller `fallback_hz` hvis de ikke sier noe.
    pub fn sample_rate(&self, fallback_hz: f64) -> f64 {
        sample_rate(&self.samples, fallback_hz)
    }
}

pub fn accelerations(samples: &[Sample]) -> Vec<Vec3> {
    samples.iter().filter_map(|s| s.acceleration()).collect()
}

pub fn sample_rate(samples: &[Sample], fallback_hz: f64) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(a), Some(b)) if samples.len() > 1 && b.t > a.t => {
            (samples.len() - 1) as f64 / (b.t - a.t)
        }
        _ => fallback_hz,
    }
}

/// Rullende buffer: gir et vindu hver gang `window_size` samples er tilgjengelig,
/// og flytter starten `step` samples fram.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    location: Location,
    samples: VecDeque<Sample>,
    window_size: usize,
    step: usize,
    next_seq: u64,
}

impl SampleBuffer {
    pub fn new(location: Location, window_size: usize, step: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            location,
            samples: VecDeque::with_capacity(window_size),
            window_size,
            step: step.clamp(1, window_size),
            next_seq: 0,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
    }

    /// Antall samples som venter på neste vindu.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sjekk om bufferet har nok samples for et helt vindu
    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.window_size
    }

    /// Neste fulle vindu, eller `None` hvis bufferet er for kort (venter på mer data).
    pub fn next_window(&mut self) -> Option<Window> {
        if !self.is_ready() {
            return None;
        }
        let samples: Vec<Sample> = self.samples.iter().take(self.window_size).cloned().collect();
        self.samples.drain(..self.step);
        let seq = self.next_seq;
        self.next_seq += 1;
        Some(Window::new(seq, self.location, samples))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(t: f64) -> Sample {
        Sample::accel(t, Location::LeftWrist, Vec3::new(t, 0.0, 0.0))
    }

    #[test]
    fn short_buffer_yields_no_window() {
        let mut b = SampleBuffer::new(Location::LeftWrist, 4, 2);
        for i in 0..3 {
            b.push(s(i as f64));
        }
        assert!(b.next_window().is_none());
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn windows_overlap_by_size_minus_step() {
        let mut b = SampleBuffer::new(Location::LeftWrist, 4, 2);
        let mut windows = Vec::new();
        for i in 0..8 {
            b.push(s(i as f64));
            while let Some(w) = b.next_window() {
                windows.push(w);
            }
        }
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1].seq, 1);
        assert_eq!(windows[1].start(), 2.0);
        assert_eq!(windows[2].end(), 7.0);
    }
}
