//! Periodogram og beslutningsgrunnlag (dominant akse, topp-frekvens, hastighet, strekning).

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::types::{Axis, Vec3};

/// Effekt ved en gitt frekvens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreqPower {
    pub frequency: f64, // Hz
    pub power: f64,
}

/// Tilstanden beslutningen i segmenteringen bygger på, regnet ut per vindu.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeciderState {
    pub dominant_axis: Axis,
    pub peak: FreqPower,
    /// Toppens andel av total effekt (0–1); høy = periodisk
    pub periodicity: f64,
    pub velocity: f64,
    pub distance: f64,
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Aksen med høyest varians. Ved likhet vinner første akse (X før Y før Z).
pub fn dominant_axis(values: &[Vec3]) -> Axis {
    let mut best = Axis::X;
    let mut best_var = f64::NEG_INFINITY;
    for axis in Axis::ALL {
        let series: Vec<f64> = values.iter().map(|v| v.along(axis)).collect();
        let var = variance(&series);
        if var > best_var {
            best_var = var;
            best = axis;
        }
    }
    best
}

/// Periodogram med Hann-vindu, uten DC-bin.
///
/// Effekten er skalert slik at en ren sinus med amplitude A gir en topp
/// på omtrent A²/2 når frekvensen ligger midt i en bin.
pub fn periodogram(signal: &[f64], sample_rate: f64) -> Vec<FreqPower> {
    let n = signal.len();
    if n < 2 || !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Vec::new();
    }
    let m = mean(signal);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);

    let mut window_sum = 0.0;
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let w = 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos());
            window_sum += w;
            Complex::new((x - m) * w, 0.0)
        })
        .collect();

    fft.process(&mut buffer);

    if window_sum <= 0.0 {
        return Vec::new();
    }
    let scale = 2.0 / (window_sum * window_sum);
    let resolution = sample_rate / n as f64;
    buffer
        .iter()
        .enumerate()
        .take(n / 2 + 1)
        .skip(1)
        .map(|(k, c)| FreqPower {
            frequency: k as f64 * resolution,
            power: c.norm_sqr() * scale,
        })
        .collect()
}

/// Høyeste topp i spekteret.
pub fn peak(spectrum: &[FreqPower]) -> Option<FreqPower> {
    spectrum
        .iter()
        .copied()
        .filter(|fp| fp.power.is_finite())
        .fold(None, |best: Option<FreqPower>, fp| match best {
            Some(b) if b.power >= fp.power => Some(b),
            _ => Some(fp),
        })
}

/// Toppens andel av summen av alle bins.
pub fn periodicity(spectrum: &[FreqPower], peak: &FreqPower) -> f64 {
    let total: f64 = spectrum.iter().map(|fp| fp.power).sum();
    if total > 0.0 {
        (peak.power / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Lekk integrator for hastighet og strekning langs én akse.
/// Nullstilles når segmenteringen bytter tilstand.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionIntegrator {
    velocity: f64,
    distance: f64,
    last_t: Option<f64>,
}

impl MotionIntegrator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Integrerer (a - offset) over nye samples `(t, a)`.
    pub fn integrate(&mut self, samples: &[(f64, f64)], offset: f64, leak: f64) {
        for &(t, a) in samples {
            let dt = match self.last_t {
                Some(prev) if t > prev => t - prev,
                _ => 0.0,
            };
            self.last_t = Some(t);
            if dt <= 0.0 {
                continue;
            }
            self.velocity = leak * self.velocity + (a - offset) * dt;
            self.distance = leak * self.distance + self.velocity * dt;
        }
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }
}

/// Regner ut dominant akse og spektral topp for et vindu.
/// `None` når vinduet er for kort for et spekter.
pub fn analyze(values: &[Vec3], sample_rate: f64) -> Option<(Axis, FreqPower, f64)> {
    if values.len() < 2 {
        return None;
    }
    let axis = dominant_axis(values);
    let series: Vec<f64> = values.iter().map(|v| v.along(axis)).collect();
    let spectrum = periodogram(&series, sample_rate);
    let top = peak(&spectrum).unwrap_or(FreqPower {
        frequency: 0.0,
        power: 0.0,
    });
    Some((axis, top, periodicity(&spectrum, &top)))
}
