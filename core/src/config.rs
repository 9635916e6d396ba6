// core/src/config.rs
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Terskler for bevegelsessegmenteringen (NotMoving / Moving / Exercising).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Vindusstørrelse i samples for periodogrammet (128 @ 50 Hz ≈ 2.6 s)
    pub window_size: usize,
    /// Steg mellom vinduer i samples
    pub window_step: usize,
    /// Toppeffekt som regnes som bevegelse ((m/s²)²)
    pub movement_power_threshold: f64,
    /// Andel av spekteret toppen må ha for at signalet regnes som periodisk
    pub periodicity_threshold: f64,
    /// Frekvensbånd for repetisjoner (Hz)
    pub min_exercise_hz: f64,
    pub max_exercise_hz: f64,
    /// Grenser for integrert hastighet (m/s) og strekning (m) langs dominant akse
    pub max_velocity: f64,
    pub max_distance: f64,
    /// Lekkasje per sample i integratoren (1.0 = ren integrasjon)
    pub integrator_leak: f64,
    /// Antall konsistente vinduer før Moving -> Exercising
    pub min_consistent_windows: usize,
    /// Antall aperiodiske/stille vinduer før Exercising avsluttes
    pub exit_dwell_windows: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            window_size: 128,
            window_step: 25,
            movement_power_threshold: 0.5,
            periodicity_threshold: 0.3,
            min_exercise_hz: 0.2,
            max_exercise_hz: 4.0,
            max_velocity: 2.0,
            max_distance: 1.5,
            integrator_leak: 0.98,
            min_consistent_windows: 3,
            exit_dwell_windows: 2,
        }
    }
}

/// Parametre for repetisjonsestimatet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionConfig {
    /// Endringer mindre enn dette (m/s²) er verken opp- eller nedsteg
    pub noise_floor: f64,
    /// Minste utslag (m/s²) mellom topp og bunn for at en vending telles
    pub min_amplitude: f64,
    /// Bakoverskuende glidende snitt (samples)
    pub smoothing_window: usize,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            noise_floor: 0.02,
            min_amplitude: 0.8,
            smoothing_window: 5,
        }
    }
}

/// Parametre for fusjon av vindusresultater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Alle stemmer ganges med dette før et nytt vindu legges til (senere vinduer teller mer)
    pub vote_decay: f64,
    /// Andel av vinduene en etikett må toppe for å telle i et dropsett/supersett
    pub significant_share: f64,
    /// Lederen må ha minst denne marginen for å slå sammen til én etikett
    pub min_margin: f64,
    /// Løp kortere enn dette (vinduer) absorberes av naboen
    pub min_run_windows: usize,
    /// Flere løp enn dette = ingen ren tidsgrense
    pub max_set_entries: usize,
    /// Toleranse for likhet i stemmer
    pub tie_epsilon: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            vote_decay: 0.95,
            significant_share: 0.25,
            min_margin: 0.2,
            min_run_windows: 1,
            max_set_entries: 4,
            tie_epsilon: 1e-9,
        }
    }
}

/// Klassifiseringsvindu (størrelse og steg i samples).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub size: usize,
    pub step: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { size: 50, step: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate_hz: f64,
    pub segmenter: SegmenterConfig,
    pub repetitions: RepetitionConfig,
    pub fusion: FusionConfig,
    pub classifier_window: WindowConfig,
    /// Send inn pause til planen når en ny blokk starter etter en øvelse
    pub submit_rest_between_blocks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            segmenter: SegmenterConfig::default(),
            repetitions: RepetitionConfig::default(),
            fusion: FusionConfig::default(),
            classifier_window: WindowConfig::default(),
            submit_rest_between_blocks: true,
        }
    }
}

fn check(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfig(what.to_string()))
    }
}

fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

impl PipelineConfig {
    /// Feiler tidlig på konfigurasjon som ikke gir mening.
    pub fn validate(&self) -> Result<()> {
        let s = &self.segmenter;
        check(positive(self.sample_rate_hz), "sample_rate_hz must be > 0")?;
        check(s.window_size >= 8, "segmenter.window_size must be >= 8")?;
        check(
            s.window_step >= 1 && s.window_step <= s.window_size,
            "segmenter.window_step must be in 1..=window_size",
        )?;
        check(
            positive(s.movement_power_threshold),
            "segmenter.movement_power_threshold must be > 0",
        )?;
        check(
            (0.0..=1.0).contains(&s.periodicity_threshold),
            "segmenter.periodicity_threshold must be in [0, 1]",
        )?;
        check(
            s.min_exercise_hz >= 0.0 && s.min_exercise_hz < s.max_exercise_hz,
            "segmenter exercise band must satisfy 0 <= min < max",
        )?;
        check(
            positive(s.max_velocity) && positive(s.max_distance),
            "segmenter velocity/distance bounds must be > 0",
        )?;
        check(
            s.integrator_leak > 0.0 && s.integrator_leak <= 1.0,
            "segmenter.integrator_leak must be in (0, 1]",
        )?;
        check(s.exit_dwell_windows >= 1, "segmenter.exit_dwell_windows must be >= 1")?;

        let r = &self.repetitions;
        check(
            r.noise_floor.is_finite() && r.noise_floor >= 0.0,
            "repetitions.noise_floor must be >= 0",
        )?;
        check(positive(r.min_amplitude), "repetitions.min_amplitude must be > 0")?;
        check(r.smoothing_window >= 1, "repetitions.smoothing_window must be >= 1")?;

        let f = &self.fusion;
        check(
            f.vote_decay > 0.0 && f.vote_decay <= 1.0,
            "fusion.vote_decay must be in (0, 1]",
        )?;
        check(
            f.significant_share > 0.0 && f.significant_share <= 0.5,
            "fusion.significant_share must be in (0, 0.5]",
        )?;
        check(
            (0.0..=1.0).contains(&f.min_margin),
            "fusion.min_margin must be in [0, 1]",
        )?;
        check(f.min_run_windows >= 1, "fusion.min_run_windows must be >= 1")?;
        check(f.max_set_entries >= 2, "fusion.max_set_entries must be >= 2")?;

        let w = &self.classifier_window;
        check(w.size >= 2, "classifier_window.size must be >= 2")?;
        check(
            w.step >= 1 && w.step <= w.size,
            "classifier_window.step must be in 1..=size",
        )?;
        Ok(())
    }
}

/// Leser konfigurasjon fra disk (JSON).
/// Hvis filen ikke finnes, returneres default-konfigurasjonen.
pub fn load_config(path: &str) -> Result<PipelineConfig> {
    if !Path::new(path).exists() {
        warn!("fant ikke konfigurasjon på {path}, bruker default");
        return Ok(PipelineConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_string(),
        source,
    })?;
    let de = &mut serde_json::Deserializer::from_str(&contents);
    let cfg: PipelineConfig = serde_path_to_error::deserialize(de).map_err(|e| Error::Json {
        path: path.to_string(),
        message: format!("{} (at {})", e.inner(), e.path()),
    })?;
    cfg.validate()?;
    info!("konfigurasjon lastet fra {path}");
    Ok(cfg)
}

/// Lagrer konfigurasjon til disk som JSON (pretty-print).
pub fn save_config(cfg: &PipelineConfig, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(cfg).map_err(|e| Error::Json {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|source| Error::Io {
        path: path.to_string(),
        source,
    })?;
    info!("konfigurasjon lagret til {path}");
    Ok(())
}
