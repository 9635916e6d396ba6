//! Grensesnitt mot den eksterne klassifiseringsmodellen.
//!
//! Modellen er en svart boks: den får et vindu (og evt. et repetisjonshint)
//! og svarer med rangerte kandidater. Tom liste = avståelse.

use std::collections::BTreeMap;
use std::sync::mpsc;

use log::warn;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::buffer::Window;
use crate::telemetry::METRICS;

/// Én kandidat fra modellen. Vekt/intensitet er med bare hvis modellen koder dem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub intensity: Option<f64>,
}

impl Candidate {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            weight: None,
            intensity: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

/// Rangerte kandidater for vindu nr. `seq` i blokken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub seq: u64,
    pub candidates: Vec<Candidate>,
}

impl WindowResult {
    pub fn new(seq: u64, candidates: Vec<Candidate>) -> Self {
        Self { seq, candidates }
    }

    pub fn abstained(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// Den eksterne modellen.
pub trait Classifier {
    fn classify(&self, window: &Window, repetition_hint: Option<u32>) -> Vec<Candidate>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn classify(&self, window: &Window, repetition_hint: Option<u32>) -> Vec<Candidate> {
        (**self).classify(window, repetition_hint)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&self, window: &Window, repetition_hint: Option<u32>) -> Vec<Candidate> {
        (**self).classify(window, repetition_hint)
    }
}

/// Rydder modellens svar: fjerner ikke-finitte verdier, klemmer til [0,1]
/// og sorterer høyest først.
pub fn normalize(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.retain(|c| c.confidence.is_finite() && !c.label.is_empty());
    for c in candidates.iter_mut() {
        c.confidence = c.confidence.clamp(0.0, 1.0);
    }
    candidates.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.confidence)));
    candidates
}

/// Kaller modellen og gjør svaret om til et `WindowResult`.
pub struct ClassifierAdapter<C> {
    inner: C,
}

impl<C: Classifier> ClassifierAdapter<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn classify(&self, seq: u64, window: &Window, repetition_hint: Option<u32>) -> WindowResult {
        let candidates = normalize(self.inner.classify(window, repetition_hint));
        METRICS.windows_classified.inc();
        if candidates.is_empty() {
            METRICS.classifier_abstentions.inc();
            warn!("klassifisering ga ingen kandidater for vindu {seq} ({:?})", window.location);
        }
        WindowResult::new(seq, candidates)
    }
}

/// Holder igjen resultater som kommer i feil rekkefølge og slipper dem ut
/// strengt etter sekvensnummer.
#[derive(Debug, Clone, Default)]
pub struct ResultReorderer {
    next_seq: u64,
    pending: BTreeMap<u64, WindowResult>,
}

impl ResultReorderer {
    pub fn new(first_seq: u64) -> Self {
        Self {
            next_seq: first_seq,
            pending: BTreeMap::new(),
        }
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Legger inn et resultat og returnerer alle som nå kan slippes i rekkefølge.
    pub fn push(&mut self, result: WindowResult) -> Vec<WindowResult> {
        if result.seq < self.next_seq {
            warn!("vindu {} kom etter at det var passert, forkastes", result.seq);
            return Vec::new();
        }
        self.pending.insert(result.seq, result);
        let mut ready = Vec::new();
        while let Some(r) = self.pending.remove(&self.next_seq) {
            ready.push(r);
            self.next_seq += 1;
        }
        ready
    }

    /// Tømmer resten i rekkefølge, også over hull i sekvensen.
    pub fn drain(&mut self) -> Vec<WindowResult> {
        let rest = std::mem::take(&mut self.pending);
        if let Some((&last, _)) = rest.iter().next_back() {
            warn!(
                "hull i vindussekvensen: forventet {}, tømmer {} ventende",
                self.next_seq,
                rest.len()
            );
            self.next_seq = last + 1;
        }
        rest.into_values().collect()
    }
}

/// Klassifiserer vinduer parallelt (scoped threads) og returnerer resultatene
/// sortert på vindusnummer.
pub fn classify_windows_parallel<C>(
    adapter: &ClassifierAdapter<C>,
    windows: &[(u64, Window)],
    workers: usize,
) -> Vec<WindowResult>
where
    C: Classifier + Sync,
{
    if windows.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, windows.len());
    let first = windows.iter().map(|(seq, _)| *seq).min().unwrap_or(0);
    let (tx, rx) = mpsc::channel();

    std::thread::scope(|scope| {
        for chunk in 0..workers {
            let tx = tx.clone();
            scope.spawn(move || {
                for (seq, window) in windows.iter().skip(chunk).step_by(workers) {
                    // mottakeren lever til alle tråder er ferdige
                    let _ = tx.send(adapter.classify(*seq, window, None));
                }
            });
        }
    });
    drop(tx);

    let mut reorderer = ResultReorderer::new(first);
    let mut out = Vec::with_capacity(windows.len());
    for result in rx {
        out.extend(reorderer.push(result));
    }
    out.extend(reorderer.drain());
    out
}
