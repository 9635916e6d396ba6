//! Fusjon av vindusresultater til ett `ExerciseSet` per øvelsesblokk.
//!
//! Hver etikett får en løpende, vektet stemme (vekt = confidence). Før et nytt
//! vindu legges til ganges alle stemmer med `vote_decay`, slik at senere
//! vinduer teller mer. Vinduer uten kandidater er avståelser med null vekt.
//!
//! Resultatene slippes inn strengt etter vindusnummer; det som kommer i feil
//! rekkefølge holdes igjen til hullet er fylt. Dermed er fusjon av W1..Wk
//! etterfulgt av Wk+1..Wn det samme som fusjon av W1..Wn på én gang.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::ops::Range;

use log::{debug, info};
use ordered_float::OrderedFloat;

use crate::classifier::{Candidate, ResultReorderer, WindowResult};
use crate::config::FusionConfig;
use crate::types::{ExerciseSet, ResistanceExercise};

/// Resultatet av en fusjon. `source_windows` har ett område per oppføring i settet.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutcome {
    pub set: ExerciseSet,
    pub is_final: bool,
    pub source_windows: Vec<Range<u64>>,
}

#[derive(Debug, Clone)]
struct Tally {
    vote: f64,
    best_confidence: f64,
    /// (vindu, rang i vinduet) sist etiketten ble sett
    last_seen: (u64, Reverse<usize>),
    weight: Option<(f64, f64)>,    // (confidence, verdi)
    intensity: Option<(f64, f64)>, // (confidence, verdi)
}

impl Tally {
    fn new(seen: (u64, Reverse<usize>)) -> Self {
        Self {
            vote: 0.0,
            best_confidence: 0.0,
            last_seen: seen,
            weight: None,
            intensity: None,
        }
    }

    fn add(&mut self, c: &Candidate, seen: (u64, Reverse<usize>)) {
        self.vote += c.confidence;
        self.best_confidence = self.best_confidence.max(c.confidence);
        self.last_seen = seen;
        keep_best(&mut self.weight, c.weight, c.confidence);
        keep_best(&mut self.intensity, c.intensity, c.confidence);
    }
}

/// Beholder verdien fra kandidaten med høyest confidence.
fn keep_best(slot: &mut Option<(f64, f64)>, value: Option<f64>, confidence: f64) {
    if let Some(v) = value.filter(|v| v.is_finite()) {
        match slot {
            Some((c, _)) if *c >= confidence => {}
            _ => *slot = Some((confidence, v)),
        }
    }
}

/// Rangering: stemme, deretter beste enkeltvindu, deretter sist sett.
fn rank(a: &Tally, b: &Tally, eps: f64) -> Ordering {
    if (a.vote - b.vote).abs() > eps {
        return OrderedFloat(a.vote).cmp(&OrderedFloat(b.vote));
    }
    OrderedFloat(a.best_confidence)
        .cmp(&OrderedFloat(b.best_confidence))
        .then(a.last_seen.cmp(&b.last_seen))
}

/// Sammenhengende løp av vinduer dominert av samme etikett.
#[derive(Debug, Clone)]
struct Run {
    label: String,
    /// Indekser inn i `FusionEngine::history`
    windows: Vec<usize>,
}

pub struct FusionEngine {
    config: FusionConfig,
    reorderer: ResultReorderer,
    tallies: BTreeMap<String, Tally>,
    norm: f64,
    /// Ikke-tomme vinduer i rekkefølge
    history: Vec<WindowResult>,
    first_seq: Option<u64>,
    last_seq: Option<u64>,
    abstentions: usize,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self::starting_at(config, 0)
    }

    /// Første vindu i blokken har nummer `first_seq`.
    pub fn starting_at(config: FusionConfig, first_seq: u64) -> Self {
        Self {
            config,
            reorderer: ResultReorderer::new(first_seq),
            tallies: BTreeMap::new(),
            norm: 0.0,
            history: Vec::new(),
            first_seq: None,
            last_seq: None,
            abstentions: 0,
        }
    }

    /// Antall vinduer fusjonert så langt (inkludert avståelser).
    pub fn windows_fused(&self) -> usize {
        self.history.len() + self.abstentions
    }

    pub fn abstentions(&self) -> usize {
        self.abstentions
    }

    /// Antall resultater som venter på et tidligere vindu.
    pub fn pending(&self) -> usize {
        self.reorderer.pending()
    }

    /// Tar imot et resultat; fusjonerer det og alt som nå ligger klart i rekkefølge.
    /// Returnerer antall vinduer som ble fusjonert.
    pub fn push(&mut self, result: WindowResult) -> usize {
        let ready = self.reorderer.push(result);
        let n = ready.len();
        for r in ready {
            self.apply(r);
        }
        n
    }

    fn apply(&mut self, result: WindowResult) {
        self.first_seq.get_or_insert(result.seq);
        self.last_seq = Some(result.seq);
        if result.abstained() {
            self.abstentions += 1;
            debug!("vindu {} avsto, null vekt", result.seq);
            return;
        }

        let decay = self.config.vote_decay;
        for tally in self.tallies.values_mut() {
            tally.vote *= decay;
        }
        self.norm = self.norm * decay + 1.0;

        for (rank_in_window, c) in result.candidates.iter().enumerate() {
            let seen = (result.seq, Reverse(rank_in_window));
            self.tallies
                .entry(c.label.clone())
                .or_insert_with(|| Tally::new(seen))
                .add(c, seen);
        }
        self.history.push(result);
    }

    fn leader(&self) -> Option<(&String, &Tally)> {
        let eps = self.config.tie_epsilon;
        self.tallies.iter().max_by(|a, b| rank(a.1, b.1, eps))
    }

    /// Etiketten med høyest stemme akkurat nå.
    pub fn leading_label(&self) -> Option<&str> {
        self.leader().map(|(label, _)| label.as_str())
    }

    fn whole_range(&self) -> Vec<Range<u64>> {
        match (self.first_seq, self.last_seq) {
            (Some(a), Some(b)) => vec![a..b + 1],
            _ => Vec::new(),
        }
    }

    fn single(&self, label: &str, tally: &Tally) -> ResistanceExercise {
        let confidence = if self.norm > 0.0 {
            tally.vote / self.norm
        } else {
            0.0
        };
        let mut e = ResistanceExercise::new(label).with_confidence(confidence);
        e.weight = tally.weight.map(|(_, v)| v);
        e.intensity = tally.intensity.map(|(_, v)| v);
        e
    }

    /// Foreløpig sett: bare lederen, aldri delt opp.
    pub fn snapshot(&self) -> FusionOutcome {
        let set = match self.leader() {
            Some((label, tally)) => ExerciseSet::single(self.single(label, tally)),
            None => ExerciseSet::unknown(),
        };
        FusionOutcome {
            set,
            is_final: false,
            source_windows: self.whole_range(),
        }
    }

    /// Endelig sett ved blokkslutt. Rester i reorder-bufferet fusjoneres i
    /// rekkefølge først. Repetisjonene settes på settet hvis det har én oppføring.
    pub fn finish(mut self, block_repetitions: Option<u32>) -> FusionOutcome {
        for r in self.reorderer.drain() {
            self.apply(r);
        }

        let mut outcome = match self.split_runs() {
            Some(runs) => self.multi(&runs),
            None => FusionOutcome {
                set: match self.leader() {
                    Some((label, tally)) => ExerciseSet::single(self.single(label, tally)),
                    None => ExerciseSet::unknown(),
                },
                is_final: true,
                source_windows: self.whole_range(),
            },
        };

        if let (Some(reps), [only]) = (block_repetitions, outcome.set.exercises.as_mut_slice()) {
            if !only.is_unknown() {
                only.repetitions = Some(reps);
            }
        }
        info!(
            "endelig klassifisering: {:?} (conf {:.2}, {} vinduer, {} avståelser)",
            outcome.set.labels(),
            outcome.set.confidence(),
            self.windows_fused(),
            self.abstentions
        );
        outcome
    }

    /// Andel av vinduene hver etikett topper. Runner-up-stemmer teller ikke.
    fn shares(&self) -> Vec<(String, f64)> {
        let mut tops: BTreeMap<&str, usize> = BTreeMap::new();
        for top in self.history.iter().filter_map(WindowResult::top) {
            *tops.entry(top.label.as_str()).or_default() += 1;
        }
        let total: usize = tops.values().sum();
        if total == 0 {
            return Vec::new();
        }
        let mut shares: Vec<(String, f64)> = tops
            .into_iter()
            .map(|(l, n)| (l.to_string(), n as f64 / total as f64))
            .collect();
        shares.sort_by_key(|(_, s)| Reverse(OrderedFloat(*s)));
        shares
    }

    /// Løpene for et dropsett/supersett, eller `None` når én etikett skal brukes.
    fn split_runs(&self) -> Option<Vec<Run>> {
        let shares = self.shares();
        let significant: Vec<&str> = shares
            .iter()
            .filter(|(_, s)| *s >= self.config.significant_share)
            .map(|(l, _)| l.as_str())
            .collect();
        if significant.len() < 2 {
            return None;
        }
        let margin = shares[0].1 - shares[1].1;
        if margin >= self.config.min_margin {
            return None;
        }

        let mut runs: Vec<Run> = Vec::new();
        for (i, w) in self.history.iter().enumerate() {
            let Some(top) = w.top() else { continue };
            match runs.last_mut() {
                Some(run) if run.label == top.label => run.windows.push(i),
                _ => runs.push(Run {
                    label: top.label.clone(),
                    windows: vec![i],
                }),
            }
        }

        let weak = |run: &Run| {
            run.windows.len() < self.config.min_run_windows
                || !significant.contains(&run.label.as_str())
        };
        while runs.len() > 1 {
            let Some(idx) = runs.iter().position(weak) else {
                break;
            };
            let absorbed = runs.remove(idx);
            if idx > 0 {
                runs[idx - 1].windows.extend(absorbed.windows);
            } else {
                let mut windows = absorbed.windows;
                windows.append(&mut runs[0].windows);
                runs[0].windows = windows;
            }
            coalesce(&mut runs);
        }

        let n = runs.len();
        if n >= 2 && n <= self.config.max_set_entries {
            debug!(
                "dropsett: {:?}",
                runs.iter().map(|r| r.label.as_str()).collect::<Vec<_>>()
            );
            Some(runs)
        } else {
            None
        }
    }

    fn multi(&self, runs: &[Run]) -> FusionOutcome {
        let mut exercises = Vec::with_capacity(runs.len());
        let mut source_windows = Vec::with_capacity(runs.len());
        for run in runs {
            let mut sum = 0.0;
            let mut weight = None;
            let mut intensity = None;
            for &i in &run.windows {
                let Some(c) = self.history[i]
                    .candidates
                    .iter()
                    .find(|c| c.label == run.label)
                else {
                    continue;
                };
                sum += c.confidence;
                keep_best(&mut weight, c.weight, c.confidence);
                keep_best(&mut intensity, c.intensity, c.confidence);
            }
            let mut e = ResistanceExercise::new(run.label.clone())
                .with_confidence(sum / run.windows.len() as f64);
            e.weight = weight.map(|(_, v)| v);
            e.intensity = intensity.map(|(_, v)| v);
            exercises.push(e);

            let first = run.windows.first().map(|&i| self.history[i].seq);
            let last = run.windows.last().map(|&i| self.history[i].seq);
            if let (Some(a), Some(b)) = (first, last) {
                source_windows.push(a..b + 1);
            }
        }
        FusionOutcome {
            set: ExerciseSet { exercises },
            is_final: true,
            source_windows,
        }
    }
}

/// Slår sammen nabolløp med samme etikett.
fn coalesce(runs: &mut Vec<Run>) {
    let mut out: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        match out.last_mut() {
            Some(prev) if prev.label == run.label => prev.windows.extend(run.windows),
            _ => out.push(run),
        }
    }
    *runs = out;
}

/// Fusjonerer en hel blokk på én gang (endelig resultat, uten repetisjoner).
pub fn fuse(config: &FusionConfig, results: impl IntoIterator<Item = WindowResult>) -> FusionOutcome {
    let mut results: Vec<WindowResult> = results.into_iter().collect();
    results.sort_by_key(|r| r.seq);
    let first = results.first().map_or(0, |r| r.seq);
    let mut engine = FusionEngine::starting_at(config.clone(), first);
    for r in results {
        engine.push(r);
    }
    engine.finish(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(label: &str, windows: &[usize]) -> Run {
        Run {
            label: label.to_string(),
            windows: windows.to_vec(),
        }
    }

    #[test]
    fn coalesce_merges_neighbours() {
        let mut runs = vec![run("a", &[0]), run("a", &[1, 2]), run("b", &[3]), run("a", &[4])];
        coalesce(&mut runs);
        let labels: Vec<&str> = runs.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "a"]);
        assert_eq!(runs[0].windows, vec![0, 1, 2]);
    }

    #[test]
    fn keep_best_prefers_higher_confidence() {
        let mut slot = None;
        keep_best(&mut slot, Some(60.0), 0.5);
        keep_best(&mut slot, Some(80.0), 0.4);
        keep_best(&mut slot, None, 0.9);
        assert_eq!(slot, Some((0.5, 60.0)));
        keep_best(&mut slot, Some(70.0), 0.7);
        assert_eq!(slot, Some((0.7, 70.0)));
    }
}
