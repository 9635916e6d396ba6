//! Overgangsmodell for øvelsesrekkefølge.
//!
//! Teller overganger fra de siste øvelsene (opptil `MAX_HISTORY`) til neste.
//! Hvert hale-utsnitt av historikken får sin egen telling, og lengre utsnitt
//! veier mer når neste øvelse foreslås.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Lengste historikk det telles overganger fra.
pub const MAX_HISTORY: usize = 3;

/// Én lagret rad: fra-utsnitt og tellinger per neste øvelse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub from: Vec<String>,
    pub next: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TransitionEntry>", into = "Vec<TransitionEntry>")]
pub struct TransitionModel {
    counts: BTreeMap<Vec<String>, BTreeMap<String, u32>>,
}

impl From<Vec<TransitionEntry>> for TransitionModel {
    fn from(entries: Vec<TransitionEntry>) -> Self {
        let mut model = Self::default();
        for entry in entries {
            let slot = model.counts.entry(entry.from).or_default();
            for (label, n) in entry.next {
                *slot.entry(label).or_default() += n;
            }
        }
        model
    }
}

impl From<TransitionModel> for Vec<TransitionEntry> {
    fn from(model: TransitionModel) -> Self {
        model
            .counts
            .into_iter()
            .map(|(from, next)| TransitionEntry { from, next })
            .collect()
    }
}

/// De siste `MAX_HISTORY` elementene, lengste utsnitt først.
fn tail_slices<'a>(history: &'a [String]) -> impl Iterator<Item = &'a [String]> + 'a {
    let start = history.len().saturating_sub(MAX_HISTORY);
    (start..history.len()).map(move |i| &history[i..])
}

impl TransitionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Registrerer at `next` fulgte etter `history`. Tom historikk gir ingen overgang.
    pub fn record(&mut self, history: &[String], next: &str) {
        for slice in tail_slices(history) {
            *self
                .counts
                .entry(slice.to_vec())
                .or_default()
                .entry(next.to_string())
                .or_default() += 1;
        }
    }

    /// Sannsynlighet for `from -> to` (0 når `from` aldri er sett).
    pub fn probability(&self, from: &[String], to: &str) -> f64 {
        let Some(next) = self.counts.get(from) else {
            return 0.0;
        };
        let total: u32 = next.values().sum();
        if total == 0 {
            return 0.0;
        }
        f64::from(next.get(to).copied().unwrap_or(0)) / f64::from(total)
    }

    /// Kandidater for neste øvelse med poeng, høyest først.
    ///
    /// Poeng = sum over hale-utsnitt av sannsynlighet × utsnittslengde.
    /// Likhet avgjøres alfabetisk.
    pub fn predict(&self, history: &[String]) -> Vec<(String, f64)> {
        let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
        for slice in tail_slices(history) {
            let Some(next) = self.counts.get(slice) else {
                continue;
            };
            let total: u32 = next.values().sum();
            if total == 0 {
                continue;
            }
            for (label, n) in next {
                let p = f64::from(*n) / f64::from(total);
                *scores.entry(label.as_str()).or_default() += p * slice.len() as f64;
            }
        }
        let mut ranked: Vec<(String, f64)> = scores
            .into_iter()
            .map(|(l, s)| (l.to_string(), s))
            .collect();
        // stabil sortering beholder alfabetisk rekkefølge ved likhet
        ranked.sort_by_key(|(_, s)| std::cmp::Reverse(OrderedFloat(*s)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn records_every_tail_slice() {
        let mut m = TransitionModel::new();
        m.record(&ids(&["curl", "extension", "raise"]), "curl");
        assert_eq!(m.probability(&ids(&["raise"]), "curl"), 1.0);
        assert_eq!(m.probability(&ids(&["extension", "raise"]), "curl"), 1.0);
        assert_eq!(m.probability(&ids(&["curl", "extension", "raise"]), "curl"), 1.0);
        assert_eq!(m.probability(&ids(&["curl"]), "raise"), 0.0);
    }

    #[test]
    fn history_is_capped() {
        let mut m = TransitionModel::new();
        m.record(&ids(&["a", "b", "c", "d"]), "e");
        assert_eq!(m.probability(&ids(&["a", "b", "c", "d"]), "e"), 0.0);
        assert_eq!(m.probability(&ids(&["b", "c", "d"]), "e"), 1.0);
    }

    #[test]
    fn empty_history_records_nothing() {
        let mut m = TransitionModel::new();
        m.record(&[], "squat");
        assert!(m.is_empty());
        assert!(m.predict(&[]).is_empty());
    }

    #[test]
    fn serializes_as_entry_list() {
        let mut m = TransitionModel::new();
        m.record(&ids(&["squat"]), "bench");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"[{"from":["squat"],"next":{"bench":1}}]"#);
        let back: TransitionModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
