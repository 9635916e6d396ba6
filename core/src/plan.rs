//! Treningsplan: forventet rekkefølge av øvelser og pauser, og avstemming
//! mot det som faktisk ble gjort.
//!
//! Planen går alltid ett steg fram per innsending. Avvik blokkerer ikke;
//! de logges som `Deviation` og planen fortsetter.

use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::telemetry::METRICS;
use crate::transitions::TransitionModel;
use crate::types::{Deviation, PlanItem, ResistanceExercise, Rest};

/// Ett element i en lagret plan-definisjon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub exercise: String,
    #[serde(default)]
    pub repetitions: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub intensity: Option<f64>,
    /// Pause etter denne øvelsen; overstyrer `default_rest_secs`
    #[serde(default)]
    pub rest: Option<Rest>,
}

impl PlanEntry {
    fn to_exercise(&self) -> ResistanceExercise {
        ResistanceExercise {
            repetitions: self.repetitions,
            weight: self.weight,
            intensity: self.intensity,
            ..ResistanceExercise::new(self.exercise.clone())
        }
    }
}

/// Plan slik den lagres som JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDefinition {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_rest_secs: Option<f64>,
    pub items: Vec<PlanEntry>,
}

/// Leser en plan-definisjon fra JSON på disk.
pub fn load_plan_definition(path: &str) -> Result<PlanDefinition> {
    if !Path::new(path).exists() {
        return Err(Error::Io {
            path: path.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "plan definition not found"),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_string(),
        source,
    })?;
    parse_plan_definition(&contents).map_err(|e| match e {
        Error::Json { message, .. } => Error::Json {
            path: path.to_string(),
            message,
        },
        other => other,
    })
}

/// Parser en plan-definisjon fra en JSON-streng.
pub fn parse_plan_definition(json: &str) -> Result<PlanDefinition> {
    let de = &mut serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(de).map_err(|e| Error::Json {
        path: "<inline>".to_string(),
        message: format!("{} (at {})", e.inner(), e.path()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePlan {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    items: Vec<PlanItem>,
    cursor: usize,
    completed: Vec<PlanItem>,
    deviations: Vec<Deviation>,
    ad_hoc: bool,
    /// Øvelses-id-er i innsendingsrekkefølge
    #[serde(default)]
    history: Vec<String>,
    #[serde(default)]
    transitions: TransitionModel,
}

impl ExercisePlan {
    /// Fri trening: ingen foreskrevet rekkefølge, aldri avvik.
    pub fn ad_hoc() -> Self {
        Self {
            id: None,
            name: None,
            items: Vec::new(),
            cursor: 0,
            completed: Vec::new(),
            deviations: Vec::new(),
            ad_hoc: true,
            history: Vec::new(),
            transitions: TransitionModel::new(),
        }
    }

    /// Plan fra ferdige elementer. Tom liste er en konfigurasjonsfeil.
    pub fn from_items(items: Vec<PlanItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::EmptyPlan);
        }
        Ok(Self {
            items,
            ad_hoc: false,
            ..Self::ad_hoc()
        })
    }

    /// Plan fra øvelser, med pause på `default_rest_secs` mellom hver øvelse
    /// (ingen pause etter siste).
    pub fn with_default_rest(
        exercises: Vec<ResistanceExercise>,
        default_rest_secs: Option<f64>,
    ) -> Result<Self> {
        let rest = default_rest_secs.map(Rest::for_secs);
        Self::with_rests(exercises.into_iter().map(|e| (e, rest)).collect())
    }

    /// Plan fra øvelser med egen pause etter hver. Pausen etter siste øvelse ignoreres.
    pub fn with_rests(exercises: Vec<(ResistanceExercise, Option<Rest>)>) -> Result<Self> {
        let n = exercises.len();
        let mut items = Vec::with_capacity(n * 2);
        for (i, (exercise, rest)) in exercises.into_iter().enumerate() {
            items.push(PlanItem::Exercise(exercise));
            if let Some(rest) = rest.filter(|_| i + 1 < n) {
                items.push(PlanItem::Rest(rest));
            }
        }
        Self::from_items(items)
    }

    pub fn from_definition(def: &PlanDefinition) -> Result<Self> {
        let default_rest = def.default_rest_secs.map(Rest::for_secs);
        let exercises = def
            .items
            .iter()
            .map(|entry| (entry.to_exercise(), entry.rest.or(default_rest)))
            .collect();
        let mut plan = Self::with_rests(exercises)?;
        plan.id = def.id.clone();
        plan.name = def.name.clone();
        Ok(plan)
    }

    /// Starter fra en overgangsmodell lært i tidligere økter.
    pub fn with_transitions(mut self, transitions: TransitionModel) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    /// Foreslåtte neste øvelser med poeng, høyest først. Påvirker ikke `todo`.
    pub fn suggestions(&self) -> Vec<(String, f64)> {
        self.transitions.predict(&self.history)
    }

    /// Mest sannsynlige neste øvelse etter det som er gjort så langt.
    pub fn suggested_next(&self) -> Option<String> {
        self.suggestions().into_iter().next().map(|(id, _)| id)
    }

    pub fn is_ad_hoc(&self) -> bool {
        self.ad_hoc
    }

    /// Hele foreskrivningen (tom for ad-hoc).
    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Det som faktisk ble gjort, i innsendingsrekkefølge.
    pub fn completed(&self) -> &[PlanItem] {
        &self.completed
    }

    pub fn todo(&self) -> &[PlanItem] {
        &self.items[self.cursor..]
    }

    pub fn deviations(&self) -> &[Deviation] {
        &self.deviations
    }

    /// Neste forventede element (None når planen er ferdig eller ad-hoc).
    pub fn current(&self) -> Option<&PlanItem> {
        self.items.get(self.cursor)
    }

    /// Andel fullført (0–1). Tom plan regnes som ferdig.
    pub fn progress(&self) -> f64 {
        if self.items.is_empty() {
            1.0
        } else {
            self.cursor as f64 / self.items.len() as f64
        }
    }

    pub fn submit_exercise(&mut self, actual: ResistanceExercise) -> &[PlanItem] {
        self.submit(PlanItem::Exercise(actual))
    }

    pub fn submit_rest(&mut self) -> &[PlanItem] {
        self.submit(PlanItem::Rest(Rest::default()))
    }

    /// Sender inn et faktisk element og returnerer det som gjenstår.
    pub fn submit(&mut self, actual: PlanItem) -> &[PlanItem] {
        METRICS.plan_submissions.inc();
        if let Some(exercise) = actual.exercise() {
            self.transitions.record(&self.history, &exercise.id);
            self.history.push(exercise.id.clone());
        }

        if self.ad_hoc {
            debug!("ad-hoc: {:?}", actual);
            self.completed.push(actual);
            return self.todo();
        }

        match self.items.get(self.cursor) {
            Some(expected) if expected.matches(&actual) => {
                self.completed.push(expected.clone());
                self.cursor += 1;
            }
            Some(expected) => {
                let planned = Some(expected.clone());
                self.record_deviation(actual.clone(), planned);
                self.completed.push(actual);
                self.cursor += 1;
            }
            None => {
                self.record_deviation(actual.clone(), None);
                self.completed.push(actual);
            }
        }
        info!(
            "plan {}: {}/{} ({:.0}%), {} avvik",
            self.id.as_deref().unwrap_or("-"),
            self.cursor,
            self.items.len(),
            self.progress() * 100.0,
            self.deviations.len()
        );
        self.todo()
    }

    fn record_deviation(&mut self, actual: PlanItem, planned: Option<PlanItem>) {
        METRICS.plan_deviations.inc();
        debug!("avvik: faktisk {:?}, planlagt {:?}", actual, planned);
        self.deviations.push(Deviation { actual, planned });
    }
}
