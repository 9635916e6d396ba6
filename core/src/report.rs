use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plan::ExercisePlan;
use crate::types::{Deviation, PlanItem};

/// Oppsummering av en plan etter (eller under) en økt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub ad_hoc: bool,
    pub completed: Vec<PlanItem>,
    pub todo: Vec<PlanItem>,
    pub deviations: Vec<Deviation>,
    pub progress: f64, // 0–1
    #[serde(default)]
    pub current: Option<PlanItem>,
}

impl PlanReport {
    pub fn from_plan(plan: &ExercisePlan) -> Self {
        Self {
            id: plan.id.clone(),
            name: plan.name.clone(),
            ad_hoc: plan.is_ad_hoc(),
            completed: plan.completed().to_vec(),
            todo: plan.todo().to_vec(),
            deviations: plan.deviations().to_vec(),
            progress: plan.progress(),
            current: plan.current().cloned(),
        }
    }

    /// Antall fullførte øvelser (pauser ikke medregnet).
    pub fn exercises_done(&self) -> usize {
        self.completed.iter().filter(|i| !i.is_rest()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Json {
            path: "<report>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn log_summary(&self) {
        info!(
            "plan {}: {} øvelser fullført, {} igjen, {} avvik, progress {:.0}%",
            self.name.as_deref().or(self.id.as_deref()).unwrap_or("ad-hoc"),
            self.exercises_done(),
            self.todo.len(),
            self.deviations.len(),
            self.progress * 100.0
        );
    }
}
