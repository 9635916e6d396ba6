// Python-binding: JSON inn, JSON ut. Bygges bare med feature "python".

use anyhow::Context;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use serde::{Deserialize, Serialize};
use serde_json as json;
use serde_path_to_error as spte;

use crate::classifier::WindowResult;
use crate::config::{FusionConfig, RepetitionConfig};
use crate::fusion::fuse;
use crate::plan::{ExercisePlan, PlanDefinition};
use crate::repetitions::RepetitionEstimator;
use crate::report::PlanReport;
use crate::types::{ExerciseSet, PlanItem, Sample};

fn parse<'a, T: Deserialize<'a>>(what: &str, json_in: &'a str) -> anyhow::Result<T> {
    let mut de = json::Deserializer::from_str(json_in);
    spte::deserialize(&mut de)
        .map_err(|e| anyhow::anyhow!("parse error ({what}) at {}: {}", e.path(), e.inner()))
}

fn to_py_err(e: anyhow::Error) -> PyErr {
    PyValueError::new_err(format!("{e:#}"))
}

// ──────────────────────────────────────────────────────────────────────────────
// PLAN
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReconcileIn {
    /// Mangler = ad-hoc
    #[serde(default)]
    plan: Option<PlanDefinition>,
    submissions: Vec<PlanItem>,
}

fn reconcile(json_in: &str) -> anyhow::Result<String> {
    let input: ReconcileIn = parse("ReconcileIn", json_in)?;
    let mut plan = match &input.plan {
        Some(def) => ExercisePlan::from_definition(def).context("building plan")?,
        None => ExercisePlan::ad_hoc(),
    };
    for item in input.submissions {
        plan.submit(item);
    }
    Ok(PlanReport::from_plan(&plan).to_json()?)
}

#[pyfunction]
fn reconcile_plan_json(json_in: &str) -> PyResult<String> {
    reconcile(json_in).map_err(to_py_err)
}

// ──────────────────────────────────────────────────────────────────────────────
// FUSJON
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FuseIn {
    #[serde(default)]
    config: FusionConfig,
    windows: Vec<WindowResult>,
}

#[derive(Debug, Serialize)]
struct FuseOut {
    set: ExerciseSet,
    confidence: f64,
    source_windows: Vec<(u64, u64)>,
}

fn fuse_windows(json_in: &str) -> anyhow::Result<String> {
    let input: FuseIn = parse("FuseIn", json_in)?;
    let outcome = fuse(&input.config, input.windows);
    let out = FuseOut {
        confidence: outcome.set.confidence(),
        source_windows: outcome
            .source_windows
            .iter()
            .map(|r| (r.start, r.end))
            .collect(),
        set: outcome.set,
    };
    json::to_string(&out).context("serializing fusion result")
}

#[pyfunction]
fn fuse_windows_json(json_in: &str) -> PyResult<String> {
    fuse_windows(json_in).map_err(to_py_err)
}

// ──────────────────────────────────────────────────────────────────────────────
// REPETISJONER
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RepetitionsIn {
    #[serde(default)]
    config: RepetitionConfig,
    samples: Vec<Sample>,
}

fn repetitions(json_in: &str) -> anyhow::Result<u32> {
    let input: RepetitionsIn = parse("RepetitionsIn", json_in)?;
    Ok(RepetitionEstimator::new(input.config).estimate(&input.samples))
}

#[pyfunction]
fn estimate_repetitions_json(json_in: &str) -> PyResult<u32> {
    repetitions(json_in).map_err(to_py_err)
}

// ──────────────────────────────────────────────────────────────────────────────
// PyO3-MODUL
// ──────────────────────────────────────────────────────────────────────────────

#[pymodule]
fn liftgraph_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(reconcile_plan_json, m)?)?;
    m.add_function(wrap_pyfunction!(fuse_windows_json, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_repetitions_json, m)?)?;
    m.add_function(wrap_pyfunction!(render_metrics, m)?)?;
    Ok(())
}

#[pyfunction]
fn render_metrics() -> PyResult<String> {
    crate::telemetry::render().map_err(|e| PyValueError::new_err(e.to_string()))
}
