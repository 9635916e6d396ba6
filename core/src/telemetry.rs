//! Prometheus-tellere for pipelinen. Egen registry, så vertsprosessen
//! kan velge om den vil eksponere dem.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub samples_ingested: IntCounter,
    pub windows_segmented: IntCounter,
    pub windows_classified: IntCounter,
    pub classifier_abstentions: IntCounter,
    pub exercise_blocks: IntCounter,
    pub final_classifications: IntCounter,
    pub plan_submissions: IntCounter,
    pub plan_deviations: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("liftgraph".to_string()), None)?;
        Ok(Self {
            samples_ingested: counter(&registry, "samples_ingested_total", "Sensor samples pushed into the pipeline")?,
            windows_segmented: counter(&registry, "windows_segmented_total", "Full windows evaluated by the motion segmenter")?,
            windows_classified: counter(&registry, "windows_classified_total", "Windows sent to the classifier")?,
            classifier_abstentions: counter(&registry, "classifier_abstentions_total", "Windows where the classifier returned no candidates")?,
            exercise_blocks: counter(&registry, "exercise_blocks_total", "Exercise blocks opened by the segmenter")?,
            final_classifications: counter(&registry, "final_classifications_total", "Final exercise sets produced at block end")?,
            plan_submissions: counter(&registry, "plan_submissions_total", "Items submitted to the exercise plan")?,
            plan_deviations: counter(&registry, "plan_deviations_total", "Plan submissions recorded as deviations")?,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Tekstformat for scraping.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// Navnene er konstante; feiler bare ved programmeringsfeil.
pub static METRICS: Lazy<Metrics> =
    Lazy::new(|| Metrics::new().expect("static metric names are valid"));

pub fn render() -> Result<String, prometheus::Error> {
    METRICS.render()
}
