//! Hele kjeden: samples → segmentering → klassifisering + repetisjoner →
//! fusjon → plan. Synkron; alt skjer på tråden som leverer samplene.

use std::collections::BTreeMap;
use std::ops::Range;

use log::{debug, info, warn};

use crate::buffer::Window;
use crate::classifier::{Classifier, ClassifierAdapter};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::fusion::FusionEngine;
use crate::plan::ExercisePlan;
use crate::repetitions::RepetitionEstimator;
use crate::segmenter::{MotionSegmenter, MovementState, SegmentEvent};
use crate::telemetry::METRICS;
use crate::types::{ExerciseSet, Location, PlanItem, Sample};

/// Åpen øvelsesblokk for én plassering.
struct OpenBlock {
    started_at: f64,
    samples: Vec<Sample>,
    /// Start (sample-indeks) for neste klassifiseringsvindu
    next_window_start: usize,
    next_seq: u64,
    fusion: FusionEngine,
    repetitions: u32,
    provisional: Vec<String>,
}

pub struct ExercisePipeline<C, S> {
    config: PipelineConfig,
    segmenter: MotionSegmenter,
    adapter: ClassifierAdapter<C>,
    estimator: RepetitionEstimator,
    plan: ExercisePlan,
    sink: S,
    blocks: BTreeMap<Location, OpenBlock>,
    exercised_since_rest: bool,
}

impl<C: Classifier, S: EventSink> ExercisePipeline<C, S> {
    /// Ny pipeline med ad-hoc plan. Feiler på ugyldig konfigurasjon.
    pub fn new(config: PipelineConfig, classifier: C, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter: MotionSegmenter::new(config.segmenter.clone(), config.sample_rate_hz),
            adapter: ClassifierAdapter::new(classifier),
            estimator: RepetitionEstimator::new(config.repetitions.clone()),
            plan: ExercisePlan::ad_hoc(),
            sink,
            blocks: BTreeMap::new(),
            exercised_since_rest: false,
            config,
        })
    }

    pub fn with_plan(mut self, plan: ExercisePlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn plan(&self) -> &ExercisePlan {
        &self.plan
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_parts(self) -> (ExercisePlan, S) {
        (self.plan, self.sink)
    }

    pub fn movement_state(&self, location: Location) -> MovementState {
        self.segmenter.state(location)
    }

    pub fn is_exercising(&self, location: Location) -> bool {
        self.blocks.contains_key(&location)
    }

    /// Tar imot ett fused sample (plassering fra samplet selv).
    pub fn push_sample(&mut self, sample: Sample) {
        METRICS.samples_ingested.inc();
        let location = sample.location;

        let appended = match self.blocks.get_mut(&location) {
            Some(block) if sample.acceleration().is_some() => {
                block.samples.push(sample.clone());
                true
            }
            _ => false,
        };
        if appended {
            self.advance_block(location);
        }

        for event in self.segmenter.push_sample(sample, location) {
            self.handle(event);
        }
    }

    /// Slutt på økten: lukker åpne blokker.
    pub fn finish(&mut self) {
        for event in self.segmenter.finish() {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: SegmentEvent) {
        match event {
            SegmentEvent::StateChanged {
                location,
                from,
                to,
                at,
            } => self.sink.emit(Event::MovementChanged {
                location,
                from,
                to,
                at,
            }),
            SegmentEvent::BlockStarted {
                location,
                at,
                window,
            } => self.open_block(location, at, window),
            SegmentEvent::BlockEnded { location, at } => self.close_block(location, at),
        }
    }

    fn open_block(&mut self, location: Location, at: f64, window: Window) {
        if self.config.submit_rest_between_blocks && self.exercised_since_rest {
            self.submit(PlanItem::Rest(Default::default()));
            self.exercised_since_rest = false;
        }
        METRICS.exercise_blocks.inc();
        self.sink.emit(Event::ExerciseBlockStarted { location, at });

        let started_at = window.start();
        self.blocks.insert(
            location,
            OpenBlock {
                started_at,
                samples: window.samples,
                next_window_start: 0,
                next_seq: 0,
                fusion: FusionEngine::new(self.config.fusion.clone()),
                repetitions: 0,
                provisional: Vec::new(),
            },
        );
        self.advance_block(location);
    }

    /// Klassifiserer alle hele vinduer som er klare i blokken.
    fn advance_block(&mut self, location: Location) {
        let size = self.config.classifier_window.size;
        let step = self.config.classifier_window.step;
        let Some(block) = self.blocks.get_mut(&location) else {
            return;
        };

        let mut cut = 0;
        while block.next_window_start + size <= block.samples.len() {
            let start = block.next_window_start;
            let window = Window::new(
                block.next_seq,
                location,
                block.samples[start..start + size].to_vec(),
            );
            let hint = (block.repetitions > 0).then_some(block.repetitions);
            let result = self.adapter.classify(window.seq, &window, hint);
            block.fusion.push(result);
            block.next_window_start += step;
            block.next_seq += 1;
            cut += 1;
        }
        if cut == 0 {
            return;
        }

        let count = self.estimator.estimate(&block.samples);
        if count > block.repetitions {
            block.repetitions = count;
            self.sink.emit(Event::RepetitionsEstimated { location, count });
        }

        let snapshot = block.fusion.snapshot();
        let labels: Vec<String> = snapshot.set.labels().iter().map(|l| l.to_string()).collect();
        if labels != block.provisional && !snapshot.set.is_unknown() {
            debug!("foreløpig {:?}: {:?}", location, labels);
            block.provisional = labels;
            self.sink.emit(Event::ClassificationProvisional {
                location,
                set: snapshot.set,
            });
        }
    }

    fn close_block(&mut self, location: Location, at: f64) {
        self.sink.emit(Event::ExerciseBlockEnded { location, at });
        let Some(block) = self.blocks.remove(&location) else {
            warn!("blokkslutt uten åpen blokk ({location:?})");
            return;
        };

        let mut outcome = block.fusion.finish(None);
        self.attach_estimates(&mut outcome.set, &outcome.source_windows, &block.samples);
        METRICS.final_classifications.inc();
        info!(
            "{:?}: {:?} på {:.1}s",
            location,
            outcome.set.labels(),
            at - block.started_at
        );

        let set = outcome.set;
        self.sink.emit(Event::ClassificationFinal {
            location,
            set: set.clone(),
            source_windows: outcome.source_windows,
        });

        if set.is_unknown() {
            warn!("ukjent øvelse ({location:?}), sendes ikke til planen");
            return;
        }
        for exercise in set.exercises {
            self.submit(PlanItem::Exercise(exercise));
        }
        self.exercised_since_rest = true;
    }

    /// Repetisjoner og varighet per oppføring, fra samplene oppføringen dekker.
    fn attach_estimates(&self, set: &mut ExerciseSet, ranges: &[Range<u64>], samples: &[Sample]) {
        if set.is_unknown() {
            return;
        }
        let size = self.config.classifier_window.size;
        let step = self.config.classifier_window.step;
        let single = set.exercises.len() == 1;

        for (i, exercise) in set.exercises.iter_mut().enumerate() {
            let slice = if single {
                samples
            } else {
                let Some(range) = ranges.get(i) else { continue };
                let from = (range.start as usize * step).min(samples.len());
                let to = (range.end.saturating_sub(1) as usize * step + size).min(samples.len());
                &samples[from..to.max(from)]
            };
            exercise.repetitions = Some(self.estimator.estimate(slice));
            if let (Some(first), Some(last)) = (slice.first(), slice.last()) {
                exercise.duration_secs = Some(last.t - first.t);
            }
        }
    }

    /// Sender inn til planen. `PlanItemChanged` bare når planen flyttet seg.
    fn submit(&mut self, actual: PlanItem) {
        let cursor = self.plan.cursor();
        let previous = self.plan.current().cloned();
        self.plan.submit(actual);
        if self.plan.cursor() != cursor {
            self.sink.emit(Event::PlanItemChanged {
                current: self.plan.current().cloned(),
                previous,
            });
        }
    }
}
