use std::cell::RefCell;
use std::sync::mpsc;

use liftgraph_core::{
    classify_windows_parallel, Candidate, Classifier, ClassifierAdapter, Event, ExercisePipeline,
    ExercisePlan, Location, MovementState, PipelineConfig, PlanItem, PlanReport, ResistanceExercise,
    Rest, Sample, Vec3, Window,
};

const HZ: f64 = 50.0;

/// Skriptet modell: etikett etter når vinduet starter.
struct Scripted {
    switch_at: f64,
    before: &'static str,
    after: &'static str,
    hints: RefCell<Vec<Option<u32>>>,
}

impl Scripted {
    fn new(switch_at: f64, before: &'static str, after: &'static str) -> Self {
        Self {
            switch_at,
            before,
            after,
            hints: RefCell::new(Vec::new()),
        }
    }
}

impl Classifier for Scripted {
    fn classify(&self, window: &Window, repetition_hint: Option<u32>) -> Vec<Candidate> {
        self.hints.borrow_mut().push(repetition_hint);
        let label = if window.start() < self.switch_at {
            self.before
        } else {
            self.after
        };
        vec![Candidate::new(label, 0.9), Candidate::new("other", 0.05)]
    }
}

struct Silent;

impl Classifier for Silent {
    fn classify(&self, _window: &Window, _hint: Option<u32>) -> Vec<Candidate> {
        Vec::new()
    }
}

fn sine(i: usize) -> f64 {
    3.0 * (2.0 * std::f64::consts::PI * i as f64 / HZ).sin()
}

/// Sinus i `active` (sample-områder), ellers stillstand.
fn session(total: usize, active: &[(usize, usize)]) -> Vec<Sample> {
    (0..total)
        .map(|i| {
            let on = active.iter().any(|&(a, b)| i >= a && i < b);
            let x = if on { sine(i) } else { 0.0 };
            Sample::accel(i as f64 / HZ, Location::RightWrist, Vec3::new(x, 0.0, 9.81))
        })
        .collect()
}

fn final_sets(events: &[Event]) -> Vec<Vec<String>> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ClassificationFinal { set, .. } => {
                Some(set.labels().iter().map(|l| l.to_string()).collect())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn single_block_is_classified_and_counted() {
    let mut pipe =
        ExercisePipeline::new(PipelineConfig::default(), Scripted::new(1e9, "squat", "-"), Vec::new())
            .unwrap();
    for s in session(750, &[(0, 500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();

    let events = pipe.sink().clone();
    assert_eq!(final_sets(&events), vec![vec!["squat".to_string()]]);

    let started = events
        .iter()
        .position(|e| matches!(e, Event::ExerciseBlockStarted { .. }))
        .expect("blokkstart");
    let ended = events
        .iter()
        .position(|e| matches!(e, Event::ExerciseBlockEnded { .. }))
        .expect("blokkslutt");
    let provisional = events
        .iter()
        .position(|e| matches!(e, Event::ClassificationProvisional { .. }))
        .expect("foreløpig klassifisering");
    assert!(started < provisional && provisional < ended);

    let exercise = events
        .iter()
        .find_map(|e| match e {
            Event::ClassificationFinal { set, .. } => Some(set.exercises[0].clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(exercise.repetitions, Some(8));
    assert!(exercise.duration_secs.unwrap() > 8.0);

    // repetisjonstall rapporteres stigende
    let counts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::RepetitionsEstimated { count, .. } => Some(*count),
            _ => None,
        })
        .collect();
    assert!(!counts.is_empty());
    assert!(counts.windows(2).all(|w| w[0] < w[1]));

    assert!(events.iter().any(|e| matches!(
        e,
        Event::MovementChanged {
            to: MovementState::Exercising,
            ..
        }
    )));
    assert_eq!(pipe.plan().completed().len(), 1);
    assert_eq!(pipe.movement_state(Location::RightWrist), MovementState::NotMoving);
}

#[test]
fn two_blocks_follow_the_plan_with_observed_rest() {
    let plan = ExercisePlan::with_default_rest(
        vec![ResistanceExercise::new("squat"), ResistanceExercise::new("bench")],
        Some(60.0),
    )
    .unwrap();
    let mut pipe = ExercisePipeline::new(
        PipelineConfig::default(),
        Scripted::new(16.0, "squat", "bench"),
        Vec::new(),
    )
    .unwrap()
    .with_plan(plan);

    for s in session(1750, &[(0, 500), (1000, 1500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();

    let (plan, events) = pipe.into_parts();
    assert_eq!(
        final_sets(&events),
        vec![vec!["squat".to_string()], vec!["bench".to_string()]]
    );
    assert!(plan.deviations().is_empty(), "avvik: {:?}", plan.deviations());
    assert_eq!(plan.progress(), 1.0);

    let changes = events
        .iter()
        .filter(|e| matches!(e, Event::PlanItemChanged { .. }))
        .count();
    assert_eq!(changes, 3, "øvelse, pause, øvelse");
    let first = events
        .iter()
        .find_map(|e| match e {
            Event::PlanItemChanged { current, previous } => Some((current.clone(), previous.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(first.1, Some(PlanItem::Exercise(ResistanceExercise::new("squat"))));
    assert_eq!(first.0, Some(PlanItem::Rest(Rest::for_secs(60.0))));

    let report = PlanReport::from_plan(&plan);
    assert_eq!(report.exercises_done(), 2);
}

#[test]
fn wrong_exercise_in_pipeline_becomes_deviation() {
    let plan = ExercisePlan::with_default_rest(vec![ResistanceExercise::new("deadlift")], None).unwrap();
    let mut pipe = ExercisePipeline::new(
        PipelineConfig::default(),
        Scripted::new(1e9, "squat", "-"),
        Vec::new(),
    )
    .unwrap()
    .with_plan(plan);
    for s in session(750, &[(0, 500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();
    assert_eq!(pipe.plan().deviations().len(), 1);
    assert_eq!(pipe.plan().progress(), 1.0);
}

fn plan_changes(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::PlanItemChanged { .. }))
        .count()
}

#[test]
fn plan_change_only_when_plan_moves() {
    // planen har én øvelse; resten av økten er forbi slutten
    let plan = ExercisePlan::with_default_rest(vec![ResistanceExercise::new("squat")], None).unwrap();
    let mut pipe = ExercisePipeline::new(
        PipelineConfig::default(),
        Scripted::new(1e9, "squat", "-"),
        Vec::new(),
    )
    .unwrap()
    .with_plan(plan);
    for s in session(1750, &[(0, 500), (1000, 1500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();
    assert_eq!(final_sets(pipe.sink()).len(), 2);
    assert_eq!(plan_changes(pipe.sink()), 1);
    assert_eq!(pipe.plan().completed().len(), 3, "øvelse, pause, øvelse");

    // ad-hoc har ingen foreskrevet rekkefølge å flytte
    let mut pipe =
        ExercisePipeline::new(PipelineConfig::default(), Scripted::new(1e9, "squat", "-"), Vec::new())
            .unwrap();
    for s in session(750, &[(0, 500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();
    assert_eq!(pipe.plan().completed().len(), 1);
    assert_eq!(plan_changes(pipe.sink()), 0);
}

#[test]
fn silent_classifier_gives_unknown_and_skips_plan() {
    let mut pipe = ExercisePipeline::new(PipelineConfig::default(), Silent, Vec::new()).unwrap();
    for s in session(750, &[(0, 500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();

    let set = pipe
        .sink()
        .iter()
        .find_map(|e| match e {
            Event::ClassificationFinal { set, .. } => Some(set.clone()),
            _ => None,
        })
        .expect("endelig resultat også når modellen avstår");
    assert!(set.is_unknown());
    assert_eq!(set.confidence(), 0.0);
    assert!(pipe.plan().completed().is_empty());
    assert!(!pipe
        .sink()
        .iter()
        .any(|e| matches!(e, Event::ClassificationProvisional { .. })));
}

#[test]
fn repetition_hint_reaches_classifier() {
    let classifier = Scripted::new(1e9, "squat", "-");
    let mut pipe =
        ExercisePipeline::new(PipelineConfig::default(), &classifier, Vec::new()).unwrap();
    for s in session(750, &[(0, 500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();
    drop(pipe);

    let hints = classifier.hints.borrow();
    assert!(hints.len() > 10);
    assert_eq!(hints[0], None);
    assert!(hints.iter().any(|h| matches!(h, Some(n) if *n > 0)));
}

#[test]
fn events_can_go_through_a_channel() {
    let (tx, rx) = mpsc::channel();
    let mut pipe =
        ExercisePipeline::new(PipelineConfig::default(), Scripted::new(1e9, "row", "-"), tx).unwrap();
    for s in session(750, &[(0, 500)]) {
        pipe.push_sample(s);
    }
    pipe.finish();
    drop(pipe);

    let events: Vec<Event> = rx.iter().collect();
    assert_eq!(final_sets(&events), vec![vec!["row".to_string()]]);
}

#[test]
fn invalid_config_is_rejected() {
    let mut cfg = PipelineConfig::default();
    cfg.fusion.vote_decay = 0.0;
    assert!(ExercisePipeline::new(cfg, Silent, Vec::new()).is_err());
}

/// Trådsikker modell for parallell klassifisering.
struct ByMean;

impl Classifier for ByMean {
    fn classify(&self, window: &Window, _hint: Option<u32>) -> Vec<Candidate> {
        let x = window.axis(liftgraph_core::Axis::X);
        let mean = x.iter().sum::<f64>() / x.len().max(1) as f64;
        vec![Candidate::new(format!("w{}", window.seq), 0.5 + mean.abs().min(0.5))]
    }
}

#[test]
fn parallel_classification_keeps_window_order() {
    let samples = session(600, &[(0, 600)]);
    let windows: Vec<(u64, Window)> = samples
        .chunks(50)
        .enumerate()
        .map(|(i, c)| (i as u64, Window::new(i as u64, Location::RightWrist, c.to_vec())))
        .collect();
    let adapter = ClassifierAdapter::new(ByMean);
    let results = classify_windows_parallel(&adapter, &windows, 4);
    assert_eq!(results.len(), windows.len());
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.seq, i as u64);
        assert_eq!(r.candidates[0].label, format!("w{i}"));
    }
}
