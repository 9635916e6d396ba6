use liftgraph_core::{fuse, Candidate, FusionConfig, FusionEngine, WindowResult};

fn w(seq: u64, candidates: &[(&str, f64)]) -> WindowResult {
    WindowResult::new(
        seq,
        candidates
            .iter()
            .map(|(l, c)| Candidate::new(*l, *c))
            .collect(),
    )
}

fn labels(outcome: &liftgraph_core::FusionOutcome) -> Vec<String> {
    outcome.set.labels().iter().map(|l| l.to_string()).collect()
}

fn sample_block() -> Vec<WindowResult> {
    vec![
        w(0, &[("squat", 0.7), ("lunge", 0.2)]),
        w(1, &[("squat", 0.8), ("deadlift", 0.1)]),
        w(2, &[]),
        w(3, &[("squat", 0.6), ("lunge", 0.3)]),
        w(4, &[("lunge", 0.5), ("squat", 0.45)]),
        w(5, &[("squat", 0.9)]),
    ]
}

#[test]
fn incremental_fusion_equals_batch() {
    let cfg = FusionConfig::default();
    let results = sample_block();
    let batch = fuse(&cfg, results.clone());

    for k in 0..=results.len() {
        let mut engine = FusionEngine::new(cfg.clone());
        for r in &results[..k] {
            engine.push(r.clone());
        }
        // foreløpig øyeblikksbilde skal ikke påvirke tilstanden
        let _ = engine.snapshot();
        for r in &results[k..] {
            engine.push(r.clone());
        }
        let incremental = engine.finish(None);
        assert_eq!(incremental, batch, "ulikt resultat ved deling etter {k} vinduer");
    }
    assert_eq!(labels(&batch), vec!["squat"]);
    assert!(batch.is_final);
    assert_eq!(batch.source_windows, vec![0..6]);
}

#[test]
fn out_of_order_results_are_fused_in_sequence() {
    let cfg = FusionConfig::default();
    let results = sample_block();
    let in_order = fuse(&cfg, results.clone());

    let mut engine = FusionEngine::new(cfg.clone());
    let order = [2usize, 0, 1, 5, 4, 3];
    let mut fused = Vec::new();
    for &i in &order {
        fused.push(engine.push(results[i].clone()));
    }
    // 2 venter på 1; 5 og 4 venter på 3
    assert_eq!(fused, vec![0, 1, 2, 0, 0, 3]);
    assert_eq!(engine.pending(), 0);
    assert_eq!(engine.finish(None), in_order);
}

#[test]
fn two_disjoint_windows_become_two_entry_set() {
    let outcome = fuse(
        &FusionConfig::default(),
        vec![w(0, &[("squat", 0.9)]), w(1, &[("lunge", 0.88)])],
    );
    assert_eq!(labels(&outcome), vec!["squat", "lunge"], "temporal rekkefølge");
    assert_eq!(outcome.source_windows, vec![0..1, 1..2]);
    let c = outcome.set.confidence();
    assert!((c - 0.88).abs() < 1e-9, "settet er aldri sikrere enn svakeste ledd: {c}");
}

#[test]
fn short_runs_are_absorbed_by_neighbour() {
    let bench = [("bench", 0.8), ("fly", 0.1)];
    let fly = [("fly", 0.8), ("bench", 0.15)];
    let mut results = vec![w(0, &bench), w(1, &bench)];
    // kort utstikker midt i benkpress-løpet
    results.push(w(2, &[("fly", 0.5), ("bench", 0.4)]));
    results.push(w(3, &bench));
    results.push(w(4, &bench));
    for seq in 5..9 {
        results.push(w(seq, &fly));
    }

    let cfg = FusionConfig {
        min_run_windows: 2,
        ..FusionConfig::default()
    };
    let outcome = fuse(&cfg, results.clone());
    assert_eq!(labels(&outcome), vec!["bench", "fly"]);
    assert_eq!(outcome.source_windows, vec![0..5, 5..9]);

    // uten absorpsjon blir utstikkeren et eget løp
    let outcome = fuse(&FusionConfig::default(), results.clone());
    assert_eq!(labels(&outcome), vec!["bench", "fly", "bench", "fly"]);

    // for mange løp: ingen ren grense, én etikett
    let cfg = FusionConfig {
        max_set_entries: 3,
        ..FusionConfig::default()
    };
    let outcome = fuse(&cfg, results);
    assert_eq!(outcome.set.exercises.len(), 1);
}

#[test]
fn clear_leader_collapses_to_one_label() {
    let mut results: Vec<WindowResult> = (0..8).map(|s| w(s, &[("row", 0.9)])).collect();
    results.push(w(8, &[("curl", 0.6)]));
    let outcome = fuse(&FusionConfig::default(), results);
    assert_eq!(labels(&outcome), vec!["row"]);
}

#[test]
fn equal_votes_prefer_highest_single_confidence() {
    let cfg = FusionConfig {
        vote_decay: 1.0,
        ..FusionConfig::default()
    };
    let mut engine = FusionEngine::new(cfg);
    engine.push(w(0, &[("press", 0.9), ("raise", 0.3)]));
    engine.push(w(1, &[("raise", 0.5), ("press", 0.3)]));
    engine.push(w(2, &[("raise", 0.4)]));
    // press 1.2, raise 1.2; press har høyest enkeltverdi
    assert_eq!(engine.leading_label(), Some("press"));
    let snap = engine.snapshot();
    assert!(!snap.is_final);
    assert_eq!(labels(&snap), vec!["press"]);
}

#[test]
fn persistent_tie_prefers_most_recent_label() {
    let cfg = FusionConfig {
        vote_decay: 1.0,
        ..FusionConfig::default()
    };
    let mut engine = FusionEngine::new(cfg);
    engine.push(w(0, &[("press", 0.5)]));
    engine.push(w(1, &[("raise", 0.5)]));
    assert_eq!(engine.leading_label(), Some("raise"));
}

#[test]
fn later_windows_count_more() {
    let mut engine = FusionEngine::new(FusionConfig {
        vote_decay: 0.5,
        ..FusionConfig::default()
    });
    engine.push(w(0, &[("a", 0.6)]));
    engine.push(w(1, &[("b", 0.5)]));
    // a: 0.3, b: 0.5
    assert_eq!(engine.leading_label(), Some("b"));
}

#[test]
fn all_abstaining_block_is_unknown() {
    let outcome = fuse(&FusionConfig::default(), vec![w(0, &[]), w(1, &[]), w(2, &[])]);
    assert!(outcome.set.is_unknown());
    assert_eq!(outcome.set.confidence(), 0.0);
    assert!(outcome.is_final);

    let empty = FusionEngine::new(FusionConfig::default()).finish(Some(4));
    assert!(empty.set.is_unknown());
}

#[test]
fn abstentions_have_zero_weight() {
    let cfg = FusionConfig::default();
    let with = fuse(&cfg, vec![w(0, &[("dip", 0.8)]), w(1, &[]), w(2, &[("dip", 0.6)])]);
    let without = fuse(&cfg, vec![w(0, &[("dip", 0.8)]), w(1, &[("dip", 0.6)])]);
    assert_eq!(with.set, without.set);
}

#[test]
fn final_attaches_repetitions_and_best_weight() {
    let mut engine = FusionEngine::new(FusionConfig::default());
    engine.push(WindowResult::new(
        0,
        vec![Candidate::new("squat", 0.6).with_weight(80.0)],
    ));
    engine.push(WindowResult::new(
        1,
        vec![Candidate::new("squat", 0.9)
            .with_weight(100.0)
            .with_intensity(0.7)],
    ));
    engine.push(WindowResult::new(
        2,
        vec![Candidate::new("squat", 0.7).with_weight(90.0)],
    ));
    let outcome = engine.finish(Some(12));
    let e = &outcome.set.exercises[0];
    assert_eq!(e.repetitions, Some(12));
    assert_eq!(e.weight, Some(100.0));
    assert_eq!(e.intensity, Some(0.7));
    assert!(e.confidence > 0.0 && e.confidence <= 1.0);
}

#[test]
fn close_runner_up_with_single_flicker_stays_one_label() {
    let mut results: Vec<WindowResult> = (0..20)
        .map(|s| w(s, &[("squat", 0.50), ("lunge", 0.45)]))
        .collect();
    results[10] = w(10, &[("lunge", 0.50), ("squat", 0.45)]);

    let outcome = fuse(&FusionConfig::default(), results);
    assert_eq!(labels(&outcome), vec!["squat"], "ett flimrevindu er ingen tidsgrense");
    assert_eq!(outcome.source_windows, vec![0..20]);
}
