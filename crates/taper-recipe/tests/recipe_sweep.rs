use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use num_complex::Complex64;
use pretty_assertions::assert_eq;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use taper_recipe::recipe::CandidateFailure;
use taper_recipe::report::render_report;
use taper_recipe::{
    ArtifactStore, Candidate, CrossSection, DesignIntent, LengthSweepResult,
    LengthSweepSimulation, RecipeError, RecordedSimulator, SelectionReason, SimulationError,
    SimulationRequest, SimulatorFactory, SweepOutcome, SweepSample, TaperDesignRecipe, WidthType,
};

const UM: f64 = 1e-6;

/// Records the level of every event emitted while installed.
#[derive(Clone, Default)]
struct LevelCounter(Arc<Mutex<Vec<Level>>>);

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}

impl LevelCounter {
    fn count(&self, level: Level) -> usize {
        self.0.lock().unwrap().iter().filter(|l| **l == level).count()
    }
}

/// Run `f` with a subscriber that counts events per level.
fn with_log_counter<T>(f: impl FnOnce() -> T) -> (T, LevelCounter) {
    let counter = LevelCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, counter)
}

/// Synthetic sweep: insertion loss (dB) that beats 3 dB/cm from `crossing_um`
/// onward, and a flat reflection (dB).
fn synthetic_sweep(intent: &DesignIntent, crossing_um: f64, reflection_db: f64) -> LengthSweepResult {
    let samples = intent
        .lengths()
        .into_iter()
        .map(|len_um| {
            let t_db = if len_um >= crossing_um { -1e-4 } else { -1.0 };
            SweepSample {
                length: len_um * UM,
                s11: Complex64::new(10f64.powf(reflection_db / 20.0), 0.0),
                s21: Complex64::new(10f64.powf(t_db / 20.0), 0.0),
            }
        })
        .collect();
    LengthSweepResult::new(samples)
}

enum Behaviour {
    Sweep(LengthSweepResult),
    FailBuild,
    Unavailable,
}

/// In-memory solver keyed by candidate name.
struct ScriptedSimulator {
    behaviours: HashMap<String, Behaviour>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedSimulator {
    fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn with(mut self, candidate: &Candidate, behaviour: Behaviour) -> Self {
        self.behaviours.insert(candidate.name(), behaviour);
        self
    }
}

struct FixedSweep(LengthSweepResult);

impl LengthSweepSimulation for FixedSweep {
    fn length_sweep(
        &mut self,
        _start: f64,
        _stop: f64,
        _num_pts: usize,
    ) -> Result<LengthSweepResult, SimulationError> {
        Ok(self.0.clone())
    }
}

impl SimulatorFactory for ScriptedSimulator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn build(
        &self,
        request: &SimulationRequest<'_>,
    ) -> Result<Box<dyn LengthSweepSimulation>, SimulationError> {
        let name = request.candidate.name();
        self.calls.borrow_mut().push(name.clone());
        match self.behaviours.get(&name) {
            Some(Behaviour::Sweep(sweep)) => Ok(Box::new(FixedSweep(sweep.clone()))),
            Some(Behaviour::FailBuild) | None => Err(SimulationError::Candidate {
                name,
                reason: "mode solver did not converge".into(),
            }),
            Some(Behaviour::Unavailable) => {
                Err(SimulationError::SimulatorUnavailable("license server down".into()))
            }
        }
    }
}

fn recipe() -> TaperDesignRecipe {
    TaperDesignRecipe {
        design_intent: DesignIntent {
            start_length: 1.0,
            stop_length: 100.0,
            num_pts: 100,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn four_candidates() -> Vec<Candidate> {
    let xs1 = CrossSection::strip(0.5);
    let xs2 = CrossSection::strip(3.0);
    let mut c = taper_recipe::geometry::sweep_candidates(&xs1, &xs2, 5.0);
    c.push(Candidate::new(&xs1, &CrossSection::strip(2.0), 5.0, WidthType::Linear));
    c
}

#[test]
fn one_failing_candidate_is_skipped() {
    let recipe = recipe();
    let di = &recipe.design_intent;
    let c = four_candidates();
    let sim = ScriptedSimulator::new()
        .with(&c[0], Behaviour::Sweep(synthetic_sweep(di, 40.0, -60.0)))
        .with(&c[1], Behaviour::FailBuild)
        .with(&c[2], Behaviour::Sweep(synthetic_sweep(di, 20.0, -75.0)))
        .with(&c[3], Behaviour::Sweep(synthetic_sweep(di, 30.0, -80.0)));

    let (outcome, logs) = with_log_counter(|| recipe.eval_candidates(&c, &sim));
    let design = outcome.unwrap().into_result().unwrap();

    assert_eq!(logs.count(Level::ERROR), 1);
    assert_eq!(logs.count(Level::WARN), 0);
    assert_eq!(sim.calls.borrow().len(), 4);
    assert_eq!(design.scores.len(), 3);
    assert_eq!(design.failures.len(), 1);
    assert_eq!(design.failures[0].name, c[1].name());

    // parabolic is shortest and already below -70 dB, though not the quietest
    assert_eq!(design.reason, SelectionReason::ShortestBelowLimit);
    assert_eq!(design.score.candidate, c[2]);
    assert!((design.component.length - 20.0).abs() < 1e-9);
    assert_eq!(design.component.width_type, WidthType::Parabolic);
    assert_eq!(design.length_sweep, synthetic_sweep(di, 20.0, -75.0));
}

#[test]
fn reflective_shortest_candidate_is_replaced() {
    let recipe = recipe();
    let di = &recipe.design_intent;
    let c = recipe.candidates();
    let sim = ScriptedSimulator::new()
        .with(&c[0], Behaviour::Sweep(synthetic_sweep(di, 10.0, -50.0)))
        .with(&c[1], Behaviour::Sweep(synthetic_sweep(di, 50.0, -80.0)))
        .with(&c[2], Behaviour::Sweep(synthetic_sweep(di, 30.0, -65.0)));

    let outcome = recipe.eval(&sim).unwrap();
    let design = outcome.design().unwrap();
    assert_eq!(design.reason, SelectionReason::LowestReflection);
    assert_eq!(design.component.width_type, WidthType::Linear);
    assert!((design.component.length - 50.0).abs() < 1e-9);
    assert!((design.score.point.reflection + 80.0).abs() < 1e-9);
}

#[test]
fn unattainable_loss_falls_back_to_stop_length() {
    let recipe = recipe();
    let di = &recipe.design_intent;
    let c = recipe.candidates();
    // crossing beyond the sweep: never reached
    let sim = ScriptedSimulator::new()
        .with(&c[0], Behaviour::Sweep(synthetic_sweep(di, 1e6, -90.0)))
        .with(&c[1], Behaviour::FailBuild)
        .with(&c[2], Behaviour::FailBuild);

    let (outcome, logs) = with_log_counter(|| recipe.eval(&sim));
    let design = outcome.unwrap().into_result().unwrap();
    assert_eq!(logs.count(Level::WARN), 1);
    assert_eq!(logs.count(Level::ERROR), 2);
    assert!(!design.score.reached_target);
    assert_eq!(design.component.length, di.stop_length);
    assert!(di.contains_length(design.component.length));
    assert!((design.score.point.transmission + 1.0).abs() < 1e-9);
}

#[test]
fn all_candidates_failing_is_no_viable_candidate() {
    let recipe = recipe();
    let sim = ScriptedSimulator::new();

    let (outcome, logs) = with_log_counter(|| recipe.eval(&sim));
    let outcome = outcome.unwrap();
    match &outcome {
        SweepOutcome::NoViableCandidate { failures } => assert_eq!(failures.len(), 3),
        other => panic!("expected no viable candidate, got {:?}", other),
    }
    // one per skipped candidate, plus the final summary
    assert_eq!(logs.count(Level::ERROR), 4);
    assert_eq!(logs.count(Level::WARN), 0);
    assert!(matches!(outcome.into_result(), Err(RecipeError::NoViableCandidate)));
}

#[test]
fn unavailable_simulator_aborts() {
    let recipe = recipe();
    let c = recipe.candidates();
    let sim = ScriptedSimulator::new()
        .with(&c[0], Behaviour::FailBuild)
        .with(&c[1], Behaviour::Unavailable);

    let err = recipe.eval(&sim).unwrap_err();
    assert!(matches!(
        err,
        RecipeError::Simulation(SimulationError::SimulatorUnavailable(_))
    ));
    // the sweep stops at the unavailable backend
    assert_eq!(sim.calls.borrow().len(), 2);
}

#[test]
fn invalid_intent_is_rejected_before_simulating() {
    let mut recipe = recipe();
    recipe.design_intent.num_pts = 0;
    let sim = ScriptedSimulator::new();
    assert!(matches!(recipe.eval(&sim), Err(RecipeError::InvalidIntent(_))));
    assert!(sim.calls.borrow().is_empty());
}

#[test]
fn cached_results_are_reused_until_config_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let mut recipe = recipe();
    recipe.dirpath = tmp.path().to_path_buf();
    let di = recipe.design_intent.clone();
    let c = recipe.candidates();

    let recorder = RecordedSimulator::new(tmp.path().join("sweeps"));
    recorder.record(&c[0], &synthetic_sweep(&di, 25.0, -72.0)).unwrap();
    recorder.record(&c[1], &synthetic_sweep(&di, 35.0, -85.0)).unwrap();
    // no recording for c[2]: skipped as a failed candidate

    let store = ArtifactStore::in_dir(tmp.path());
    let (first, ran) = recipe.eval_cached(&recorder, &store, false).unwrap();
    assert!(ran);
    assert_eq!(
        first.design.failures,
        vec![CandidateFailure {
            name: c[2].name(),
            reason: first.design.failures[0].reason.clone(),
        }]
    );
    assert_eq!(first.design.component.width_type, WidthType::Sine);
    assert_eq!(first.design.reason, SelectionReason::ShortestBelowLimit);
    let report = render_report(&recipe, &first.design).unwrap();
    assert!(report.contains("shortest taper, reflecting below -70 dB"));
    assert!(store.is_fresh(&recipe.fingerprint().unwrap()).unwrap());

    let (second, ran) = recipe.eval_cached(&recorder, &store, false).unwrap();
    assert!(!ran);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.design.component.name(), first.design.component.name());

    let (_, ran) = recipe.eval_cached(&recorder, &store, true).unwrap();
    assert!(ran);

    recipe.design_intent.max_reflection = -90.0;
    assert!(!store.is_fresh(&recipe.fingerprint().unwrap()).unwrap());
    let (third, ran) = recipe.eval_cached(&recorder, &store, false).unwrap();
    assert!(ran);
    // sine is shortest but above -90 dB; linear reflects least
    assert_eq!(third.design.component.width_type, WidthType::Linear);
    assert_eq!(third.design.reason, SelectionReason::LowestReflection);
}

#[test]
fn report_lists_candidates_and_failures() {
    let recipe = recipe();
    let di = &recipe.design_intent;
    let c = recipe.candidates();
    let sim = ScriptedSimulator::new()
        .with(&c[0], Behaviour::Sweep(synthetic_sweep(di, 10.0, -75.0)))
        .with(&c[2], Behaviour::Sweep(synthetic_sweep(di, 30.0, -65.0)));

    let design = recipe.eval(&sim).unwrap().into_result().unwrap();
    let report = render_report(&recipe, &design).unwrap();

    assert!(report.contains(&c[0].name()));
    assert!(report.contains(&c[2].name()));
    assert!(report.contains("Failed candidates"));
    assert!(report.contains(&c[1].name()));
    assert!(report.contains(&format!("Selected: {}", design.component.name())));
    assert!(report.contains(&design.fingerprint.to_hex()));

    // sine is both the shortest and the least reflective
    assert_eq!(design.reason, SelectionReason::ShortestAndQuietest);
    assert!(report.contains("shortest taper, also the least reflective"));
    assert!(!report.contains("reflecting below"));
}

#[test]
fn perfectly_matched_taper_survives_the_artifact_store() {
    let tmp = tempfile::tempdir().unwrap();
    let mut recipe = recipe();
    recipe.dirpath = tmp.path().to_path_buf();
    let di = recipe.design_intent.clone();
    let c = recipe.candidates();

    // |s11| = 0 everywhere: reflection is -inf dB
    let mut matched = synthetic_sweep(&di, 20.0, -60.0);
    for sample in &mut matched.samples {
        sample.s11 = Complex64::new(0.0, 0.0);
    }
    let recorder = RecordedSimulator::new(tmp.path().join("sweeps"));
    recorder.record(&c[0], &matched).unwrap();
    recorder.record(&c[1], &synthetic_sweep(&di, 40.0, -80.0)).unwrap();
    recorder.record(&c[2], &synthetic_sweep(&di, 60.0, -75.0)).unwrap();

    let store = ArtifactStore::in_dir(tmp.path());
    let (first, ran) = recipe.eval_cached(&recorder, &store, false).unwrap();
    assert!(ran);
    assert_eq!(first.design.score.point.reflection, f64::NEG_INFINITY);
    assert_eq!(first.design.reason, SelectionReason::ShortestAndQuietest);

    let (second, ran) = recipe.eval_cached(&recorder, &store, false).unwrap();
    assert!(!ran);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(second.design.score.point.reflection, f64::NEG_INFINITY);
    assert_eq!(second.design.component.name(), first.design.component.name());
    assert_eq!(second.design.scores.len(), 3);
}

#[test]
fn samples_outside_the_declared_range_are_ignored() {
    let recipe = recipe();
    let di = &recipe.design_intent;
    let c = recipe.candidates();

    let mut sweep = synthetic_sweep(di, 30.0, -75.0);
    let lossless = Complex64::new(1.0, 0.0);
    let quiet = Complex64::new(1e-5, 0.0);
    let outside = |len_um: f64| SweepSample {
        length: len_um * UM,
        s11: quiet,
        s21: lossless,
    };
    sweep.samples.insert(0, outside(0.1));
    sweep.samples.push(outside(500.0));

    let sim = ScriptedSimulator::new().with(&c[0], Behaviour::Sweep(sweep));
    let design = recipe
        .eval_candidates(&c[..1], &sim)
        .unwrap()
        .into_result()
        .unwrap();

    assert!(di.contains_length(design.component.length));
    assert!((design.component.length - 30.0).abs() < 1e-9);
    assert_eq!(design.length_sweep, synthetic_sweep(di, 30.0, -75.0));
}

#[test]
fn unordered_sweep_is_a_failed_candidate() {
    let recipe = recipe();
    let di = &recipe.design_intent;
    let c = recipe.candidates();

    let mut reversed = synthetic_sweep(di, 30.0, -75.0);
    reversed.samples.reverse();
    let sim = ScriptedSimulator::new()
        .with(&c[0], Behaviour::Sweep(reversed))
        .with(&c[1], Behaviour::Sweep(synthetic_sweep(di, 50.0, -80.0)));

    let (outcome, logs) = with_log_counter(|| recipe.eval_candidates(&c[..2], &sim));
    let design = outcome.unwrap().into_result().unwrap();

    assert_eq!(logs.count(Level::ERROR), 1);
    assert_eq!(design.failures.len(), 1);
    assert_eq!(design.failures[0].name, c[0].name());
    assert!(design.failures[0].reason.contains("not ordered by length"));
    assert_eq!(design.component.width_type, WidthType::Linear);
}
