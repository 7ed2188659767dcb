//! Integration tests for the XCS engine
//!
//! These tests drive full experiments against the multiplexer and check the
//! population-level properties that must hold across many learning steps.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use lcs_core::XcsParams;
use lcs_rl::{
    run_parallel, Environment, Experiment, ExperimentConfig, Multiplexer, PopulationSnapshot,
    StepMode, XcsEngine, MULTIPLEXER_REWARD,
};

fn six_multiplexer_config(seed: u64) -> ExperimentConfig {
    ExperimentConfig {
        training_cycles: 10_000,
        evaluation_cycles: 1_000,
        initial_explore: 0.5,
        final_explore: 0.0,
        seed,
        ..ExperimentConfig::default()
    }
}

/// Train on the 6-multiplexer from an empty population and check the
/// evaluation window is close to the maximum reward
#[test]
fn test_six_multiplexer_converges() {
    let env = Multiplexer::new(2, 42).unwrap();
    let mut experiment =
        Experiment::new(env, XcsParams::default(), six_multiplexer_config(42)).unwrap();

    let report = experiment.run().unwrap();

    assert_eq!(report.training_cycles, 10_000);
    assert!(
        report.evaluation_average_reward >= 0.95 * MULTIPLEXER_REWARD,
        "evaluation reward {} too low",
        report.evaluation_average_reward
    );
    assert!(report.population.micro_classifiers <= 400);
}

/// Population numerosity stays within N after every learning step
#[test]
fn test_capacity_never_exceeded() {
    let params = XcsParams {
        population_size: 80,
        ..XcsParams::default()
    };
    let mut env = Multiplexer::new(2, 9).unwrap();
    let mut engine = XcsEngine::for_environment(params, &env, 9).unwrap();

    for _ in 0..2_000 {
        let mode = engine.next_mode();
        engine.run_episode(&mut env, mode, 1).unwrap();

        let population = engine.population();
        assert!(population.numerosity() <= 80);
        assert!(population.iter().all(|cl| cl.numerosity >= 1));
        assert!(population.iter().all(|cl| cl.error >= 0.0));
        assert!(population.iter().all(|cl| cl.fitness >= 0.0));
    }
}

/// Covering always leaves both actions advocated
#[test]
fn test_match_sets_cover_all_actions() {
    let mut env = Multiplexer::new(2, 5).unwrap();
    let mut engine = XcsEngine::for_environment(XcsParams::default(), &env, 5).unwrap();

    for _ in 0..200 {
        env.reset();
        let outcome = engine.step(&mut env, StepMode::Explore).unwrap();
        assert!(outcome.match_set_size >= env.num_actions());
        assert!(outcome.action_set_size >= 1);
        assert!(outcome.end_of_task);

        assert!(engine
            .population()
            .iter()
            .all(|cl| cl.condition.len() == 6 && cl.action.to_index() < 2));
    }
}

/// Same seed, same learned population
#[test]
fn test_seeded_runs_are_reproducible() {
    let config = ExperimentConfig {
        training_cycles: 1_500,
        evaluation_cycles: 100,
        ..six_multiplexer_config(11)
    };

    let run = || {
        let env = Multiplexer::new(2, 11).unwrap();
        let mut experiment = Experiment::new(env, XcsParams::default(), config.clone()).unwrap();
        let report = experiment.run().unwrap();
        (report, experiment.engine().snapshot())
    };

    let (first_report, first) = run();
    let (second_report, second) = run();

    assert_eq!(first.classifiers, second.classifiers);
    assert_eq!(
        first_report.evaluation_average_reward,
        second_report.evaluation_average_reward
    );
    assert_ne!(first_report.run_id, second_report.run_id);
}

/// A checkpoint written to disk restores the same population
#[test]
fn test_snapshot_file_round_trip() {
    let mut env = Multiplexer::new(2, 3).unwrap();
    let mut engine = XcsEngine::for_environment(XcsParams::default(), &env, 3).unwrap();
    for _ in 0..1_000 {
        let mode = engine.next_mode();
        engine.run_episode(&mut env, mode, 1).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("population.json");
    engine.snapshot().save(&path).unwrap();

    let loaded = PopulationSnapshot::load(&path).unwrap();
    let mut restored = XcsEngine::for_environment(XcsParams::default(), &env, 3).unwrap();
    restored.restore(&loaded).unwrap();

    assert_eq!(restored.population().len(), engine.population().len());
    assert_eq!(restored.population().numerosity(), engine.population().numerosity());
    for cl in engine.population().iter() {
        let copy = restored.population().get(&cl.key()).unwrap();
        assert_eq!(copy.numerosity, cl.numerosity);
        assert_eq!(copy.experience, cl.experience);
        assert!((copy.prediction - cl.prediction).abs() < 1e-9);
    }
}

/// A snapshot for another problem size is rejected
#[test]
fn test_snapshot_for_other_environment_rejected() {
    let six = Multiplexer::new(2, 1).unwrap();
    let mut engine = XcsEngine::for_environment(XcsParams::default(), &six, 1).unwrap();
    let mut env = six.clone();
    engine.run_episode(&mut env, StepMode::Explore, 1).unwrap();

    let eleven = Multiplexer::new(3, 1).unwrap();
    let mut other = XcsEngine::for_environment(XcsParams::default(), &eleven, 1).unwrap();
    assert!(other.restore(&engine.snapshot()).is_err());
}

#[tokio::test]
async fn test_parallel_runs_use_consecutive_seeds() {
    let config = ExperimentConfig {
        training_cycles: 300,
        evaluation_cycles: 50,
        window: 100,
        seed: 5,
        runs: 3,
        ..ExperimentConfig::default()
    };

    let results = run_parallel(XcsParams::default(), config, None, |seed| Multiplexer::new(2, seed))
        .await
        .unwrap();

    let seeds: Vec<u64> = results.iter().map(|(report, _)| report.seed).collect();
    assert_eq!(seeds, vec![5, 6, 7]);
    for (report, snapshot) in &results {
        assert_eq!(report.windows.len(), 3);
        assert_eq!(snapshot.condition_length, 6);
        assert_eq!(
            snapshot.classifiers.iter().map(|r| r.numerosity as usize).sum::<usize>(),
            report.population.micro_classifiers
        );
    }
}

/// A trained population carries over into a new experiment
#[test]
fn test_experiment_resumes_from_snapshot() {
    let config = ExperimentConfig {
        training_cycles: 5_000,
        evaluation_cycles: 0,
        ..six_multiplexer_config(21)
    };
    let mut first = Experiment::new(Multiplexer::new(2, 21).unwrap(), XcsParams::default(), config)
        .unwrap();
    first.run().unwrap();
    let trained = first.engine().snapshot();

    let evaluate_only = ExperimentConfig {
        training_cycles: 0,
        evaluation_cycles: 500,
        learn_during_evaluation: false,
        ..six_multiplexer_config(22)
    };
    let mut resumed = Experiment::new(
        Multiplexer::new(2, 22).unwrap(),
        XcsParams::default(),
        evaluate_only.clone(),
    )
    .unwrap()
    .with_snapshot(&trained)
    .unwrap();
    let mut fresh = Experiment::new(
        Multiplexer::new(2, 22).unwrap(),
        XcsParams::default(),
        evaluate_only,
    )
    .unwrap();

    assert_eq!(resumed.engine().population().numerosity(), trained_numerosity(&trained));
    assert!(fresh.engine().population().is_empty());

    let resumed_report = resumed.run().unwrap();
    let fresh_report = fresh.run().unwrap();
    assert!(resumed_report.evaluation_performance > 0.8);
    assert!(resumed_report.evaluation_performance > fresh_report.evaluation_performance);
}

fn trained_numerosity(snapshot: &PopulationSnapshot) -> usize {
    snapshot.classifiers.iter().map(|r| r.numerosity as usize).sum()
}

#[tokio::test]
async fn test_parallel_runs_resume_from_snapshot() {
    let mut env = Multiplexer::new(2, 2).unwrap();
    let mut engine = XcsEngine::for_environment(XcsParams::default(), &env, 2).unwrap();
    for _ in 0..500 {
        let mode = engine.next_mode();
        engine.run_episode(&mut env, mode, 1).unwrap();
    }
    let snapshot = engine.snapshot();

    let config = ExperimentConfig {
        training_cycles: 0,
        evaluation_cycles: 0,
        runs: 2,
        ..ExperimentConfig::default()
    };
    let results = run_parallel(XcsParams::default(), config, Some(snapshot.clone()), |seed| {
        Multiplexer::new(2, seed)
    })
    .await
    .unwrap();

    for (_, resumed) in &results {
        assert_eq!(resumed.classifiers, snapshot.classifiers);
    }

    let small = XcsParams {
        population_size: 10,
        ..XcsParams::default()
    };
    let config = ExperimentConfig {
        training_cycles: 0,
        evaluation_cycles: 0,
        ..ExperimentConfig::default()
    };
    let oversized = run_parallel(small, config, Some(snapshot), |seed| Multiplexer::new(2, seed)).await;
    assert!(oversized.is_err());
}

#[tokio::test]
async fn test_parallel_run_reports_environment_errors() {
    let config = ExperimentConfig {
        training_cycles: 10,
        runs: 2,
        ..ExperimentConfig::default()
    };

    let result = run_parallel(XcsParams::default(), config, None, |seed| Multiplexer::new(7, seed)).await;
    assert!(result.is_err());
}
