use crate::decision::Decision;
use crate::error::Error;
use crate::policy::CapacityPolicy;
use crate::scenario::{Scenario, TestingSet, TrainingSet};
use crate::solver::HighsModelStatus;
use crate::subproblem::{
    set_default_solver_options, EvaluationSubproblem, TrainingModel,
};
use crate::system::Network;
use crate::utils::{mean, std_deviation};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// The solved sample average approximation over the training set.
#[derive(Debug)]
pub struct SaaSolution {
    pub decision: Decision,
    /// Optimal value of the deterministic equivalent: first-stage cost
    /// plus the training-sample average of the recourse cost.
    pub in_sample_objective: f64,
    /// `false` when the solver stopped on the time limit with an
    /// incumbent instead of proving optimality.
    pub proven_optimal: bool,
    pub mip_gap: f64,
    pub solve_time: Duration,
}

/// Builds and solves the deterministic equivalent, returning the
/// first-stage decision it commits to.
///
/// A time limit hit with a feasible incumbent is accepted and flagged
/// through `proven_optimal`; without an incumbent it is an error.
pub fn solve_training(
    network: &Network,
    policy: &CapacityPolicy,
    training: &TrainingSet,
    continuous_assignment: bool,
    time_limit: f64,
) -> Result<SaaSolution, Error> {
    let mut built =
        TrainingModel::build(network, policy, training, continuous_assignment)?;
    set_default_solver_options(&mut built.model, time_limit);
    built.model.make_quiet();

    let begin = Instant::now();
    built
        .model
        .try_solve()
        .map_err(|status| Error::Solver(format!("{:?}", status)))?;
    let solve_time = begin.elapsed();

    let proven_optimal = match built.model.status() {
        HighsModelStatus::Optimal => true,
        HighsModelStatus::Infeasible => return Err(Error::SolverInfeasible),
        HighsModelStatus::Unbounded
        | HighsModelStatus::UnboundedOrInfeasible => {
            return Err(Error::SolverUnbounded)
        }
        HighsModelStatus::ReachedTimeLimit => {
            if !built.model.has_feasible_solution() {
                return Err(Error::SolverTimeout);
            }
            false
        }
        status => {
            return Err(Error::Solver(format!(
                "unexpected training status {:?}",
                status
            )))
        }
    };

    let solution = built.model.get_solution();
    let decision = built.extract_decision(&solution, network);
    Ok(SaaSolution {
        decision,
        in_sample_objective: built.model.get_objective_value(),
        proven_optimal,
        mip_gap: built.model.mip_gap(),
        solve_time,
    })
}

/// What happened to one testing scenario under the fixed decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioOutcome {
    /// Total cost: sunk first-stage cost plus optimal recourse.
    Cost(f64),
    /// No admissible recourse covers the realized demand.
    InfeasibleUnderDecision,
    TimedOut,
}

/// Out-of-sample statistics over the testing set. Unsolved scenarios
/// are counted, never dropped, and the cost statistics run over the
/// solved ones only.
#[derive(Debug)]
pub struct Evaluation {
    /// One outcome per testing scenario, in scenario order.
    pub outcomes: Vec<ScenarioOutcome>,
    pub evaluated_count: usize,
    pub infeasible_count: usize,
    pub timed_out_count: usize,
    pub mean: Option<f64>,
    pub std_deviation: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Relative out-of-sample gap,
    /// `(mean - in_sample) / in_sample`.
    pub gap: Option<f64>,
}

/// Solves one evaluation sub-problem per testing scenario, in parallel,
/// and reduces the outcomes to out-of-sample statistics.
pub fn evaluate(
    network: &Network,
    policy: &CapacityPolicy,
    solution: &SaaSolution,
    testing: &TestingSet,
    continuous_assignment: bool,
    time_limit: f64,
    num_workers: Option<usize>,
) -> Result<Evaluation, Error> {
    let run = || {
        testing
            .scenarios()
            .par_iter()
            .map(|scenario| {
                evaluate_scenario(
                    network,
                    policy,
                    &solution.decision,
                    scenario,
                    continuous_assignment,
                    time_limit,
                )
            })
            .collect::<Result<Vec<ScenarioOutcome>, Error>>()
    };
    let outcomes = match num_workers {
        Some(workers) => rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?
            .install(run),
        None => run(),
    }?;
    Ok(reduce_outcomes(outcomes, solution.in_sample_objective))
}

fn evaluate_scenario(
    network: &Network,
    policy: &CapacityPolicy,
    decision: &Decision,
    scenario: &Scenario,
    continuous_assignment: bool,
    time_limit: f64,
) -> Result<ScenarioOutcome, Error> {
    let mut sub = EvaluationSubproblem::build(
        network,
        policy,
        decision,
        scenario,
        continuous_assignment,
    )?;
    set_default_solver_options(&mut sub.model, time_limit);
    sub.model.make_quiet();
    sub.model
        .try_solve()
        .map_err(|status| Error::Solver(format!("{:?}", status)))?;
    match sub.model.status() {
        HighsModelStatus::Optimal => {
            Ok(ScenarioOutcome::Cost(sub.model.get_objective_value()))
        }
        // with a fixed decision and non-negative serving costs the
        // sub-problem cannot be unbounded
        HighsModelStatus::Infeasible
        | HighsModelStatus::UnboundedOrInfeasible => {
            Ok(ScenarioOutcome::InfeasibleUnderDecision)
        }
        HighsModelStatus::ReachedTimeLimit => Ok(ScenarioOutcome::TimedOut),
        status => Err(Error::Solver(format!(
            "unexpected evaluation status {:?}",
            status
        ))),
    }
}

fn reduce_outcomes(
    outcomes: Vec<ScenarioOutcome>,
    in_sample_objective: f64,
) -> Evaluation {
    let costs: Vec<f64> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            ScenarioOutcome::Cost(cost) => Some(*cost),
            _ => None,
        })
        .collect();
    let infeasible_count = outcomes
        .iter()
        .filter(|o| **o == ScenarioOutcome::InfeasibleUnderDecision)
        .count();
    let timed_out_count = outcomes
        .iter()
        .filter(|o| **o == ScenarioOutcome::TimedOut)
        .count();

    let (mean, std, min, max, gap) = if costs.is_empty() {
        (None, None, None, None, None)
    } else {
        let mean_cost = mean(&costs);
        (
            Some(mean_cost),
            Some(std_deviation(&costs)),
            Some(costs.iter().cloned().fold(f64::INFINITY, f64::min)),
            Some(costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
            Some(
                (mean_cost - in_sample_objective)
                    / in_sample_objective.abs(),
            ),
        )
    };

    Evaluation {
        evaluated_count: costs.len(),
        infeasible_count,
        timed_out_count,
        outcomes,
        mean,
        std_deviation: std,
        min,
        max,
        gap,
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decision::FacilityState;
    use crate::policy::Flexibility;
    use crate::scenario::partition;

    fn solve_default_fixed(
        network: &Network,
    ) -> (CapacityPolicy, SaaSolution) {
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let scenarios = vec![Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0)];
        let (training, _) = partition(scenarios, 1, 0).unwrap();
        let solution =
            solve_training(network, &policy, &training, true, 60.0).unwrap();
        (policy, solution)
    }

    #[test]
    fn test_solve_training_fixed() {
        let network = Network::default();
        let (_, solution) = solve_default_fixed(&network);
        assert!(solution.proven_optimal);
        assert!((solution.in_sample_objective - 122.0).abs() < 1e-6);
        assert_eq!(
            solution.decision.installation[0],
            FacilityState::Installed(1)
        );
    }

    #[test]
    fn test_solve_training_rejects_uncoverable_sample() {
        let mut network = Network::default();
        network.dc_fleet_capacity = Some(0.0);
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let scenarios =
            vec![Scenario::single_pixel(1, &[50.0, 5.0], 1.0, 100.0)];
        let (training, _) = partition(scenarios, 1, 0).unwrap();
        let result = solve_training(&network, &policy, &training, true, 60.0);
        assert!(matches!(result, Err(Error::InfeasiblePolicy { .. })));
    }

    #[test]
    fn test_evaluate_matching_sample_has_zero_gap() {
        let network = Network::default();
        let (policy, solution) = solve_default_fixed(&network);
        let scenarios = vec![
            Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0),
            Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0),
        ];
        let (_, testing) = partition(scenarios, 0, 2).unwrap();
        let evaluation = evaluate(
            &network, &policy, &solution, &testing, true, 60.0, None,
        )
        .unwrap();
        assert_eq!(evaluation.evaluated_count, 2);
        assert_eq!(evaluation.infeasible_count, 0);
        assert!((evaluation.mean.unwrap() - 122.0).abs() < 1e-6);
        assert!(evaluation.gap.unwrap().abs() < 1e-9);
        assert_eq!(evaluation.std_deviation.unwrap(), 0.0);
    }

    #[test]
    fn test_evaluate_counts_infeasible_scenarios() {
        let mut network = Network::default();
        network.dc_fleet_capacity = Some(0.0);
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let scenarios = vec![
            Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0),
            Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0),
            // 12 vehicles exceed every capacity level of the facility
            Scenario::single_pixel(1, &[12.0, 5.0], 1.0, 100.0),
        ];
        let (training, testing) = partition(scenarios, 1, 2).unwrap();
        let solution =
            solve_training(&network, &policy, &training, true, 60.0).unwrap();
        let evaluation = evaluate(
            &network, &policy, &solution, &testing, true, 60.0, Some(2),
        )
        .unwrap();
        assert_eq!(evaluation.outcomes.len(), 2);
        assert_eq!(evaluation.evaluated_count, 1);
        assert_eq!(evaluation.infeasible_count, 1);
        assert_eq!(
            evaluation.outcomes[1],
            ScenarioOutcome::InfeasibleUnderDecision
        );
        // the statistics run over the single solved scenario
        assert!((evaluation.mean.unwrap() - 122.0).abs() < 1e-6);
    }

    #[test]
    fn test_sampled_pipeline_reports_a_gap() {
        use crate::scenario::{PixelModel, ScenarioGenerator};
        use rand_distr::LogNormal;

        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let mut generator = ScenarioGenerator::new(2);
        generator.add_pixel(PixelModel {
            name: String::from("p0"),
            demand: LogNormal::new(0.5, 0.3).unwrap(),
            dc_cost_rate: 40.0,
            facility_cost_rates: vec![1.0],
            fleet_rate: 1.5,
        });
        let (training, testing) =
            partition(generator.generate(8, 7), 4, 4).unwrap();
        let solution =
            solve_training(&network, &policy, &training, true, 60.0).unwrap();
        let evaluation = evaluate(
            &network, &policy, &solution, &testing, true, 60.0, None,
        )
        .unwrap();
        // the DC is uncapacitated, so every held-out scenario solves
        // and the gap is well defined
        assert_eq!(evaluation.evaluated_count, 4);
        assert_eq!(evaluation.outcomes.len(), 4);
        assert!(evaluation.gap.unwrap().is_finite());
        assert!(evaluation.min.unwrap() <= evaluation.max.unwrap());
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let network = Network::default();
        let (policy, solution) = solve_default_fixed(&network);
        let scenarios = vec![
            Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0),
            Scenario::single_pixel(1, &[4.0, 4.0], 2.0, 100.0),
        ];
        let (_, testing) = partition(scenarios, 0, 2).unwrap();
        let first = evaluate(
            &network, &policy, &solution, &testing, true, 60.0, None,
        )
        .unwrap();
        let second = evaluate(
            &network, &policy, &solution, &testing, true, 60.0, None,
        )
        .unwrap();
        assert_eq!(first.outcomes, second.outcomes);
        assert_eq!(first.mean, second.mean);
        assert_eq!(first.gap, second.gap);
    }
}
