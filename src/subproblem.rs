use crate::decision::{Decision, FacilityState};
use crate::error::Error;
use crate::policy::{CapacityPolicy, Flexibility};
use crate::scenario::{Scenario, TrainingSet};
use crate::solver;
use crate::system::Network;

/// Helper function for setting the same solver options on every
/// solved problem.
pub fn set_default_solver_options(model: &mut solver::Model, time_limit: f64) {
    model.set_option("parallel", "off");
    model.set_option("threads", 1);
    model.set_option("mip_feasibility_tolerance", 1e-7);
    model.set_option("time_limit", time_limit);
}

/// Column indices of one training scenario's recourse block.
#[derive(Debug)]
pub struct ScenarioBlock {
    /// `serve_facility[i][k][t]`: pixel `k` served from facility `i`
    /// in period `t`.
    pub serve_facility: Vec<Vec<Vec<usize>>>,
    /// `serve_dc[k][t]`: pixel `k` served from the DC in period `t`.
    pub serve_dc: Vec<Vec<usize>>,
}

/// Helper accessor for indexing variables of the deterministic
/// equivalent. First-stage columns come first; every training
/// scenario's block references the same `install`/`operate` columns,
/// which is what enforces non-anticipativity structurally.
#[derive(Debug)]
pub struct Accessors {
    /// `install[i][s]`: facility `i` takes state `s` (`Y`).
    pub install: Vec<Vec<usize>>,
    /// `operate[i][t][s]`: facility `i` operates at state `s` in
    /// period `t` (`Z`). Empty under fixed capacity, where operation
    /// is pinned to the installation.
    pub operate: Vec<Vec<Vec<usize>>>,
    pub blocks: Vec<ScenarioBlock>,
    /// Number of first-stage columns; every column below this index
    /// is shared by all scenario blocks.
    pub num_first_stage: usize,
}

/// The deterministic equivalent of the two-stage program over the
/// training sample, ready to be solved.
#[derive(Debug)]
pub struct TrainingModel {
    pub model: solver::Model,
    pub accessors: Accessors,
    pub flexibility: Flexibility,
}

impl TrainingModel {
    pub fn build(
        network: &Network,
        policy: &CapacityPolicy,
        training: &TrainingSet,
        continuous_assignment: bool,
    ) -> Result<Self, Error> {
        policy.validate(network, training)?;
        let (pb, accessors) =
            build_training_problem(network, policy, training, continuous_assignment);
        let model = pb
            .try_optimise(solver::Sense::Minimise)
            .map_err(|e| Error::Solver(format!("{:?}", e)))?;
        Ok(Self {
            model,
            accessors,
            flexibility: policy.flexibility,
        })
    }

    /// Reads the first-stage decision out of a solved model.
    pub fn extract_decision(
        &self,
        solution: &solver::Solution,
        network: &Network,
    ) -> Decision {
        let installation: Vec<FacilityState> = self
            .accessors
            .install
            .iter()
            .map(|cols| FacilityState::from_index(argmax_state(cols, solution)))
            .collect();
        let operation: Vec<Vec<FacilityState>> = match self.flexibility {
            Flexibility::FixedCapacity => installation
                .iter()
                .map(|state| vec![*state; network.periods])
                .collect(),
            Flexibility::FlexCapacity => self
                .accessors
                .operate
                .iter()
                .map(|periods| {
                    periods
                        .iter()
                        .map(|cols| {
                            FacilityState::from_index(argmax_state(
                                cols, solution,
                            ))
                        })
                        .collect()
                })
                .collect(),
        };
        Decision::new(installation, operation)
    }
}

fn argmax_state(cols: &[usize], solution: &solver::Solution) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (state, col) in cols.iter().enumerate() {
        let value = solution.colvalue[*col];
        if value > best_value {
            best = state;
            best_value = value;
        }
    }
    best
}

/// Builds the deterministic-equivalent problem: first-stage `Y` (and
/// `Z` under flexible capacity) columns, then one recourse block per
/// training scenario, with the constraint families A.1-A.5.
pub fn build_training_problem(
    network: &Network,
    policy: &CapacityPolicy,
    training: &TrainingSet,
    continuous_assignment: bool,
) -> (solver::Problem, Accessors) {
    let mut pb = solver::Problem::new();
    let num_scenarios = training.len();
    let sample_weight = 1.0 / num_scenarios as f64;
    let flex = policy.flexibility == Flexibility::FlexCapacity;

    // FIRST-STAGE VARIABLES
    // Y[i][s]: the installation carries the one-time cost; under fixed
    // capacity it also carries the whole operation cost, since the
    // operating level is pinned.
    let install: Vec<Vec<usize>> = network
        .facilities
        .iter()
        .map(|facility| {
            policy
                .admissible_states(facility, 0)
                .iter()
                .map(|state| {
                    let s = state.index();
                    let mut cost = facility.cost_installation[s];
                    if !flex {
                        cost += facility.cost_operation[s]
                            .iter()
                            .take(network.periods)
                            .sum::<f64>();
                    }
                    pb.add_integer_column(cost, 0.0..=1.0)
                })
                .collect()
        })
        .collect();

    // Z[i][t][s]: per-period operating state, flexible capacity only
    let operate: Vec<Vec<Vec<usize>>> = if flex {
        network
            .facilities
            .iter()
            .map(|facility| {
                (0..network.periods)
                    .map(|t| {
                        policy
                            .admissible_states(facility, t)
                            .iter()
                            .map(|state| {
                                pb.add_integer_column(
                                    facility.cost_operation[state.index()][t],
                                    0.0..=1.0,
                                )
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect()
    } else {
        vec![]
    };

    let num_first_stage = pb.num_col;

    // SECOND-STAGE VARIABLES, one block per training scenario
    let blocks: Vec<ScenarioBlock> = training
        .scenarios()
        .iter()
        .map(|scenario| {
            add_serving_columns(
                &mut pb,
                network,
                scenario,
                sample_weight,
                continuous_assignment,
            )
        })
        .collect();

    // A.1 - each facility takes exactly one state
    for cols in install.iter() {
        let factors: Vec<(usize, f64)> =
            cols.iter().map(|col| (*col, 1.0)).collect();
        pb.add_row(1.0..=1.0, factors);
    }

    if flex {
        for (i, facility) in network.facilities.iter().enumerate() {
            for t in 0..network.periods {
                // A.2 - exactly one operating state per period
                let factors: Vec<(usize, f64)> = operate[i][t]
                    .iter()
                    .map(|col| (*col, 1.0))
                    .collect();
                pb.add_row(1.0..=1.0, factors);

                // A.3 - never operate above the installed capacity
                let max_capacity = facility.max_capacity();
                for s in 0..facility.capacity.len() {
                    let capacity = facility.capacity[s];
                    if capacity >= max_capacity {
                        continue;
                    }
                    let mut factors = vec![(install[i][s], 1.0)];
                    for higher in 0..facility.capacity.len() {
                        if facility.capacity[higher] > capacity {
                            factors.push((operate[i][t][higher], 1.0));
                        }
                    }
                    pb.add_row(..=1.0, factors);
                }
            }
        }
    }

    for (n, scenario) in training.scenarios().iter().enumerate() {
        let block = &blocks[n];
        for t in 0..network.periods {
            // A.4 - serving fleet within the operating capacity
            for (i, facility) in network.facilities.iter().enumerate() {
                let mut factors: Vec<(usize, f64)> = (0..scenario
                    .num_pixels())
                    .map(|k| {
                        (
                            block.serve_facility[i][k][t],
                            scenario.fleet_size[i][k][t],
                        )
                    })
                    .collect();
                for s in 1..facility.capacity.len() {
                    let col = if flex {
                        operate[i][t][s]
                    } else {
                        install[i][s]
                    };
                    factors.push((col, -facility.capacity[s]));
                }
                pb.add_row(..=0.0, factors);
            }

            // A.5 - every pixel is served from somewhere
            for k in 0..scenario.num_pixels() {
                let mut factors: Vec<(usize, f64)> = (0..network
                    .facilities
                    .len())
                    .map(|i| (block.serve_facility[i][k][t], 1.0))
                    .collect();
                factors.push((block.serve_dc[k][t], 1.0));
                pb.add_row(1.0.., factors);
            }

            // DC fleet limit, when the first echelon is capacitated
            if let Some(dc_capacity) = network.dc_fleet_capacity {
                let factors: Vec<(usize, f64)> = (0..scenario.num_pixels())
                    .map(|k| {
                        (block.serve_dc[k][t], scenario.dc_fleet_size[k][t])
                    })
                    .collect();
                pb.add_row(..=dc_capacity, factors);
            }
        }
    }

    (
        pb,
        Accessors {
            install,
            operate,
            blocks,
            num_first_stage,
        },
    )
}

fn add_serving_columns(
    pb: &mut solver::Problem,
    network: &Network,
    scenario: &Scenario,
    weight: f64,
    continuous_assignment: bool,
) -> ScenarioBlock {
    let mut add_col = |cost: f64| {
        if continuous_assignment {
            pb.add_column(cost, 0.0..=1.0)
        } else {
            pb.add_integer_column(cost, 0.0..=1.0)
        }
    };
    let serve_facility: Vec<Vec<Vec<usize>>> = (0..network.facilities.len())
        .map(|i| {
            (0..scenario.num_pixels())
                .map(|k| {
                    (0..network.periods)
                        .map(|t| {
                            add_col(
                                weight
                                    * scenario.facility_serving_cost[i][k][t],
                            )
                        })
                        .collect()
                })
                .collect()
        })
        .collect();
    let serve_dc: Vec<Vec<usize>> = (0..scenario.num_pixels())
        .map(|k| {
            (0..network.periods)
                .map(|t| add_col(weight * scenario.dc_serving_cost[k][t]))
                .collect()
        })
        .collect();
    ScenarioBlock {
        serve_facility,
        serve_dc,
    }
}

/// The per-scenario sub-problem the evaluator solves: the first-stage
/// decision is baked in, only serving (and, under flexible capacity,
/// the per-period operating level below the installed one) remains
/// free. Deterministic first-stage costs enter as the objective
/// offset.
#[derive(Debug)]
pub struct EvaluationSubproblem {
    pub model: solver::Model,
}

impl EvaluationSubproblem {
    pub fn build(
        network: &Network,
        policy: &CapacityPolicy,
        decision: &Decision,
        scenario: &Scenario,
        continuous_assignment: bool,
    ) -> Result<Self, Error> {
        let pb = build_evaluation_problem(
            network,
            policy,
            decision,
            scenario,
            continuous_assignment,
        );
        let model = pb
            .try_optimise(solver::Sense::Minimise)
            .map_err(|e| Error::Solver(format!("{:?}", e)))?;
        Ok(Self { model })
    }
}

fn build_evaluation_problem(
    network: &Network,
    policy: &CapacityPolicy,
    decision: &Decision,
    scenario: &Scenario,
    continuous_assignment: bool,
) -> solver::Problem {
    let mut pb = solver::Problem::new();
    let flex = policy.flexibility == Flexibility::FlexCapacity;

    // Installation is sunk; under fixed capacity so is operation.
    pb.offset = match flex {
        false => decision.first_stage_cost(network),
        true => network
            .facilities
            .iter()
            .enumerate()
            .map(|(i, f)| {
                f.cost_installation[decision.installation[i].index()]
            })
            .sum(),
    };

    // Z[i][t][s] over the states the policy admits for the installed
    // level; the second stage re-chooses the operating level here.
    let operate: Vec<Vec<Vec<(usize, usize)>>> = if flex {
        network
            .facilities
            .iter()
            .enumerate()
            .map(|(i, facility)| {
                (0..network.periods)
                    .map(|t| {
                        policy
                            .operating_states(
                                facility,
                                decision.installation[i],
                            )
                            .iter()
                            .map(|state| {
                                let s = state.index();
                                let col = pb.add_integer_column(
                                    facility.cost_operation[s][t],
                                    0.0..=1.0,
                                );
                                (s, col)
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect()
    } else {
        vec![]
    };

    let mut add_col = |cost: f64, closed: bool| {
        let upper = if closed { 0.0 } else { 1.0 };
        if continuous_assignment {
            pb.add_column(cost, 0.0..=upper)
        } else {
            pb.add_integer_column(cost, 0.0..=upper)
        }
    };

    let serve_facility: Vec<Vec<Vec<usize>>> = network
        .facilities
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let closed = !decision.installation[i].is_installed();
            (0..scenario.num_pixels())
                .map(|k| {
                    (0..network.periods)
                        .map(|t| {
                            add_col(
                                scenario.facility_serving_cost[i][k][t],
                                closed,
                            )
                        })
                        .collect()
                })
                .collect()
        })
        .collect();
    let serve_dc: Vec<Vec<usize>> = (0..scenario.num_pixels())
        .map(|k| {
            (0..network.periods)
                .map(|t| add_col(scenario.dc_serving_cost[k][t], false))
                .collect()
        })
        .collect();

    for t in 0..network.periods {
        for (i, facility) in network.facilities.iter().enumerate() {
            if flex {
                // exactly one operating state per period
                let factors: Vec<(usize, f64)> = operate[i][t]
                    .iter()
                    .map(|(_, col)| (*col, 1.0))
                    .collect();
                pb.add_row(1.0..=1.0, factors);
            }

            // serving fleet within the period's capacity
            let mut factors: Vec<(usize, f64)> = (0..scenario.num_pixels())
                .map(|k| {
                    (serve_facility[i][k][t], scenario.fleet_size[i][k][t])
                })
                .collect();
            match flex {
                true => {
                    for (s, col) in operate[i][t].iter() {
                        factors.push((*col, -facility.capacity[*s]));
                    }
                    pb.add_row(..=0.0, factors);
                }
                false => {
                    let capacity = facility.capacity
                        [decision.state(i, t).index()];
                    pb.add_row(..=capacity, factors);
                }
            }
        }

        for k in 0..scenario.num_pixels() {
            let mut factors: Vec<(usize, f64)> = (0..network
                .facilities
                .len())
                .map(|i| (serve_facility[i][k][t], 1.0))
                .collect();
            factors.push((serve_dc[k][t], 1.0));
            pb.add_row(1.0.., factors);
        }

        if let Some(dc_capacity) = network.dc_fleet_capacity {
            let factors: Vec<(usize, f64)> = (0..scenario.num_pixels())
                .map(|k| (serve_dc[k][t], scenario.dc_fleet_size[k][t]))
                .collect();
            pb.add_row(..=dc_capacity, factors);
        }
    }

    pb
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::scenario::partition;

    fn single_scenario_training(fleet: &[f64]) -> TrainingSet {
        let scenarios = vec![Scenario::single_pixel(1, fleet, 1.0, 100.0)];
        let (training, _) = partition(scenarios, 1, 0).unwrap();
        training
    }

    #[test]
    fn test_build_training_problem_fixed_shape() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let training = single_scenario_training(&[5.0, 5.0]);
        let (pb, accessors) =
            build_training_problem(&network, &policy, &training, true);
        // 3 Y columns, no Z, one block of 1 facility x 1 pixel x 2
        // periods X plus 1 pixel x 2 periods W
        assert_eq!(accessors.install.len(), 1);
        assert_eq!(accessors.install[0].len(), 3);
        assert!(accessors.operate.is_empty());
        assert_eq!(accessors.num_first_stage, 3);
        assert_eq!(pb.num_col, 3 + 2 + 2);
        assert!(pb.is_mip());
    }

    #[test]
    fn test_build_training_problem_flex_shape() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FlexCapacity);
        let training = single_scenario_training(&[5.0, 9.0]);
        let (_, accessors) =
            build_training_problem(&network, &policy, &training, true);
        assert_eq!(accessors.operate.len(), 1);
        assert_eq!(accessors.operate[0].len(), 2);
        assert_eq!(accessors.operate[0][0].len(), 3);
        // 3 Y + 2 periods x 3 Z
        assert_eq!(accessors.num_first_stage, 9);
    }

    #[test]
    fn test_first_stage_columns_shared_across_blocks() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let scenarios = vec![
            Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0),
            Scenario::single_pixel(1, &[4.0, 3.0], 2.0, 100.0),
        ];
        let (training, _) = partition(scenarios, 2, 0).unwrap();
        let (_, accessors) =
            build_training_problem(&network, &policy, &training, true);
        // every installation column precedes every recourse column,
        // and the recourse blocks are disjoint
        for cols in accessors.install.iter() {
            for col in cols {
                assert!(*col < accessors.num_first_stage);
            }
        }
        let mut seen = std::collections::HashSet::new();
        for block in accessors.blocks.iter() {
            for facility in block.serve_facility.iter() {
                for pixel in facility.iter() {
                    for col in pixel {
                        assert!(*col >= accessors.num_first_stage);
                        assert!(seen.insert(*col));
                    }
                }
            }
            for pixel in block.serve_dc.iter() {
                for col in pixel {
                    assert!(*col >= accessors.num_first_stage);
                    assert!(seen.insert(*col));
                }
            }
        }
    }

    #[test]
    fn test_solve_training_model_fixed() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let training = single_scenario_training(&[5.0, 5.0]);
        let mut built =
            TrainingModel::build(&network, &policy, &training, true).unwrap();
        set_default_solver_options(&mut built.model, 60.0);
        built.model.solve();
        assert_eq!(built.model.status(), solver::HighsModelStatus::Optimal);
        // install level 1: 100 + 10 + 10 + serving 1 + 1
        assert!((built.model.get_objective_value() - 122.0).abs() < 1e-6);
        let decision = built
            .extract_decision(&built.model.get_solution(), &network);
        assert_eq!(decision.installation[0], FacilityState::Installed(1));
        assert!(decision.has_constant_levels());
    }

    #[test]
    fn test_solve_training_model_flex_switches_level() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FlexCapacity);
        let scenarios = vec![Scenario::single_pixel(1, &[5.0, 9.0], 1.0, 200.0)];
        let (training, _) = partition(scenarios, 1, 0).unwrap();
        let mut built =
            TrainingModel::build(&network, &policy, &training, true).unwrap();
        set_default_solver_options(&mut built.model, 60.0);
        built.model.solve();
        assert_eq!(built.model.status(), solver::HighsModelStatus::Optimal);
        // install level 2, operate at level 1 then 2:
        // 180 + 10 + 20 + serving 1 + 1
        assert!((built.model.get_objective_value() - 212.0).abs() < 1e-6);
        let decision = built
            .extract_decision(&built.model.get_solution(), &network);
        assert_eq!(decision.installation[0], FacilityState::Installed(2));
        assert_eq!(decision.operation[0][0], FacilityState::Installed(1));
        assert_eq!(decision.operation[0][1], FacilityState::Installed(2));
    }

    #[test]
    fn test_build_rejects_uncoverable_training_set() {
        let mut network = Network::default();
        network.dc_fleet_capacity = Some(0.0);
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let training = single_scenario_training(&[50.0, 5.0]);
        let result = TrainingModel::build(&network, &policy, &training, true);
        assert!(matches!(result, Err(Error::InfeasiblePolicy { .. })));
    }

    #[test]
    fn test_evaluation_subproblem_fixed_cost() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let decision = Decision::new(
            vec![FacilityState::Installed(1)],
            vec![vec![
                FacilityState::Installed(1),
                FacilityState::Installed(1),
            ]],
        );
        let scenario = Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0);
        let mut sub = EvaluationSubproblem::build(
            &network, &policy, &decision, &scenario, true,
        )
        .unwrap();
        set_default_solver_options(&mut sub.model, 60.0);
        sub.model.solve();
        assert_eq!(sub.model.status(), solver::HighsModelStatus::Optimal);
        // sunk 120 + serving 1 + 1
        assert!((sub.model.get_objective_value() - 122.0).abs() < 1e-6);
    }

    #[test]
    fn test_evaluation_subproblem_infeasible_under_decision() {
        let mut network = Network::default();
        network.dc_fleet_capacity = Some(0.0);
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let decision = Decision::new(
            vec![FacilityState::Installed(1)],
            vec![vec![
                FacilityState::Installed(1),
                FacilityState::Installed(1),
            ]],
        );
        // fleet 12 exceeds every capacity level and the DC takes none
        let scenario = Scenario::single_pixel(1, &[12.0, 5.0], 1.0, 100.0);
        let mut sub = EvaluationSubproblem::build(
            &network, &policy, &decision, &scenario, true,
        )
        .unwrap();
        set_default_solver_options(&mut sub.model, 60.0);
        sub.model.solve();
        assert_eq!(sub.model.status(), solver::HighsModelStatus::Infeasible);
    }

    #[test]
    fn test_evaluation_subproblem_closed_network_uses_dc() {
        let network = Network::default();
        let policy = CapacityPolicy::new(Flexibility::FixedCapacity);
        let decision = Decision::new(
            vec![FacilityState::NotInstalled],
            vec![vec![
                FacilityState::NotInstalled,
                FacilityState::NotInstalled,
            ]],
        );
        let scenario = Scenario::single_pixel(1, &[5.0, 5.0], 1.0, 100.0);
        let mut sub = EvaluationSubproblem::build(
            &network, &policy, &decision, &scenario, true,
        )
        .unwrap();
        set_default_solver_options(&mut sub.model, 60.0);
        sub.model.solve();
        assert_eq!(sub.model.status(), solver::HighsModelStatus::Optimal);
        // everything from the DC: 100 + 100
        assert!((sub.model.get_objective_value() - 200.0).abs() < 1e-6);
    }
}
