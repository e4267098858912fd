use crate::decision::{Decision, DecisionSummaryRow};
use crate::error::Error;
use crate::input::Instance;
use crate::saa::{Evaluation, SaaSolution, ScenarioOutcome};
use crate::system::Network;

use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs;

#[derive(Serialize)]
struct DecisionOutput {
    facility: String,
    period: usize,
    installed_level: usize,
    operating_level: usize,
    capacity: f64,
}

fn write_decision(
    decision: &Decision,
    network: &Network,
    path: &str,
) -> Result<(), Error> {
    let mut wtr = Writer::from_path(path.to_owned() + "/decision.csv")?;
    for (i, facility) in network.facilities.iter().enumerate() {
        for period in 0..network.periods {
            let operating_level = decision.state(i, period).index();
            wtr.serialize(DecisionOutput {
                facility: facility.name.clone(),
                period,
                installed_level: decision.installation[i].index(),
                operating_level,
                capacity: facility.capacity[operating_level],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct EvaluationOutput {
    scenario_index: usize,
    status: &'static str,
    cost: Option<f64>,
}

fn outcome_fields(outcome: &ScenarioOutcome) -> (&'static str, Option<f64>) {
    match outcome {
        ScenarioOutcome::Cost(cost) => ("optimal", Some(*cost)),
        ScenarioOutcome::InfeasibleUnderDecision => ("infeasible", None),
        ScenarioOutcome::TimedOut => ("timed-out", None),
    }
}

fn write_evaluation(
    evaluation: &Evaluation,
    path: &str,
) -> Result<(), Error> {
    let mut wtr = Writer::from_path(path.to_owned() + "/evaluation.csv")?;
    for (scenario_index, outcome) in evaluation.outcomes.iter().enumerate() {
        let (status, cost) = outcome_fields(outcome);
        wtr.serialize(EvaluationOutput {
            scenario_index,
            status,
            cost,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct EvaluationReport {
    evaluated_count: usize,
    infeasible_count: usize,
    timed_out_count: usize,
    mean: Option<f64>,
    std_deviation: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    gap: Option<f64>,
}

#[derive(Serialize)]
struct Report {
    instance_id: String,
    generated_at: String,
    type_of_flexibility: &'static str,
    num_training: usize,
    num_testing: usize,
    in_sample_objective: f64,
    proven_optimal: bool,
    mip_gap: f64,
    training_time_s: f64,
    decision: Vec<DecisionSummaryRow>,
    evaluation: EvaluationReport,
}

fn write_report(
    instance: &Instance,
    solution: &SaaSolution,
    evaluation: &Evaluation,
    path: &str,
) -> Result<(), Error> {
    let report = Report {
        instance_id: instance.instance_id.clone(),
        generated_at: Local::now().to_rfc3339(),
        type_of_flexibility: instance.flexibility.as_str(),
        num_training: instance.training.len(),
        num_testing: instance.testing.len(),
        in_sample_objective: solution.in_sample_objective,
        proven_optimal: solution.proven_optimal,
        mip_gap: solution.mip_gap,
        training_time_s: solution.solve_time.as_secs_f64(),
        decision: solution.decision.summary(&instance.network),
        evaluation: EvaluationReport {
            evaluated_count: evaluation.evaluated_count,
            infeasible_count: evaluation.infeasible_count,
            timed_out_count: evaluation.timed_out_count,
            mean: evaluation.mean,
            std_deviation: evaluation.std_deviation,
            min: evaluation.min,
            max: evaluation.max,
            gap: evaluation.gap,
        },
    };
    let contents = serde_json::to_string_pretty(&report)?;
    fs::write(path.to_owned() + "/report.json", contents)?;
    Ok(())
}

pub fn generate_outputs(
    instance: &Instance,
    solution: &SaaSolution,
    evaluation: &Evaluation,
    path: &str,
) -> Result<(), Error> {
    write_decision(&solution.decision, &instance.network, path)?;
    write_evaluation(evaluation, path)?;
    write_report(instance, solution, evaluation, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FacilityState;

    fn output_dir(name: &str) -> String {
        let dir = std::env::temp_dir().join(name);
        fs::create_dir_all(&dir).unwrap();
        dir.to_str().unwrap().to_owned()
    }

    #[test]
    fn test_write_decision() {
        let network = Network::default();
        let decision = Decision::new(
            vec![FacilityState::Installed(1)],
            vec![vec![
                FacilityState::Installed(1),
                FacilityState::Installed(2),
            ]],
        );
        let path = output_dir("satnet_test_write_decision");

        write_decision(&decision, &network, &path).unwrap();

        let contents =
            fs::read_to_string(path + "/decision.csv").unwrap();
        let expected = "facility,period,installed_level,operating_level,\
                        capacity\ns0,0,1,1,5.0\ns0,1,1,2,10.0\n";
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_write_evaluation() {
        let evaluation = Evaluation {
            outcomes: vec![
                ScenarioOutcome::Cost(122.0),
                ScenarioOutcome::InfeasibleUnderDecision,
                ScenarioOutcome::TimedOut,
            ],
            evaluated_count: 1,
            infeasible_count: 1,
            timed_out_count: 1,
            mean: Some(122.0),
            std_deviation: Some(0.0),
            min: Some(122.0),
            max: Some(122.0),
            gap: Some(0.0),
        };
        let path = output_dir("satnet_test_write_evaluation");

        write_evaluation(&evaluation, &path).unwrap();

        let contents =
            fs::read_to_string(path + "/evaluation.csv").unwrap();
        let expected = "scenario_index,status,cost\n0,optimal,122.0\n\
                        1,infeasible,\n2,timed-out,\n";
        assert_eq!(contents, expected);
    }
}
