use crate::saa::{Evaluation, SaaSolution, ScenarioOutcome};
use std::time::Duration;

pub fn show_greeting() {
    println!("# satnet-rs");
}

pub fn input_reading_line(path: &str) {
    println!("\nReading instance from: {path}");
}

pub fn instance_error_line(path: &str, error: &crate::error::Error) {
    eprintln!("\nInstance {path} failed: {error}");
}

pub fn output_generation_line(path: &str) {
    println!("\nWriting outputs to: {path}");
}

pub fn show_farewell(time: Duration) {
    println!("\nTotal time: {:.2} s", time.as_millis() as f64 / 1000.0);
}

/// Helper function for displaying the greeting data for an instance
pub fn instance_greeting(
    instance_id: &str,
    flexibility: &str,
    num_facilities: usize,
    periods: usize,
) {
    println!("\n# Instance {instance_id}");
    println!("- Flexibility: {flexibility}");
    println!("- Candidate facilities: {num_facilities}");
    println!("- Periods: {periods}");
}

/// Helper function for displaying the greeting data for the training
pub fn training_greeting(num_training: usize) {
    println!("\n# Training");
    println!("- Scenarios: {num_training}");
}

pub fn training_summary(solution: &SaaSolution) {
    let status = match solution.proven_optimal {
        true => "optimal",
        false => "time limit (incumbent)",
    };
    println!("\nStatus: {status}");
    println!("Installed facilities: {}", solution.decision.num_installed());
    println!("In-sample objective ($): {:.4}", solution.in_sample_objective);
    println!("MIP gap: {:.2e}", solution.mip_gap);
}

pub fn training_duration(time: Duration) {
    println!("\nTraining time: {:.2} s", time.as_millis() as f64 / 1000.0)
}

/// Helper function for displaying the greeting data for the evaluation
pub fn evaluation_greeting(num_testing: usize) {
    println!("\n# Evaluating");
    println!("- Scenarios: {num_testing}\n");
}

/// Helper function for displaying the evaluation table header
pub fn evaluation_table_header() {
    println!(
        "{0: ^10} | {1: ^12} | {2: ^15}",
        "scenario", "status", "total cost ($)"
    )
}

/// Helper function for displaying a divider for the evaluation table
pub fn evaluation_table_divider() {
    println!("-------------------------------------------")
}

/// Helper function for displaying a row of scenario results for
/// the evaluation table
pub fn evaluation_table_row(scenario: usize, outcome: &ScenarioOutcome) {
    match outcome {
        ScenarioOutcome::Cost(cost) => println!(
            "{0: >10} | {1: >12} | {2: >15.4}",
            scenario, "optimal", cost
        ),
        ScenarioOutcome::InfeasibleUnderDecision => println!(
            "{0: >10} | {1: >12} | {2: >15}",
            scenario, "infeasible", "-"
        ),
        ScenarioOutcome::TimedOut => println!(
            "{0: >10} | {1: >12} | {2: >15}",
            scenario, "timed-out", "-"
        ),
    }
}

pub fn evaluation_stats(evaluation: &Evaluation) {
    if let (Some(mean), Some(std)) = (evaluation.mean, evaluation.std_deviation)
    {
        println!("\nOut-of-sample cost ($): {:.2} +- {:.2}", mean, std);
    }
    if let Some(gap) = evaluation.gap {
        println!("Out-of-sample gap: {:.2} %", 100.0 * gap);
    }
    if evaluation.infeasible_count > 0 {
        println!("Infeasible scenarios: {}", evaluation.infeasible_count);
    }
    if evaluation.timed_out_count > 0 {
        println!("Timed-out scenarios: {}", evaluation.timed_out_count);
    }
}

pub fn evaluation_duration(time: Duration) {
    println!(
        "\nEvaluation time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    )
}
