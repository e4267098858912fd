mod decision;
mod error;
pub mod input;
mod log;
pub mod output;
mod policy;
pub mod saa;
pub mod scenario;
mod solver;
mod subproblem;
mod system;
pub mod utils;
use input::Input;
use policy::CapacityPolicy;
use std::error::Error;
use std::time::Instant;

pub fn run(input_args: &InputArgs) -> Result<(), Box<dyn Error>> {
    log::show_greeting();

    let begin = Instant::now();
    for path in input_args.paths.iter() {
        // a broken instance never takes the rest of the batch down
        if let Err(e) = run_instance(path) {
            log::instance_error_line(path, &e);
        }
    }
    log::show_farewell(begin.elapsed());

    Ok(())
}

fn run_instance(path: &str) -> Result<(), error::Error> {
    log::input_reading_line(path);
    let input = Input::build(path)?;
    let instance = input.build_instance()?;
    let policy = CapacityPolicy::new(instance.flexibility);

    log::instance_greeting(
        &instance.instance_id,
        instance.flexibility.as_str(),
        instance.network.facilities.len(),
        instance.network.periods,
    );

    log::training_greeting(instance.training.len());
    let solution = saa::solve_training(
        &instance.network,
        &policy,
        &instance.training,
        instance.continuous_assignment,
        instance.training_time_limit,
    )?;
    log::training_summary(&solution);
    log::training_duration(solution.solve_time);

    log::evaluation_greeting(instance.testing.len());
    let begin = Instant::now();
    let evaluation = saa::evaluate(
        &instance.network,
        &policy,
        &solution,
        &instance.testing,
        instance.continuous_assignment,
        instance.evaluation_time_limit,
        instance.num_workers,
    )?;
    log::evaluation_table_header();
    log::evaluation_table_divider();
    for (scenario, outcome) in evaluation.outcomes.iter().enumerate() {
        log::evaluation_table_row(scenario, outcome);
    }
    log::evaluation_table_divider();
    log::evaluation_stats(&evaluation);
    log::evaluation_duration(begin.elapsed());

    log::output_generation_line(path);
    output::generate_outputs(&instance, &solution, &evaluation, path)?;

    Ok(())
}

pub struct InputArgs {
    pub paths: Vec<String>,
}

impl InputArgs {
    pub fn build(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH ...]");
        }

        let paths = args[1..].to_vec();

        Ok(Self { paths })
    }
}
