use thiserror::Error;

/// Everything that can abort the processing of a single instance.
///
/// Fatal variants stop the current instance only; a batch run keeps going
/// with the next one. Recoverable situations at the evaluation level
/// (a scenario being infeasible under the fixed decision, or timing out)
/// are not errors at all and live in [`crate::saa::ScenarioOutcome`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed scenario {index}: {reason}")]
    MalformedScenario { index: usize, reason: String },

    #[error(
        "no admissible capacity state covers scenario {scenario} \
         in period {period}"
    )]
    InfeasiblePolicy { scenario: usize, period: usize },

    #[error("training model is infeasible")]
    SolverInfeasible,

    #[error("training model is unbounded")]
    SolverUnbounded,

    #[error("solver hit the time limit without a feasible incumbent")]
    SolverTimeout,

    #[error("solver failure: {0}")]
    Solver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
