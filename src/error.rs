use thiserror::Error;

/// Failures the engine can report. Neither is recoverable mid-round.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A sampling request or parameter that cannot be satisfied, caught before any round runs.
    #[error("invalid parameter `{name}`: requested {requested}, but only {available} available")]
    InvalidParameter {
        name: &'static str,
        requested: String,
        available: String,
    },
    /// The occupancy grid and an agent disagree about where the agent is.
    #[error("inconsistent simulation state: {0}")]
    InconsistentState(String),
}

impl SimError {
    pub fn invalid(name: &'static str, requested: impl ToString, available: impl ToString) -> Self {
        SimError::InvalidParameter {
            name,
            requested: requested.to_string(),
            available: available.to_string(),
        }
    }

    /// Rejects probabilities and fractions outside `[0, 1]`.
    pub fn check_probability(name: &'static str, value: f64) -> SimResult<()> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(SimError::invalid(name, value, "a value in [0, 1]"))
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
