//! Error type shared by every solver component.

/// Errors raised by the TTP solver.
///
/// Infeasible packing plans are *not* errors: they evaluate to sentinel
/// objective values (see [`crate::solution::Solution::is_feasible`]).
#[derive(Debug, Clone, PartialEq)]
pub enum TTPError {
    /// Malformed tour, packing plan or instance data.
    InvalidInput(String),
    /// A parameter outside its legal range.
    InvalidConfig(String),
    /// A colony task panicked; the whole batch is aborted.
    WorkerFailure { colony: usize, message: String },
    /// The worker pool could not be created.
    ThreadPool(String),
    /// Configuration file could not be read or parsed.
    Config(String),
}

impl TTPError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        TTPError::InvalidInput(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        TTPError::InvalidConfig(msg.into())
    }
}

impl std::fmt::Display for TTPError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TTPError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            TTPError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            TTPError::WorkerFailure { colony, message } => {
                write!(f, "Colony {} failed: {}", colony, message)
            }
            TTPError::ThreadPool(msg) => write!(f, "Cannot build worker pool: {}", msg),
            TTPError::Config(msg) => write!(f, "Cannot load configuration: {}", msg),
        }
    }
}

impl std::error::Error for TTPError {}

pub type Result<T> = std::result::Result<T, TTPError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_colony() {
        let err = TTPError::WorkerFailure { colony: 3, message: "boom".to_string() };
        assert_eq!(err.to_string(), "Colony 3 failed: boom");
    }
}
