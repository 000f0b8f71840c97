use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Expected HTTP response {}, actual was {actual}: {body}", join_codes(.expected))]
    UnexpectedStatus {
        expected: Vec<u16>,
        actual: u16,
        body: String,
    },

    #[error("Build request was not accepted: {body}")]
    UnexpectedOutcome { body: String },

    #[error("Too many failures for owner {owner}: {failures} of {total} build requests failed")]
    TooManyFailures {
        owner: String,
        failures: usize,
        total: usize,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    /// Whether the driver may count this error against the owner instead of aborting.
    pub fn is_build_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. } | Self::UnexpectedOutcome { .. }
        )
    }
}

fn join_codes(codes: &[u16]) -> String {
    codes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
