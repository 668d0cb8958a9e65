use thiserror::Error;

/// Why a submission was turned away before reaching the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid userkey: {0}")]
    UnknownParticipant(String),

    #[error("already in the queue: {0}")]
    AlreadyInQueue(String),

    #[error("job queue is at capacity ({0})")]
    QueueFull(usize),

    #[error("job queue is closed")]
    QueueClosed,
}

/// Failure of a single functional check, or of a whole benchmark run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BenchmarkError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} responded with status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("{0}")]
    Content(String),

    #[error("media {name} hash mismatch")]
    HashMismatch { name: String },

    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("unable to receive expected results from the endpoint ({endpoint}) in round {round}")]
    ZeroRound { endpoint: String, round: u32 },
}

/// Failure while computing the availability tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("required role labels are not set")]
    NoRequiredRoles,

    #[error("failed to fetch resource inventory: {0}")]
    Inventory(String),

    #[error("resource labelled {key}:{value} is not found")]
    RoleNotFound { key: String, value: String },

    #[error("rule violation: {0} can't be used in this contest")]
    RuleViolation(String),
}

/// Failure writing to or reading from the result store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Startup, configuration and static-data errors.
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ScorerError>;
