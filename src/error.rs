use thiserror::Error;

/// Failure talking to the job-board API.
///
/// Isolated per company during ingestion: the company is skipped and the
/// run moves on to the next one.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status that was not worth retrying (or ran out of retries).
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The body arrived but could not be decoded as a vacancy page.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl FetchError {
    /// Timeouts, connection failures, 5xx and 429 may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure in the relational store.
///
/// Fatal while opening the database or creating the schema; isolated per
/// record while ingesting.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Wraps every SQLite failure, including constraint violations such as a
    /// vacancy that points at a company that does not exist.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cannot prepare database location {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PersistenceError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            PersistenceError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Missing or invalid startup settings. Always fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no company names configured; set COMPANY_NAMES or pass --companies")]
    NoCompanies,

    #[error("invalid value '{value}' for {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        value: String,
        reason: String,
    },
}
