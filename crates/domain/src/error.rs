/// Shared error type used across all rosterwatch crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    /// The store's version precondition was rejected (concurrent writer won).
    #[error("store conflict: {0}")]
    StoreConflict(String),

    /// A non-conflict write failure; the tick's work is lost.
    #[error("store fatal: {0}")]
    StoreFatal(String),

    /// Malformed or otherwise rejected client input; maps to 4xx at the API edge.
    #[error("invalid input: {0}")]
    ClientInput(String),

    /// Requested resource does not exist; maps to 404 at the API edge.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested resource already exists; maps to 409 at the API edge.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
