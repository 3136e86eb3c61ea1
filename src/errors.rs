use thiserror::Error;

/// Error type for cyphervector operations.
///
/// Expected conditions (missing nodes, duplicate actions) are reported through
/// [`crate::Outcome`]; this type covers declaration defects and read failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphMapError {
    #[error("invalid vector shape: {0}")]
    InvalidVectorShape(String),
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GraphMapError {
    pub fn shape<T: Into<String>>(msg: T) -> Self {
        GraphMapError::InvalidVectorShape(msg.into())
    }

    pub fn declaration<T: Into<String>>(msg: T) -> Self {
        GraphMapError::InvalidDeclaration(msg.into())
    }

    pub fn session<T: Into<String>>(msg: T) -> Self {
        GraphMapError::Session(msg.into())
    }

    pub fn decode<T: Into<String>>(msg: T) -> Self {
        GraphMapError::Decode(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        GraphMapError::InvalidInput(msg.into())
    }

    /// True for errors caused by how types were declared rather than by data or I/O.
    ///
    /// These are never folded into an [`crate::Outcome`].
    pub fn is_declaration_defect(&self) -> bool {
        matches!(
            self,
            GraphMapError::InvalidVectorShape(_) | GraphMapError::InvalidDeclaration(_)
        )
    }
}

/// Error reported by a [`crate::session::GraphSession`] implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("statement rejected: {0}")]
    Rejected(String),
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl SessionError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        SessionError::Connection(msg.into())
    }

    pub fn rejected<T: Into<String>>(msg: T) -> Self {
        SessionError::Rejected(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        SessionError::Transaction(msg.into())
    }
}

impl From<SessionError> for GraphMapError {
    fn from(err: SessionError) -> Self {
        GraphMapError::Session(err.to_string())
    }
}

impl From<serde_json::Error> for GraphMapError {
    fn from(err: serde_json::Error) -> Self {
        GraphMapError::Decode(err.to_string())
    }
}
