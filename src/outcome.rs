//! Result taxonomy returned by mutating operations.
//!
//! Expected conditions (missing node, edge already present) and session faults
//! are values of [`Outcome`], not `Err`s; only declaration defects propagate as
//! [`GraphMapError`].

use serde::Serialize;
use serde_json::Value;

use crate::errors::GraphMapError;

/// Why an operation was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StatusDetail {
    NotFound,
    ActionAlreadyPerformed,
}

/// Coarse classification of an [`Outcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Success,
    Info,
    Warning,
    Rejected,
    Error,
    Unauthorized,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T = ()> {
    Success(T),
    Info {
        data: Option<T>,
        message: String,
    },
    Warning {
        message: String,
        fault: Option<GraphMapError>,
    },
    Rejected {
        detail: Option<StatusDetail>,
        message: String,
    },
    /// A fault raised while talking to the session, with the input that caused it.
    Error {
        fault: GraphMapError,
        input: Option<Value>,
    },
    Unauthorized {
        message: String,
    },
}

impl<T> Outcome<T> {
    pub fn success(data: T) -> Self {
        Outcome::Success(data)
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Outcome::Rejected {
            detail: Some(StatusDetail::NotFound),
            message: message.into(),
        }
    }

    pub fn already_performed<M: Into<String>>(message: M) -> Self {
        Outcome::Rejected {
            detail: Some(StatusDetail::ActionAlreadyPerformed),
            message: message.into(),
        }
    }

    pub fn rejected<M: Into<String>>(message: M) -> Self {
        Outcome::Rejected {
            detail: None,
            message: message.into(),
        }
    }

    pub fn error(fault: GraphMapError, input: Option<Value>) -> Self {
        Outcome::Error { fault, input }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            Outcome::Success(_) => OutcomeStatus::Success,
            Outcome::Info { .. } => OutcomeStatus::Info,
            Outcome::Warning { .. } => OutcomeStatus::Warning,
            Outcome::Rejected { .. } => OutcomeStatus::Rejected,
            Outcome::Error { .. } => OutcomeStatus::Error,
            Outcome::Unauthorized { .. } => OutcomeStatus::Unauthorized,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_unsuccessful(&self) -> bool {
        matches!(
            self,
            Outcome::Rejected { .. } | Outcome::Error { .. } | Outcome::Unauthorized { .. }
        )
    }

    pub fn detail(&self) -> Option<StatusDetail> {
        match self {
            Outcome::Rejected { detail, .. } => *detail,
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Success(data) => Some(data),
            Outcome::Info { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Outcome::Success(data) => Some(data),
            Outcome::Info { data, .. } => data,
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Info { message, .. }
            | Outcome::Warning { message, .. }
            | Outcome::Rejected { message, .. }
            | Outcome::Unauthorized { message } => Some(message),
            Outcome::Success(_) | Outcome::Error { .. } => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(data) => Outcome::Success(f(data)),
            Outcome::Info { data, message } => Outcome::Info {
                data: data.map(f),
                message,
            },
            Outcome::Warning { message, fault } => Outcome::Warning { message, fault },
            Outcome::Rejected { detail, message } => Outcome::Rejected { detail, message },
            Outcome::Error { fault, input } => Outcome::Error { fault, input },
            Outcome::Unauthorized { message } => Outcome::Unauthorized { message },
        }
    }

    /// Re-types a data-free outcome.
    ///
    /// Returns `None` for `Success` and `Info`, which carry data.
    pub fn cast<U>(self) -> Option<Outcome<U>> {
        match self {
            Outcome::Success(_) | Outcome::Info { .. } => None,
            Outcome::Warning { message, fault } => Some(Outcome::Warning { message, fault }),
            Outcome::Rejected { detail, message } => Some(Outcome::Rejected { detail, message }),
            Outcome::Error { fault, input } => Some(Outcome::Error { fault, input }),
            Outcome::Unauthorized { message } => Some(Outcome::Unauthorized { message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_rejected_with_detail() {
        let outcome: Outcome<u32> = Outcome::not_found("missing");
        assert_eq!(outcome.status(), OutcomeStatus::Rejected);
        assert_eq!(outcome.detail(), Some(StatusDetail::NotFound));
        assert!(outcome.is_unsuccessful());
        assert_eq!(outcome.message(), Some("missing"));
    }

    #[test]
    fn test_map_keeps_variant() {
        let outcome = Outcome::success(2).map(|v| v * 10);
        assert_eq!(outcome.into_data(), Some(20));

        let rejected: Outcome<u32> = Outcome::already_performed("dup");
        let mapped = rejected.map(|v| v.to_string());
        assert_eq!(mapped.detail(), Some(StatusDetail::ActionAlreadyPerformed));
    }

    #[test]
    fn test_cast_refuses_success() {
        assert!(Outcome::success(1u8).cast::<String>().is_none());
        let cast = Outcome::<u8>::rejected("no").cast::<String>();
        assert_eq!(cast.map(|o| o.status()), Some(OutcomeStatus::Rejected));
    }
}
