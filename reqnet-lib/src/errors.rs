//! Error types for ledger operations.
//!
//! Every failure is fatal to the surrounding transaction: the ledger undoes
//! its writes and nothing is retried internally. Errors are grouped into
//! five kinds so callers can decide whether to fix their input, wait for a
//! state change, or give up.

use crate::types::{Address, AssetId, RequestId, RequestState};
use crate::Amount;

/// Broad classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the required role (payer, payee, trusted extension, admin).
    Authorization,
    /// Operation is invalid for the current lifecycle state.
    State,
    /// Malformed input.
    Validation,
    /// Signed-request verification failed.
    Protocol,
    /// Attached value or transferable balance does not match the requirement.
    Value,
}

/// Numeric error codes for indexers and foreign callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LedgerErrorCode {
    Unauthorized = 1000,
    UntrustedExtension = 1001,
    NotOwner = 1002,
    NotAdmin = 1003,
    InvalidState = 2000,
    BalanceNotNull = 2001,
    RequestLocked = 2002,
    Paused = 2003,
    RefundRouteAlreadySet = 2004,
    EscrowClosed = 2005,
    UnknownRequest = 3000,
    InvalidInput = 3001,
    Overflow = 3002,
    ZeroAddress = 3003,
    IndexOutOfRange = 3004,
    Serialization = 3005,
    Storage = 3006,
    SignatureMismatch = 4000,
    Expired = 4001,
    SelfDealing = 4002,
    PayerMismatch = 4003,
    WrongExtension = 4004,
    AlreadyRedeemed = 4005,
    WrongAsset = 4006,
    ValueMismatch = 5000,
    InsufficientFunds = 5001,
    InsufficientAllowance = 5002,
}

/// Role a caller was expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Payer,
    Payee,
    PayerOrPayee,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Payer => f.write_str("payer"),
            Role::Payee => f.write_str("payee"),
            Role::PayerOrPayee => f.write_str("payer or payee"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{caller} is not the {role} of request {request_id}")]
    Unauthorized {
        request_id: RequestId,
        caller: Address,
        role: Role,
    },

    #[error("{0} is not a trusted extension")]
    UntrustedExtension(Address),

    #[error("extension {caller} does not own request {request_id}")]
    NotOwner {
        request_id: RequestId,
        caller: Address,
    },

    #[error("{0} is not the administrator")]
    NotAdmin(Address),

    #[error("cannot {operation} request {request_id} in state {state}")]
    InvalidState {
        request_id: RequestId,
        state: RequestState,
        operation: &'static str,
    },

    #[error("request {0} still holds a non-zero balance")]
    BalanceNotNull(RequestId),

    #[error("request {0} is locked by an operation in progress")]
    RequestLocked(RequestId),

    #[error("request creation is paused")]
    Paused,

    #[error("payer refund route already set on request {0}")]
    RefundRouteAlreadySet(RequestId),

    #[error("escrow of request {0} has already been settled")]
    EscrowClosed(RequestId),

    #[error("unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),

    #[error("payee index {index} out of range ({count} payees)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("signature does not match the signed terms")]
    SignatureMismatch,

    #[error("authorization expired at {expires_at} (now {now})")]
    Expired { expires_at: i64, now: i64 },

    #[error("{0} cannot redeem a request it signed")]
    SelfDealing(Address),

    #[error("request is restricted to payer {expected}, got {actual}")]
    PayerMismatch { expected: Address, actual: Address },

    #[error("signed for extension {signed}, broadcast to {actual}")]
    WrongExtension { signed: Address, actual: Address },

    #[error("signed request has already been redeemed")]
    AlreadyRedeemed,

    #[error("signed for asset {signed}, broadcast to an extension settling {actual}")]
    WrongAsset { signed: AssetId, actual: AssetId },

    #[error("attached value {attached} does not match required {required}")]
    ValueMismatch { required: Amount, attached: Amount },

    #[error("insufficient funds for {owner}: need {required}, have {available}")]
    InsufficientFunds {
        owner: Address,
        required: Amount,
        available: Amount,
    },

    #[error("insufficient allowance from {owner}: need {required}, have {available}")]
    InsufficientAllowance {
        owner: Address,
        required: Amount,
        available: Amount,
    },
}

impl LedgerError {
    /// Get the numeric error code.
    pub fn code(&self) -> LedgerErrorCode {
        match self {
            Self::Unauthorized { .. } => LedgerErrorCode::Unauthorized,
            Self::UntrustedExtension(_) => LedgerErrorCode::UntrustedExtension,
            Self::NotOwner { .. } => LedgerErrorCode::NotOwner,
            Self::NotAdmin(_) => LedgerErrorCode::NotAdmin,
            Self::InvalidState { .. } => LedgerErrorCode::InvalidState,
            Self::BalanceNotNull(_) => LedgerErrorCode::BalanceNotNull,
            Self::RequestLocked(_) => LedgerErrorCode::RequestLocked,
            Self::Paused => LedgerErrorCode::Paused,
            Self::RefundRouteAlreadySet(_) => LedgerErrorCode::RefundRouteAlreadySet,
            Self::EscrowClosed(_) => LedgerErrorCode::EscrowClosed,
            Self::UnknownRequest(_) => LedgerErrorCode::UnknownRequest,
            Self::InvalidInput { .. } => LedgerErrorCode::InvalidInput,
            Self::Overflow(_) => LedgerErrorCode::Overflow,
            Self::ZeroAddress(_) => LedgerErrorCode::ZeroAddress,
            Self::IndexOutOfRange { .. } => LedgerErrorCode::IndexOutOfRange,
            Self::Serialization(_) => LedgerErrorCode::Serialization,
            Self::Storage(_) => LedgerErrorCode::Storage,
            Self::SignatureMismatch => LedgerErrorCode::SignatureMismatch,
            Self::Expired { .. } => LedgerErrorCode::Expired,
            Self::SelfDealing(_) => LedgerErrorCode::SelfDealing,
            Self::PayerMismatch { .. } => LedgerErrorCode::PayerMismatch,
            Self::WrongExtension { .. } => LedgerErrorCode::WrongExtension,
            Self::AlreadyRedeemed => LedgerErrorCode::AlreadyRedeemed,
            Self::WrongAsset { .. } => LedgerErrorCode::WrongAsset,
            Self::ValueMismatch { .. } => LedgerErrorCode::ValueMismatch,
            Self::InsufficientFunds { .. } => LedgerErrorCode::InsufficientFunds,
            Self::InsufficientAllowance { .. } => LedgerErrorCode::InsufficientAllowance,
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self.code() as i32 / 1000 {
            1 => ErrorKind::Authorization,
            2 => ErrorKind::State,
            3 => ErrorKind::Validation,
            4 => ErrorKind::Protocol,
            _ => ErrorKind::Value,
        }
    }

    /// Get the error message as an owned String.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_state(
        request_id: RequestId,
        state: RequestState,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            request_id,
            state,
            operation,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_code_group() {
        assert_eq!(LedgerError::Paused.kind(), ErrorKind::State);
        assert_eq!(LedgerError::SignatureMismatch.kind(), ErrorKind::Protocol);
        assert_eq!(
            LedgerError::NotAdmin(Address::ZERO).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(LedgerError::Overflow("balance").kind(), ErrorKind::Validation);
        assert_eq!(
            LedgerError::ValueMismatch {
                required: Amount::new(5),
                attached: Amount::new(4),
            }
            .kind(),
            ErrorKind::Value
        );
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::Expired {
            expires_at: 100,
            now: 101,
        };
        assert!(err.to_string().contains("expired"));
        assert_eq!(err.code(), LedgerErrorCode::Expired);

        let err = LedgerError::invalid_input("amounts", "more entries than payees");
        assert_eq!(err.code(), LedgerErrorCode::InvalidInput);
        assert!(err.message().contains("amounts"));
    }
}
