use ulid::Ulid;

use crate::model::{BookingStatus, InvalidRange, PricingError};

use super::offers::OfferViolation;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Overlapping blocking bookings.
    Conflict(Vec<Ulid>),
    InvalidRange(InvalidRange),
    InvalidPrice(&'static str),
    InvalidOffer(&'static str),
    /// New bookings start as pending or confirmed.
    InvalidStatus(BookingStatus),
    OfferNotFound(String),
    OfferIneligible(Vec<OfferViolation>),
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },
    HasActiveBookings(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "not available for selected dates; conflicts with: {}", ids.join(", "))
            }
            EngineError::InvalidRange(e) => write!(f, "{e}"),
            EngineError::InvalidPrice(msg) => write!(f, "invalid price: {msg}"),
            EngineError::InvalidOffer(msg) => write!(f, "invalid offer: {msg}"),
            EngineError::InvalidStatus(s) => write!(f, "a new booking cannot start as {s}"),
            EngineError::OfferNotFound(code) => write!(f, "invalid coupon code: {code}"),
            EngineError::OfferIneligible(violations) => {
                let msgs: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                write!(f, "coupon not applicable: {}", msgs.join("; "))
            }
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "booking {id} cannot move from {from} to {to}")
            }
            EngineError::HasActiveBookings(id) => {
                write!(f, "cannot delete room {id}: has active bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<InvalidRange> for EngineError {
    fn from(e: InvalidRange) -> Self {
        EngineError::InvalidRange(e)
    }
}

impl From<PricingError> for EngineError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::InvalidRange(r) => EngineError::InvalidRange(r),
            PricingError::Overflow => EngineError::InvalidPrice("stay total out of range"),
        }
    }
}
