use crate::limits::*;
use crate::model::*;

use super::availability::check_availability;
use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn validate_stay(check_in: Day, check_out: Day) -> Result<Stay, EngineError> {
    let stay = Stay::new(check_in, check_out)?;
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

pub(crate) fn validate_window(from: Day, to: Day) -> Result<(), EngineError> {
    if (to - from).num_days() > MAX_CALENDAR_DAYS {
        return Err(EngineError::LimitExceeded("calendar window too wide"));
    }
    Ok(())
}

pub(crate) fn validate_price(price: Money) -> Result<(), EngineError> {
    if price < Money::ZERO {
        return Err(EngineError::InvalidPrice("must not be negative"));
    }
    if price > Money::from(MAX_PRICE) {
        return Err(EngineError::InvalidPrice("exceeds maximum price"));
    }
    Ok(())
}

/// Write-time availability check. Run under the room's write lock so the
/// answer cannot go stale before the booking is applied.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    scope: RoomScope,
    stay: &Stay,
) -> Result<(), EngineError> {
    let candidates = rs.overlapping(stay).map(|b| &b.range);
    match check_availability(candidates, scope, stay.check_in, stay.check_out) {
        Availability::Available => Ok(()),
        Availability::Conflict(ids) => Err(EngineError::Conflict(ids)),
        Availability::InvalidRange => Err(EngineError::InvalidRange(InvalidRange {
            check_in: stay.check_in,
            check_out: stay.check_out,
        })),
    }
}
