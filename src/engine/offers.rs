use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use ulid::Ulid;

use crate::model::*;

// ── Offer Resolver ────────────────────────────────────────────────

/// One violated eligibility rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferViolation {
    Inactive,
    NotYetValid { valid_from: Ms },
    Expired { valid_until: Ms },
    UsageLimitReached { limit: u32 },
    BelowMinimum { minimum: Money },
    WrongHotel,
}

impl fmt::Display for OfferViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferViolation::Inactive => write!(f, "offer is not active"),
            OfferViolation::NotYetValid { .. } => write!(f, "offer is not valid yet"),
            OfferViolation::Expired { .. } => write!(f, "offer has expired"),
            OfferViolation::UsageLimitReached { limit } => {
                write!(f, "offer usage limit reached ({limit} uses)")
            }
            OfferViolation::BelowMinimum { minimum } => {
                write!(f, "minimum booking amount is {minimum}")
            }
            OfferViolation::WrongHotel => write!(f, "offer is not valid for this hotel"),
        }
    }
}

/// Every rule an offer failed, in check order. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferValidation {
    pub errors: Vec<OfferViolation>,
}

impl OfferValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The single most relevant reason, for user-facing messages.
    pub fn first_error(&self) -> Option<&OfferViolation> {
        self.errors.first()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Check every eligibility rule independently; nothing short-circuits.
pub fn validate_offer(offer: &Offer, hotel_id: Ulid, booking_amount: Money, now: Ms) -> OfferValidation {
    let mut errors = Vec::new();

    if !offer.is_active {
        errors.push(OfferViolation::Inactive);
    }

    if now < offer.valid_from {
        errors.push(OfferViolation::NotYetValid { valid_from: offer.valid_from });
    } else if now > offer.valid_until {
        errors.push(OfferViolation::Expired { valid_until: offer.valid_until });
    }

    if offer.usage_limit > 0 && offer.usage_count >= offer.usage_limit {
        errors.push(OfferViolation::UsageLimitReached { limit: offer.usage_limit });
    }

    if booking_amount < offer.min_booking_amount {
        errors.push(OfferViolation::BelowMinimum { minimum: offer.min_booking_amount });
    }

    if !offer.applies_to_hotel(hotel_id) {
        errors.push(OfferViolation::WrongHotel);
    }

    OfferValidation { errors }
}

/// Discount to subtract from `booking_amount`.
///
/// Percentage discounts are rounded to cents and capped by
/// `max_discount_amount`. The result always lies in `[0, booking_amount]`,
/// for any amount `Money` can hold.
pub fn calculate_discount(offer: &Offer, booking_amount: Money) -> Money {
    let amount = booking_amount.max(Money::ZERO);
    let discount = match offer.discount_type {
        DiscountType::Percentage => {
            // Divide first when the product would not fit. If even that
            // overflows the rate is above 100% and the amount is the cap.
            let pct = amount
                .checked_mul(offer.discount_value)
                .and_then(|p| p.checked_div(Decimal::ONE_HUNDRED))
                .or_else(|| (amount / Decimal::ONE_HUNDRED).checked_mul(offer.discount_value))
                .unwrap_or(amount)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            match offer.max_discount_amount {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
        DiscountType::Fixed => offer.discount_value,
    };
    discount.max(Money::ZERO).min(amount)
}

/// Coupon codes are matched case-insensitively, ignoring surrounding blanks.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Build the coupon endpoint result. `offer` is `None` when the code did not
/// resolve for the hotel.
pub fn coupon_check(offer: Option<&Offer>, hotel_id: Ulid, booking_amount: Money, now: Ms) -> CouponCheck {
    let Some(offer) = offer else {
        return CouponCheck {
            valid: false,
            error: Some("invalid coupon code".into()),
            discount_amount: Money::ZERO,
            message: "coupon invalid: invalid coupon code".into(),
        };
    };

    let validation = validate_offer(offer, hotel_id, booking_amount, now);
    match validation.first_error() {
        Some(reason) => CouponCheck {
            valid: false,
            error: Some(reason.to_string()),
            discount_amount: Money::ZERO,
            message: format!("coupon invalid: {}", validation.messages().join("; ")),
        },
        None => {
            let discount = calculate_discount(offer, booking_amount);
            CouponCheck {
                valid: true,
                error: None,
                discount_amount: discount,
                message: format!("coupon {} applied: you save {discount}", offer.code),
            }
        }
    }
}
