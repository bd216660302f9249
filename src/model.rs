use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. Used for instants (offer windows, redemption times).
pub type Ms = i64;

/// A calendar day. Stay dates never carry a time of day, so special-rate
/// matching is by day identity and immune to timezone drift.
pub type Day = NaiveDate;

pub type Money = Decimal;

// ── Stays ────────────────────────────────────────────────────────

/// Half-open stay `[check_in, check_out)`: occupies the nights
/// `check_in ..= check_out - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: Day,
    pub check_out: Day,
}

/// `check_out <= check_in`. A structured failure, not a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRange {
    pub check_in: Day,
    pub check_out: Day,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid range: check-out {} must be after check-in {}",
            self.check_out, self.check_in
        )
    }
}

impl std::error::Error for InvalidRange {}

/// Why a stay could not be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    InvalidRange(InvalidRange),
    /// The subtotal does not fit in `Money`.
    Overflow,
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::InvalidRange(e) => write!(f, "{e}"),
            PricingError::Overflow => write!(f, "stay total is out of range"),
        }
    }
}

impl std::error::Error for PricingError {}

impl From<InvalidRange> for PricingError {
    fn from(e: InvalidRange) -> Self {
        PricingError::InvalidRange(e)
    }
}

impl Stay {
    pub fn new(check_in: Day, check_out: Day) -> Result<Self, InvalidRange> {
        if check_out <= check_in {
            return Err(InvalidRange { check_in, check_out });
        }
        Ok(Self { check_in, check_out })
    }

    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_night(&self, day: Day) -> bool {
        self.check_in <= day && day < self.check_out
    }

    /// Every night of the stay, in order.
    pub fn nights_iter(&self) -> impl Iterator<Item = Day> {
        let end = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < end)
    }
}

// ── Rates ────────────────────────────────────────────────────────

/// Set of weekdays, indexed 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    /// Friday and Saturday nights.
    pub fn weekend() -> Self {
        Self((1 << 5) | (1 << 6))
    }

    /// `None` if any index is outside 0..=6.
    pub fn from_indices(days: &[u8]) -> Option<Self> {
        let mut bits = 0u8;
        for &d in days {
            if d > 6 {
                return None;
            }
            bits |= 1 << d;
        }
        Some(Self(bits))
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0 & (1 << weekday.num_days_from_sunday()) != 0
    }

    pub fn indices(&self) -> Vec<u8> {
        (0..7).filter(|d| self.0 & (1 << d) != 0).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for WeekdaySet {
    fn default() -> Self {
        Self::weekend()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.indices().iter().map(|d| d.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// Which rule priced a night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateTier {
    Special,
    Weekend,
    Base,
}

impl RateTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateTier::Special => "special",
            RateTier::Weekend => "weekend",
            RateTier::Base => "base",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekendPricing {
    pub enabled: bool,
    pub price: Money,
    pub days: WeekdaySet,
}

impl Default for WeekendPricing {
    fn default() -> Self {
        Self {
            enabled: false,
            price: Money::ZERO,
            days: WeekdaySet::weekend(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialRate {
    pub date: Day,
    pub price: Money,
    pub note: String,
}

/// Nightly pricing owned by a room. Precedence: special > weekend > base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRateConfig {
    pub base_price: Money,
    pub weekend: WeekendPricing,
    /// Per-date overrides in insertion order.
    pub special_rates: Vec<SpecialRate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightPrice {
    pub date: Day,
    pub price: Money,
    pub tier: RateTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayPrice {
    pub nights: u32,
    pub subtotal: Money,
    pub breakdown: Vec<NightPrice>,
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Rejected,
    NoShow,
}

impl BookingStatus {
    /// Statuses that occupy the room for availability purposes.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Rejected)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
                | (CheckedIn, CheckedOut)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "checked_in" => Ok(BookingStatus::CheckedIn),
            "checked_out" => Ok(BookingStatus::CheckedOut),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "rejected" => Ok(BookingStatus::Rejected),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Ownership scope of an availability check: a whole room type, or one
/// physical unit of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomScope {
    Room(Ulid),
    Unit { room_id: Ulid, unit_id: Ulid },
}

/// The part of a booking that availability cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRange {
    pub booking_id: Ulid,
    pub room_id: Ulid,
    pub unit_id: Option<Ulid>,
    pub stay: Stay,
    pub status: BookingStatus,
}

impl BookingRange {
    pub fn in_scope(&self, scope: RoomScope) -> bool {
        match scope {
            RoomScope::Room(id) => self.room_id == id,
            // A room-level booking holds every unit of the room.
            RoomScope::Unit { room_id, unit_id } => match self.unit_id {
                Some(id) => id == unit_id,
                None => self.room_id == room_id,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub range: BookingRange,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub offer_id: Option<Ulid>,
    pub created_at: Ms,
}

impl Booking {
    pub fn id(&self) -> Ulid {
        self.range.booking_id
    }
}

/// Result of an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Overlapping blocking bookings, in booking order.
    Conflict(Vec<Ulid>),
    InvalidRange,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn conflicting_booking_ids(&self) -> &[Ulid] {
        match self {
            Availability::Conflict(ids) => ids,
            _ => &[],
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Availability::Available => None,
            Availability::Conflict(_) => Some("not available for selected dates"),
            Availability::InvalidRange => Some("invalid range"),
        }
    }
}

// ── Offers ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "percentage" | "percent" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferScope {
    Platform,
    Hotel,
}

impl OfferScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferScope::Platform => "platform",
            OfferScope::Hotel => "hotel",
        }
    }
}

impl FromStr for OfferScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "platform" => Ok(OfferScope::Platform),
            "hotel" => Ok(OfferScope::Hotel),
            other => Err(format!("unknown offer scope: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub booking_id: Ulid,
    pub hotel_id: Ulid,
    pub discount: Money,
    pub at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Ulid,
    /// Upper-cased on write.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_booking_amount: Money,
    /// Caps percentage discounts.
    pub max_discount_amount: Option<Money>,
    /// Inclusive window.
    pub valid_from: Ms,
    pub valid_until: Ms,
    /// 0 = unlimited.
    pub usage_limit: u32,
    pub usage_count: u32,
    pub scope: OfferScope,
    /// Required when `scope == Hotel`.
    pub hotel_id: Option<Ulid>,
    /// Restricts a platform offer when non-empty.
    pub applicable_hotels: Vec<Ulid>,
    pub is_active: bool,
    pub redemptions: Vec<Redemption>,
}

impl Offer {
    /// Count a use. Keyed by booking id: recording the same booking twice
    /// is a no-op. Returns whether the redemption was new.
    pub fn record_redemption(&mut self, redemption: &Redemption) -> bool {
        if self
            .redemptions
            .iter()
            .any(|r| r.booking_id == redemption.booking_id)
        {
            return false;
        }
        self.redemptions.push(redemption.clone());
        self.usage_count += 1;
        true
    }

    /// Whether this offer may be used at `hotel_id` at all.
    pub fn applies_to_hotel(&self, hotel_id: Ulid) -> bool {
        match self.scope {
            OfferScope::Hotel => self.hotel_id == Some(hotel_id),
            OfferScope::Platform => {
                self.applicable_hotels.is_empty() || self.applicable_hotels.contains(&hotel_id)
            }
        }
    }
}

/// Input to `Engine::create_booking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub unit_id: Option<Ulid>,
    pub check_in: Day,
    pub check_out: Day,
    pub status: BookingStatus,
    pub coupon: Option<String>,
}

// ── Room state ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub name: Option<String>,
    pub rates: RoomRateConfig,
    /// All bookings, any status, sorted by `check_in`.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(id: Ulid, hotel_id: Ulid, name: Option<String>, rates: RoomRateConfig) -> Self {
        Self {
            id,
            hotel_id,
            name,
            rates,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by check-in.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.range.stay.check_in <= booking.range.stay.check_in);
        self.bookings.insert(pos, booking);
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id() == id)
    }

    /// Bookings whose stay overlaps the query, any status.
    /// Skips everything checking in on or after `query.check_out`.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.stay.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.stay.check_out > query.check_in)
    }

    pub fn has_blocking_bookings(&self) -> bool {
        self.bookings.iter().any(|b| b.range.status.is_blocking())
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        hotel_id: Ulid,
        name: Option<String>,
        rates: RoomRateConfig,
    },
    RoomDeleted {
        id: Ulid,
    },
    RoomRatesUpdated {
        room_id: Ulid,
        base_price: Money,
        weekend: WeekendPricing,
    },
    SpecialRateSet {
        room_id: Ulid,
        rate: SpecialRate,
    },
    SpecialRateRemoved {
        room_id: Ulid,
        date: Day,
    },
    /// `redemption` is recorded on `booking.offer_id` in the same record, so
    /// a booking and its coupon use are persisted together.
    BookingCreated {
        booking: Booking,
        redemption: Option<Redemption>,
    },
    BookingStatusChanged {
        id: Ulid,
        room_id: Ulid,
        status: BookingStatus,
    },
    OfferCreated {
        offer: Offer,
    },
    OfferDeactivated {
        id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub name: Option<String>,
    pub base_price: Money,
    pub weekend: WeekendPricing,
    pub special_rate_count: usize,
}

/// A priced stay, optionally discounted by a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub room_id: Ulid,
    pub stay: Stay,
    pub nights: u32,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub breakdown: Vec<NightPrice>,
    pub offer_id: Option<Ulid>,
}

/// Coupon endpoint result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheck {
    pub valid: bool,
    pub error: Option<String>,
    pub discount_amount: Money,
    pub message: String,
}

/// One day of the pricing calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: Day,
    pub price: Money,
    pub tier: RateTier,
    pub booked: bool,
}
