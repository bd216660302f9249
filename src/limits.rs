//! Hard caps on tenant-controlled input.

pub const MAX_ROOMS_PER_TENANT: usize = 100_000;
pub const MAX_OFFERS_PER_TENANT: usize = 100_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 50_000;
pub const MAX_SPECIAL_RATES_PER_ROOM: usize = 3_660;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_NOTE_LEN: usize = 1_024;
pub const MAX_CODE_LEN: usize = 64;
pub const MAX_APPLICABLE_HOTELS: usize = 1_000;

/// Largest accepted price, discount or booking amount, in whole currency
/// units. A year-long stay at this rate still fits a `Decimal`.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: u32 = 365;
/// Widest calendar / booked-nights query, in days.
pub const MAX_CALENDAR_DAYS: i64 = 732;

pub const MAX_SQL_LENGTH: usize = 64 * 1024;
pub const MAX_ROWS_PER_INSERT: usize = 1_000;

pub const MAX_TENANTS: usize = 1_000;
pub const MAX_TENANT_NAME_LEN: usize = 128;
