use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::limits::{MAX_ROWS_PER_INSERT, MAX_SQL_LENGTH};
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        id: Ulid,
        hotel_id: Ulid,
        name: Option<String>,
        rates: RoomRateConfig,
    },
    DeleteRoom {
        id: Ulid,
    },
    UpsertRoomRates {
        room_id: Ulid,
        base_price: Money,
        weekend: WeekendPricing,
    },
    InsertSpecialRates {
        rates: Vec<(Ulid, SpecialRate)>, // (room_id, rate)
    },
    DeleteSpecialRate {
        room_id: Ulid,
        date: Day,
    },
    InsertOffer {
        offer: Offer,
    },
    DeactivateOffer {
        id: Ulid,
    },
    InsertBooking {
        booking: NewBooking,
    },
    CancelBooking {
        id: Ulid,
    },
    UpdateBookingStatus {
        id: Ulid,
        status: BookingStatus,
    },
    SelectAvailability {
        room_id: Ulid,
        unit_id: Option<Ulid>,
        check_in: Day,
        check_out: Day,
    },
    SelectQuote {
        room_id: Ulid,
        check_in: Day,
        check_out: Day,
        coupon: Option<String>,
    },
    SelectCouponCheck {
        hotel_id: Ulid,
        code: String,
        amount: Money,
    },
    SelectRateCalendar {
        room_id: Ulid,
        from: Day,
        to: Day,
    },
    SelectRooms,
    SelectSpecialRates {
        room_id: Ulid,
    },
    SelectBookings {
        room_id: Ulid,
    },
    SelectOffers {
        hotel_id: Option<Ulid>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    if sql.len() > MAX_SQL_LENGTH {
        return Err(SqlError::TooLong(sql.len()));
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

const ROOM_COLUMNS: &[&str] = &[
    "id",
    "hotel_id",
    "name",
    "base_price",
    "weekend_enabled",
    "weekend_price",
    "weekend_days",
];
const ROOM_RATE_COLUMNS: &[&str] = &[
    "room_id",
    "base_price",
    "weekend_enabled",
    "weekend_price",
    "weekend_days",
];
const SPECIAL_RATE_COLUMNS: &[&str] = &["room_id", "date", "price", "note"];
const OFFER_COLUMNS: &[&str] = &[
    "id",
    "code",
    "discount_type",
    "discount_value",
    "min_booking_amount",
    "max_discount_amount",
    "valid_from",
    "valid_until",
    "usage_limit",
    "scope",
    "hotel_id",
    "applicable_hotels",
];
const BOOKING_COLUMNS: &[&str] = &["id", "room_id", "check_in", "check_out", "unit_id", "coupon", "status"];
const BOOKING_STATUS_COLUMNS: &[&str] = &["booking_id", "status"];

/// One VALUES row, addressed by column name. Without an explicit column
/// list the table's declared column order applies.
struct Row<'a> {
    table: &'static str,
    columns: Vec<String>,
    values: &'a [Expr],
}

impl<'a> Row<'a> {
    fn new(
        table: &'static str,
        declared: &'static [&'static str],
        insert: &ast::Insert,
        values: &'a [Expr],
    ) -> Result<Self, SqlError> {
        let columns: Vec<String> = if insert.columns.is_empty() {
            declared.iter().map(|c| c.to_string()).collect()
        } else {
            insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
        };
        for col in &columns {
            if !declared.contains(&col.as_str()) {
                return Err(SqlError::UnknownColumn(table, col.clone()));
            }
        }
        if values.len() > columns.len() {
            return Err(SqlError::WrongArity(table, columns.len(), values.len()));
        }
        if !insert.columns.is_empty() && values.len() != columns.len() {
            return Err(SqlError::WrongArity(table, columns.len(), values.len()));
        }
        Ok(Self { table, columns, values })
    }

    /// The value for `col`, `None` when absent or NULL.
    fn get(&self, col: &str) -> Option<&'a Expr> {
        let idx = self.columns.iter().position(|c| c == col)?;
        let expr = self.values.get(idx)?;
        if is_null(expr) { None } else { Some(expr) }
    }

    fn require(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(col).ok_or(SqlError::MissingColumn(self.table, col))
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = extract_all_insert_rows(insert)?;
    if rows.len() > MAX_ROWS_PER_INSERT {
        return Err(SqlError::TooManyRows(rows.len()));
    }

    match table.as_str() {
        "special_rates" => {
            let mut rates = Vec::with_capacity(rows.len());
            for (i, values) in rows.iter().enumerate() {
                let row = Row::new("special_rates", SPECIAL_RATE_COLUMNS, insert, values)?;
                rates.push(parse_special_rate_row(&row).map_err(|e| e.in_row(i))?);
            }
            Ok(Command::InsertSpecialRates { rates })
        }
        _ if rows.len() > 1 => Err(SqlError::Unsupported(format!("multi-row INSERT into {table}"))),
        "rooms" => {
            let row = Row::new("rooms", ROOM_COLUMNS, insert, &rows[0])?;
            let rates = RoomRateConfig {
                base_price: parse_money(row.require("base_price")?)?,
                weekend: parse_weekend(&row)?,
                special_rates: Vec::new(),
            };
            Ok(Command::InsertRoom {
                id: parse_ulid(row.require("id")?)?,
                hotel_id: parse_ulid(row.require("hotel_id")?)?,
                name: row.get("name").map(parse_string).transpose()?,
                rates,
            })
        }
        "room_rates" => {
            let row = Row::new("room_rates", ROOM_RATE_COLUMNS, insert, &rows[0])?;
            Ok(Command::UpsertRoomRates {
                room_id: parse_ulid(row.require("room_id")?)?,
                base_price: parse_money(row.require("base_price")?)?,
                weekend: parse_weekend(&row)?,
            })
        }
        "offers" => {
            let row = Row::new("offers", OFFER_COLUMNS, insert, &rows[0])?;
            Ok(Command::InsertOffer {
                offer: parse_offer_row(&row)?,
            })
        }
        "bookings" => {
            let row = Row::new("bookings", BOOKING_COLUMNS, insert, &rows[0])?;
            let status = match row.get("status") {
                Some(expr) => parse_status(expr)?,
                None => BookingStatus::Confirmed,
            };
            Ok(Command::InsertBooking {
                booking: NewBooking {
                    id: parse_ulid(row.require("id")?)?,
                    room_id: parse_ulid(row.require("room_id")?)?,
                    unit_id: row.get("unit_id").map(parse_ulid).transpose()?,
                    check_in: parse_date(row.require("check_in")?)?,
                    check_out: parse_date(row.require("check_out")?)?,
                    status,
                    coupon: row
                        .get("coupon")
                        .map(parse_string)
                        .transpose()?
                        .filter(|c| !c.trim().is_empty()),
                },
            })
        }
        "booking_status" => {
            let row = Row::new("booking_status", BOOKING_STATUS_COLUMNS, insert, &rows[0])?;
            Ok(Command::UpdateBookingStatus {
                id: parse_ulid(row.require("booking_id")?)?,
                status: parse_status(row.require("status")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_special_rate_row(row: &Row<'_>) -> Result<(Ulid, SpecialRate), SqlError> {
    let room_id = parse_ulid(row.require("room_id")?)?;
    let rate = SpecialRate {
        date: parse_date(row.require("date")?)?,
        price: parse_money(row.require("price")?)?,
        note: row.get("note").map(parse_string).transpose()?.unwrap_or_default(),
    };
    Ok((room_id, rate))
}

/// Weekend columns are optional; omitted ones keep the defaults
/// (disabled, Friday and Saturday).
fn parse_weekend(row: &Row<'_>) -> Result<WeekendPricing, SqlError> {
    let mut weekend = WeekendPricing::default();
    if let Some(expr) = row.get("weekend_enabled") {
        weekend.enabled = parse_bool(expr)?;
    }
    if let Some(expr) = row.get("weekend_price") {
        weekend.price = parse_money(expr)?;
    }
    if let Some(expr) = row.get("weekend_days") {
        weekend.days = parse_weekdays(expr)?;
    }
    Ok(weekend)
}

fn parse_offer_row(row: &Row<'_>) -> Result<Offer, SqlError> {
    let hotel_id = row.get("hotel_id").map(parse_ulid).transpose()?;
    let scope = match row.get("scope") {
        Some(expr) => OfferScope::from_str(&parse_string(expr)?).map_err(SqlError::Parse)?,
        None if hotel_id.is_some() => OfferScope::Hotel,
        None => OfferScope::Platform,
    };
    let discount_type =
        DiscountType::from_str(&parse_string(row.require("discount_type")?)?).map_err(SqlError::Parse)?;

    Ok(Offer {
        id: parse_ulid(row.require("id")?)?,
        code: parse_string(row.require("code")?)?,
        discount_type,
        discount_value: parse_money(row.require("discount_value")?)?,
        min_booking_amount: row.get("min_booking_amount").map(parse_money).transpose()?.unwrap_or_default(),
        max_discount_amount: row.get("max_discount_amount").map(parse_money).transpose()?,
        valid_from: row
            .get("valid_from")
            .map(|e| parse_instant(e, false))
            .transpose()?
            .unwrap_or(0),
        valid_until: row
            .get("valid_until")
            .map(|e| parse_instant(e, true))
            .transpose()?
            .unwrap_or(Ms::MAX),
        usage_limit: row.get("usage_limit").map(parse_u32).transpose()?.unwrap_or(0),
        usage_count: 0,
        scope,
        hotel_id,
        applicable_hotels: row
            .get("applicable_hotels")
            .map(parse_ulid_list)
            .transpose()?
            .unwrap_or_default(),
        is_active: true,
        redemptions: Vec::new(),
    })
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom {
            id: extract_where_id(&delete.selection)?,
        }),
        "offers" => Ok(Command::DeactivateOffer {
            id: extract_where_id(&delete.selection)?,
        }),
        "bookings" => Ok(Command::CancelBooking {
            id: extract_where_id(&delete.selection)?,
        }),
        "special_rates" => {
            let filters = collect_filters(delete.selection.as_ref())?;
            Ok(Command::DeleteSpecialRate {
                room_id: parse_ulid(filters.require_eq("room_id")?)?,
                date: parse_date(filters.require_eq("date")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = collect_filters(select.selection.as_ref())?;

    match table.as_str() {
        "availability" => Ok(Command::SelectAvailability {
            room_id: parse_ulid(filters.require_eq("room_id")?)?,
            unit_id: filters.eq("unit_id").map(parse_ulid).transpose()?,
            check_in: parse_date(filters.require_eq("check_in")?)?,
            check_out: parse_date(filters.require_eq("check_out")?)?,
        }),
        "quote" => Ok(Command::SelectQuote {
            room_id: parse_ulid(filters.require_eq("room_id")?)?,
            check_in: parse_date(filters.require_eq("check_in")?)?,
            check_out: parse_date(filters.require_eq("check_out")?)?,
            coupon: filters
                .eq("coupon")
                .map(parse_string)
                .transpose()?
                .filter(|c| !c.trim().is_empty()),
        }),
        "coupon_check" => Ok(Command::SelectCouponCheck {
            hotel_id: parse_ulid(filters.require_eq("hotel_id")?)?,
            code: parse_string(filters.require_eq("code")?)?,
            amount: parse_money(filters.require_eq("amount")?)?,
        }),
        "rate_calendar" => {
            let from = filters.lower("date").ok_or(SqlError::MissingFilter("date >="))?;
            let to = filters.upper("date").ok_or(SqlError::MissingFilter("date <="))?;
            Ok(Command::SelectRateCalendar {
                room_id: parse_ulid(filters.require_eq("room_id")?)?,
                from: parse_date(from)?,
                to: parse_date(to)?,
            })
        }
        "rooms" => Ok(Command::SelectRooms),
        "special_rates" => Ok(Command::SelectSpecialRates {
            room_id: parse_ulid(filters.require_eq("room_id")?)?,
        }),
        "bookings" => Ok(Command::SelectBookings {
            room_id: parse_ulid(filters.require_eq("room_id")?)?,
        }),
        "offers" => Ok(Command::SelectOffers {
            hotel_id: filters.eq("hotel_id").map(parse_ulid).transpose()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterOp {
    Eq,
    GtEq,
    LtEq,
}

/// Column predicates of a WHERE clause joined by AND.
#[derive(Default)]
struct Filters<'a> {
    preds: Vec<(String, FilterOp, &'a Expr)>,
}

impl<'a> Filters<'a> {
    fn find(&self, col: &str, op: FilterOp) -> Option<&'a Expr> {
        self.preds
            .iter()
            .find(|(c, o, _)| c == col && *o == op)
            .map(|(_, _, e)| *e)
    }

    fn eq(&self, col: &str) -> Option<&'a Expr> {
        self.find(col, FilterOp::Eq).filter(|e| !is_null(e))
    }

    fn require_eq(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.eq(col).ok_or(SqlError::MissingFilter(col))
    }

    fn lower(&self, col: &str) -> Option<&'a Expr> {
        self.find(col, FilterOp::GtEq)
    }

    fn upper(&self, col: &str) -> Option<&'a Expr> {
        self.find(col, FilterOp::LtEq)
    }
}

fn collect_filters(selection: Option<&Expr>) -> Result<Filters<'_>, SqlError> {
    let mut filters = Filters::default();
    if let Some(expr) = selection {
        walk_filters(expr, &mut filters)?;
    }
    Ok(filters)
}

fn walk_filters<'a>(expr: &'a Expr, filters: &mut Filters<'a>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => walk_filters(inner, filters)?,
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                walk_filters(left, filters)?;
                walk_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => push_pred(filters, left, FilterOp::Eq, right),
            ast::BinaryOperator::GtEq => push_pred(filters, left, FilterOp::GtEq, right),
            ast::BinaryOperator::LtEq => push_pred(filters, left, FilterOp::LtEq, right),
            ast::BinaryOperator::Or => {
                return Err(SqlError::Unsupported("OR in WHERE".into()));
            }
            _ => {}
        },
        Expr::Between {
            expr,
            negated: false,
            low,
            high,
        } => {
            push_pred(filters, expr, FilterOp::GtEq, low);
            push_pred(filters, expr, FilterOp::LtEq, high);
        }
        _ => {}
    }
    Ok(())
}

fn push_pred<'a>(filters: &mut Filters<'a>, left: &'a Expr, op: FilterOp, right: &'a Expr) {
    if let Some(col) = expr_column_name(left) {
        filters.preds.push((col, op, right));
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(&values.rows)
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let filters = collect_filters(selection.as_ref())?;
    parse_ulid(filters.require_eq("id")?)
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

/// The literal behind `expr`, looking through casts such as `'2024-01-05'::date`.
fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        Expr::Cast { expr, .. } | Expr::Nested(expr) => extract_value(expr),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

/// Text of a string or number literal.
fn literal_text(expr: &Expr) -> Result<&str, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s),
        Some(value) => Err(SqlError::Parse(format!("expected literal, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

/// Peel a leading unary minus.
fn negated(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::UnaryOp {
            op: ast::UnaryOperator::Minus,
            expr,
        } => Some(expr),
        _ => None,
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = literal_text(expr)?;
    Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

/// Comma-separated ULIDs in one string; the empty string is the empty list.
fn parse_ulid_list(expr: &Expr) -> Result<Vec<Ulid>, SqlError> {
    literal_text(expr)?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}"))))
        .collect()
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(inner) = negated(expr) {
        return Ok(-parse_i64(inner)?);
    }
    literal_text(expr)?
        .trim()
        .parse()
        .map_err(|e| SqlError::Parse(format!("bad i64: {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_money(expr: &Expr) -> Result<Money, SqlError> {
    if let Some(inner) = negated(expr) {
        return Ok(-parse_money(inner)?);
    }
    let s = literal_text(expr)?;
    Money::from_str(s.trim()).map_err(|e| SqlError::Parse(format!("bad amount {s:?}: {e}")))
}

fn parse_date(expr: &Expr) -> Result<Day, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

/// Unix ms, or a `YYYY-MM-DD` day: its first millisecond, or its last when
/// `end_of_day` is set.
fn parse_instant(expr: &Expr, end_of_day: bool) -> Result<Ms, SqlError> {
    if let Ok(ms) = parse_i64(expr) {
        return Ok(ms);
    }
    let date = parse_date(expr)?;
    let start = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    Ok(if end_of_day { start + 86_400_000 - 1 } else { start })
}

fn parse_weekdays(expr: &Expr) -> Result<WeekdaySet, SqlError> {
    let text = literal_text(expr)?;
    let mut days = Vec::new();
    for part in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let d: u8 = part
            .parse()
            .map_err(|_| SqlError::Parse(format!("bad weekday: {part}")))?;
        days.push(d);
    }
    WeekdaySet::from_indices(&days)
        .ok_or_else(|| SqlError::Parse(format!("weekdays must be 0..6, got {text}")))
}

fn parse_status(expr: &Expr) -> Result<BookingStatus, SqlError> {
    BookingStatus::from_str(&parse_string(expr)?).map_err(SqlError::Parse)
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    TooLong(usize),
    TooManyRows(usize),
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
    InRow(usize, Box<SqlError>),
}

impl SqlError {
    fn in_row(self, row: usize) -> Self {
        SqlError::InRow(row, Box::new(self))
    }
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::TooLong(len) => {
                write!(f, "query too long: {len} bytes (max {MAX_SQL_LENGTH})")
            }
            SqlError::TooManyRows(n) => {
                write!(f, "too many rows: {n} (max {MAX_ROWS_PER_INSERT})")
            }
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing value for {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::InRow(row, e) => write!(f, "row {row}: {e}"),
        }
    }
}

impl std::error::Error for SqlError {}
