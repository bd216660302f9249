use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::InnkeepAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability::{self, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command, SqlError};
use crate::tenant::TenantManager;

pub struct InnkeepHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<InnkeepQueryParser>,
}

impl InnkeepHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(InnkeepQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Parse, execute and record metrics for one statement.
    async fn run(&self, engine: &Engine, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(|e| {
            metrics::counter!(QUERIES_TOTAL, "command" => "parse", "status" => "error").increment(1);
            sql_err(e)
        })?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Response> {
        match cmd {
            Command::InsertRoom {
                id,
                hotel_id,
                name,
                rates,
            } => {
                engine
                    .create_room(id, hotel_id, name, rates)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteRoom { id } => {
                engine.delete_room(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::UpsertRoomRates {
                room_id,
                base_price,
                weekend,
            } => {
                engine
                    .update_room_rates(room_id, base_price, weekend)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::InsertSpecialRates { rates } => {
                // Each row is an upsert of its own, so a failed row leaves
                // the earlier ones in place.
                let count = rates.len();
                for (room_id, rate) in rates {
                    engine
                        .set_special_rate(room_id, rate.date, rate.price, rate.note)
                        .await
                        .map_err(engine_err)?;
                }
                Ok(Response::Execution(Tag::new("INSERT").with_rows(count)))
            }
            Command::DeleteSpecialRate { room_id, date } => {
                let removed = engine
                    .remove_special_rate(room_id, date)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(
                    Tag::new("DELETE").with_rows(usize::from(removed)),
                ))
            }
            Command::InsertOffer { offer } => {
                engine.create_offer(offer).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeactivateOffer { id } => {
                engine.deactivate_offer(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertBooking { booking } => {
                engine.create_booking(booking).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::CancelBooking { id } => {
                engine.cancel_booking(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::UpdateBookingStatus { id, status } => {
                engine
                    .update_booking_status(id, status)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::SelectAvailability {
                room_id,
                unit_id,
                check_in,
                check_out,
            } => {
                let availability = engine
                    .check_availability(room_id, unit_id, check_in, check_out)
                    .await
                    .map_err(engine_err)?;
                query_response(availability_schema(), vec![availability], |enc, a| {
                    enc.encode_field(&room_id.to_string())?;
                    enc.encode_field(&unit_id.map(|u| u.to_string()))?;
                    enc.encode_field(&check_in.to_string())?;
                    enc.encode_field(&check_out.to_string())?;
                    enc.encode_field(&a.is_available())?;
                    enc.encode_field(&a.reason().map(str::to_string))?;
                    enc.encode_field(&join_ids(a.conflicting_booking_ids()))
                })
            }
            Command::SelectQuote {
                room_id,
                check_in,
                check_out,
                coupon,
            } => {
                let quote = engine
                    .quote(room_id, check_in, check_out, coupon.as_deref())
                    .await
                    .map_err(engine_err)?;
                let breakdown = serde_json::to_string(&quote.breakdown).map_err(json_err)?;
                query_response(quote_schema(), vec![quote], move |enc, q| {
                    enc.encode_field(&q.room_id.to_string())?;
                    enc.encode_field(&q.stay.check_in.to_string())?;
                    enc.encode_field(&q.stay.check_out.to_string())?;
                    enc.encode_field(&(q.nights as i32))?;
                    enc.encode_field(&q.subtotal.to_string())?;
                    enc.encode_field(&q.discount.to_string())?;
                    enc.encode_field(&q.total.to_string())?;
                    enc.encode_field(&q.offer_id.map(|o| o.to_string()))?;
                    enc.encode_field(&breakdown)
                })
            }
            Command::SelectCouponCheck {
                hotel_id,
                code,
                amount,
            } => {
                let check = engine.coupon_check(hotel_id, &code, amount).await;
                query_response(coupon_check_schema(), vec![check], |enc, c| {
                    enc.encode_field(&c.valid)?;
                    enc.encode_field(&c.error)?;
                    enc.encode_field(&c.discount_amount.to_string())?;
                    enc.encode_field(&c.message)
                })
            }
            Command::SelectRateCalendar { room_id, from, to } => {
                let days = engine
                    .rate_calendar(room_id, from, to)
                    .await
                    .map_err(engine_err)?;
                query_response(rate_calendar_schema(), days, |enc, d| {
                    enc.encode_field(&d.date.to_string())?;
                    enc.encode_field(&d.price.to_string())?;
                    enc.encode_field(&d.tier.as_str())?;
                    enc.encode_field(&d.booked)
                })
            }
            Command::SelectRooms => {
                let rooms = engine.list_rooms().await;
                query_response(rooms_schema(), rooms, |enc, r| {
                    enc.encode_field(&r.id.to_string())?;
                    enc.encode_field(&r.hotel_id.to_string())?;
                    enc.encode_field(&r.name)?;
                    enc.encode_field(&r.base_price.to_string())?;
                    enc.encode_field(&r.weekend.enabled)?;
                    enc.encode_field(&r.weekend.price.to_string())?;
                    enc.encode_field(&r.weekend.days.to_string())?;
                    enc.encode_field(&(r.special_rate_count as i64))
                })
            }
            Command::SelectSpecialRates { room_id } => {
                let rates = engine
                    .get_special_rates(room_id)
                    .await
                    .map_err(engine_err)?;
                query_response(special_rates_schema(), rates, |enc, r| {
                    enc.encode_field(&room_id.to_string())?;
                    enc.encode_field(&r.date.to_string())?;
                    enc.encode_field(&r.price.to_string())?;
                    enc.encode_field(&r.note)
                })
            }
            Command::SelectBookings { room_id } => {
                let bookings = engine.get_bookings(room_id).await.map_err(engine_err)?;
                query_response(bookings_schema(), bookings, |enc, b| {
                    enc.encode_field(&b.id().to_string())?;
                    enc.encode_field(&b.range.room_id.to_string())?;
                    enc.encode_field(&b.range.unit_id.map(|u| u.to_string()))?;
                    enc.encode_field(&b.range.stay.check_in.to_string())?;
                    enc.encode_field(&b.range.stay.check_out.to_string())?;
                    enc.encode_field(&b.range.status.as_str())?;
                    enc.encode_field(&(b.range.stay.nights() as i32))?;
                    enc.encode_field(&b.subtotal.to_string())?;
                    enc.encode_field(&b.discount.to_string())?;
                    enc.encode_field(&b.total.to_string())?;
                    enc.encode_field(&b.offer_id.map(|o| o.to_string()))?;
                    enc.encode_field(&b.created_at)
                })
            }
            Command::SelectOffers { hotel_id } => {
                let offers = engine.list_offers(hotel_id).await;
                query_response(offers_schema(), offers, |enc, o| {
                    enc.encode_field(&o.id.to_string())?;
                    enc.encode_field(&o.code)?;
                    enc.encode_field(&o.discount_type.as_str())?;
                    enc.encode_field(&o.discount_value.to_string())?;
                    enc.encode_field(&o.min_booking_amount.to_string())?;
                    enc.encode_field(&o.max_discount_amount.map(|m| m.to_string()))?;
                    enc.encode_field(&o.valid_from)?;
                    enc.encode_field(&o.valid_until)?;
                    enc.encode_field(&i64::from(o.usage_limit))?;
                    enc.encode_field(&i64::from(o.usage_count))?;
                    enc.encode_field(&o.scope.as_str())?;
                    enc.encode_field(&o.hotel_id.map(|h| h.to_string()))?;
                    enc.encode_field(&join_ids(&o.applicable_hotels))?;
                    enc.encode_field(&o.is_active)
                })
            }
        }
    }
}

/// Encode `items` as the rows of a single result set.
fn query_response<T>(
    schema: Vec<FieldInfo>,
    items: Vec<T>,
    encode: impl Fn(&mut DataRowEncoder, T) -> PgWireResult<()>,
) -> PgWireResult<Response> {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .into_iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn join_ids(ids: &[ulid::Ulid]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::VARCHAR),
        field("unit_id", Type::VARCHAR),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("available", Type::BOOL),
        field("reason", Type::VARCHAR),
        field("conflicting_booking_ids", Type::VARCHAR),
    ]
}

fn quote_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::VARCHAR),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("nights", Type::INT4),
        field("subtotal", Type::VARCHAR),
        field("discount", Type::VARCHAR),
        field("total", Type::VARCHAR),
        field("offer_id", Type::VARCHAR),
        field("breakdown", Type::VARCHAR),
    ]
}

fn coupon_check_schema() -> Vec<FieldInfo> {
    vec![
        field("valid", Type::BOOL),
        field("error", Type::VARCHAR),
        field("discount_amount", Type::VARCHAR),
        field("message", Type::VARCHAR),
    ]
}

fn rate_calendar_schema() -> Vec<FieldInfo> {
    vec![
        field("date", Type::VARCHAR),
        field("price", Type::VARCHAR),
        field("tier", Type::VARCHAR),
        field("booked", Type::BOOL),
    ]
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("hotel_id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("base_price", Type::VARCHAR),
        field("weekend_enabled", Type::BOOL),
        field("weekend_price", Type::VARCHAR),
        field("weekend_days", Type::VARCHAR),
        field("special_rate_count", Type::INT8),
    ]
}

fn special_rates_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::VARCHAR),
        field("date", Type::VARCHAR),
        field("price", Type::VARCHAR),
        field("note", Type::VARCHAR),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("room_id", Type::VARCHAR),
        field("unit_id", Type::VARCHAR),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("nights", Type::INT4),
        field("subtotal", Type::VARCHAR),
        field("discount", Type::VARCHAR),
        field("total", Type::VARCHAR),
        field("offer_id", Type::VARCHAR),
        field("created_at", Type::INT8),
    ]
}

fn offers_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("code", Type::VARCHAR),
        field("discount_type", Type::VARCHAR),
        field("discount_value", Type::VARCHAR),
        field("min_booking_amount", Type::VARCHAR),
        field("max_discount_amount", Type::VARCHAR),
        field("valid_from", Type::INT8),
        field("valid_until", Type::INT8),
        field("usage_limit", Type::INT8),
        field("usage_count", Type::INT8),
        field("scope", Type::VARCHAR),
        field("hotel_id", Type::VARCHAR),
        field("applicable_hotels", Type::VARCHAR),
        field("is_active", Type::BOOL),
    ]
}

/// Result columns of a statement, from the table it selects from. Used
/// before parameters are bound, so the statement is not fully parsed.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    let mut tokens = upper
        .split(|c: char| c.is_whitespace() || c == ';' || c == ',')
        .filter(|t| !t.is_empty());
    if tokens.next() != Some("SELECT") {
        return vec![];
    }
    let table = tokens
        .skip_while(|t| *t != "FROM")
        .nth(1)
        .map(|t| t.trim_matches('"').to_lowercase());
    match table.as_deref() {
        Some("availability") => availability_schema(),
        Some("quote") => quote_schema(),
        Some("coupon_check") => coupon_check_schema(),
        Some("rate_calendar") => rate_calendar_schema(),
        Some("rooms") => rooms_schema(),
        Some("special_rates") => special_rates_schema(),
        Some("bookings") => bookings_schema(),
        Some("offers") => offers_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for InnkeepHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        Ok(vec![self.run(&engine, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct InnkeepQueryParser;

#[async_trait]
impl QueryParser for InnkeepQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for InnkeepHandler {
    type Statement = String;
    type QueryParser = InnkeepQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        self.run(&engine, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_literal = !in_literal;
            i += 1;
        } else if bytes[i] == b'$' && !in_literal {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let values: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute_values(&portal.statement.statement, &values)
}

/// One left-to-right pass: each placeholder is replaced once and inserted
/// text is never scanned again. Placeholders inside quoted literals and
/// indexes with no bound value are left as written.
fn substitute_values(sql: &str, values: &[Option<String>]) -> String {
    let bytes = sql.as_bytes();
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                in_literal = !in_literal;
                i += 1;
            }
            b'$' if !in_literal => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let value = sql[start..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| values.get(idx));
                if let Some(value) = value {
                    result.push_str(&sql[copied..i]);
                    match value {
                        Some(text) => {
                            result.push('\'');
                            result.push_str(&text.replace('\'', "''"));
                            result.push('\'');
                        }
                        None => result.push_str("NULL"),
                    }
                    copied = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct InnkeepFactory {
    handler: Arc<InnkeepHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<InnkeepAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl InnkeepFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = InnkeepAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(InnkeepHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for InnkeepFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(InnkeepFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Conflict(_) => "23P01",
        _ => "P0001",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

fn json_err(e: serde_json::Error) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "XX000".into(),
        format!("encoding error: {e}"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM rooms"), 0);
        assert_eq!(
            count_params("SELECT * FROM quote WHERE room_id = $1 AND check_in = $2 AND check_out = $3"),
            3
        );
        assert_eq!(count_params("SELECT $2, $10, $1"), 10);
        assert_eq!(count_params("SELECT '$9', $1"), 1);
    }

    #[test]
    fn substitute_quotes_and_nulls() {
        let sql = "INSERT INTO special_rates (room_id, date, price, note) VALUES ($1, $2, $3, $4)";
        let out = substitute_values(
            sql,
            &[
                Some("R".into()),
                Some("2024-12-24".into()),
                Some("100".into()),
                Some("guest's pick".into()),
            ],
        );
        assert_eq!(
            out,
            "INSERT INTO special_rates (room_id, date, price, note) VALUES ('R', '2024-12-24', '100', 'guest''s pick')"
        );
        assert_eq!(substitute_values("SELECT $1", &[None]), "SELECT NULL");
    }

    #[test]
    fn substitute_does_not_rescan_bound_values() {
        let values: Vec<Option<String>> = vec![Some("A".into()), Some("x$1".into())];
        assert_eq!(substitute_values("SELECT $1, $2", &values), "SELECT 'A', 'x$1'");

        let values: Vec<Option<String>> = vec![Some("$2".into()), Some("it's".into())];
        assert_eq!(substitute_values("VALUES ($2, $1)", &values), "VALUES ('it''s', '$2')");
    }

    #[test]
    fn substitute_skips_quoted_and_unbound_placeholders() {
        let values: Vec<Option<String>> = vec![Some("R".into())];
        assert_eq!(
            substitute_values("SELECT '$1', $1, $3, $", &values),
            "SELECT '$1', 'R', $3, $"
        );
    }

    #[test]
    fn substitute_two_digit_placeholders() {
        let values: Vec<Option<String>> = (1..=10).map(|i| Some(i.to_string())).collect();
        assert_eq!(substitute_values("$1 $10", &values), "'1' '10'");
    }

    #[test]
    fn substituted_booking_parses() {
        let room = Ulid::new();
        let id = Ulid::new();
        let sql = substitute_values(
            "INSERT INTO bookings (id, room_id, check_in, check_out) VALUES ($1, $2, $3, $4)",
            &[
                Some(id.to_string()),
                Some(room.to_string()),
                Some("2024-03-01".into()),
                Some("2024-03-04".into()),
            ],
        );
        match sql::parse_sql(&sql).unwrap() {
            Command::InsertBooking { booking } => {
                assert_eq!(booking.id, id);
                assert_eq!(booking.room_id, room);
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn result_schema_by_table() {
        let names = |fields: Vec<FieldInfo>| -> Vec<String> {
            fields.iter().map(|f| f.name().to_string()).collect()
        };
        assert_eq!(
            names(result_schema("select * from coupon_check where code = $1")),
            vec!["valid", "error", "discount_amount", "message"]
        );
        assert_eq!(result_schema("SELECT * FROM availability WHERE room_id = $1").len(), 7);
        assert_eq!(result_schema("SELECT * FROM rooms;").len(), 8);
        assert!(result_schema("INSERT INTO rooms VALUES ($1)").is_empty());
        assert!(result_schema("SELECT * FROM guests").is_empty());
    }

    #[test]
    fn conflicts_map_to_exclusion_violation() {
        assert_eq!(sqlstate(&EngineError::Conflict(vec![Ulid::new()])), "23P01");
        assert_eq!(sqlstate(&EngineError::NotFound(Ulid::new())), "P0001");
        assert_eq!(
            sqlstate(&EngineError::OfferNotFound("SAVE".into())),
            "P0001"
        );
    }
}
