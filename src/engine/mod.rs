mod availability;
mod conflict;
mod error;
mod mutations;
mod offers;
mod pricing;
mod queries;

pub use availability::{booked_nights, check_availability, merge_stays};
pub use error::EngineError;
pub use offers::{
    OfferValidation, OfferViolation, calculate_discount, coupon_check, normalize_code, validate_offer,
};
pub use pricing::{price_for_date, price_for_stay, rate_calendar, remove_special_rate, set_special_rate};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;
pub type SharedOffer = Arc<RwLock<Offer>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain every Append already queued behind it.
/// 3. One flush_sync for the whole batch, then answer every sender.
/// A non-append command ends the batch early; it runs after the flush.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut pending = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(cmd) = pending {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed: {e}");
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so half-written bytes don't leak
    // into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// In-memory state of one tenant: rooms with their rates and bookings, and
/// the offer catalogue.
pub struct Engine {
    pub rooms: DashMap<Ulid, SharedRoomState>,
    pub offers: DashMap<Ulid, SharedOffer>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: booking id → room id
    pub(super) booking_to_room: DashMap<Ulid, Ulid>,
    /// Normalized coupon code → offers carrying it, oldest first.
    pub(super) offer_codes: DashMap<String, Vec<Ulid>>,
    /// Shared by room and offer creation and room deletion, exclusive for
    /// compaction. A compaction snapshot never sees a map entry whose WAL
    /// record is missing, or misses one whose record is already on disk.
    pub(super) structure: RwLock<()>,
}

/// Apply an event to a room. Caller holds the room's write lock.
fn apply_to_room(rs: &mut RoomState, event: &Event, booking_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomRatesUpdated {
            base_price,
            weekend,
            ..
        } => {
            rs.rates.base_price = *base_price;
            rs.rates.weekend = weekend.clone();
        }
        Event::SpecialRateSet { rate, .. } => {
            let rates = std::mem::take(&mut rs.rates);
            rs.rates = pricing::set_special_rate(rates, rate.date, rate.price, rate.note.clone());
        }
        Event::SpecialRateRemoved { date, .. } => {
            let rates = std::mem::take(&mut rs.rates);
            rs.rates = pricing::remove_special_rate(rates, *date);
        }
        Event::BookingCreated { booking, .. } => {
            booking_map.insert(booking.id(), rs.id);
            rs.insert_booking(booking.clone());
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(booking) = rs.booking_mut(*id) {
                booking.range.status = *status;
            }
        }
        // Room lifecycle and offer events are handled at the map level.
        Event::RoomCreated { .. }
        | Event::RoomDeleted { .. }
        | Event::OfferCreated { .. }
        | Event::OfferDeactivated { .. } => {}
    }
}

/// Apply an event to an offer (caller holds the lock).
fn apply_to_offer(offer: &mut Offer, event: &Event) {
    match event {
        Event::OfferDeactivated { .. } => offer.is_active = false,
        Event::BookingCreated {
            redemption: Some(redemption),
            ..
        } => {
            offer.record_redemption(redemption);
        }
        _ => {}
    }
}

/// The room an event mutates (for non-Create/Delete room events).
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomRatesUpdated { room_id, .. }
        | Event::SpecialRateSet { room_id, .. }
        | Event::SpecialRateRemoved { room_id, .. }
        | Event::BookingStatusChanged { room_id, .. } => Some(*room_id),
        Event::BookingCreated { booking, .. } => Some(booking.range.room_id),
        Event::RoomCreated { .. }
        | Event::RoomDeleted { .. }
        | Event::OfferCreated { .. }
        | Event::OfferDeactivated { .. } => None,
    }
}

/// Preference when several offers share a code: active beats inactive, and
/// the hotel's own offer beats a platform one. Lower is better.
fn offer_rank(offer: &Offer, hotel_id: Ulid) -> u8 {
    let own = offer.scope == OfferScope::Hotel && offer.hotel_id == Some(hotel_id);
    match (offer.is_active, own, offer.applies_to_hotel(hotel_id)) {
        (true, true, _) => 0,
        (true, false, true) => 1,
        (false, true, _) => 2,
        (false, false, true) => 3,
        _ => 4,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        // Replay into plain maps; nothing is shared until the engine is built.
        let booking_to_room = DashMap::new();
        let mut rooms: HashMap<Ulid, RoomState> = HashMap::new();
        let mut offers: HashMap<Ulid, Offer> = HashMap::new();

        for event in &events {
            match event {
                Event::RoomCreated {
                    id,
                    hotel_id,
                    name,
                    rates,
                } => {
                    let rs = RoomState::new(*id, *hotel_id, name.clone(), rates.clone());
                    rooms.insert(*id, rs);
                }
                Event::RoomDeleted { id } => {
                    if let Some(rs) = rooms.remove(id) {
                        for booking in &rs.bookings {
                            booking_to_room.remove(&booking.id());
                        }
                    }
                }
                Event::OfferCreated { offer } => {
                    offers.insert(offer.id, offer.clone());
                }
                Event::OfferDeactivated { id } => {
                    if let Some(offer) = offers.get_mut(id) {
                        apply_to_offer(offer, event);
                    }
                }
                other => {
                    if let Event::BookingCreated { booking, .. } = other
                        && let Some(offer_id) = booking.offer_id
                        && let Some(offer) = offers.get_mut(&offer_id)
                    {
                        apply_to_offer(offer, other);
                    }
                    if let Some(room_id) = event_room_id(other)
                        && let Some(rs) = rooms.get_mut(&room_id)
                    {
                        apply_to_room(rs, other, &booking_to_room);
                    }
                }
            }
        }

        let offer_codes: DashMap<String, Vec<Ulid>> = DashMap::new();
        for offer in offers.values() {
            offer_codes.entry(offer.code.clone()).or_default().push(offer.id);
        }
        for mut ids in offer_codes.iter_mut() {
            ids.sort();
        }

        Ok(Self {
            rooms: rooms
                .into_iter()
                .map(|(id, rs)| (id, Arc::new(RwLock::new(rs))))
                .collect(),
            offers: offers
                .into_iter()
                .map(|(id, offer)| (id, Arc::new(RwLock::new(offer))))
                .collect(),
            wal_tx,
            booking_to_room,
            offer_codes,
            structure: RwLock::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn get_offer(&self, id: &Ulid) -> Option<SharedOffer> {
        self.offers.get(id).map(|e| e.value().clone())
    }

    pub fn get_room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_room.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append, then apply to the locked room.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.booking_to_room);
        Ok(())
    }

    /// Write-lock a room. Fails if the room was deleted while we waited.
    pub(super) async fn lock_room_write(
        &self,
        room_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.write_owned().await;
        if !self.rooms.contains_key(&room_id) {
            return Err(EngineError::NotFound(room_id));
        }
        Ok(guard)
    }

    /// Lookup booking → room, acquire the room's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .get_room_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let guard = self.lock_room_write(room_id).await?;
        Ok((room_id, guard))
    }

    /// Resolve a coupon code for a hotel. When several offers share the code,
    /// the hotel's own active offer wins, then an applicable platform offer.
    /// Newer offers win ties.
    pub(super) async fn find_offer(&self, hotel_id: Ulid, code: &str) -> Option<SharedOffer> {
        let code = offers::normalize_code(code);
        let ids: Vec<Ulid> = self.offer_codes.get(&code).map(|e| e.value().clone())?;

        let mut best: Option<(u8, SharedOffer)> = None;
        for id in ids.into_iter().rev() {
            let Some(offer) = self.get_offer(&id) else {
                continue;
            };
            let rank = offer_rank(&*offer.read().await, hotel_id);
            if best.as_ref().is_none_or(|(r, _)| rank < *r) {
                best = Some((rank, offer));
            }
        }
        best.map(|(_, offer)| offer)
    }
}
