use std::sync::Arc;

use dashmap::mapref::entry::Entry;

use tokio::sync::{RwLock, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, now_ms, validate_price, validate_stay};
use super::offers::{calculate_discount, normalize_code, validate_offer};
use super::pricing::price_for_stay;
use super::{Engine, EngineError, SharedOffer, WalCommand, apply_to_offer};

fn validate_weekend(weekend: &WeekendPricing) -> Result<(), EngineError> {
    validate_price(weekend.price)
}

fn validate_rates(rates: &RoomRateConfig) -> Result<(), EngineError> {
    validate_price(rates.base_price)?;
    validate_weekend(&rates.weekend)?;
    if rates.special_rates.len() > MAX_SPECIAL_RATES_PER_ROOM {
        return Err(EngineError::LimitExceeded("too many special rates on room"));
    }
    for rate in &rates.special_rates {
        validate_price(rate.price)?;
        if rate.note.len() > MAX_NOTE_LEN {
            return Err(EngineError::LimitExceeded("special rate note too long"));
        }
    }
    Ok(())
}

fn validate_new_offer(offer: &Offer) -> Result<(), EngineError> {
    if offer.code.is_empty() {
        return Err(EngineError::InvalidOffer("code must not be empty"));
    }
    if offer.code.len() > MAX_CODE_LEN {
        return Err(EngineError::LimitExceeded("offer code too long"));
    }
    if offer.discount_value < Money::ZERO {
        return Err(EngineError::InvalidOffer("discount value must not be negative"));
    }
    let max = Money::from(MAX_PRICE);
    if offer.discount_value > max
        || offer.min_booking_amount > max
        || offer.max_discount_amount.is_some_and(|cap| cap > max)
    {
        return Err(EngineError::LimitExceeded("offer amount exceeds maximum price"));
    }
    if offer.discount_type == DiscountType::Percentage && offer.discount_value > Money::ONE_HUNDRED {
        return Err(EngineError::InvalidOffer("percentage must not exceed 100"));
    }
    if offer.min_booking_amount < Money::ZERO {
        return Err(EngineError::InvalidOffer("minimum booking amount must not be negative"));
    }
    if offer.max_discount_amount.is_some_and(|cap| cap < Money::ZERO) {
        return Err(EngineError::InvalidOffer("maximum discount must not be negative"));
    }
    if offer.valid_until < offer.valid_from {
        return Err(EngineError::InvalidOffer("validity window ends before it starts"));
    }
    if offer.scope == OfferScope::Hotel && offer.hotel_id.is_none() {
        return Err(EngineError::InvalidOffer("hotel offer requires hotel_id"));
    }
    if offer.applicable_hotels.len() > MAX_APPLICABLE_HOTELS {
        return Err(EngineError::LimitExceeded("too many applicable hotels"));
    }
    Ok(())
}

impl Engine {
    pub async fn create_room(
        &self,
        id: Ulid,
        hotel_id: Ulid,
        name: Option<String>,
        rates: RoomRateConfig,
    ) -> Result<(), EngineError> {
        if self.rooms.len() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if name.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN) {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        validate_rates(&rates)?;
        let _structure = self.structure.read().await;
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::RoomCreated {
            id,
            hotel_id,
            name: name.clone(),
            rates: rates.clone(),
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, hotel_id, name, rates);
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        info!(room_id = %id, hotel_id = %hotel_id, "room created");
        Ok(())
    }

    /// Delete a room. Refused while any pending, confirmed or checked-in
    /// booking remains.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _structure = self.structure.read().await;
        let guard = self.lock_room_write(id).await?;
        if guard.has_blocking_bookings() {
            return Err(EngineError::HasActiveBookings(id));
        }

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        for booking in &guard.bookings {
            self.booking_to_room.remove(&booking.id());
        }
        self.rooms.remove(&id);
        info!(room_id = %id, "room deleted");
        Ok(())
    }

    pub async fn update_room_rates(
        &self,
        room_id: Ulid,
        base_price: Money,
        weekend: WeekendPricing,
    ) -> Result<(), EngineError> {
        validate_price(base_price)?;
        validate_weekend(&weekend)?;
        let mut guard = self.lock_room_write(room_id).await?;
        let event = Event::RoomRatesUpdated {
            room_id,
            base_price,
            weekend,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Set the override for one date, replacing any existing one.
    pub async fn set_special_rate(
        &self,
        room_id: Ulid,
        date: Day,
        price: Money,
        note: String,
    ) -> Result<(), EngineError> {
        validate_price(price)?;
        if note.len() > MAX_NOTE_LEN {
            return Err(EngineError::LimitExceeded("special rate note too long"));
        }
        let mut guard = self.lock_room_write(room_id).await?;
        let replaces = guard.rates.special_rates.iter().any(|r| r.date == date);
        if !replaces && guard.rates.special_rates.len() >= MAX_SPECIAL_RATES_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many special rates on room"));
        }

        let event = Event::SpecialRateSet {
            room_id,
            rate: SpecialRate { date, price, note },
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Returns false (and writes nothing) if the date had no override.
    pub async fn remove_special_rate(&self, room_id: Ulid, date: Day) -> Result<bool, EngineError> {
        let mut guard = self.lock_room_write(room_id).await?;
        if !guard.rates.special_rates.iter().any(|r| r.date == date) {
            return Ok(false);
        }
        let event = Event::SpecialRateRemoved { room_id, date };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(true)
    }

    /// Register an offer. The code is normalized; usage starts at zero.
    /// Two active offers may share a code only if they target different
    /// scopes (a hotel's own offer and a platform offer, say).
    pub async fn create_offer(&self, mut offer: Offer) -> Result<(), EngineError> {
        if self.offers.len() >= MAX_OFFERS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many offers"));
        }
        offer.code = normalize_code(&offer.code);
        validate_new_offer(&offer)?;
        let _structure = self.structure.read().await;
        if self.offers.contains_key(&offer.id) {
            return Err(EngineError::AlreadyExists(offer.id));
        }
        if let Some(existing) = self.active_offer_clash(&offer).await {
            return Err(EngineError::AlreadyExists(existing));
        }

        offer.usage_count = 0;
        offer.redemptions.clear();
        offer.is_active = true;

        let (id, code) = (offer.id, offer.code.clone());
        let event = Event::OfferCreated {
            offer: offer.clone(),
        };
        self.wal_append(&event).await?;
        self.offers.insert(id, Arc::new(RwLock::new(offer)));
        self.offer_codes.entry(code.clone()).or_default().push(id);
        info!(offer_id = %id, code = %code, "offer created");
        Ok(())
    }

    async fn active_offer_clash(&self, offer: &Offer) -> Option<Ulid> {
        let ids: Vec<Ulid> = self
            .offer_codes
            .get(&offer.code)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        for id in ids {
            let Some(existing) = self.get_offer(&id) else {
                continue;
            };
            let existing = existing.read().await;
            if existing.is_active
                && existing.scope == offer.scope
                && existing.hotel_id == offer.hotel_id
            {
                return Some(existing.id);
            }
        }
        None
    }

    /// Deactivate an offer. Already-inactive offers are left untouched.
    pub async fn deactivate_offer(&self, id: Ulid) -> Result<(), EngineError> {
        let offer = self.get_offer(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = offer.write().await;
        if !guard.is_active {
            return Ok(());
        }
        let event = Event::OfferDeactivated { id };
        self.wal_append(&event).await?;
        apply_to_offer(&mut guard, &event);
        info!(offer_id = %id, "offer deactivated");
        Ok(())
    }

    /// Check availability, price the stay, apply the coupon and commit, all
    /// under the room's write lock. The coupon's offer is locked after the
    /// room and re-validated there, so its usage cap holds under concurrent
    /// bookings. The booking and its redemption share one WAL record.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, EngineError> {
        if !matches!(req.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(EngineError::InvalidStatus(req.status));
        }
        let stay = validate_stay(req.check_in, req.check_out)?;

        // Booking ids are unique across rooms: claim the id before taking
        // any room lock, and release the claim if the booking fails.
        let id = req.id;
        match self.booking_to_room.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(e) => {
                e.insert(req.room_id);
            }
        }
        let result = self.commit_booking(req, stay).await;
        if result.is_err() {
            self.booking_to_room.remove(&id);
        }
        result
    }

    async fn commit_booking(&self, req: NewBooking, stay: Stay) -> Result<Booking, EngineError> {
        let mut guard = self.lock_room_write(req.room_id).await?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        let scope = match req.unit_id {
            Some(unit_id) => RoomScope::Unit {
                room_id: req.room_id,
                unit_id,
            },
            None => RoomScope::Room(req.room_id),
        };
        if let Err(e) = check_no_conflict(&guard, scope, &stay) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!(room_id = %req.room_id, check_in = %stay.check_in, check_out = %stay.check_out, "booking rejected: {e}");
            return Err(e);
        }

        let price = price_for_stay(&guard.rates, stay.check_in, stay.check_out)?;
        let hotel_id = guard.hotel_id;
        let now = now_ms();

        let mut offer_guard = None;
        let mut discount = Money::ZERO;
        if let Some(code) = req.coupon.as_deref() {
            let offer: SharedOffer = self
                .find_offer(hotel_id, code)
                .await
                .ok_or_else(|| EngineError::OfferNotFound(normalize_code(code)))?;
            let og = offer.write_owned().await;
            let validation = validate_offer(&og, hotel_id, price.subtotal, now);
            if !validation.is_valid() {
                return Err(EngineError::OfferIneligible(validation.errors));
            }
            discount = calculate_discount(&og, price.subtotal);
            offer_guard = Some(og);
        }

        let booking = Booking {
            range: BookingRange {
                booking_id: req.id,
                room_id: req.room_id,
                unit_id: req.unit_id,
                stay,
                status: req.status,
            },
            subtotal: price.subtotal,
            discount,
            total: price.subtotal - discount,
            offer_id: offer_guard.as_ref().map(|o| o.id),
            created_at: now,
        };
        let redemption = offer_guard.as_ref().map(|_| Redemption {
            booking_id: req.id,
            hotel_id,
            discount,
            at: now,
        });
        let event = Event::BookingCreated {
            booking: booking.clone(),
            redemption,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        if let Some(mut og) = offer_guard {
            apply_to_offer(&mut og, &event);
            metrics::counter!(observability::OFFER_REDEMPTIONS_TOTAL).increment(1);
        }

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            booking_id = %req.id,
            room_id = %req.room_id,
            nights = price.nights,
            total = %booking.total,
            "booking created"
        );
        Ok(booking)
    }

    /// Move a booking along its lifecycle. Leaving a blocking status frees
    /// the dates for new bookings.
    pub async fn update_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let from = guard
            .bookings
            .iter()
            .find(|b| b.id() == id)
            .map(|b| b.range.status)
            .ok_or(EngineError::NotFound(id))?;
        if !from.can_transition_to(status) {
            return Err(EngineError::InvalidTransition { id, from, to: status });
        }

        let event = Event::BookingStatusChanged { id, room_id, status };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking_id = %id, %from, to = %status, "booking status changed");

        guard
            .bookings
            .iter()
            .find(|b| b.id() == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// Cancel a booking. Any coupon use it consumed stays counted.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.update_booking_status(id, BookingStatus::Cancelled).await
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. The structure lock and every read lock
    /// are held until the swap so no concurrent write can land between
    /// snapshot and rewrite.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _structure = self.structure.write().await;
        let mut events = Vec::new();

        // Rooms before offers: the same order bookings take their locks in.
        let rooms: Vec<_> = self.rooms.iter().map(|e| (*e.key(), e.value().clone())).collect();
        let mut room_guards = Vec::with_capacity(rooms.len());
        for (id, rs) in rooms {
            let guard = rs.read_owned().await;
            if self.rooms.contains_key(&id) {
                room_guards.push(guard);
            }
        }
        let offers: Vec<_> = self.offers.iter().map(|e| e.value().clone()).collect();
        let mut offer_guards = Vec::with_capacity(offers.len());
        for offer in offers {
            offer_guards.push(offer.read_owned().await);
        }

        for guard in &room_guards {
            events.push(Event::RoomCreated {
                id: guard.id,
                hotel_id: guard.hotel_id,
                name: guard.name.clone(),
                rates: guard.rates.clone(),
            });
        }
        // Offers carry their redemptions, so bookings replay without one.
        for guard in &offer_guards {
            events.push(Event::OfferCreated {
                offer: (**guard).clone(),
            });
        }
        for guard in &room_guards {
            for booking in &guard.bookings {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                    redemption: None,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
