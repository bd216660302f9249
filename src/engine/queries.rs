use std::collections::HashSet;

use ulid::Ulid;

use crate::limits::MAX_PRICE;
use crate::model::*;

use super::availability::{self, booked_nights};
use super::conflict::{now_ms, validate_stay, validate_window};
use super::offers::{self, calculate_discount, normalize_code, validate_offer};
use super::pricing::{self, price_for_stay};
use super::{Engine, EngineError};

impl Engine {
    /// Read-only availability check. An invalid range is reported as
    /// `Availability::InvalidRange`, not as an error.
    pub async fn check_availability(
        &self,
        room_id: Ulid,
        unit_id: Option<Ulid>,
        check_in: Day,
        check_out: Day,
    ) -> Result<Availability, EngineError> {
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        let scope = match unit_id {
            Some(unit_id) => RoomScope::Unit { room_id, unit_id },
            None => RoomScope::Room(room_id),
        };
        Ok(match Stay::new(check_in, check_out) {
            Ok(stay) => availability::check_availability(
                guard.overlapping(&stay).map(|b| &b.range),
                scope,
                check_in,
                check_out,
            ),
            Err(_) => Availability::InvalidRange,
        })
    }

    /// Price a stay and apply an optional coupon, without booking anything.
    pub async fn quote(
        &self,
        room_id: Ulid,
        check_in: Day,
        check_out: Day,
        coupon: Option<&str>,
    ) -> Result<Quote, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        let price = price_for_stay(&guard.rates, stay.check_in, stay.check_out)?;

        let mut discount = Money::ZERO;
        let mut offer_id = None;
        if let Some(code) = coupon {
            let offer = self
                .find_offer(guard.hotel_id, code)
                .await
                .ok_or_else(|| EngineError::OfferNotFound(normalize_code(code)))?;
            let offer = offer.read().await;
            let validation = validate_offer(&offer, guard.hotel_id, price.subtotal, now_ms());
            if !validation.is_valid() {
                return Err(EngineError::OfferIneligible(validation.errors));
            }
            discount = calculate_discount(&offer, price.subtotal);
            offer_id = Some(offer.id);
        }

        Ok(Quote {
            room_id,
            stay,
            nights: price.nights,
            subtotal: price.subtotal,
            discount,
            total: price.subtotal - discount,
            breakdown: price.breakdown,
            offer_id,
        })
    }

    /// The coupon endpoint: never fails, reports validity instead.
    pub async fn coupon_check(&self, hotel_id: Ulid, code: &str, booking_amount: Money) -> CouponCheck {
        if booking_amount > Money::from(MAX_PRICE) {
            return CouponCheck {
                valid: false,
                error: Some("booking amount exceeds maximum price".into()),
                discount_amount: Money::ZERO,
                message: "coupon invalid: booking amount exceeds maximum price".into(),
            };
        }
        let now = now_ms();
        match self.find_offer(hotel_id, code).await {
            Some(offer) => {
                let offer = offer.read().await;
                offers::coupon_check(Some(&*offer), hotel_id, booking_amount, now)
            }
            None => offers::coupon_check(None, hotel_id, booking_amount, now),
        }
    }

    /// Per-day prices for `from ..= to`, each flagged if a blocking booking
    /// occupies that night.
    pub async fn rate_calendar(
        &self,
        room_id: Ulid,
        from: Day,
        to: Day,
    ) -> Result<Vec<CalendarDay>, EngineError> {
        validate_window(from, to)?;
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;

        let booked: HashSet<Day> = booked_nights(
            guard.bookings.iter().map(|b| &b.range),
            RoomScope::Room(room_id),
            from,
            to,
        )
        .into_iter()
        .collect();

        Ok(pricing::rate_calendar(&guard.rates, from, to)
            .into_iter()
            .map(|night| CalendarDay {
                booked: booked.contains(&night.date),
                date: night.date,
                price: night.price,
                tier: night.tier,
            })
            .collect())
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let rooms: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(rooms.len());
        for rs in rooms {
            let guard = rs.read().await;
            out.push(RoomInfo {
                id: guard.id,
                hotel_id: guard.hotel_id,
                name: guard.name.clone(),
                base_price: guard.rates.base_price,
                weekend: guard.rates.weekend.clone(),
                special_rate_count: guard.rates.special_rates.len(),
            });
        }
        out.sort_by_key(|r| r.id);
        out
    }

    /// Special rates of a room, by date.
    pub async fn get_special_rates(&self, room_id: Ulid) -> Result<Vec<SpecialRate>, EngineError> {
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        let mut rates = guard.rates.special_rates.clone();
        rates.sort_by_key(|r| r.date);
        Ok(rates)
    }

    /// Bookings of a room in check-in order, any status.
    pub async fn get_bookings(&self, room_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        Ok(guard.bookings.clone())
    }

    #[cfg(test)]
    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let room_id = self.get_room_for_booking(&id)?;
        let rs = self.get_room(&room_id)?;
        let guard = rs.read().await;
        guard.bookings.iter().find(|b| b.id() == id).cloned()
    }

    /// All offers, or only those usable at `hotel_id`.
    pub async fn list_offers(&self, hotel_id: Option<Ulid>) -> Vec<Offer> {
        let offers: Vec<_> = self.offers.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(offers.len());
        for offer in offers {
            let guard = offer.read().await;
            if hotel_id.is_none_or(|h| guard.applies_to_hotel(h)) {
                out.push(guard.clone());
            }
        }
        out.sort_by_key(|o| o.id);
        out
    }
}
