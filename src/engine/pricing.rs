use chrono::Datelike;

use crate::model::*;

// ── Pricing Resolver ──────────────────────────────────────────────

/// Resolve the price of one night.
///
/// Precedence: special rate > weekend rate > base price. If a date carries
/// several special rates the most recently added one wins. Negative prices
/// never leave the resolver.
pub fn price_for_date(config: &RoomRateConfig, date: Day) -> NightPrice {
    if let Some(special) = config.special_rates.iter().rev().find(|r| r.date == date) {
        return NightPrice {
            date,
            price: special.price.max(Money::ZERO),
            tier: RateTier::Special,
        };
    }

    let weekend = &config.weekend;
    if weekend.enabled && weekend.days.contains(date.weekday()) {
        return NightPrice {
            date,
            price: weekend.price.max(Money::ZERO),
            tier: RateTier::Weekend,
        };
    }

    NightPrice {
        date,
        price: config.base_price.max(Money::ZERO),
        tier: RateTier::Base,
    }
}

/// Price every night of `[check_in, check_out)`. A subtotal too large for
/// `Money` is reported as `PricingError::Overflow`.
pub fn price_for_stay(
    config: &RoomRateConfig,
    check_in: Day,
    check_out: Day,
) -> Result<StayPrice, PricingError> {
    let stay = Stay::new(check_in, check_out)?;
    let breakdown: Vec<NightPrice> = stay
        .nights_iter()
        .map(|night| price_for_date(config, night))
        .collect();
    let subtotal = breakdown
        .iter()
        .try_fold(Money::ZERO, |acc, n| acc.checked_add(n.price))
        .ok_or(PricingError::Overflow)?;
    Ok(StayPrice {
        nights: stay.nights(),
        subtotal,
        breakdown,
    })
}

/// Set the override for `date`. The date is a unique key: an existing entry
/// for it is replaced and the new one goes to the end of the list.
pub fn set_special_rate(
    mut config: RoomRateConfig,
    date: Day,
    price: Money,
    note: String,
) -> RoomRateConfig {
    config.special_rates.retain(|r| r.date != date);
    config.special_rates.push(SpecialRate { date, price, note });
    config
}

pub fn remove_special_rate(mut config: RoomRateConfig, date: Day) -> RoomRateConfig {
    config.special_rates.retain(|r| r.date != date);
    config
}

/// Per-day prices for `from ..= to`. Empty if `to < from`.
pub fn rate_calendar(config: &RoomRateConfig, from: Day, to: Day) -> Vec<NightPrice> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .map(|d| price_for_date(config, d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};

    // 2024-01-01 is a Monday.
    fn day(s: &str) -> Day {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn money(n: i64) -> Money {
        Money::from(n)
    }

    /// base 1000, weekend 1500 on Fri/Sat, no special rates.
    fn standard_room() -> RoomRateConfig {
        RoomRateConfig {
            base_price: money(1000),
            weekend: WeekendPricing {
                enabled: true,
                price: money(1500),
                days: WeekdaySet::weekend(),
            },
            special_rates: Vec::new(),
        }
    }

    // ── price_for_date ───────────────────────────────────

    #[test]
    fn weekday_uses_base() {
        let np = price_for_date(&standard_room(), day("2024-01-03"));
        assert_eq!(np.price, money(1000));
        assert_eq!(np.tier, RateTier::Base);
    }

    #[test]
    fn friday_and_saturday_use_weekend() {
        let room = standard_room();
        for d in ["2024-01-05", "2024-01-06"] {
            let np = price_for_date(&room, day(d));
            assert_eq!(np.price, money(1500), "{d}");
            assert_eq!(np.tier, RateTier::Weekend);
        }
        assert_eq!(price_for_date(&room, day("2024-01-07")).tier, RateTier::Base);
    }

    #[test]
    fn disabled_weekend_falls_back_to_base() {
        let mut room = standard_room();
        room.weekend.enabled = false;
        let np = price_for_date(&room, day("2024-01-05"));
        assert_eq!(np.price, money(1000));
        assert_eq!(np.tier, RateTier::Base);
    }

    #[test]
    fn custom_weekend_days() {
        let mut room = standard_room();
        room.weekend.days = WeekdaySet::from_indices(&[0]).unwrap(); // Sunday only
        assert_eq!(day("2024-01-07").weekday(), Weekday::Sun);
        assert_eq!(price_for_date(&room, day("2024-01-07")).tier, RateTier::Weekend);
        assert_eq!(price_for_date(&room, day("2024-01-05")).tier, RateTier::Base);
    }

    #[test]
    fn special_beats_weekend_on_every_day() {
        let mut room = standard_room();
        let start = day("2024-01-01");
        for d in start.iter_days().take(14) {
            room = set_special_rate(room, d, money(2000), String::new());
        }
        for d in start.iter_days().take(14) {
            let np = price_for_date(&room, d);
            assert_eq!(np.price, money(2000));
            assert_eq!(np.tier, RateTier::Special);
        }
    }

    #[test]
    fn unset_base_price_resolves_to_zero() {
        let np = price_for_date(&RoomRateConfig::default(), day("2024-01-02"));
        assert_eq!(np.price, Money::ZERO);
        assert_eq!(np.tier, RateTier::Base);
    }

    #[test]
    fn duplicate_special_rates_latest_wins() {
        let mut room = standard_room();
        room.special_rates.push(SpecialRate {
            date: day("2024-01-10"),
            price: money(1800),
            note: "first".into(),
        });
        room.special_rates.push(SpecialRate {
            date: day("2024-01-10"),
            price: money(1900),
            note: "second".into(),
        });
        assert_eq!(price_for_date(&room, day("2024-01-10")).price, money(1900));
    }

    #[test]
    fn resolver_is_idempotent() {
        let room = set_special_rate(standard_room(), day("2024-01-05"), money(2000), "gala".into());
        for d in ["2024-01-04", "2024-01-05", "2024-01-06"] {
            assert_eq!(price_for_date(&room, day(d)), price_for_date(&room, day(d)));
        }
    }

    // ── set_special_rate ─────────────────────────────────

    #[test]
    fn set_special_rate_replaces_same_date() {
        let room = set_special_rate(standard_room(), day("2024-02-14"), money(3000), "valentine".into());
        let room = set_special_rate(room, day("2024-02-15"), money(1200), String::new());
        let room = set_special_rate(room, day("2024-02-14"), money(3500), "valentine v2".into());

        assert_eq!(room.special_rates.len(), 2);
        assert_eq!(room.special_rates[1].date, day("2024-02-14"));
        assert_eq!(room.special_rates[1].note, "valentine v2");
        assert_eq!(price_for_date(&room, day("2024-02-14")).price, money(3500));
    }

    #[test]
    fn remove_special_rate_restores_lower_tier() {
        let room = set_special_rate(standard_room(), day("2024-01-05"), money(2000), String::new());
        let room = remove_special_rate(room, day("2024-01-05"));
        let np = price_for_date(&room, day("2024-01-05"));
        assert_eq!(np.tier, RateTier::Weekend);
        assert_eq!(np.price, money(1500));
    }

    // ── price_for_stay ───────────────────────────────────

    #[test]
    fn stay_monday_to_thursday_is_all_base() {
        let sp = price_for_stay(&standard_room(), day("2024-01-01"), day("2024-01-04")).unwrap();
        assert_eq!(sp.nights, 3);
        assert_eq!(sp.subtotal, money(3000));
        assert!(sp.breakdown.iter().all(|n| n.tier == RateTier::Base));
    }

    #[test]
    fn stay_friday_to_sunday_is_all_weekend() {
        let sp = price_for_stay(&standard_room(), day("2024-01-05"), day("2024-01-07")).unwrap();
        assert_eq!(sp.nights, 2);
        assert_eq!(sp.subtotal, money(3000));
        assert_eq!(sp.breakdown[0].price, money(1500));
        assert_eq!(sp.breakdown[1].price, money(1500));
    }

    #[test]
    fn stay_special_override_wins_over_weekend() {
        let room = set_special_rate(standard_room(), day("2024-01-05"), money(2000), String::new());
        let sp = price_for_stay(&room, day("2024-01-05"), day("2024-01-06")).unwrap();
        assert_eq!(sp.nights, 1);
        assert_eq!(sp.subtotal, money(2000));
        assert_eq!(sp.breakdown[0].tier, RateTier::Special);
    }

    #[test]
    fn stay_mixed_week() {
        // Thu, Fri, Sat, Sun
        let sp = price_for_stay(&standard_room(), day("2024-01-04"), day("2024-01-08")).unwrap();
        assert_eq!(sp.nights, 4);
        assert_eq!(sp.subtotal, money(1000 + 1500 + 1500 + 1000));
    }

    #[test]
    fn stay_excludes_checkout_night() {
        let room = set_special_rate(standard_room(), day("2024-01-03"), money(9999), String::new());
        let sp = price_for_stay(&room, day("2024-01-01"), day("2024-01-03")).unwrap();
        assert_eq!(sp.subtotal, money(2000));
    }

    #[test]
    fn stay_same_day_is_invalid() {
        let d = day("2024-01-01");
        assert_eq!(
            price_for_stay(&standard_room(), d, d),
            Err(PricingError::InvalidRange(InvalidRange { check_in: d, check_out: d }))
        );
    }

    #[test]
    fn stay_inverted_is_invalid() {
        assert!(price_for_stay(&standard_room(), day("2024-01-05"), day("2024-01-01")).is_err());
    }

    #[test]
    fn stay_fractional_prices_sum_exactly() {
        let mut room = standard_room();
        room.base_price = Money::new(99_99, 2);
        room.weekend.enabled = false;
        let sp = price_for_stay(&room, day("2024-01-01"), day("2024-01-04")).unwrap();
        assert_eq!(sp.subtotal, Money::new(299_97, 2));
    }

    #[test]
    fn stay_subtotal_overflow_is_reported() {
        let mut room = standard_room();
        room.base_price = Money::MAX;
        room.weekend.enabled = false;
        assert_eq!(
            price_for_stay(&room, day("2024-01-01"), day("2024-01-03")),
            Err(PricingError::Overflow)
        );

        let one = price_for_stay(&room, day("2024-01-01"), day("2024-01-02")).unwrap();
        assert_eq!(one.subtotal, Money::MAX);
    }

    // ── rate_calendar ────────────────────────────────────

    #[test]
    fn calendar_covers_inclusive_window() {
        let cal = rate_calendar(&standard_room(), day("2024-01-01"), day("2024-01-07"));
        assert_eq!(cal.len(), 7);
        let tiers: Vec<RateTier> = cal.iter().map(|n| n.tier).collect();
        assert_eq!(
            tiers,
            vec![
                RateTier::Base,
                RateTier::Base,
                RateTier::Base,
                RateTier::Base,
                RateTier::Weekend,
                RateTier::Weekend,
                RateTier::Base,
            ]
        );
    }

    #[test]
    fn calendar_empty_when_inverted() {
        assert!(rate_calendar(&standard_room(), day("2024-01-07"), day("2024-01-01")).is_empty());
    }
}
