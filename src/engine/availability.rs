use ulid::Ulid;

use crate::model::*;

// ── Availability Checker ──────────────────────────────────────────

/// Decide whether `[check_in, check_out)` can be booked within `scope`.
///
/// Ranges outside the scope or in a non-blocking status are ignored. Overlap
/// is half-open, so a stay checking in on another's check-out day is fine.
/// All overlapping booking ids are reported, in input order. Read-only:
/// nothing is reserved.
pub fn check_availability<'a>(
    existing: impl IntoIterator<Item = &'a BookingRange>,
    scope: RoomScope,
    check_in: Day,
    check_out: Day,
) -> Availability {
    let Ok(stay) = Stay::new(check_in, check_out) else {
        return Availability::InvalidRange;
    };

    let conflicts: Vec<Ulid> = existing
        .into_iter()
        .filter(|r| r.in_scope(scope) && r.status.is_blocking() && r.stay.overlaps(&stay))
        .map(|r| r.booking_id)
        .collect();

    if conflicts.is_empty() {
        Availability::Available
    } else {
        Availability::Conflict(conflicts)
    }
}

/// Merge stays sorted by check-in into disjoint stays. Back-to-back stays
/// are joined.
pub fn merge_stays(sorted: &[Stay]) -> Vec<Stay> {
    let mut merged: Vec<Stay> = Vec::new();
    for &stay in sorted {
        if let Some(last) = merged.last_mut()
            && stay.check_in <= last.check_out
        {
            last.check_out = last.check_out.max(stay.check_out);
            continue;
        }
        merged.push(stay);
    }
    merged
}

/// Nights within `from ..= to` occupied by blocking bookings in `scope`,
/// ascending. Feeds the booking calendar.
pub fn booked_nights<'a>(
    existing: impl IntoIterator<Item = &'a BookingRange>,
    scope: RoomScope,
    from: Day,
    to: Day,
) -> Vec<Day> {
    let mut occupied: Vec<Stay> = existing
        .into_iter()
        .filter(|r| r.in_scope(scope) && r.status.is_blocking())
        .map(|r| r.stay)
        .collect();
    occupied.sort_by_key(|s| s.check_in);

    let mut nights = Vec::new();
    for stay in merge_stays(&occupied) {
        let start = stay.check_in.max(from);
        for night in start.iter_days().take_while(|d| stay.contains_night(*d) && *d <= to) {
            nights.push(night);
        }
    }
    nights
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(s: &str) -> Day {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stay(a: &str, b: &str) -> Stay {
        Stay::new(day(a), day(b)).unwrap()
    }

    fn range(room_id: Ulid, a: &str, b: &str, status: BookingStatus) -> BookingRange {
        BookingRange {
            booking_id: Ulid::new(),
            room_id,
            unit_id: None,
            stay: stay(a, b),
            status,
        }
    }

    fn unit_range(room_id: Ulid, unit_id: Ulid, a: &str, b: &str) -> BookingRange {
        BookingRange {
            unit_id: Some(unit_id),
            ..range(room_id, a, b, BookingStatus::Confirmed)
        }
    }

    // ── check_availability ───────────────────────────────

    #[test]
    fn empty_room_is_available() {
        let room = Ulid::new();
        let none: Vec<BookingRange> = Vec::new();
        let result = check_availability(&none, RoomScope::Room(room), day("2024-01-01"), day("2024-01-03"));
        assert_eq!(result, Availability::Available);
        assert!(result.conflicting_booking_ids().is_empty());
    }

    #[test]
    fn overlapping_booking_rejected() {
        let room = Ulid::new();
        let existing = vec![range(room, "2024-01-10", "2024-01-15", BookingStatus::Confirmed)];
        let result = check_availability(&existing, RoomScope::Room(room), day("2024-01-12"), day("2024-01-18"));
        assert!(!result.is_available());
        assert_eq!(result.conflicting_booking_ids(), &[existing[0].booking_id]);
        assert_eq!(result.reason(), Some("not available for selected dates"));
    }

    #[test]
    fn back_to_back_stays_do_not_conflict() {
        let room = Ulid::new();
        let existing = vec![range(room, "2024-01-01", "2024-01-05", BookingStatus::Confirmed)];
        let after = check_availability(&existing, RoomScope::Room(room), day("2024-01-05"), day("2024-01-10"));
        assert!(after.is_available());

        let existing = vec![range(room, "2024-01-05", "2024-01-10", BookingStatus::Confirmed)];
        let before = check_availability(&existing, RoomScope::Room(room), day("2024-01-01"), day("2024-01-05"));
        assert!(before.is_available());
    }

    #[test]
    fn overlap_is_symmetric() {
        let room = Ulid::new();
        let base = day("2024-03-01");
        let spans: Vec<(i64, i64)> = (0..6)
            .flat_map(|s| ((s + 1)..7).map(move |e| (s, e)))
            .collect();
        let at = |n: i64| base + chrono::Days::new(n as u64);

        for &(a1, a2) in &spans {
            for &(b1, b2) in &spans {
                let a = BookingRange {
                    stay: Stay::new(at(a1), at(a2)).unwrap(),
                    ..range(room, "2024-01-01", "2024-01-02", BookingStatus::Confirmed)
                };
                let b = BookingRange {
                    stay: Stay::new(at(b1), at(b2)).unwrap(),
                    ..range(room, "2024-01-01", "2024-01-02", BookingStatus::Confirmed)
                };
                let ab = check_availability([&a], RoomScope::Room(room), at(b1), at(b2));
                let ba = check_availability([&b], RoomScope::Room(room), at(a1), at(a2));
                assert_eq!(
                    ab.is_available(),
                    ba.is_available(),
                    "[{a1},{a2}) vs [{b1},{b2})"
                );
            }
        }
    }

    #[test]
    fn all_conflicts_reported() {
        let room = Ulid::new();
        let existing = vec![
            range(room, "2024-01-01", "2024-01-04", BookingStatus::Confirmed),
            range(room, "2024-01-04", "2024-01-06", BookingStatus::Pending),
            range(room, "2024-01-08", "2024-01-09", BookingStatus::CheckedIn),
            range(room, "2024-01-20", "2024-01-22", BookingStatus::Confirmed),
        ];
        let result = check_availability(&existing, RoomScope::Room(room), day("2024-01-03"), day("2024-01-09"));
        assert_eq!(
            result.conflicting_booking_ids(),
            &[existing[0].booking_id, existing[1].booking_id, existing[2].booking_id]
        );
    }

    #[test]
    fn non_blocking_statuses_ignored() {
        let room = Ulid::new();
        let existing: Vec<BookingRange> = [
            BookingStatus::Cancelled,
            BookingStatus::Rejected,
            BookingStatus::NoShow,
            BookingStatus::CheckedOut,
        ]
        .into_iter()
        .map(|status| range(room, "2024-01-10", "2024-01-15", status))
        .collect();
        let result = check_availability(&existing, RoomScope::Room(room), day("2024-01-11"), day("2024-01-12"));
        assert!(result.is_available());
    }

    #[test]
    fn other_rooms_ignored() {
        let room = Ulid::new();
        let existing = vec![range(Ulid::new(), "2024-01-10", "2024-01-15", BookingStatus::Confirmed)];
        let result = check_availability(&existing, RoomScope::Room(room), day("2024-01-11"), day("2024-01-12"));
        assert!(result.is_available());
    }

    #[test]
    fn unit_scope_only_sees_that_unit() {
        let room = Ulid::new();
        let unit_a = Ulid::new();
        let unit_b = Ulid::new();
        let existing = vec![unit_range(room, unit_a, "2024-01-10", "2024-01-15")];

        let scope_a = RoomScope::Unit { room_id: room, unit_id: unit_a };
        let a = check_availability(&existing, scope_a, day("2024-01-12"), day("2024-01-13"));
        assert_eq!(a.conflicting_booking_ids(), &[existing[0].booking_id]);

        let scope_b = RoomScope::Unit { room_id: room, unit_id: unit_b };
        let b = check_availability(&existing, scope_b, day("2024-01-12"), day("2024-01-13"));
        assert!(b.is_available());

        // Room scope still sees unit-assigned bookings.
        let whole = check_availability(&existing, RoomScope::Room(room), day("2024-01-12"), day("2024-01-13"));
        assert!(!whole.is_available());
    }

    #[test]
    fn unit_scope_sees_room_level_bookings() {
        let room = Ulid::new();
        let unit = Ulid::new();
        let existing = vec![
            range(room, "2024-01-10", "2024-01-15", BookingStatus::Confirmed),
            range(Ulid::new(), "2024-01-10", "2024-01-15", BookingStatus::Confirmed),
        ];
        let scope = RoomScope::Unit { room_id: room, unit_id: unit };
        let result = check_availability(&existing, scope, day("2024-01-12"), day("2024-01-13"));
        assert_eq!(result.conflicting_booking_ids(), &[existing[0].booking_id]);
    }

    #[test]
    fn invalid_range_is_distinct_from_conflict() {
        let room = Ulid::new();
        let d = day("2024-01-10");
        let none: Vec<BookingRange> = Vec::new();
        let same = check_availability(&none, RoomScope::Room(room), d, d);
        assert_eq!(same, Availability::InvalidRange);
        assert_eq!(same.reason(), Some("invalid range"));

        let inverted = check_availability(&none, RoomScope::Room(room), day("2024-01-11"), d);
        assert_eq!(inverted, Availability::InvalidRange);
    }

    #[test]
    fn check_is_idempotent() {
        let room = Ulid::new();
        let existing = vec![range(room, "2024-01-10", "2024-01-15", BookingStatus::Confirmed)];
        let first = check_availability(&existing, RoomScope::Room(room), day("2024-01-12"), day("2024-01-18"));
        let second = check_availability(&existing, RoomScope::Room(room), day("2024-01-12"), day("2024-01-18"));
        assert_eq!(first, second);
    }

    // ── merge_stays ──────────────────────────────────────

    #[test]
    fn merge_overlapping_and_adjacent() {
        let stays = vec![
            stay("2024-01-01", "2024-01-04"),
            stay("2024-01-03", "2024-01-05"),
            stay("2024-01-05", "2024-01-06"),
            stay("2024-01-10", "2024-01-12"),
        ];
        assert_eq!(
            merge_stays(&stays),
            vec![stay("2024-01-01", "2024-01-06"), stay("2024-01-10", "2024-01-12")]
        );
    }

    // ── booked_nights ────────────────────────────────────

    #[test]
    fn booked_nights_clamped_to_window() {
        let room = Ulid::new();
        let existing = vec![
            range(room, "2024-01-01", "2024-01-04", BookingStatus::Confirmed),
            range(room, "2024-01-06", "2024-01-08", BookingStatus::Pending),
            range(room, "2024-01-02", "2024-01-03", BookingStatus::Cancelled),
        ];
        let nights = booked_nights(&existing, RoomScope::Room(room), day("2024-01-02"), day("2024-01-06"));
        assert_eq!(
            nights,
            vec![day("2024-01-02"), day("2024-01-03"), day("2024-01-06")]
        );
    }

    #[test]
    fn booked_nights_empty_room() {
        let none: Vec<BookingRange> = Vec::new();
        let nights = booked_nights(&none, RoomScope::Room(Ulid::new()), day("2024-01-01"), day("2024-01-31"));
        assert!(nights.is_empty());
    }
}
