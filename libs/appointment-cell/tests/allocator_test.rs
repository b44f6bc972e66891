// libs/appointment-cell/tests/allocator_test.rs
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{BookingError, NewBooking};
use appointment_cell::services::allocator::SlotAllocator;
use appointment_cell::services::ledger::{BookingLedger, MemoryLedger};
use appointment_cell::services::records::MemoryRecordStore;
use medic_cell::models::TimeWindow;

// ==============================================================================
// FIXTURES
// ==============================================================================

struct TestSetup {
    ledger: Arc<MemoryLedger>,
    records: Arc<MemoryRecordStore>,
    allocator: SlotAllocator,
}

impl TestSetup {
    fn new() -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let records = Arc::new(MemoryRecordStore::new());
        let allocator = SlotAllocator::new(ledger.clone(), records.clone());

        Self {
            ledger,
            records,
            allocator,
        }
    }
}

/// Monday morning window: 09:00-12:00 in 30 minute visits, capacity 6.
fn monday_window() -> TimeWindow {
    TimeWindow {
        id: Uuid::new_v4(),
        medic_id: Uuid::new_v4(),
        clinic_id: Uuid::new_v4(),
        day_of_week: 0,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        avg_visit_minutes: 30,
        capacity: 6,
        active: true,
    }
}

/// Wednesday 2025-06-18, mid-morning.
fn wednesday_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 18, 10, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ==============================================================================
// OCCURRENCE DATE COMPUTATION
// ==============================================================================

#[test]
fn next_occurrence_lands_on_the_coming_weekday() {
    let now = wednesday_now();

    // Thursday and Sunday are still ahead this week.
    assert_eq!(SlotAllocator::next_occurrence(3, now), date(2025, 6, 19));
    assert_eq!(SlotAllocator::next_occurrence(6, now), date(2025, 6, 22));

    // Monday and Tuesday already passed, so next week.
    assert_eq!(SlotAllocator::next_occurrence(0, now), date(2025, 6, 23));
    assert_eq!(SlotAllocator::next_occurrence(1, now), date(2025, 6, 24));
}

#[test]
fn next_occurrence_never_books_today() {
    // 2025-06-18 is a Wednesday; a Wednesday window resolves to the
    // Wednesday a full week out.
    assert_eq!(
        SlotAllocator::next_occurrence(2, wednesday_now()),
        date(2025, 6, 25)
    );
}

// ==============================================================================
// ALLOCATION
// ==============================================================================

#[tokio::test]
async fn first_booking_takes_the_window_start() {
    let setup = TestSetup::new();
    let window = monday_window();

    let booking = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, wednesday_now())
        .await
        .unwrap();

    assert_eq!(booking.occurrence_date, date(2025, 6, 23));
    assert_eq!(booking.ordinal, 1);
    assert_eq!(
        booking.start_at,
        Utc.with_ymd_and_hms(2025, 6, 23, 9, 0, 0).unwrap()
    );
    assert_eq!(booking.end_at, booking.start_at + Duration::minutes(30));
    assert_eq!(booking.duration_minutes, 30);
}

#[tokio::test]
async fn consecutive_bookings_take_consecutive_slots() {
    let setup = TestSetup::new();
    let window = monday_window();

    let first = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, wednesday_now())
        .await
        .unwrap();
    let second = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, wednesday_now())
        .await
        .unwrap();

    assert_eq!(first.ordinal, 1);
    assert_eq!(second.ordinal, 2);
    assert_eq!(
        second.start_at,
        Utc.with_ymd_and_hms(2025, 6, 23, 9, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn booking_on_the_windows_own_weekday_lands_a_week_out() {
    let setup = TestSetup::new();
    let window = monday_window();

    // Monday 2025-06-23, before the window even opens.
    let monday_morning = Utc.with_ymd_and_hms(2025, 6, 23, 7, 0, 0).unwrap();
    let booking = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, monday_morning)
        .await
        .unwrap();

    assert_eq!(booking.occurrence_date, date(2025, 6, 30));
}

#[tokio::test]
async fn seventh_booking_is_rejected_at_capacity_six() {
    let setup = TestSetup::new();
    let window = monday_window();

    for expected_ordinal in 1..=6 {
        let booking = setup
            .allocator
            .allocate(&window, Uuid::new_v4(), None, wednesday_now())
            .await
            .unwrap();
        assert_eq!(booking.ordinal, expected_ordinal);
    }

    let result = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, wednesday_now())
        .await;
    assert_matches!(result, Err(BookingError::FullyBooked));
}

#[tokio::test]
async fn full_occurrence_has_contiguous_ordinals_and_disjoint_intervals() {
    let setup = TestSetup::new();
    let window = monday_window();

    for _ in 0..6 {
        setup
            .allocator
            .allocate(&window, Uuid::new_v4(), None, wednesday_now())
            .await
            .unwrap();
    }

    let mut bookings = setup
        .ledger
        .upcoming_for_windows(&[window.id], wednesday_now(), wednesday_now() + Duration::days(7))
        .await
        .unwrap();
    bookings.sort_by_key(|b| b.ordinal);

    let ordinals: Vec<i32> = bookings.iter().map(|b| b.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6]);

    for pair in bookings.windows(2) {
        assert!(pair[0].end_at <= pair[1].start_at);
    }
}

#[tokio::test]
async fn inactive_window_is_never_allocated() {
    let setup = TestSetup::new();
    let mut window = monday_window();
    window.active = false;

    let result = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, wednesday_now())
        .await;
    assert_matches!(result, Err(BookingError::InactiveWindow));
}

#[tokio::test]
async fn slot_taken_by_a_racing_writer_is_a_conflict() {
    let setup = TestSetup::new();
    let window = monday_window();

    // A concurrent allocation claimed 09:30 under a later ordinal; the
    // count snapshot of the next caller still points it at 09:30.
    setup
        .ledger
        .insert(NewBooking {
            window_id: window.id,
            patient_id: Uuid::new_v4(),
            occurrence_date: date(2025, 6, 23),
            ordinal: 5,
            start_at: Utc.with_ymd_and_hms(2025, 6, 23, 9, 30, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 6, 23, 10, 0, 0).unwrap(),
            duration_minutes: 30,
            short_description: None,
            medical_record_id: None,
            prescription_id: None,
        })
        .await
        .unwrap();

    let result = setup
        .allocator
        .allocate(&window, Uuid::new_v4(), None, wednesday_now())
        .await;
    assert_matches!(result, Err(BookingError::Conflict));
}

// ==============================================================================
// SIDE ENTITIES
// ==============================================================================

#[tokio::test]
async fn repeat_patient_shares_a_record_but_gets_fresh_prescriptions() {
    let setup = TestSetup::new();
    let window = monday_window();
    let patient = Uuid::new_v4();

    let first = setup
        .allocator
        .allocate(&window, patient, None, wednesday_now())
        .await
        .unwrap();
    let second = setup
        .allocator
        .allocate(&window, patient, None, wednesday_now())
        .await
        .unwrap();

    assert_eq!(setup.records.record_count(), 1);
    assert_eq!(setup.records.prescription_count(), 2);
    assert_eq!(first.medical_record_id, second.medical_record_id);
    assert_ne!(first.prescription_id, second.prescription_id);
}

// ==============================================================================
// CANCELLATION
// ==============================================================================

#[tokio::test]
async fn cancellation_leaves_sibling_ordinals_untouched() {
    let setup = TestSetup::new();
    let window = monday_window();
    let patient = Uuid::new_v4();

    let mut bookings = Vec::new();
    for _ in 0..3 {
        bookings.push(
            setup
                .allocator
                .allocate(&window, patient, None, wednesday_now())
                .await
                .unwrap(),
        );
    }

    setup.allocator.cancel(bookings[1].id, patient).await.unwrap();

    let remaining = setup
        .ledger
        .upcoming_for_patient(patient, wednesday_now(), wednesday_now() + Duration::days(7))
        .await
        .unwrap();
    let ordinals: Vec<i32> = remaining.iter().map(|b| b.ordinal).collect();
    assert_eq!(ordinals, vec![1, 3]);
}

#[tokio::test]
async fn cancellation_requires_ownership() {
    let setup = TestSetup::new();
    let window = monday_window();
    let patient = Uuid::new_v4();

    let booking = setup
        .allocator
        .allocate(&window, patient, None, wednesday_now())
        .await
        .unwrap();

    let result = setup.allocator.cancel(booking.id, Uuid::new_v4()).await;
    assert_matches!(result, Err(BookingError::NotFound(_)));

    // Still on the books.
    assert!(setup.ledger.get(booking.id).await.is_ok());
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[tokio::test]
async fn open_windows_drops_full_and_inactive_entries() {
    let setup = TestSetup::new();

    // Tiny Monday window that fills after one booking.
    let mut small = monday_window();
    small.end_time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    small.capacity = 1;

    let free = TimeWindow {
        day_of_week: 1,
        ..monday_window()
    };
    let mut inactive = monday_window();
    inactive.day_of_week = 3;
    inactive.active = false;

    setup
        .allocator
        .allocate(&small, Uuid::new_v4(), None, wednesday_now())
        .await
        .unwrap();

    let open = setup
        .allocator
        .open_windows(
            vec![small.clone(), free.clone(), inactive],
            wednesday_now(),
        )
        .await
        .unwrap();

    let open_ids: Vec<Uuid> = open.iter().map(|w| w.id).collect();
    assert_eq!(open_ids, vec![free.id]);
}

#[tokio::test]
async fn upcoming_listing_is_limited_to_the_next_week() {
    let setup = TestSetup::new();
    let window = monday_window();
    let patient = Uuid::new_v4();

    let booking = setup
        .allocator
        .allocate(&window, patient, None, wednesday_now())
        .await
        .unwrap();

    // A reservation two Mondays out sits beyond the horizon.
    setup
        .ledger
        .insert(NewBooking {
            window_id: window.id,
            patient_id: patient,
            occurrence_date: date(2025, 6, 30),
            ordinal: 1,
            start_at: Utc.with_ymd_and_hms(2025, 6, 30, 9, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 6, 30, 9, 30, 0).unwrap(),
            duration_minutes: 30,
            short_description: None,
            medical_record_id: None,
            prescription_id: None,
        })
        .await
        .unwrap();

    let upcoming = setup
        .allocator
        .upcoming_for_patient(patient, wednesday_now())
        .await
        .unwrap();

    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, booking.id);
}
