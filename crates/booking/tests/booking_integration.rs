//! Integration tests for reservations and payments over the in-memory store.

use std::sync::Arc;

use booking::{Booking, BookingSettings, ErrorKind, InMemoryOtpSender};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use common::{ManualClock, Money};
use domain::{
    Account, BillingStatus, NewReservation, PaymentKind, PaymentStatus, Reservation,
    ReservationPatch, ReservationStatus, Role, TimeSlot,
};
use store::{BookingStore, InMemoryStore};

struct TestHarness {
    booking: Booking<InMemoryStore>,
    store: InMemoryStore,
    next_phone: std::sync::atomic::AtomicU32,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 9, 0, 0).unwrap(),
        ));
        let booking = Booking::with_collaborators(
            store.clone(),
            BookingSettings::default(),
            clock,
            Arc::new(InMemoryOtpSender::new()),
        );

        Self {
            booking,
            store,
            next_phone: std::sync::atomic::AtomicU32::new(1),
        }
    }

    async fn account(&self, role: Role) -> Account {
        let n = self
            .next_phone
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.booking
            .identity()
            .register(&format!("0912{n:07}"), "Sara", "Ahmadi", role)
            .await
            .unwrap()
    }

    async fn book(
        &self,
        account: &Account,
        start: NaiveTime,
        end: NaiveTime,
    ) -> booking::Result<Reservation> {
        self.booking
            .reservations()
            .create(request(account, start, end))
            .await
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn request(account: &Account, start: NaiveTime, end: NaiveTime) -> NewReservation {
    NewReservation {
        account_id: account.id,
        service_type: "haircut".to_string(),
        date: day(),
        slot: TimeSlot::new(start, end).unwrap(),
        note: None,
    }
}

#[tokio::test]
async fn test_touching_slots_book_and_overlap_conflicts() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;

    let first = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();
    assert_eq!(first.status, ReservationStatus::Pending);
    assert_eq!(first.billing_status, BillingStatus::Unpaid);

    let err = h.book(&customer, at(10, 15), at(10, 45)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.book(&customer, at(10, 30), at(11, 0)).await.unwrap();
    assert_eq!(h.store.reservation_count().await, 2);

    let detector = h.booking.conflicts();
    assert!(detector.has_conflict(day(), at(10, 20), at(10, 40)).await.unwrap());
    assert!(!detector.has_conflict(day(), at(11, 0), at(11, 30)).await.unwrap());
}

#[tokio::test]
async fn test_booking_in_the_past_is_rejected() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;

    let mut input = request(&customer, at(10, 0), at(10, 30));
    input.date = NaiveDate::from_ymd_opt(2025, 5, 29).unwrap();
    let err = h.booking.reservations().create(input).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.store.reservation_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overlapping_creates_have_one_winner() {
    let h = Arc::new(TestHarness::new());
    let customer = h.account(Role::Customer).await;

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let h = h.clone();
        let customer = customer.clone();
        handles.push(tokio::spawn(async move {
            h.book(&customer, at(14, i), at(14, 30 + i)).await
        }));
    }

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }

    assert_eq!(booked, 1);
    let on_day = h.store.reservations_on(day()).await.unwrap();
    assert_eq!(on_day.len(), 1);
}

#[tokio::test]
async fn test_cancel_releases_the_slot() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(11, 0)).await.unwrap();

    let cancelled = h
        .booking
        .reservations()
        .cancel(reservation.id, customer.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(cancelled.version, reservation.version.next());

    h.book(&customer, at(10, 0), at(11, 0)).await.unwrap();
}

#[tokio::test]
async fn test_only_owner_or_staff_can_cancel() {
    let h = TestHarness::new();
    let owner = h.account(Role::Customer).await;
    let stranger = h.account(Role::Customer).await;
    let coworker = h.account(Role::Coworker).await;
    let reservation = h.book(&owner, at(10, 0), at(10, 30)).await.unwrap();

    let err = h
        .booking
        .reservations()
        .cancel(reservation.id, stranger.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let cancelled = h
        .booking
        .reservations()
        .cancel(reservation.id, coworker.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn test_terminal_status_cannot_move() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();
    let ledger = h.booking.reservations();

    ledger
        .update(reservation.id, ReservationPatch::status(ReservationStatus::Done))
        .await
        .unwrap();
    let err = ledger
        .update(
            reservation.id,
            ReservationPatch::status(ReservationStatus::Pending),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        ledger.get(reservation.id).await.unwrap().status,
        ReservationStatus::Done
    );
}

#[tokio::test]
async fn test_create_at_uses_default_slot_length() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;

    let reservation = h
        .booking
        .reservations()
        .create_at(
            customer.id,
            "nails".to_string(),
            day(),
            at(16, 0),
            Some("  window seat ".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(reservation.slot.end(), at(16, 30));
    assert_eq!(reservation.note.as_deref(), Some("window seat"));
}

#[tokio::test]
async fn test_inactive_account_cannot_book() {
    let h = TestHarness::new();
    let admin = h.account(Role::Admin).await;
    let customer = h.account(Role::Customer).await;

    h.booking
        .identity()
        .set_active(admin.id, customer.id, false)
        .await
        .unwrap();

    let err = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_assign_coworker_requires_staff_on_both_ends() {
    let h = TestHarness::new();
    let manager = h.account(Role::Manager).await;
    let coworker = h.account(Role::Coworker).await;
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(12, 0), at(12, 30)).await.unwrap();
    let ledger = h.booking.reservations();

    let err = ledger
        .assign_coworker(customer.id, reservation.id, coworker.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = ledger
        .assign_coworker(manager.id, reservation.id, customer.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let assigned = ledger
        .assign_coworker(manager.id, reservation.id, coworker.id)
        .await
        .unwrap();
    assert_eq!(assigned.coworker_id, Some(coworker.id));

    let served = ledger.list_for_coworker(coworker.id).await.unwrap();
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].id, reservation.id);
}

#[tokio::test]
async fn test_list_all_requires_staff() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let manager = h.account(Role::Manager).await;
    h.book(&customer, at(9, 0), at(9, 30)).await.unwrap();

    let err = h
        .booking
        .reservations()
        .list_all(customer.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let all = h.booking.reservations().list_all(manager.id).await.unwrap();
    assert_eq!(all.len(), 1);
    let own = h
        .booking
        .reservations()
        .list_for_account(customer.id)
        .await
        .unwrap();
    assert_eq!(own.len(), 1);
}

#[tokio::test]
async fn test_full_payment_completes_reservation_once() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();
    let payments = h.booking.payments();

    let payment = payments
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);

    let paid = h.booking.reservations().get(reservation.id).await.unwrap();
    assert_eq!(paid.status, ReservationStatus::Done);
    assert_eq!(paid.billing_status, BillingStatus::Paid);

    let err = payments
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyPaid);

    let after = h.booking.reservations().get(reservation.id).await.unwrap();
    assert_eq!(after, paid);
    assert_eq!(
        payments.list_for_account(customer.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_deposit_advances_to_deposit_paid() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();

    h.booking
        .payments()
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(10),
            PaymentKind::Deposit,
        )
        .await
        .unwrap();

    let advanced = h.booking.reservations().get(reservation.id).await.unwrap();
    assert_eq!(advanced.status, ReservationStatus::DepositPaid);
    assert_eq!(advanced.billing_status, BillingStatus::Paid);
}

#[tokio::test]
async fn test_payment_checks_owner_and_amount() {
    let h = TestHarness::new();
    let owner = h.account(Role::Customer).await;
    let stranger = h.account(Role::Customer).await;
    let reservation = h.book(&owner, at(10, 0), at(10, 30)).await.unwrap();
    let payments = h.booking.payments();

    let err = payments
        .create_payment(
            reservation.id,
            stranger.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = payments
        .create_payment(reservation.id, owner.id, Money::zero(), PaymentKind::Full)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = payments
        .create_payment(
            common::ReservationId::new(),
            owner.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_failed_commit_leaves_payment_and_reservation_untouched() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();

    h.store.fail_next_commit();
    let err = h
        .booking
        .payments()
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    assert!(
        h.booking
            .payments()
            .payment_for_reservation(reservation.id)
            .await
            .unwrap()
            .is_none()
    );
    let unchanged = h.booking.reservations().get(reservation.id).await.unwrap();
    assert_eq!(unchanged, reservation);

    h.booking
        .payments()
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_open_payment_then_settle_reuses_the_row() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();
    let payments = h.booking.payments();

    let pending = payments
        .open_payment(
            reservation.id,
            customer.id,
            Money::from_major(40),
            PaymentKind::Full,
        )
        .await
        .unwrap();
    assert_eq!(pending.status, PaymentStatus::Pending);

    let failed = payments.mark_failed(pending.id).await.unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    let settled = payments
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(40),
            PaymentKind::Full,
        )
        .await
        .unwrap();
    assert_eq!(settled.id, pending.id);
    assert_eq!(settled.status, PaymentStatus::Paid);
    assert_eq!(payments.get_payment(pending.id).await.unwrap(), settled);
}

#[tokio::test]
async fn test_paying_a_cancelled_reservation_is_rejected() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let reservation = h.book(&customer, at(10, 0), at(10, 30)).await.unwrap();
    h.booking
        .reservations()
        .cancel(reservation.id, customer.id)
        .await
        .unwrap();

    let err = h
        .booking
        .payments()
        .create_payment(
            reservation.id,
            customer.id,
            Money::from_major(50),
            PaymentKind::Full,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(
        h.booking
            .payments()
            .payment_for_reservation(reservation.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_wire_input_with_inverted_slot_never_books() {
    let h = TestHarness::new();
    let customer = h.account(Role::Customer).await;
    let body = |start: &str, end: &str| {
        serde_json::json!({
            "account_id": customer.id,
            "service_type": "haircut",
            "date": "2025-06-01",
            "slot": { "start": start, "end": end },
            "note": null,
        })
    };

    let inverted = serde_json::from_value::<NewReservation>(body("11:00:00", "10:00:00"));
    let err = inverted.unwrap_err().to_string();
    assert!(err.contains("Invalid time slot"), "{err}");

    let input: NewReservation = serde_json::from_value(body("10:00:00", "11:00:00")).unwrap();
    h.booking.reservations().create(input).await.unwrap();
    assert_eq!(h.store.reservation_count().await, 1);
}
