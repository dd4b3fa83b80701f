//! Integration tests for accounts, one-time codes and coworker invitations.

use std::sync::Arc;

use booking::{Booking, BookingSettings, ErrorKind, InMemoryOtpSender};
use chrono::{Duration, TimeZone, Utc};
use common::ManualClock;
use domain::{AccountPatch, PhoneNumber, Role};
use store::InMemoryStore;

const PHONE: &str = "09121234567";

struct TestHarness {
    booking: Booking<InMemoryStore>,
    clock: Arc<ManualClock>,
    sender: InMemoryOtpSender,
}

impl TestHarness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 9, 0, 0).unwrap(),
        ));
        let sender = InMemoryOtpSender::new();
        let booking = Booking::with_collaborators(
            InMemoryStore::new(),
            BookingSettings::default(),
            clock.clone(),
            Arc::new(sender.clone()),
        );

        Self {
            booking,
            clock,
            sender,
        }
    }

    fn last_code(&self) -> String {
        let phone = PhoneNumber::parse(PHONE).unwrap();
        self.sender.last_code_for(&phone).unwrap()
    }
}

#[tokio::test]
async fn test_first_verification_creates_customer() {
    let h = TestHarness::new();
    let identity = h.booking.identity();

    let otp = identity.request_code(PHONE).await.unwrap();
    assert_eq!(otp.code, h.last_code());
    assert_eq!(otp.expires_at, otp.created_at + Duration::minutes(3));

    let account = identity.verify_code(PHONE, &otp.code).await.unwrap();
    assert_eq!(account.role, Role::Customer);
    assert!(account.active);

    let found = identity.find_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(found, account);

    let next = identity.request_code(PHONE).await.unwrap();
    let again = identity.verify_code(PHONE, &next.code).await.unwrap();
    assert_eq!(again.id, account.id);
}

#[tokio::test]
async fn test_reused_code_is_rejected() {
    let h = TestHarness::new();
    let identity = h.booking.identity();

    let otp = identity.request_code(PHONE).await.unwrap();
    identity.verify_code(PHONE, &otp.code).await.unwrap();

    let err = identity.verify_code(PHONE, &otp.code).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyUsed);
}

#[tokio::test]
async fn test_expired_code_is_rejected() {
    let h = TestHarness::new();
    let identity = h.booking.identity();

    let otp = identity.request_code(PHONE).await.unwrap();
    h.clock.advance(Duration::minutes(3));

    let err = identity.verify_code(PHONE, &otp.code).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    assert!(identity.find_by_phone(PHONE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_only_the_latest_code_counts() {
    let h = TestHarness::new();
    let identity = h.booking.identity();

    let stale = identity.request_code(PHONE).await.unwrap();
    h.clock.advance(Duration::seconds(30));
    let fresh = identity.request_code(PHONE).await.unwrap();

    if stale.code != fresh.code {
        let err = identity.verify_code(PHONE, &stale.code).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    identity.verify_code(PHONE, &fresh.code).await.unwrap();
}

#[tokio::test]
async fn test_verify_without_request_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .booking
        .identity()
        .verify_code(PHONE, "123456")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .booking
        .identity()
        .verify_code("not a phone", "123456")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let h = TestHarness::new();
    h.sender.set_fail_on_send(true);

    let err = h.booking.identity().request_code(PHONE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(h.sender.sent().is_empty());
}

#[tokio::test]
async fn test_register_rejects_taken_phone() {
    let h = TestHarness::new();
    let identity = h.booking.identity();

    let account = identity
        .register(PHONE, " Leila ", "Moradi", Role::Customer)
        .await
        .unwrap();
    assert_eq!(account.first_name, "Leila");

    let err = identity
        .register("0912 123 4567", "Other", "Person", Role::Customer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let err = identity
        .register("12", "Bad", "Phone", Role::Customer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_account_management_requires_capability() {
    let h = TestHarness::new();
    let identity = h.booking.identity();
    let admin = identity
        .register("09120000001", "Ali", "Admin", Role::Admin)
        .await
        .unwrap();
    let customer = identity
        .register("09120000002", "Mina", "Customer", Role::Customer)
        .await
        .unwrap();

    let err = identity.list_all(customer.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(identity.list_all(admin.id).await.unwrap().len(), 2);

    let err = identity
        .change_role(customer.id, customer.id, Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let promoted = identity
        .change_role(admin.id, customer.id, Role::Manager)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Manager);

    let renamed = identity
        .update_profile(
            customer.id,
            AccountPatch {
                first_name: Some("Mina ".to_string()),
                last_name: Some("Rahimi".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.display_name(), "Mina Rahimi");
    assert_eq!(renamed.version, promoted.version.next());
}

#[tokio::test]
async fn test_coworker_invite_links_and_promotes() {
    let h = TestHarness::new();
    let identity = h.booking.identity();
    let manager = identity
        .register("09120000010", "Hana", "Manager", Role::Manager)
        .await
        .unwrap();
    let customer = identity
        .register("09120000011", "Omid", "Stylist", Role::Customer)
        .await
        .unwrap();
    let latecomer = identity
        .register("09120000012", "Nima", "Late", Role::Customer)
        .await
        .unwrap();

    let err = identity
        .create_coworker_invite(customer.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let invite = identity.create_coworker_invite(manager.id).await.unwrap();

    let err = identity
        .accept_coworker_invite(manager.id, &invite.code)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let link = identity
        .accept_coworker_invite(customer.id, &invite.code)
        .await
        .unwrap();
    assert_eq!(link.manager_id, manager.id);
    assert_eq!(link.coworker_id, customer.id);
    assert_eq!(
        identity.get(customer.id).await.unwrap().role,
        Role::Coworker
    );

    let err = identity
        .accept_coworker_invite(latecomer.id, &invite.code)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyUsed);

    let err = identity
        .accept_coworker_invite(latecomer.id, "NOSUCHCODE")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let coworkers = identity.coworkers_of(manager.id).await.unwrap();
    assert_eq!(coworkers.len(), 1);
    assert_eq!(coworkers[0].id, customer.id);
}

#[tokio::test]
async fn test_second_invite_from_same_manager_is_already_linked() {
    let h = TestHarness::new();
    let identity = h.booking.identity();
    let manager = identity
        .register("09120000020", "Hana", "Manager", Role::Manager)
        .await
        .unwrap();
    let coworker = identity
        .register("09120000021", "Omid", "Stylist", Role::Coworker)
        .await
        .unwrap();

    let first = identity.create_coworker_invite(manager.id).await.unwrap();
    let second = identity.create_coworker_invite(manager.id).await.unwrap();
    assert_ne!(first.code, second.code);

    identity
        .accept_coworker_invite(coworker.id, &first.code)
        .await
        .unwrap();
    let err = identity
        .accept_coworker_invite(coworker.id, &second.code)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(identity.get(coworker.id).await.unwrap().role, Role::Coworker);
}

#[tokio::test]
async fn test_unrepresentable_code_expiry_is_rejected() {
    let sender = InMemoryOtpSender::new();
    let booking = Booking::with_collaborators(
        InMemoryStore::new(),
        BookingSettings {
            otp_ttl: Duration::days(100_000_000),
            ..BookingSettings::default()
        },
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 9, 0, 0).unwrap(),
        )),
        Arc::new(sender.clone()),
    );

    let err = booking.identity().request_code(PHONE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(sender.sent().is_empty());
}
