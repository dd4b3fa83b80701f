//! Host bootstrap over the in-memory store.

use app::Config;
use chrono::NaiveTime;
use domain::{ReservationStatus, Role};
use store::InMemoryStore;

#[tokio::test]
async fn test_run_without_database_stops_on_shutdown() {
    app::run(Config::default(), async {}).await.unwrap();
}

#[tokio::test]
async fn test_built_services_follow_configuration() {
    let config = Config::from_lookup(|key| match key {
        "DEFAULT_SLOT_MINUTES" => Some("45".to_string()),
        _ => None,
    });
    let booking = app::build(InMemoryStore::new(), &config);

    let customer = booking
        .identity()
        .register("09123334444", "Parisa", "Nouri", Role::Customer)
        .await
        .unwrap();
    let tomorrow = chrono::Utc::now().date_naive().succ_opt().unwrap();

    let reservation = booking
        .reservations()
        .create_at(
            customer.id,
            "coloring".to_string(),
            tomorrow,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(
        reservation.slot.end(),
        NaiveTime::from_hms_opt(9, 45, 0).unwrap()
    );
}
