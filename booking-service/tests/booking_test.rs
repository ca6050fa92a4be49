mod common;

use booking_service::models::{BookingStatus, Field, PaymentStatus};
use booking_service::services::{BookingError, ErrorKind, Repository};
use chrono::Duration;
use common::{tomorrow_at, yesterday_at, TestApp, FIELD_PRICE};
use uuid::Uuid;

#[tokio::test]
async fn create_booking_bills_whole_hours() {
    let app = TestApp::spawn().await;

    let created = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            app.field.id,
            tomorrow_at(9, 0),
            tomorrow_at(10, 30),
        )
        .await
        .expect("Failed to create booking");

    assert_eq!(created.booking.status, BookingStatus::Pending);
    assert_eq!(created.booking.user_id, app.user.id);
    assert_eq!(created.payment.booking_id, created.booking.id);
    assert_eq!(created.payment.status, PaymentStatus::Pending);
    assert_eq!(created.payment.amount, FIELD_PRICE);

    let created = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            app.field.id,
            tomorrow_at(13, 0),
            tomorrow_at(15, 59),
        )
        .await
        .unwrap();
    assert_eq!(created.payment.amount, 2 * FIELD_PRICE);
}

#[tokio::test]
async fn unknown_field_is_reported_before_range_errors() {
    let app = TestApp::spawn().await;
    let err = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            Uuid::new_v4(),
            tomorrow_at(10, 0),
            tomorrow_at(9, 0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::FieldNotFound(_)));
}

#[tokio::test]
async fn malformed_range_is_reported_before_past_start() {
    let app = TestApp::spawn().await;
    let start = yesterday_at(9, 0);
    let err = app
        .state
        .bookings
        .create_booking(app.user.id, app.field.id, start, start)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTimeRange));
}

#[tokio::test]
async fn past_start_is_rejected() {
    let app = TestApp::spawn().await;
    let err = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            app.field.id,
            yesterday_at(9, 0),
            yesterday_at(11, 0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BookingInPast));
}

#[tokio::test]
async fn bookings_shorter_than_an_hour_are_rejected() {
    let app = TestApp::spawn().await;
    let start = tomorrow_at(9, 0);
    let err = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            app.field.id,
            start,
            start + Duration::minutes(45),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::MinimumDuration));
}

#[tokio::test]
async fn overlapping_slot_is_rejected_and_adjacent_slot_is_accepted() {
    let app = TestApp::spawn().await;
    app.book(&app.user, 9, 2).await;

    let err = app
        .state
        .bookings
        .create_booking(
            app.other_user.id,
            app.field.id,
            tomorrow_at(10, 0),
            tomorrow_at(12, 0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::TimeSlotOverlap));

    app.state
        .bookings
        .create_booking(
            app.other_user.id,
            app.field.id,
            tomorrow_at(11, 0),
            tomorrow_at(12, 0),
        )
        .await
        .expect("Adjacent slot should be free");
}

#[tokio::test]
async fn overlap_is_reported_before_minimum_duration() {
    let app = TestApp::spawn().await;
    app.book(&app.user, 9, 2).await;

    let err = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            app.field.id,
            tomorrow_at(9, 30),
            tomorrow_at(10, 0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::TimeSlotOverlap));
}

#[tokio::test]
async fn user_bookings_are_listed_latest_start_first() {
    let app = TestApp::spawn().await;
    let early = app.book(&app.user, 8, 1).await;
    let late = app.book(&app.user, 18, 2).await;
    app.book(&app.other_user, 12, 1).await;

    let bookings = app
        .state
        .bookings
        .get_user_bookings(app.user.id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![late.id, early.id]);
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let app = TestApp::spawn().await;
    let err = app
        .state
        .bookings
        .get_booking_by_id(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound(_)));
}

#[tokio::test]
async fn amount_overflow_is_a_validation_error() {
    let app = TestApp::spawn().await;
    let pricey = app
        .repo
        .create_field(Field::new(
            "Lapangan Premium".to_string(),
            200_000_000_000,
            "Jakarta Pusat".to_string(),
        ))
        .await
        .unwrap();

    let start = tomorrow_at(9, 0);
    let err = app
        .state
        .bookings
        .create_booking(
            app.user.id,
            pricey.id,
            start,
            start + Duration::days(3_650_000),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::AmountTooLarge));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = app
        .state
        .bookings
        .get_user_bookings(app.user.id)
        .await
        .unwrap();
    assert!(stored.is_empty());
}
