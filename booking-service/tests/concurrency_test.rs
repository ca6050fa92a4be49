mod common;

use booking_service::models::PaymentStatus;
use booking_service::services::BookingError;
use common::{signed_notification, tomorrow_at, TestApp};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_bookings_admit_exactly_one() {
    let app = TestApp::spawn().await;

    let mut handles = Vec::new();
    for offset in 0..8u32 {
        let bookings = app.state.bookings.clone();
        let user_id = if offset % 2 == 0 {
            app.user.id
        } else {
            app.other_user.id
        };
        let field_id = app.field.id;
        // Every candidate covers 10:00-11:00.
        let start = tomorrow_at(9 + offset % 2, 0);
        let end = tomorrow_at(11 + offset % 2, 0);
        handles.push(tokio::spawn(async move {
            bookings.create_booking(user_id, field_id, start, end).await
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => created += 1,
            Err(BookingError::TimeSlotOverlap) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_apply_once() {
    let app = TestApp::spawn().await;
    let booking = app.book(&app.user, 9, 1).await;
    let booking_id = booking.id;
    let order_id = booking_id.to_string();

    let mut handles = Vec::new();
    for i in 0..6 {
        let payments = app.state.payments.clone();
        let notification = signed_notification(&order_id, "settlement");
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                payments
                    .handle_payment_notification(&notification)
                    .await
                    .map(|_| ())
            } else {
                payments.process_payment(booking_id, "cash").await.map(|_| ())
            }
        }));
    }

    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(()) | Err(BookingError::PaymentAlreadyProcessed) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let payment = app
        .state
        .payments
        .get_payment_by_booking(booking_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert!(payment.paid_at.is_some());
}
