//! Payment-provider webhook that settles bookings.
//!
//! The provider validates the payload (signature check, event decoding) via
//! [`PaymentWebhook`]; every state change happens here, so Stripe and any
//! future gateway share one reconciliation path.

use crate::{
    AppState,
    db::{errors::DbError, handlers::Bookings},
    errors::Error,
    jobs::{self, JobKind},
    payment_providers::PaymentNotification,
};
use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Extractor that hands the raw payload to the configured payment provider
/// for validation.
///
/// Carries `None` when the provider has no webhook channel (the dummy
/// gateway); the handler acknowledges those without touching anything.
pub struct PaymentWebhook(pub Option<PaymentNotification>);

impl FromRequest<AppState> for PaymentWebhook
where
    String: FromRequest<AppState>,
{
    type Rejection = Response;

    async fn from_request(req: Request<Body>, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();

        let payload = String::from_request(req, state).await.map_err(IntoResponse::into_response)?;

        let notification = state
            .payment
            .validate_webhook(&headers, &payload)
            .await
            .map_err(|e| {
                warn!("Rejecting payment webhook: {e}");
                StatusCode::BAD_REQUEST.into_response()
            })?;

        Ok(Self(notification))
    }
}

/// Payment provider webhook
#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "payments",
    summary = "Payment provider webhook",
    description = "Marks the referenced booking paid on settlement events and queues the \
                   confirmation email. Invalid signatures are rejected before any state changes.",
    responses(
        (status = 200, description = "Event settled or acknowledged"),
        (status = 400, description = "Invalid or missing signature"),
        (status = 500, description = "Settlement could not be recorded; the gateway retries"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    PaymentWebhook(notification): PaymentWebhook,
) -> Result<StatusCode, Error> {
    let Some(notification) = notification else {
        return Ok(StatusCode::OK);
    };

    if !notification.is_settlement() {
        debug!("Ignoring payment event type {}", notification.event_type);
        return Ok(StatusCode::OK);
    }

    // Post-verification failures return 500 so the gateway redelivers
    let booking_id = notification.booking_id.ok_or_else(|| Error::Internal {
        operation: format!(
            "resolve booking for a {} event without metadata",
            notification.event_type
        ),
    })?;

    let mut tx = state.db.begin().await.map_err(DbError::from)?;

    // A booking already released (payment landed after the hold expired) is a
    // hard error; those sessions need manual reconciliation.
    let booking = Bookings::new(&mut tx)
        .get_for_update(booking_id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: format!("settle payment for missing booking {booking_id}"),
        })?;

    // Redelivered settlements ack without queueing another email
    if booking.is_paid {
        debug!("Booking {} already settled, acknowledging redelivery", booking_id);
        return Ok(StatusCode::OK);
    }

    Bookings::new(&mut tx).mark_paid(booking_id).await?;

    jobs::enqueue_on(&mut tx, &JobKind::ConfirmationEmail { booking_id }, Utc::now()).await?;

    tx.commit().await.map_err(DbError::from)?;

    info!(
        "Booking {} settled via {} ({} seats)",
        booking.id,
        notification.event_type,
        booking.seats.len()
    );

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{handlers::Repository, models::bookings::BookingDBResponse},
        test_utils::{create_test_booking, create_test_movie, create_test_show, create_test_state, create_test_user},
        types::BookingId,
    };
    use chrono::Duration;
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn settlement(booking_id: BookingId) -> PaymentWebhook {
        PaymentWebhook(Some(PaymentNotification {
            event_type: "CheckoutSessionCompleted".to_string(),
            booking_id: Some(booking_id),
        }))
    }

    async fn seeded_booking(pool: &PgPool) -> BookingDBResponse {
        let user = create_test_user(pool, false).await;
        let movie = create_test_movie(pool, 603).await;
        let show = create_test_show(pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;
        create_test_booking(pool, &user.id, show.id, &["A1", "A2"]).await
    }

    async fn load_booking(pool: &PgPool, id: BookingId) -> BookingDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Bookings::new(&mut conn).get_by_id(id).await.unwrap().unwrap()
    }

    async fn email_jobs(pool: &PgPool) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE job_type = 'confirmation_email'")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settlement_marks_booking_paid_and_queues_email(pool: PgPool) {
        let state = create_test_state(&pool);
        let booking = seeded_booking(&pool).await;

        let status = payment_webhook(State(state), settlement(booking.id)).await.unwrap();
        assert_eq!(status, StatusCode::OK);

        assert!(load_booking(&pool, booking.id).await.is_paid);
        assert_eq!(email_jobs(&pool).await, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_redelivered_settlement_acks_without_second_email(pool: PgPool) {
        let state = create_test_state(&pool);
        let booking = seeded_booking(&pool).await;

        payment_webhook(State(state.clone()), settlement(booking.id)).await.unwrap();

        // Gateways redeliver, sometimes as the async-settled variant
        let redelivery = PaymentWebhook(Some(PaymentNotification {
            event_type: "CheckoutSessionAsyncPaymentSucceeded".to_string(),
            booking_id: Some(booking.id),
        }));
        let status = payment_webhook(State(state), redelivery).await.unwrap();
        assert_eq!(status, StatusCode::OK);

        assert!(load_booking(&pool, booking.id).await.is_paid);
        assert_eq!(email_jobs(&pool).await, 1, "Redelivery must not queue a second email");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settlement_for_missing_booking_errors(pool: PgPool) {
        let state = create_test_state(&pool);

        let err = payment_webhook(State(state), settlement(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }), "Gateway should be told to retry");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settlement_without_booking_metadata_errors(pool: PgPool) {
        let state = create_test_state(&pool);

        let webhook = PaymentWebhook(Some(PaymentNotification {
            event_type: "CheckoutSessionCompleted".to_string(),
            booking_id: None,
        }));
        let err = payment_webhook(State(state), webhook).await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_non_settlement_events_are_ignored(pool: PgPool) {
        let state = create_test_state(&pool);
        let booking = seeded_booking(&pool).await;

        let webhook = PaymentWebhook(Some(PaymentNotification {
            event_type: "ChargeRefunded".to_string(),
            booking_id: Some(booking.id),
        }));
        let status = payment_webhook(State(state), webhook).await.unwrap();
        assert_eq!(status, StatusCode::OK);

        assert!(!load_booking(&pool, booking.id).await.is_paid);
        assert_eq!(email_jobs(&pool).await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_providers_without_webhooks_are_acknowledged(pool: PgPool) {
        let state = create_test_state(&pool);

        let status = payment_webhook(State(state), PaymentWebhook(None)).await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
}
