//! Dummy payment provider implementation
//!
//! This provider hands back a fake checkout link without talking to any
//! gateway. Useful for testing and development purposes; bookings stay
//! unpaid until the deferred release frees them, since no webhook ever
//! arrives.

use async_trait::async_trait;

use crate::{
    db::models::bookings::BookingDBResponse,
    payment_providers::{PaymentNotification, PaymentProvider, Result},
};

/// Dummy payment provider that skips the gateway entirely
pub struct DummyProvider;

impl DummyProvider {
    /// Create a new Dummy provider
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_checkout_session(
        &self,
        booking: &BookingDBResponse,
        _movie_title: &str,
        _cancel_url: &str,
        success_url: &str,
    ) -> Result<String> {
        // Generate a unique session ID that includes the booking ID so the
        // fake redirect is traceable back to its booking
        let session_id = format!("dummy_session_{}_{}", booking.id, uuid::Uuid::new_v4());

        // Build success URL with session ID
        let redirect_url = success_url.replace("{CHECKOUT_SESSION_ID}", &session_id);

        tracing::info!("Dummy provider created checkout session {} for booking {}", session_id, booking.id);

        Ok(redirect_url)
    }

    async fn validate_webhook(&self, _headers: &axum::http::HeaderMap, _body: &str) -> Result<Option<PaymentNotification>> {
        // Dummy provider doesn't use webhooks
        Ok(None)
    }
}
