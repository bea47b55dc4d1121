//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which abstracts checkout
//! sessions and webhook validation across payment gateways (Stripe today,
//! others later).

use async_trait::async_trait;

use crate::{config::PaymentConfig, db::models::bookings::BookingDBResponse, types::BookingId};

pub mod dummy;
pub mod stripe;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: PaymentConfig) -> Box<dyn PaymentProvider> {
    match config {
        PaymentConfig::Stripe(stripe_config) => Box::new(stripe::StripeProvider::from(stripe_config)),
        PaymentConfig::Dummy => Box::new(dummy::DummyProvider::new()),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),
}

impl From<PaymentError> for crate::errors::Error {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ProviderApi(message) => crate::errors::Error::Upstream {
                service: "payment gateway".to_string(),
                message,
            },
            PaymentError::InvalidData(message) => crate::errors::Error::BadRequest { message },
        }
    }
}

/// A validated webhook notification from a payment provider
///
/// `booking_id` is resolved from the provider's session metadata when the
/// event carries a checkout session, `None` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    /// Type of event (e.g., "CheckoutSessionCompleted")
    pub event_type: String,
    /// Booking the event settles, if the payload named one
    pub booking_id: Option<BookingId>,
}

impl PaymentNotification {
    /// Whether this event means the session's payment has settled.
    pub fn is_settlement(&self) -> bool {
        self.event_type == "CheckoutSessionCompleted" || self.event_type == "CheckoutSessionAsyncPaymentSucceeded"
    }
}

/// Abstract payment provider interface
///
/// Implementors provide checkout processing for different gateways. State
/// mutation (marking bookings paid) stays in the webhook handler so every
/// provider shares one reconciliation path.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a new checkout session for an unpaid booking
    ///
    /// Returns a URL the user should be redirected to for payment. The
    /// session carries the booking id in its metadata so the webhook can
    /// settle it later.
    ///
    /// # Arguments
    /// * `booking` - The pending booking to collect payment for
    /// * `movie_title` - Display name for the line item
    /// * `cancel_url` - URL to redirect to if payment is cancelled
    /// * `success_url` - URL to redirect to if payment succeeds
    async fn create_checkout_session(
        &self,
        booking: &BookingDBResponse,
        movie_title: &str,
        cancel_url: &str,
        success_url: &str,
    ) -> Result<String>;

    /// Validate and extract a webhook notification from raw request data
    ///
    /// Returns None if this provider doesn't support webhooks.
    /// Returns Err if validation fails (invalid signature, malformed data, etc.)
    async fn validate_webhook(&self, headers: &axum::http::HeaderMap, body: &str) -> Result<Option<PaymentNotification>>;
}
