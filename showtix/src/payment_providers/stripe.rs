//! Stripe payment provider implementation

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
};

use crate::{
    config::StripeConfig,
    db::models::bookings::BookingDBResponse,
    payment_providers::{PaymentError, PaymentNotification, PaymentProvider, Result},
};

/// Checkout sessions expire in lockstep with the deferred seat release, so an
/// abandoned session and its hold disappear together.
const SESSION_EXPIRY_MINUTES: i64 = 30;

/// Stripe payment provider
pub struct StripeProvider {
    api_key: String,
    webhook_secret: String,
    currency: stripe::Currency,
}

impl From<StripeConfig> for StripeProvider {
    fn from(config: StripeConfig) -> Self {
        let currency = config.currency.parse().unwrap_or_else(|_| {
            tracing::warn!("Unrecognized currency {:?} in Stripe config, falling back to usd", config.currency);
            stripe::Currency::USD
        });

        Self {
            api_key: config.api_key,
            webhook_secret: config.webhook_secret,
            currency,
        }
    }
}

impl StripeProvider {
    /// Get a Stripe client
    fn client(&self) -> Client {
        Client::new(&self.api_key)
    }
}

/// Convert a decimal major-unit amount to the gateway's integer minor units.
fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| PaymentError::InvalidData(format!("Amount {amount} cannot be represented in minor units")))
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_checkout_session(
        &self,
        booking: &BookingDBResponse,
        movie_title: &str,
        cancel_url: &str,
        success_url: &str,
    ) -> Result<String> {
        let client = self.client();

        let unit_amount = to_minor_units(booking.amount)?;
        let expires_at = (Utc::now() + Duration::minutes(SESSION_EXPIRY_MINUTES)).timestamp();

        let line_item_name = format!("{} ({} seats)", movie_title, booking.seats.len());
        let metadata = std::collections::HashMap::from([("booking_id".to_string(), booking.id.to_string())]);

        let checkout_params = CreateCheckoutSession {
            cancel_url: Some(cancel_url),
            success_url: Some(success_url),
            client_reference_id: Some(&booking.user_id),
            currency: Some(self.currency),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: self.currency,
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: line_item_name,
                        ..Default::default()
                    }),
                    unit_amount: Some(unit_amount),
                    ..Default::default()
                }),
                quantity: Some(1),
                ..Default::default()
            }]),
            mode: Some(CheckoutSessionMode::Payment),
            metadata: Some(metadata),
            expires_at: Some(expires_at),
            ..Default::default()
        };

        let checkout_session = CheckoutSession::create(&client, checkout_params).await.map_err(|e| {
            tracing::error!("Failed to create Stripe checkout session: {:?}", e);
            PaymentError::ProviderApi(e.to_string())
        })?;

        tracing::info!("Created checkout session {} for booking {}", checkout_session.id, booking.id);

        // Return checkout URL for hosted checkout
        checkout_session.url.ok_or_else(|| {
            tracing::error!("Checkout session missing URL");
            PaymentError::ProviderApi("Checkout session missing URL".to_string())
        })
    }

    async fn validate_webhook(&self, headers: &axum::http::HeaderMap, body: &str) -> Result<Option<PaymentNotification>> {
        // Get the Stripe signature from headers
        let signature = headers
            .get("stripe-signature")
            .ok_or_else(|| {
                tracing::error!("Missing stripe-signature header");
                PaymentError::InvalidData("Missing stripe-signature header".to_string())
            })?
            .to_str()
            .map_err(|e| {
                tracing::error!("Invalid stripe-signature header: {:?}", e);
                PaymentError::InvalidData("Invalid stripe-signature header".to_string())
            })?;

        // Validate the webhook signature and construct the event
        let event = stripe::Webhook::construct_event(body, signature, &self.webhook_secret).map_err(|e| {
            tracing::error!("Failed to construct webhook event: {:?}", e);
            PaymentError::InvalidData(format!("Webhook validation failed: {}", e))
        })?;

        tracing::trace!("Validated Stripe webhook event: {:?}", event.type_);

        // The checkout session carries our booking id in its metadata
        let booking_id = match &event.data.object {
            stripe::EventObject::CheckoutSession(session) => session
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.get("booking_id"))
                .and_then(|id| id.parse().ok()),
            _ => None,
        };

        Ok(Some(PaymentNotification {
            event_type: format!("{:?}", event.type_),
            booking_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn test_config() -> StripeConfig {
        StripeConfig {
            api_key: "sk_test_fake".to_string(),
            webhook_secret: "whsec_fake".to_string(),
            currency: "usd".to_string(),
        }
    }

    #[test]
    fn test_provider_from_config() {
        let provider = StripeProvider::from(test_config());

        assert_eq!(provider.api_key, "sk_test_fake");
        assert_eq!(provider.webhook_secret, "whsec_fake");
        assert_eq!(provider.currency, stripe::Currency::USD);
    }

    #[test]
    fn test_provider_parses_configured_currency() {
        let mut config = test_config();
        config.currency = "eur".to_string();

        let provider = StripeProvider::from(config);
        assert_eq!(provider.currency, stripe::Currency::EUR);
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(Decimal::new(1000, 2)).unwrap(), 1000); // 10.00
        assert_eq!(to_minor_units(Decimal::new(999, 2)).unwrap(), 999); // 9.99
        assert_eq!(to_minor_units(Decimal::from(25)).unwrap(), 2500); // 25
    }

    #[tokio::test]
    async fn test_webhook_rejects_missing_signature() {
        let provider = StripeProvider::from(test_config());

        let err = provider.validate_webhook(&HeaderMap::new(), "{}").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_webhook_rejects_garbage_signature() {
        let provider = StripeProvider::from(test_config());

        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", "t=123,v1=deadbeef".parse().unwrap());

        let err = provider.validate_webhook(&headers, "{}").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidData(_)));
    }
}
