//! Identity-provider webhook that mirrors users locally.
//!
//! The provider delivers Standard Webhooks-style signed lifecycle events:
//! the signature is a base64 HMAC-SHA256 over `{id}.{timestamp}.{body}`,
//! keyed with a `whsec_` prefixed base64 secret, sent in the
//! `svix-signature` header as one or more space-delimited `v1,{base64}`
//! entries.

use crate::{
    AppState,
    api::models::users::IdentityEvent,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Prefix for webhook secrets
const SECRET_PREFIX: &str = "whsec_";

/// Identity provider webhook
#[utoipa::path(
    post,
    path = "/webhooks/identity",
    tag = "users",
    summary = "Identity provider webhook",
    description = "Mirrors user lifecycle events (`user.created`, `user.updated`, `user.deleted`) \
                   into the local users table. Invalid signatures are rejected before any state changes.",
    responses(
        (status = 200, description = "Event mirrored or acknowledged"),
        (status = 400, description = "Invalid signature or malformed event"),
        (status = 501, description = "No identity webhook secret configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let Some(secret) = &state.config.auth.identity_webhook_secret else {
        warn!("Identity webhook called but no signing secret is configured");
        return Ok(StatusCode::NOT_IMPLEMENTED);
    };

    let msg_id = required_header(&headers, "svix-id")?;
    let timestamp = required_header(&headers, "svix-timestamp")?;
    let signatures = required_header(&headers, "svix-signature")?;

    if !verify_signature(msg_id, timestamp, &body, signatures, secret) {
        return Err(Error::BadRequest {
            message: "Invalid webhook signature".to_string(),
        });
    }

    let event: IdentityEvent = serde_json::from_str(&body).map_err(|e| Error::BadRequest {
        message: format!("Malformed identity event: {e}"),
    })?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let request = event.data.to_db_request().ok_or_else(|| Error::BadRequest {
                message: "Identity event carried no email address".to_string(),
            })?;

            let user = repo.create(&request).await?;
            info!("Mirrored {} for user {}", event.event_type, user.id);
        }
        "user.deleted" => {
            let deleted = repo.delete(event.data.id.clone()).await?;
            info!("Processed user.deleted for {} (existed: {})", event.data.id, deleted);
        }
        other => {
            debug!("Ignoring identity event type {other}");
        }
    }

    Ok(StatusCode::OK)
}

fn required_header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::BadRequest {
            message: format!("Missing {name} header"),
        })
}

/// Extract the raw secret bytes from a `whsec_` prefixed secret.
fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let encoded = secret.strip_prefix(SECRET_PREFIX)?;
    BASE64_STANDARD.decode(encoded).ok()
}

/// Compute the expected base64 signature over `{msg_id}.{timestamp}.{payload}`.
fn sign_payload(msg_id: &str, timestamp: &str, payload: &str, secret: &str) -> Option<String> {
    let secret_bytes = decode_secret(secret)?;

    let signed_content = format!("{msg_id}.{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(&secret_bytes).ok()?;
    mac.update(signed_content.as_bytes());
    let signature = mac.finalize().into_bytes();

    Some(BASE64_STANDARD.encode(signature))
}

/// Verify the `svix-signature` header, which may carry several
/// space-delimited `v1,{base64}` candidates after secret rotations.
fn verify_signature(msg_id: &str, timestamp: &str, payload: &str, signatures: &str, secret: &str) -> bool {
    let Some(expected) = sign_payload(msg_id, timestamp, payload, secret) else {
        return false;
    };

    signatures
        .split_whitespace()
        .filter_map(|candidate| candidate.strip_prefix("v1,"))
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
