use crate::{
    api::models::users::CurrentUser,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use tracing::{debug, instrument, trace};

/// Extract user from the trusted proxy header if present
/// Returns:
/// - None: No proxy header present
/// - Some(Ok(user)): Header present and the user is mirrored locally
/// - Some(Err(error)): Header present but the user is unknown or lookup failed
#[instrument(skip(parts, config, db))]
async fn try_proxy_header_auth(
    parts: &Parts,
    config: &crate::config::Config,
    db: &PgPool,
) -> Option<Result<CurrentUser>> {
    let user_id = parts
        .headers
        .get(&config.auth.proxy_header.header_name)
        .and_then(|h| h.to_str().ok())?;

    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => return Some(Err(crate::db::errors::DbError::from(e).into())),
    };

    match Users::new(&mut conn).get_by_id(user_id.to_string()).await {
        Ok(Some(user)) => Some(Ok(CurrentUser::from(user))),
        // The identity webhook has not mirrored this user yet. Callers retry
        // once the webhook catches up.
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some("User is not synced yet".to_string()),
        })),
        Err(e) => Some(Err(Error::Database(e))),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_proxy_header_auth(parts, &state.config, &state.db).await {
            Some(Ok(user)) => {
                debug!("Authenticated user {} via proxy header", user.id);
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Proxy header authentication failed: {:?}", e);
                Err(e)
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// An authenticated user whose mirrored `is_admin` flag is set.
///
/// Extraction fails with 403 for ordinary users, 401 when nobody is
/// authenticated at all.
#[derive(Debug)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            trace!("User {} is not an admin", user.id);
            return Err(Error::InsufficientPermissions {
                action: "access".to_string(),
                resource: "admin endpoints".to_string(),
            });
        }

        Ok(AdminUser(user))
    }
}
