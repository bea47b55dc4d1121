//! Authentication and authorization.
//!
//! User accounts live in the external identity provider; the backend never
//! sees credentials. Two pieces cover the whole surface:
//!
//! - **Proxy header auth**: the fronting proxy authenticates the browser
//!   session and injects the identity provider's user id into a trusted
//!   header (`auth.proxy_header.header_name`, `x-showtix-user` by default).
//!   The [`current_user`] extractors resolve that id against the mirrored
//!   `users` table. A user that has not been mirrored yet (identity webhook
//!   lagging) is treated as unauthenticated.
//! - **Admin gating**: privileged routes extract [`current_user::AdminUser`],
//!   which checks the mirrored `is_admin` flag and rejects with 403.
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use showtix::api::models::users::CurrentUser;
//! use showtix::auth::current_user::AdminUser;
//!
//! async fn my_bookings(user: CurrentUser) -> Result<Json<Vec<BookingWithShowResponse>>> { ... }
//!
//! async fn dashboard(AdminUser(user): AdminUser) -> Result<Json<DashboardResponse>> { ... }
//! ```

pub mod current_user;

pub use current_user::AdminUser;
