//! Credentials, session tokens and the request guards built on them.

pub mod gate;
pub mod password;
pub mod token;

pub use gate::{require_admin, AdminUser, AuthUser};
pub use token::{Claims, TokenService};
