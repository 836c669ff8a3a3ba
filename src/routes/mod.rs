/**
 * Routes Module
 * HTTP handlers; business rules live in `crate::services`
 */

pub mod auth;
pub mod form;
pub mod health;
pub mod posts;
pub mod summary;
