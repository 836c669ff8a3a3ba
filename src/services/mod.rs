//! Domain operations shared by the HTTP handlers.

pub mod accounts;
pub mod posts;
