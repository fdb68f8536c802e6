// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service info, health and token acquisition.

pub mod auth;
pub mod root;

pub use auth::{login, register};
pub use root::{health, root};
