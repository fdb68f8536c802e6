// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (any valid token) → Elevated (admin role)

pub mod elevated;
pub mod protected;
pub mod public;
