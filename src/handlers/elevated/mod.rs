// handlers/elevated/mod.rs - Admin-only handlers
//
// Every route here is layered with `authenticate` and `require_role(Role::Admin)`.

pub mod analytics;
pub mod dashboard;
pub mod drives;
pub mod students;
