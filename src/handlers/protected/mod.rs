// handlers/protected/mod.rs - Handlers open to any authenticated role

pub mod drives;

pub use drives::list_drives;
