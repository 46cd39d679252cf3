pub mod health;
pub mod policy;
pub mod sessions;
