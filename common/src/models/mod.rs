// common/src/models/mod.rs
pub mod identity;
pub mod session;
