// web-server/src/middleware/mod.rs
pub mod session_guard;
