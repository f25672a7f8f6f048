pub mod config;
pub mod download;
pub mod models;
pub mod utils;

pub use config::*;
pub use download::*;
pub use utils::*;
