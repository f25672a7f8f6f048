// Common Crate - utils.rs
// common/src/utils.rs
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Setup tracing for consistent logging across services
pub fn setup_tracing() {
    // RUST_LOG wins over the default level when present
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Name of a 1-based month index, as returned by telemetry aggregation
pub fn month_index_to_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTH_NAMES.get(index).copied()
}
