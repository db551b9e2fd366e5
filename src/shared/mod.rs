pub mod metrics;
pub mod utils;
