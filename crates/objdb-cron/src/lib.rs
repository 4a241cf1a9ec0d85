//! Cron manager: a small facade over `tokio-cron-scheduler` giving every
//! plugin that needs scheduled work (inventory sync, metrics retention
//! sweeps, recovery loops) named jobs and one graceful shutdown path,
//! instead of each plugin spinning its own `tokio::spawn` loop.

pub mod error;
pub mod manager;

pub use error::CronError;
pub use manager::CronManager;
