pub mod monitor;
pub mod watchdog;
