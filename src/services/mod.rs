pub mod power_monitor;
pub mod status;
