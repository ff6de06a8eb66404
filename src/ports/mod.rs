//! Port traits for the engine's external collaborators.

pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod report_port;
