//! Core domain types and decision logic.

pub mod bar;
pub mod bar_window;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod intent;
pub mod opening_range;
pub mod position;
pub mod reconcile;
pub mod signal;
