//! Approval workflow for municipal property, water connection and shop registration applications.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
