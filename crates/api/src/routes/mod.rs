//! HTTP Route Handlers

pub mod dashboard;
pub mod stats;
pub mod upload;
