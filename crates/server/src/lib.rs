//! HTTP surface for the recast service.

pub mod api;
pub mod metrics;
pub mod state;
