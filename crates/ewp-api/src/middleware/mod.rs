//! # Middleware
//!
//! Request-level layers applied around every route.

pub mod metrics;
