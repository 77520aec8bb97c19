//! # API Route Modules
//!
//! - `prove`: `POST /prove/<kind>` for each enabled proof kind.
//! - `health`: `/healthz` service report and the `/health/*` probes.

pub mod health;
pub mod prove;
