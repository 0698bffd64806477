#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Observability.

pub mod metrics;
