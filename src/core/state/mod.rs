#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod merkle;
pub mod persistent_state;
