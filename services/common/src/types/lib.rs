//! Common types and utilities for `ShrivenQ` trading platform

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::cargo)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod instrument;
pub mod market;
pub mod types;

pub use constants::*;
pub use instrument::*;
pub use market::*;
pub use types::*;
