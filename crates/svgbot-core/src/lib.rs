//! Core domain + application logic for the SVG minifier bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind ports
//! (traits) implemented in the adapter crate; the minification engine sits
//! behind `SvgOptimizer` so it can be swapped or faked.

pub mod cleanup;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod optimizer;
pub mod storage;
pub mod validate;

pub use errors::{Error, Result};
