//! segcast: segmented bulk broadcast over WhatsApp.
//!
//! Keeps named recipient groups (plus their `ALL` union) in plain text files,
//! one optional attachment per media kind, and sends one message to every
//! member of a group, one recipient at a time, throttled, recording each
//! outcome without aborting on failures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod store;

pub mod contacts;
pub mod media;
pub mod transport;

pub mod campaign;
pub mod engine;
