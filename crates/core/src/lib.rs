//! Tradedesk Core - Shared domain types.
//!
//! This crate provides the types shared by every Tradedesk component:
//! - `client` - Session handling, typed backend API, payment and dashboard flows
//! - `cli` - Command-line front end built on the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no timers. This keeps it lightweight and trivially testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers, money, emails, statuses and
//!   the trading records reported by the backend

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
