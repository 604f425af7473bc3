//! Core types for Tradedesk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;
pub mod trading;
pub mod user;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, MinorUnits, format_amount};
pub use status::*;
pub use trading::*;
pub use user::{SessionUser, UserProfile};
