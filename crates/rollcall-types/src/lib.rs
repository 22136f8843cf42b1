//! Shared domain types for the Rollcall attendance client.

pub mod attendance;
pub mod config;
pub mod events;
pub mod frame;
pub mod roster;
pub mod session;
pub mod view;

mod errors;

pub use errors::{Result, RollcallError};
