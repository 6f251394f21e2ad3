//! Action relay
//!
//! Forwards enforcement intents to the external modqueue service, which
//! applies them inside the live game. Delivery is best-effort: the ledger is
//! the source of truth and is never rolled back on a relay failure.

mod action;
mod client;
mod error;

pub use action::RelayAction;
pub use client::{ActionRelay, HttpRelay};
pub use error::{RelayError, RelayResult};

#[cfg(test)]
pub use client::MockActionRelay;
