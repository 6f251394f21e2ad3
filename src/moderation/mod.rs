//! Moderation engine
//!
//! Every staff request becomes an [`Operation`], is checked against the
//! static rank table and then dispatched by [`ModerationService`]. Tempban
//! expiry runs separately in the [`Sweeper`].

mod error;
mod operation;
mod service;
mod sweeper;

pub use error::{ModerationError, ModerationResult};
pub use operation::{CashChange, GameSetting, Operation, Outcome};
pub use service::{
    AUTO_BAN_DAYS, AUTO_BAN_PROOF, AUTO_BAN_REASON, ModerationService, STAFF_LOG_LIMIT,
    STRIKE_THRESHOLD, SweepReport, WARNING_THRESHOLD, bans_csv,
};
pub use sweeper::{SWEEP_INTERVAL, SweepRequest, Sweeper};
