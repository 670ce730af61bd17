//! Runs match settlement against a live engine connection.

pub mod session;
pub mod stdio;

pub use self::session::{MatchId, Session, SessionConfig};
