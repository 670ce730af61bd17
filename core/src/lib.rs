//! Match settlement for Ranked Turbo: win detection, double down tracking and rating updates.

pub mod cache;
pub mod detector;
pub mod host;
pub mod message;
pub mod opt_in;
pub mod player;
pub mod publisher;
pub mod rating;
pub mod settlement;
