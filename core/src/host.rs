use crate::{
    message::Notification,
    player::{Roster, Slot, Team},
};

/// The game engine, as seen by a match session.
///
/// Besides the roster, the engine accepts a small set of writes. Each may fail (for example if the
/// player disconnected in the meantime); callers log the failure and carry on.
pub trait Host: Roster {
    /// End the match in favor of `team`.
    fn declare_winner(&mut self, team: Team) -> anyhow::Result<()>;

    /// Broadcast a chat-style message to every player.
    fn announce(&mut self, text: &str) -> anyhow::Result<()>;

    /// Send a message to a single player's client.
    fn notify(&mut self, slot: Slot, notification: Notification) -> anyhow::Result<()>;
}
