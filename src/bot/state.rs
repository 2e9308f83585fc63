use serde::{Deserialize, Serialize};

/// Represents the current state of the user dialogue
#[derive(Clone, Serialize, Deserialize, Default)]
pub enum State {
    /// No conversation step in progress
    #[default]
    Idle,
    /// /start was issued, the next text message is taken as the user's name
    AwaitingName,
}
