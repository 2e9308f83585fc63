/// Command and message handlers
pub mod handlers;
/// Per-user session records
pub mod sessions;
/// User state and dialogue management
pub mod state;
