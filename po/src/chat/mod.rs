//! Interactive schedule review chat
//!
//! [`ChatSession`] is the orchestrator (entry flow, optimistic sends,
//! transcript); [`ChatRepl`] is the terminal front end over it.

mod repl;
mod session;

pub use repl::ChatRepl;
pub use session::{ChatError, ChatMessage, ChatRole, ChatSession, ChatState, SendOutcome};

use std::sync::Arc;

use eyre::Result;
use perryclient::{SessionId, WorkflowApi};
use tracing::info;

use crate::config::Config;

/// Run the interactive chat over an existing session
///
/// This is the main entry point for `po chat`; `api` is the client the
/// command already built.
pub async fn run_interactive(config: &Config, api: Arc<dyn WorkflowApi>, session_id: SessionId) -> Result<()> {
    info!(%session_id, base_url = %config.api.base_url, "run_interactive: starting chat");
    let session = ChatSession::new(api, session_id);
    let mut repl = ChatRepl::new(session, config.chat.history_preview_chars);
    repl.run().await
}
