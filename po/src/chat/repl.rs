//! Terminal front end for a chat session

use std::future::Future;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use super::session::{ChatMessage, ChatRole, ChatSession, ChatState, SendOutcome};

/// Interactive REPL over a [`ChatSession`]
pub struct ChatRepl {
    session: ChatSession,
    preview_chars: usize,
    printed: usize,
}

impl ChatRepl {
    pub fn new(session: ChatSession, preview_chars: usize) -> Self {
        Self {
            session,
            preview_chars,
            printed: 0,
        }
    }

    /// Run the entry flow, then the main input loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        if !self.load().await {
            println!("{}", "Cancelled.".dimmed());
            return Ok(());
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = format!("{} ", ">".bright_green());
            // A failed merge leaves its input in place; offer it back for editing
            let readline = if self.session.input().is_empty() {
                rl.readline(&prompt)
            } else {
                let kept = self.session.input().to_string();
                rl.readline_with_initial(&prompt, (kept.as_str(), ""))
            };

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        self.session.set_input("");
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.submit(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    self.session.set_input("");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Run the entry flow; false if the user abandoned it
    async fn load(&mut self) -> bool {
        println!("{}", "Extracting schedule and checking compliance...".dimmed());
        let state = abandonable(self.session.start()).await.cloned();
        match state {
            None => false,
            Some(state) => {
                self.print_new_messages();
                self.print_state(&state);
                true
            }
        }
    }

    async fn submit(&mut self, input: &str) {
        if !self.session.is_ready() {
            self.print_not_ready();
            return;
        }

        self.session.set_input(input);
        self.print_new_messages();
        match abandonable(self.session.send()).await {
            Some(Ok(SendOutcome::Failed)) => {
                self.print_new_messages();
                println!("{}", "Your input was kept; edit it and press Enter to resend.".dimmed());
            }
            Some(Ok(_)) => self.print_new_messages(),
            Some(Err(e)) => println!("{} {}", "!".red(), e),
            None => {
                self.print_new_messages();
                println!("{}", "Request abandoned.".dimmed());
            }
        }
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");
        debug!(%cmd, "handle_slash_command: called");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/history" => {
                self.print_history();
                SlashResult::Continue
            }
            "/session" => {
                println!("Session: {}", self.session.session_id().as_str().bright_white());
                self.print_state(&self.session.state().clone());
                SlashResult::Continue
            }
            "/retry" => {
                if matches!(self.session.state(), ChatState::Error(_)) {
                    info!(session_id = %self.session.session_id(), "handle_slash_command: retrying entry flow");
                    if !self.load().await {
                        println!("{}", "Cancelled.".dimmed());
                    }
                } else {
                    println!("{}", "Nothing to retry.".dimmed());
                }
                SlashResult::Continue
            }
            "/merge" => {
                self.submit("").await;
                SlashResult::Continue
            }
            "/plan" => {
                if !self.session.is_ready() {
                    self.print_not_ready();
                    return SlashResult::Continue;
                }
                println!("{}", "Generating action plan...".dimmed());
                match abandonable(self.session.plan()).await {
                    Some(Ok(_)) => self.print_new_messages(),
                    Some(Err(e)) => println!("{} {}", "!".red(), e),
                    None => println!("{}", "Request abandoned.".dimmed()),
                }
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "PerryOps Schedule Review".bright_cyan().bold());
        println!("Session: {}", self.session.session_id());
        println!("Type corrections as plain text. {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the chat", "/quit".yellow());
        println!("  {:14} Show the transcript", "/history".yellow());
        println!("  {:14} Re-run extraction and compliance check after a failure", "/retry".yellow());
        println!("  {:14} Merge with no corrections", "/merge".yellow());
        println!("  {:14} Generate the patient action plan", "/plan".yellow());
        println!("  {:14} Show session id and state", "/session".yellow());
        println!();
        println!("Press {} during a request to abandon it.", "Ctrl+C".yellow());
        println!();
    }

    fn print_history(&self) {
        let transcript = self.session.transcript();
        if transcript.is_empty() {
            println!("{}", "No messages yet.".dimmed());
            return;
        }

        println!();
        println!("{}", "Transcript:".bright_cyan());
        for (i, msg) in transcript.iter().enumerate() {
            let role = match msg.role {
                ChatRole::User => "You".bright_green(),
                ChatRole::Assistant => "Perry".bright_blue(),
            };
            println!(
                "  {}. [{}] {}: {}",
                i + 1,
                msg.at.format("%H:%M"),
                role,
                preview(&msg.text, self.preview_chars)
            );
        }
        println!();
    }

    fn print_state(&self, state: &ChatState) {
        match state {
            ChatState::Loading => println!("{}", "Loading...".dimmed()),
            ChatState::Ready => {}
            ChatState::Error(text) => {
                println!("{} {}", "Error:".red().bold(), text);
                println!("Type {} to try again or {} to leave", "/retry".yellow(), "/quit".yellow());
            }
        }
    }

    fn print_not_ready(&self) {
        match self.session.state() {
            ChatState::Error(_) => println!("{} Chat is unavailable; use {}", "!".red(), "/retry".yellow()),
            _ => println!("{}", "Still loading...".dimmed()),
        }
    }

    /// Print transcript messages appended since the last call
    fn print_new_messages(&mut self) {
        for msg in &self.session.transcript()[self.printed..] {
            print_message(msg);
        }
        self.printed = self.session.transcript().len();
    }
}

fn print_message(msg: &ChatMessage) {
    match msg.role {
        ChatRole::User => {}
        ChatRole::Assistant => {
            println!();
            println!("{}", msg.text);
            println!();
        }
    }
}

/// Collapse whitespace and truncate to `max` characters
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

/// Await `fut` unless Ctrl+C arrives first; the dropped future's result is discarded
async fn abandonable<F: Future>(fut: F) -> Option<F::Output> {
    tokio::select! {
        output = fut => Some(output),
        _ = tokio::signal::ctrl_c() => {
            debug!("abandonable: interrupted");
            None
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}
