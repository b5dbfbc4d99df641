use crate::commands::setup::build_engine;
use crate::config::Config;
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::info;

/// Interactive conversation through the same engine the gateway uses
pub async fn execute(session: Option<String>, config: &Config) -> Result<()> {
    let engine = build_engine(config).await?;
    let mut session_id = session;

    println!(
        "Hearth [{}] - Type 'exit' to quit",
        config.home_assistant.location_name
    );
    if let Some(id) = &session_id {
        println!("Session: {}", id);
    }
    println!("---");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let outcome = engine.process(session_id.as_deref(), input, "en").await;
        if session_id.as_deref() != Some(outcome.session_id.as_str()) {
            info!(session_id = %outcome.session_id, "Conversation started");
        }
        println!("\nAssistant: {}\n", outcome.speech);
        session_id = Some(outcome.session_id);
    }

    if let Some(id) = session_id {
        println!("Session: {}", id);
    }
    Ok(())
}
