//! Interactive question loop for `docsage chat`.
//!
//! Each line is either a command or a question:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `exit`, `quit` | end the session (any case) |
//! | `/clear` | forget the transcript |
//! | `/model <id or label>` | switch model; the engine is rebuilt on the next question |
//! | `/models` | list presets |
//! | `/history` | print the transcript |
//! | anything else | answered from the index |
//!
//! Failures are printed and the loop continues.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::{Config, LlmConfig};
use crate::search::open_store;
use crate::session::Session;

#[derive(Debug, PartialEq)]
enum Input<'a> {
    Exit,
    Clear,
    Model(&'a str),
    Models,
    History,
    Empty,
    Question(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Input::Exit;
    }
    match line.split_once(char::is_whitespace) {
        Some(("/model", rest)) => Input::Model(rest.trim()),
        _ => match line {
            "" => Input::Empty,
            "/clear" => Input::Clear,
            "/models" => Input::Models,
            "/history" => Input::History,
            "/model" => Input::Model(""),
            q => Input::Question(q),
        },
    }
}

pub async fn run_chat(config: &Config, model: Option<&str>) -> Result<()> {
    let store = open_store(config).await?;
    let mut session = Session::from_config(config, store, model.unwrap_or(&config.llm.model));

    println!(
        "docsage chat (model: {}). Type a question, /models, /model <name>, /clear, /history, or exit.",
        session.model()
    );
    let stdin = BufReader::new(tokio::io::stdin());
    chat_loop(&mut session, &config.llm, stdin, &mut std::io::stdout()).await
}

/// Drive `session` from `input` until EOF or `exit`, writing to `out`.
pub async fn chat_loop<R, W>(session: &mut Session, llm: &LlmConfig, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match parse_input(&line) {
            Input::Exit => break,
            Input::Empty => {}
            Input::Clear => {
                session.clear();
                writeln!(out, "History cleared.")?;
            }
            Input::Models => {
                for preset in &llm.presets {
                    let marker = if preset.id == session.model() { "*" } else { " " };
                    writeln!(out, "{} {:<32} {}", marker, preset.label, preset.id)?;
                }
            }
            Input::Model("") => writeln!(out, "Usage: /model <id or label>")?,
            Input::Model(name) => {
                let id = llm.resolve_model(name);
                if session.select_model(&id) {
                    writeln!(out, "Switched to {}.", id)?;
                } else {
                    writeln!(out, "Already using {}.", id)?;
                }
            }
            Input::History => {
                if session.history().is_empty() {
                    writeln!(out, "(no messages)")?;
                }
                for msg in session.history() {
                    writeln!(out, "[{}] {}", msg.role.as_str(), msg.content)?;
                }
            }
            Input::Question(q) => match session.ask(q).await {
                Ok(answer) => {
                    writeln!(out, "{}", answer.text)?;
                    writeln!(out)?;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "question failed");
                    writeln!(out, "Error: {}", e)?;
                }
            },
        }
    }
    Ok(())
}
