//! CLI host: line commands read from stdin and applied to the wizard.

use std::pin::Pin;

use futures::Stream;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::onboarding::steps::IntegrationStatus;
use crate::onboarding::{AdvanceOutcome, OnboardingManager};

pub const HELP: &str = "\
Commands:
  name <v> | email <v> | password <v>     fill the registration form
  send | resend | code <v>                e-mail verification
  company <v> | url <v> | description <v> fill the organization form
  scrape | page <name>                    scrape the website, inspect a page
  integrate                               install the chatbot
  next | status | help | quit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Name(String),
    Email(String),
    Password(String),
    SendCode,
    ResendCode,
    SubmitCode(String),
    Company(String),
    Url(String),
    Description(String),
    Scrape,
    Page(String),
    Integrate,
    Next,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "name" => with_value(word, rest, Command::Name),
        "email" => with_value(word, rest, Command::Email),
        "password" => with_value(word, rest, Command::Password),
        "code" => with_value(word, rest, Command::SubmitCode),
        "company" => with_value(word, rest, Command::Company),
        "url" => with_value(word, rest, Command::Url),
        "description" => with_value(word, rest, Command::Description),
        "page" => with_value(word, rest, Command::Page),
        "send" => Ok(Some(Command::SendCode)),
        "resend" => Ok(Some(Command::ResendCode)),
        "scrape" => Ok(Some(Command::Scrape)),
        "integrate" => Ok(Some(Command::Integrate)),
        "next" => Ok(Some(Command::Next)),
        "status" => Ok(Some(Command::Status)),
        "help" | "?" => Ok(Some(Command::Help)),
        "quit" | "exit" | "/quit" => Ok(Some(Command::Quit)),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

fn with_value(
    word: &str,
    value: &str,
    build: fn(String) -> Command,
) -> Result<Option<Command>, String> {
    if value.is_empty() {
        Err(format!("'{word}' needs a value"))
    } else {
        Ok(Some(build(value.to_string())))
    }
}

/// Apply a command and describe the result for the terminal.
pub async fn execute(manager: &OnboardingManager, command: Command) -> String {
    match command {
        Command::Name(v) => edited(manager.registration().set_name(&v).await, "Name"),
        Command::Email(v) => edited(manager.registration().set_email(&v).await, "Email"),
        Command::Password(v) => edited(manager.registration().set_password(&v).await, "Password"),
        Command::SendCode => match manager.registration().send_code().await {
            Ok(()) => "Verification code sent. Check your inbox.".to_string(),
            Err(e) => e.to_string(),
        },
        Command::ResendCode => match manager.registration().resend_code().await {
            Ok(true) => "A new verification code was sent.".to_string(),
            Ok(false) => {
                let remaining = manager.registration().view().await.verification.remaining_secs;
                format!("Resend available in {remaining}s")
            }
            Err(e) => e.to_string(),
        },
        Command::SubmitCode(code) => match manager.registration().submit_code(&code).await {
            Ok(()) => "Email verified.".to_string(),
            Err(e) => e.to_string(),
        },
        Command::Company(v) => {
            manager.organization().set_company_name(&v).await;
            "Company name set.".to_string()
        }
        Command::Url(v) => {
            manager.organization().set_website_url(&v).await;
            "Website URL set. Fetching metadata...".to_string()
        }
        Command::Description(v) => {
            manager.organization().set_description(&v).await;
            "Description set.".to_string()
        }
        Command::Scrape => match manager.organization().start_scraping().await {
            Ok(job_id) => format!("Scraping started (job {job_id})."),
            Err(e) => e.to_string(),
        },
        Command::Page(name) => match manager.organization().select_page(&name).await {
            Some(page) if page.chunks.is_empty() => format!("{}: {}", page.name, page.status),
            Some(page) => {
                let mut out = format!("{}: {}", page.name, page.status);
                for chunk in page.chunks {
                    out.push_str(&format!("\n  [{}] {}", chunk.kind, chunk.content));
                }
                out
            }
            None => format!("No page named '{name}'"),
        },
        Command::Integrate => {
            if manager.integration().integrate().await {
                format!(
                    "Integrating... Add this to your site:\n  {}",
                    manager.integration().embed_snippet()
                )
            } else {
                match manager.integration().status().await {
                    IntegrationStatus::Integrated => "Chatbot already integrated.".to_string(),
                    _ => "Integration already in progress.".to_string(),
                }
            }
        }
        Command::Next => match manager.advance_current().await {
            AdvanceOutcome::Advanced { to, .. } if to.is_terminal() => manager
                .summary()
                .await
                .unwrap_or_else(|| "Onboarding complete.".to_string()),
            AdvanceOutcome::Advanced { to, .. } => format!("Step: {}", to.title()),
            AdvanceOutcome::NotReady { errors } => format!("Not ready: {errors}"),
            AdvanceOutcome::Ignored { current, .. } => format!("Nothing to advance ({current})"),
        },
        Command::Status => {
            let status = manager.status().await;
            serde_json::to_string_pretty(&status).unwrap_or_else(|e| format!("status unavailable: {e}"))
        }
        Command::Help => HELP.to_string(),
        Command::Quit => "Bye.".to_string(),
    }
}

fn edited(applied: bool, field: &str) -> String {
    if applied {
        format!("{field} set.")
    } else {
        "Registration form is locked once a code has been sent.".to_string()
    }
}

/// Lines typed on stdin, trimmed, blanks skipped. Ends on EOF.
pub fn stdin_lines() -> Pin<Box<dyn Stream<Item = String> + Send>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }))
}
