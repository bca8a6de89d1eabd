use colored::Colorize;
use ghostpass_sdk::{Cue, CuePlayer, ScanOutcome, Scanner, SilentCuePlayer};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use super::authority::Backend;
use crate::cli::AuthorityArgs;
use crate::config::CliConfig;
use crate::error::{CliError, Result};

/// Rings the terminal bell: once for success, twice for failure
struct TerminalBell;

impl CuePlayer for TerminalBell {
    fn play(&self, cue: Cue) {
        let bell = match cue {
            Cue::Success => "\x07",
            Cue::Failure => "\x07\x07",
        };
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(bell.as_bytes());
        let _ = stderr.flush();
    }
}

fn outcome_json(outcome: &ScanOutcome) -> Value {
    match outcome {
        ScanOutcome::Verified {
            identifier,
            attributes,
        } => json!({
            "outcome": "verified",
            "identifier": identifier,
            "attributes": attributes,
        }),
        ScanOutcome::Expired { guidance } => json!({
            "outcome": "expired",
            "message": guidance,
        }),
        ScanOutcome::Denied(reason) => json!({
            "outcome": "denied",
            "class": reason.class(),
            "message": reason.message(),
        }),
        ScanOutcome::Idle => json!({ "outcome": "idle" }),
        ScanOutcome::Loading => json!({ "outcome": "loading" }),
    }
}

fn print_outcome(outcome: &ScanOutcome, json_output: bool) {
    if json_output {
        println!("{}", outcome_json(outcome));
        return;
    }

    match outcome {
        ScanOutcome::Verified {
            identifier,
            attributes,
        } => {
            println!("{} {}", "✓ VERIFIED".green().bold(), identifier);
            if let Some(name) = &attributes.name {
                println!("  Name:   {name}");
            }
            if let Some(color) = &attributes.status_color {
                println!("  Status: {color}");
            }
            if !attributes.badges.is_empty() {
                println!("  Badges: {}", attributes.badges.join(", "));
            }
        }
        ScanOutcome::Expired { guidance } => {
            println!("{} {}", "⏱ EXPIRED".yellow().bold(), guidance);
        }
        ScanOutcome::Denied(reason) => {
            println!("{} {}", "✗ DENIED".red().bold(), reason.message());
        }
        ScanOutcome::Idle | ScanOutcome::Loading => {}
    }
}

/// Submit one payload and wait for its terminal outcome
async fn scan_one(
    scanner: &Scanner,
    rx: &mut watch::Receiver<ScanOutcome>,
    payload: String,
) -> Result<ScanOutcome> {
    // clear the previous outcome so the next terminal value is this scan's
    scanner.dismiss().await?;
    rx.wait_for(|outcome| *outcome == ScanOutcome::Idle)
        .await
        .map_err(|_| ghostpass_sdk::SdkError::ComponentStopped)?;

    scanner.submit(payload).await?;
    let outcome = rx
        .wait_for(ScanOutcome::is_terminal)
        .await
        .map_err(|_| ghostpass_sdk::SdkError::ComponentStopped)?
        .clone();
    Ok(outcome)
}

pub async fn handle_scan(
    payload: Option<String>,
    bell: bool,
    authority: AuthorityArgs,
    json_output: bool,
) -> Result<()> {
    let config = CliConfig::load()?;
    let backend = Backend::resolve(&authority, &config)?;
    if backend.is_local() {
        return Err(CliError::InvalidInput(
            "Scanning needs the issuer's verifier; a local key only knows passes minted in \
             the same process. Use --server, or `ghostpass verify` for an offline check."
                .to_string(),
        ));
    }

    let cues: Arc<dyn CuePlayer> = if bell {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentCuePlayer)
    };
    let scanner = Scanner::spawn(backend.verifier(), cues, backend.scanner_settings(&config));
    let mut rx = scanner.subscribe();

    let result = match payload {
        Some(payload) => scan_one(&scanner, &mut rx, payload)
            .await
            .map(|outcome| print_outcome(&outcome, json_output)),
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut result = Ok(());
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                match scan_one(&scanner, &mut rx, line).await {
                    Ok(outcome) => print_outcome(&outcome, json_output),
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                }
            }
            result
        }
    };

    scanner.unmount().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghostpass_sdk::{DenyReason, DisplayAttributes};

    #[test]
    fn json_outcomes_keep_deny_classes_apart() {
        let invalid = outcome_json(&ScanOutcome::Denied(DenyReason::InvalidFormat));
        let offline = outcome_json(&ScanOutcome::Denied(DenyReason::Connection));

        assert_eq!(invalid["class"], "invalid_format");
        assert_eq!(invalid["message"], "invalid format");
        assert_eq!(offline["class"], "connection");
    }

    #[test]
    fn verified_json_carries_attributes() {
        let value = outcome_json(&ScanOutcome::Verified {
            identifier: "CC-12345678".to_string(),
            attributes: DisplayAttributes {
                name: Some("Ada".to_string()),
                badges: vec!["VIP".to_string()],
                ..DisplayAttributes::default()
            },
        });

        assert_eq!(value["outcome"], "verified");
        assert_eq!(value["identifier"], "CC-12345678");
        assert_eq!(value["attributes"]["name"], "Ada");
        assert_eq!(value["attributes"]["badges"][0], "VIP");
    }
}
