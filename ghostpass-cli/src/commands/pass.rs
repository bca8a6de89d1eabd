use chrono::{TimeZone, Utc};
use colored::Colorize;
use ghostpass_sdk::{
    public_key_from_str, verify_token, IssuedToken, Presenter, PresenterPhase, PresenterView,
    SubjectId, TokenIssuer,
};
use ghostpass_token::{public_key_from_pem_file, QrPayload, StructuredPayload};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::PathBuf;

use super::authority::{parse_permissions, Backend};
use crate::cli::AuthorityArgs;
use crate::config::CliConfig;
use crate::error::{CliError, Result};

fn qr_payload(token: &IssuedToken, subject: &SubjectId) -> Result<String> {
    let payload = QrPayload::Structured(StructuredPayload::new(
        token.token.clone(),
        subject.as_str(),
        token.expires_at,
    ));
    payload
        .encode()
        .map_err(|e| CliError::InvalidInput(e.to_string()))
}

fn format_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

pub async fn handle_issue(
    subject: String,
    permissions: Vec<String>,
    payload_only: bool,
    authority: AuthorityArgs,
    json_output: bool,
) -> Result<()> {
    let config = CliConfig::load()?;
    let backend = Backend::resolve(&authority, &config)?;
    let permissions = parse_permissions(&permissions)?;
    let subject = SubjectId::new(subject);

    let token = backend.issuer().issue(&subject, &permissions).await?;
    let payload = qr_payload(&token, &subject)?;

    if payload_only {
        println!("{payload}");
    } else if json_output {
        let output = json!({
            "success": true,
            "token": token.token,
            "expires_at": token.expires_at,
            "issued_at": token.issued_at,
            "payload": payload,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} Pass issued for {}", "✓".green(), subject.as_str().bright_cyan());
        println!("  Expires: {}", format_timestamp(token.expires_at));
        println!("  Enabled: {}", permissions.enabled().collect::<Vec<_>>().join(", "));
        println!("  Payload: {payload}");
    }

    Ok(())
}

fn phase_label(view: &PresenterView) -> String {
    match view.phase {
        PresenterPhase::AuthRequired => "sign-in required".red().to_string(),
        PresenterPhase::Initializing => "requesting pass".yellow().to_string(),
        PresenterPhase::Active => "active".green().to_string(),
        PresenterPhase::Refreshing => "refreshing".yellow().to_string(),
        PresenterPhase::Error => view.banner.unwrap_or("error").red().to_string(),
    }
}

pub async fn handle_present(
    subject: String,
    permissions: Vec<String>,
    rotations: Option<usize>,
    authority: AuthorityArgs,
    json_output: bool,
) -> Result<()> {
    let config = CliConfig::load()?;
    let backend = Backend::resolve(&authority, &config)?;
    let permissions = parse_permissions(&permissions)?;
    let subject = SubjectId::new(subject);
    let settings = backend.presenter_settings();

    let presenter = Presenter::spawn(
        backend.issuer(),
        Some(subject.clone()),
        permissions,
        settings,
    );
    let mut rx = presenter.subscribe();
    presenter.mount().await?;

    let progress = if !json_output {
        let pb = ProgressBar::new(settings.token_ttl.as_secs());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:30.green}] {pos}s")
                .map_err(|e| CliError::InvalidInput(e.to_string()))?
                .progress_chars("█░ "),
        );
        pb.set_message("requesting pass".yellow().to_string());
        Some(pb)
    } else {
        None
    };

    let mut shown = 0usize;
    let mut last_token: Option<String> = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let view = rx.borrow_and_update().clone();

                if view.phase == PresenterPhase::AuthRequired {
                    break Err(CliError::Config(
                        "The issuer rejected the session. Set a valid session token with \
                         --session or `ghostpass config set session_token <token>`."
                            .to_string(),
                    ));
                }

                if let Some(pass) = &view.pass {
                    if last_token.as_deref() != Some(pass.token.token.as_str()) {
                        last_token = Some(pass.token.token.clone());
                        shown += 1;
                        if json_output {
                            let output = json!({
                                "token": pass.token.token,
                                "expires_at": pass.token.expires_at,
                                "payload": pass.qr_payload,
                            });
                            println!("{output}");
                        } else if let Some(pb) = &progress {
                            pb.println(format!("{} {}", "▣".bright_cyan(), pass.qr_payload));
                        }
                    }
                }

                if let Some(pb) = &progress {
                    pb.set_position(view.seconds_left());
                    pb.set_message(phase_label(&view));
                }

                if rotations.is_some_and(|limit| shown >= limit) {
                    break Ok(());
                }
            }
            _ = &mut ctrl_c => break Ok(()),
        }
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    presenter.unmount().await;
    outcome
}

pub fn handle_verify(
    token: String,
    public_key: Option<String>,
    public_key_file: Option<PathBuf>,
    json_output: bool,
) -> Result<()> {
    let public_key = if let Some(path) = public_key_file {
        public_key_from_pem_file(path)?
    } else {
        let key = public_key
            .or_else(|| CliConfig::load().ok().and_then(|c| c.public_key))
            .ok_or_else(|| {
                CliError::Config(
                    "No public key given. Use --public-key, --public-key-file or \
                     `ghostpass config set public_key <key>`."
                        .to_string(),
                )
            })?;
        public_key_from_str(&key)?
    };

    let claims = verify_token(&token, public_key)?;
    let remaining = (claims.expires_at - Utc::now().timestamp()).max(0);

    if json_output {
        let output = json!({
            "valid": true,
            "pass_id": claims.pass_id,
            "expires_at": claims.expires_at,
            "seconds_left": remaining,
            "revocation_id": claims.revocation_id,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} Signature and validity window OK", "✓".green());
        println!("  Pass:    {}", claims.pass_id);
        println!(
            "  Expires: {} ({remaining}s left)",
            format_timestamp(claims.expires_at)
        );
    }

    Ok(())
}
