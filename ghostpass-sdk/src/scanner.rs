//! Gateway scanner: payload in, one fixed outcome out.
//!
//! Input is decoded locally (structured JSON first, legacy `VALID:` second)
//! and only well-formed payloads reach the verifier. Terminal outcomes clear
//! themselves after the display window; a new scan or a dismiss clears them
//! at once and discards any verification still running.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use ghostpass_config::ScannerSettings;
use ghostpass_token::{DisplayAttributes, QrPayload, Verdict};

use crate::cue::{Cue, CueDispatcher, CuePlayer};
use crate::error::SdkError;
use crate::verifier::TokenVerifier;

/// Shown with an `Expired` outcome
pub const EXPIRED_GUIDANCE: &str = "Pass expired. Ask the holder to refresh their QR code.";

/// Shown when no authoritative answer was obtained
pub const CONNECTION_REASON: &str = "Couldn't reach the verifier. Try again.";

/// Shown for an authoritative deny that carried no reason
pub const DEFAULT_DENY_REASON: &str = "Access denied";

/// Why a scan was denied.
///
/// The variants may render alike but are always logged apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Payload matched neither QR shape; the verifier was not called
    InvalidFormat,
    /// The verifier said no
    Rejected { code: String, reason: Option<String> },
    /// Transport failure or an unreadable verifier response
    Connection,
}

impl DenyReason {
    /// Text for the outcome screen
    pub fn message(&self) -> &str {
        match self {
            DenyReason::InvalidFormat => "invalid format",
            DenyReason::Rejected { reason, .. } => {
                reason.as_deref().unwrap_or(DEFAULT_DENY_REASON)
            }
            DenyReason::Connection => CONNECTION_REASON,
        }
    }

    /// Stable label for logs
    pub fn class(&self) -> &'static str {
        match self {
            DenyReason::InvalidFormat => "invalid_format",
            DenyReason::Rejected { .. } => "rejected",
            DenyReason::Connection => "connection",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Idle,
    Loading,
    Verified {
        /// Profile pointer or legacy identifier from the payload
        identifier: String,
        attributes: DisplayAttributes,
    },
    Expired {
        guidance: &'static str,
    },
    Denied(DenyReason),
}

impl ScanOutcome {
    /// Outcomes that are displayed and later cleared
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanOutcome::Verified { .. } | ScanOutcome::Expired { .. } | ScanOutcome::Denied(_)
        )
    }

    fn label(&self) -> &'static str {
        match self {
            ScanOutcome::Idle => "idle",
            ScanOutcome::Loading => "loading",
            ScanOutcome::Verified { .. } => "verified",
            ScanOutcome::Expired { .. } => "expired",
            ScanOutcome::Denied(_) => "denied",
        }
    }

    fn cue(&self) -> Cue {
        match self {
            ScanOutcome::Verified { .. } => Cue::Success,
            _ => Cue::Failure,
        }
    }
}

fn outcome_for(identifier: String, result: Result<Verdict, SdkError>) -> ScanOutcome {
    match result {
        Ok(Verdict::Allow { attributes }) => ScanOutcome::Verified {
            identifier,
            attributes,
        },
        Ok(Verdict::Expired { .. }) => ScanOutcome::Expired {
            guidance: EXPIRED_GUIDANCE,
        },
        Ok(Verdict::Deny { code, reason }) => {
            ScanOutcome::Denied(DenyReason::Rejected { code, reason })
        }
        Err(e) => {
            warn!(error = %e, transport = e.is_transport(), "verification failed");
            ScanOutcome::Denied(DenyReason::Connection)
        }
    }
}

fn log_outcome(scan: u64, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Denied(reason) => match reason {
            DenyReason::Rejected { code, .. } => {
                info!(scan, outcome = "denied", class = reason.class(), code = %code, "scan settled")
            }
            _ => info!(scan, outcome = "denied", class = reason.class(), "scan settled"),
        },
        other => info!(scan, outcome = other.label(), "scan settled"),
    }
}

enum Command {
    Submit(String),
    Dismiss,
}

type Verification = (u64, String, Result<Verdict, SdkError>);

/// Handle to a running scanner task
pub struct Scanner {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ScanOutcome>,
    task: JoinHandle<()>,
}

impl Scanner {
    /// Start an idle scanner. Cues are played through `cues` unless the
    /// settings turn sound off.
    pub fn spawn(
        verifier: Arc<dyn TokenVerifier>,
        cues: Arc<dyn CuePlayer>,
        settings: ScannerSettings,
    ) -> Self {
        let dispatcher = settings.sound_enabled.then(|| CueDispatcher::spawn(cues));
        let (state_tx, state_rx) = watch::channel(ScanOutcome::Idle);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let task = tokio::spawn(run_scanner(verifier, dispatcher, settings, cmd_rx, state_tx));

        Self {
            commands: cmd_tx,
            state: state_rx,
            task,
        }
    }

    /// Scan raw camera or manual-entry input
    pub async fn submit(&self, raw: impl Into<String>) -> Result<(), SdkError> {
        self.commands
            .send(Command::Submit(raw.into()))
            .await
            .map_err(|_| SdkError::ComponentStopped)
    }

    /// Clear the current outcome now
    pub async fn dismiss(&self) -> Result<(), SdkError> {
        self.commands
            .send(Command::Dismiss)
            .await
            .map_err(|_| SdkError::ComponentStopped)
    }

    pub fn outcome(&self) -> ScanOutcome {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanOutcome> {
        self.state.clone()
    }

    /// Stop the scanner, dropping any verification still in flight
    pub async fn unmount(self) {
        let Scanner { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!(error = %e, "scanner task ended abnormally");
        }
    }
}

async fn run_scanner(
    verifier: Arc<dyn TokenVerifier>,
    cues: Option<CueDispatcher>,
    settings: ScannerSettings,
    mut commands: mpsc::Receiver<Command>,
    state: watch::Sender<ScanOutcome>,
) {
    let mut scan: u64 = 0;
    let mut in_flight: JoinSet<Verification> = JoinSet::new();

    let revert = time::sleep(settings.display_window);
    tokio::pin!(revert);
    let mut revert_armed = false;

    loop {
        let outcome = tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };

                // whatever was on screen or in flight belongs to an older scan
                scan += 1;
                in_flight.abort_all();
                revert_armed = false;

                match command {
                    Command::Dismiss => Some(ScanOutcome::Idle),
                    Command::Submit(raw) => match QrPayload::parse(&raw) {
                        Ok(payload) => {
                            debug!(scan, format = %payload.format(), "verifying payload");
                            let verifier = Arc::clone(&verifier);
                            let current = scan;
                            in_flight.spawn(async move {
                                let profile = match &payload {
                                    QrPayload::Structured(structured) => {
                                        Some(structured.profile.as_str())
                                    }
                                    QrPayload::Legacy(_) => None,
                                };
                                let result = verifier
                                    .verify(payload.token(), profile, payload.format())
                                    .await;
                                (current, payload.profile().to_string(), result)
                            });
                            Some(ScanOutcome::Loading)
                        }
                        Err(e) => {
                            debug!(scan, error = %e, "payload rejected locally");
                            Some(ScanOutcome::Denied(DenyReason::InvalidFormat))
                        }
                    },
                }
            }
            Some(joined) = in_flight.join_next() => match joined {
                Ok((finished, identifier, result)) if finished == scan => {
                    Some(outcome_for(identifier, result))
                }
                Ok((finished, ..)) => {
                    debug!(scan = finished, "discarding stale verification");
                    None
                }
                Err(e) if e.is_cancelled() => None,
                Err(e) => {
                    warn!(error = %e, "verification task failed");
                    Some(ScanOutcome::Denied(DenyReason::Connection))
                }
            },
            () = &mut revert, if revert_armed => {
                revert_armed = false;
                Some(ScanOutcome::Idle)
            }
        };

        let Some(outcome) = outcome else { continue };

        if outcome.is_terminal() {
            log_outcome(scan, &outcome);
            revert
                .as_mut()
                .reset(Instant::now() + settings.display_window);
            revert_armed = true;
            if let Some(cues) = &cues {
                cues.dispatch(outcome.cue());
            }
        }

        state.send_if_modified(|current| {
            if *current != outcome {
                *current = outcome;
                true
            } else {
                false
            }
        });
    }

    in_flight.abort_all();
    debug!("scanner stopped");
}
