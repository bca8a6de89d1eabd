//! Token rotation behind the wallet's QR screen.
//!
//! A [`Presenter`] owns one countdown timer and the issuer requests it has in
//! flight. Rotation is time-driven: when the countdown of the displayed pass
//! reaches zero a new pass is requested, and the countdown restarts only once
//! that pass is on screen. Every request carries a generation number and only
//! the answer to the most recent request is ever applied.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use ghostpass_config::PresenterSettings;
use ghostpass_token::{IssuedToken, PermissionSet, QrPayload, StructuredPayload, SubjectId};

use crate::error::SdkError;
use crate::issuer::TokenIssuer;

/// Banner shown while the issuer cannot be reached
pub const ISSUE_FAILED_BANNER: &str = "Couldn't refresh your pass. Retrying.";

/// Shortest countdown step the timer runs at
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterPhase {
    /// Nobody is signed in; the issuer is never called
    AuthRequired,
    /// First pass requested, nothing to show yet
    Initializing,
    Active,
    /// A new pass has been requested
    Refreshing,
    /// Last request failed; a retry follows on the next tick
    Error,
}

/// A pass as rendered on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedPass {
    pub token: IssuedToken,
    /// Encoded QR payload: token reference and profile pointer only
    pub qr_payload: String,
}

/// Everything the QR screen renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenterView {
    pub phase: PresenterPhase,
    pub pass: Option<DisplayedPass>,
    pub time_left: Duration,
    pub banner: Option<&'static str>,
    pub permissions: PermissionSet,
}

impl PresenterView {
    /// Countdown in whole seconds, rounded up
    pub fn seconds_left(&self) -> u64 {
        let millis = self.time_left.as_millis() as u64;
        millis.div_ceil(1000)
    }

    /// Opaque value of the displayed pass
    pub fn token(&self) -> Option<&str> {
        self.pass.as_ref().map(|pass| pass.token.token.as_str())
    }
}

#[derive(Debug)]
struct IssueRequest {
    generation: u64,
    subject: SubjectId,
    permissions: PermissionSet,
}

#[derive(Debug, PartialEq, Eq)]
enum Applied {
    Stale,
    Token,
    Failed,
}

struct PresenterMachine {
    settings: PresenterSettings,
    subject: Option<SubjectId>,
    generation: u64,
    awaiting: Option<u64>,
    view: PresenterView,
}

impl PresenterMachine {
    fn new(
        subject: Option<SubjectId>,
        permissions: PermissionSet,
        settings: PresenterSettings,
    ) -> Self {
        let phase = if subject.is_some() {
            PresenterPhase::Initializing
        } else {
            PresenterPhase::AuthRequired
        };

        Self {
            settings,
            subject,
            generation: 0,
            awaiting: None,
            view: PresenterView {
                phase,
                pass: None,
                time_left: Duration::ZERO,
                banner: None,
                permissions,
            },
        }
    }

    fn view(&self) -> &PresenterView {
        &self.view
    }

    fn request(&mut self) -> Option<IssueRequest> {
        let subject = self.subject.clone()?;

        self.generation += 1;
        self.awaiting = Some(self.generation);
        if self.view.phase != PresenterPhase::Initializing {
            self.view.phase = PresenterPhase::Refreshing;
        }

        Some(IssueRequest {
            generation: self.generation,
            subject,
            permissions: self.view.permissions.clone(),
        })
    }

    fn mount(&mut self) -> Option<IssueRequest> {
        if self.subject.is_none() {
            self.view.phase = PresenterPhase::AuthRequired;
            return None;
        }
        self.view.phase = PresenterPhase::Initializing;
        self.request()
    }

    fn tick(&mut self) -> Option<IssueRequest> {
        if matches!(
            self.view.phase,
            PresenterPhase::AuthRequired | PresenterPhase::Initializing
        ) {
            return None;
        }

        if self.view.pass.is_some() {
            self.view.time_left = self.view.time_left.saturating_sub(self.settings.tick_interval);
            if self.view.time_left.is_zero() {
                // a lapsed pass is never left on screen
                self.view.pass = None;
                self.view.phase = PresenterPhase::Refreshing;
            } else if self.view.phase != PresenterPhase::Error {
                return None;
            }
        }

        if self.awaiting.is_none() {
            self.request()
        } else {
            None
        }
    }

    fn refresh_now(&mut self) -> Option<IssueRequest> {
        self.request()
    }

    fn toggle_permission(&mut self, name: &str) -> Option<IssueRequest> {
        let enabled = self.view.permissions.toggle(name);
        debug!(permission = name, enabled, "permission toggled");
        self.request()
    }

    fn set_subject(&mut self, subject: Option<SubjectId>) -> Option<IssueRequest> {
        self.awaiting = None;
        self.view.pass = None;
        self.view.time_left = Duration::ZERO;
        self.view.banner = None;
        self.subject = subject;

        if self.subject.is_none() {
            self.view.phase = PresenterPhase::AuthRequired;
            return None;
        }
        self.view.phase = PresenterPhase::Initializing;
        self.request()
    }

    fn apply(&mut self, generation: u64, result: Result<IssuedToken, SdkError>) -> Applied {
        if self.awaiting != Some(generation) {
            debug!(generation, "discarding stale issuer response");
            return Applied::Stale;
        }
        self.awaiting = None;

        let result = result.and_then(|token| {
            let profile = self.subject.as_ref().map(SubjectId::as_str).unwrap_or_default();
            let payload = QrPayload::Structured(StructuredPayload::new(
                token.token.clone(),
                profile,
                token.expires_at,
            ))
            .encode()?;
            Ok(DisplayedPass {
                token,
                qr_payload: payload,
            })
        });

        match result {
            Ok(pass) => {
                info!(generation, expires_at = pass.token.expires_at, "pass rotated");
                self.view.pass = Some(pass);
                self.view.time_left = self.settings.token_ttl;
                self.view.phase = PresenterPhase::Active;
                self.view.banner = None;
                Applied::Token
            }
            Err(e) if e.is_unauthorized() => {
                info!("issuer refused the session, sign-in required");
                self.subject = None;
                self.view.pass = None;
                self.view.time_left = Duration::ZERO;
                self.view.phase = PresenterPhase::AuthRequired;
                self.view.banner = None;
                Applied::Failed
            }
            Err(e) => {
                warn!(error = %e, generation, "issuer request failed");
                self.fail();
                Applied::Failed
            }
        }
    }

    /// The in-flight request vanished without an answer
    fn request_lost(&mut self) {
        if self.awaiting.take().is_some() {
            self.fail();
        }
    }

    fn fail(&mut self) {
        self.view.phase = PresenterPhase::Error;
        self.view.banner = Some(ISSUE_FAILED_BANNER);
        if self.view.time_left.is_zero() {
            self.view.pass = None;
        }
    }
}

enum Command {
    Mount,
    RefreshNow,
    TogglePermission(String),
    SetSubject(Option<SubjectId>),
}

/// Handle to a running presenter task.
///
/// Dropping the handle, or calling [`Presenter::unmount`], stops the timer
/// and aborts every in-flight issuer request.
pub struct Presenter {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PresenterView>,
    task: JoinHandle<()>,
}

impl Presenter {
    /// Start a presenter. Nothing is requested until [`Presenter::mount`].
    pub fn spawn(
        issuer: Arc<dyn TokenIssuer>,
        subject: Option<SubjectId>,
        permissions: PermissionSet,
        mut settings: PresenterSettings,
    ) -> Self {
        settings.tick_interval = settings.tick_interval.max(MIN_TICK_INTERVAL);
        let machine = PresenterMachine::new(subject, permissions, settings);
        let (state_tx, state_rx) = watch::channel(machine.view().clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let task = tokio::spawn(run_presenter(machine, issuer, cmd_rx, state_tx));

        Self {
            commands: cmd_tx,
            state: state_rx,
            task,
        }
    }

    async fn send(&self, command: Command) -> Result<(), SdkError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SdkError::ComponentStopped)
    }

    /// Request the first pass for the signed-in subject
    pub async fn mount(&self) -> Result<(), SdkError> {
        self.send(Command::Mount).await
    }

    pub async fn refresh_now(&self) -> Result<(), SdkError> {
        self.send(Command::RefreshNow).await
    }

    /// Flip a capability and request a pass that reflects it
    pub async fn toggle_permission(&self, name: impl Into<String>) -> Result<(), SdkError> {
        self.send(Command::TogglePermission(name.into())).await
    }

    /// Sign in (`Some`) or out (`None`)
    pub async fn set_subject(&self, subject: Option<SubjectId>) -> Result<(), SdkError> {
        self.send(Command::SetSubject(subject)).await
    }

    /// Current view
    pub fn view(&self) -> PresenterView {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published view
    pub fn subscribe(&self) -> watch::Receiver<PresenterView> {
        self.state.clone()
    }

    /// Stop the timer, abort in-flight requests and wait for the task to end
    pub async fn unmount(self) {
        let Presenter { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!(error = %e, "presenter task ended abnormally");
        }
    }
}

async fn run_presenter(
    mut machine: PresenterMachine,
    issuer: Arc<dyn TokenIssuer>,
    mut commands: mpsc::Receiver<Command>,
    state: watch::Sender<PresenterView>,
) {
    let period = machine.settings.tick_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: JoinSet<(u64, Result<IssuedToken, SdkError>)> = JoinSet::new();

    loop {
        let request = tokio::select! {
            command = commands.recv() => match command {
                None => break,
                Some(Command::Mount) => machine.mount(),
                Some(Command::RefreshNow) => machine.refresh_now(),
                Some(Command::TogglePermission(name)) => machine.toggle_permission(&name),
                Some(Command::SetSubject(subject)) => {
                    in_flight.abort_all();
                    machine.set_subject(subject)
                }
            },
            _ = ticker.tick() => machine.tick(),
            Some(joined) = in_flight.join_next() => {
                match joined {
                    Ok((generation, result)) => {
                        if machine.apply(generation, result) == Applied::Token {
                            ticker.reset();
                        }
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        warn!(error = %e, "issuer task failed");
                        machine.request_lost();
                    }
                }
                None
            }
        };

        if let Some(request) = request {
            debug!(generation = request.generation, "requesting pass");
            let issuer = Arc::clone(&issuer);
            in_flight.spawn(async move {
                let result = issuer.issue(&request.subject, &request.permissions).await;
                (request.generation, result)
            });
        }

        state.send_if_modified(|view| {
            if view != machine.view() {
                *view = machine.view().clone();
                true
            } else {
                false
            }
        });
    }

    in_flight.abort_all();
    debug!("presenter stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ghostpass_api::ApiError;
    use ghostpass_token::{HEALTH, IDENTITY};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Outcome {
        Ok,
        Fail,
        Unauthorized,
    }

    /// Issuer that answers call `n` with token `T{n}`, following a script of
    /// delays and outcomes; calls past the script succeed immediately.
    #[derive(Default)]
    struct ScriptedIssuer {
        script: Mutex<VecDeque<(Duration, Outcome)>>,
        calls: Mutex<Vec<PermissionSet>>,
    }

    impl ScriptedIssuer {
        fn with_script(steps: &[(u64, Outcome)]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(
                    steps
                        .iter()
                        .map(|(ms, outcome)| (Duration::from_millis(*ms), *outcome))
                        .collect(),
                ),
                calls: Mutex::default(),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TokenIssuer for ScriptedIssuer {
        async fn issue(
            &self,
            _subject: &SubjectId,
            permissions: &PermissionSet,
        ) -> Result<IssuedToken, SdkError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(permissions.clone());
                calls.len()
            };
            let (delay, outcome) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((Duration::ZERO, Outcome::Ok));

            time::sleep(delay).await;
            match outcome {
                Outcome::Ok => Ok(IssuedToken {
                    token: format!("T{n}"),
                    expires_at: 1_000 + n as i64 * 30,
                    issued_at: None,
                }),
                Outcome::Fail => Err(ApiError::InvalidResponse("HTTP error: 503".into()).into()),
                Outcome::Unauthorized => Err(ApiError::Unauthorized("401".into()).into()),
            }
        }
    }

    fn spawn(issuer: Arc<ScriptedIssuer>, subject: Option<&str>) -> Presenter {
        Presenter::spawn(
            issuer,
            subject.map(SubjectId::from),
            PermissionSet::wallet_defaults(),
            PresenterSettings::default(),
        )
    }

    async fn wait_for_token(presenter: &Presenter, token: &str) -> PresenterView {
        let mut rx = presenter.subscribe();
        let view = rx
            .wait_for(|view| view.token() == Some(token))
            .await
            .expect("presenter running")
            .clone();
        view
    }

    #[tokio::test(start_paused = true)]
    async fn rotates_when_countdown_elapses() {
        let issuer = ScriptedIssuer::with_script(&[]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();

        let first = wait_for_token(&presenter, "T1").await;
        assert_eq!(first.phase, PresenterPhase::Active);
        assert_eq!(first.seconds_left(), 30);
        let shown_at = Instant::now();

        let second = wait_for_token(&presenter, "T2").await;
        assert_eq!(shown_at.elapsed(), Duration::from_secs(30));
        assert_eq!(second.phase, PresenterPhase::Active);
        assert_eq!(second.seconds_left(), 30);
        assert_eq!(issuer.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tick_interval_is_clamped() {
        let issuer = ScriptedIssuer::with_script(&[]);
        let presenter = Presenter::spawn(
            issuer.clone(),
            Some(SubjectId::from("wallet-ada")),
            PermissionSet::wallet_defaults(),
            PresenterSettings {
                tick_interval: Duration::ZERO,
                ..PresenterSettings::default()
            },
        );
        presenter.mount().await.unwrap();

        let view = wait_for_token(&presenter, "T1").await;
        assert_eq!(view.phase, PresenterPhase::Active);
        assert!(issuer.call_count() >= 1);

        // the task is still alive and answers commands
        presenter.refresh_now().await.unwrap();
        presenter.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn qr_payload_carries_no_permissions() {
        let issuer = ScriptedIssuer::with_script(&[]);
        let presenter = spawn(issuer, Some("wallet-ada"));
        presenter.mount().await.unwrap();

        let view = wait_for_token(&presenter, "T1").await;
        let payload = view.pass.unwrap().qr_payload;
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["exp", "profile", "token", "v"]);
        assert!(!payload.contains(IDENTITY));
        assert!(!payload.contains(HEALTH));
    }

    #[tokio::test(start_paused = true)]
    async fn latest_refresh_wins() {
        // mount answers at once, the first manual refresh is slow and the
        // second is fast
        let issuer = ScriptedIssuer::with_script(&[
            (0, Outcome::Ok),
            (3_000, Outcome::Ok),
            (1_000, Outcome::Ok),
        ]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        wait_for_token(&presenter, "T1").await;

        presenter.refresh_now().await.unwrap();
        presenter.refresh_now().await.unwrap();

        let mut rx = presenter.subscribe();
        let collector = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                if let Some(token) = rx.borrow_and_update().token() {
                    seen.push(token.to_string());
                }
            }
            seen
        });

        wait_for_token(&presenter, "T3").await;
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(presenter.view().token(), Some("T3"));
        assert_eq!(issuer.call_count(), 3);

        presenter.unmount().await;
        let seen = collector.await.unwrap();
        assert!(!seen.contains(&"T2".to_string()), "stale token shown: {seen:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_in_flight_when_countdown_hits_zero() {
        let issuer = ScriptedIssuer::with_script(&[(0, Outcome::Ok), (2_000, Outcome::Ok)]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        wait_for_token(&presenter, "T1").await;

        let mut rx = presenter.subscribe();
        let view = rx
            .wait_for(|view| view.phase == PresenterPhase::Refreshing)
            .await
            .unwrap()
            .clone();
        assert_eq!(view.time_left, Duration::ZERO);
        assert_eq!(view.pass, None);

        let view = wait_for_token(&presenter, "T2").await;
        assert_eq!(view.seconds_left(), 30);
        assert_eq!(issuer.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_last_pass_and_retries_next_tick() {
        let issuer = ScriptedIssuer::with_script(&[(0, Outcome::Ok), (0, Outcome::Fail)]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        wait_for_token(&presenter, "T1").await;

        presenter.refresh_now().await.unwrap();
        let mut rx = presenter.subscribe();
        let view = rx
            .wait_for(|view| view.phase == PresenterPhase::Error)
            .await
            .unwrap()
            .clone();
        assert_eq!(view.banner, Some(ISSUE_FAILED_BANNER));
        assert_eq!(view.token(), Some("T1"));

        let view = wait_for_token(&presenter, "T3").await;
        assert_eq!(view.phase, PresenterPhase::Active);
        assert_eq!(view.banner, None);
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_presenter_never_calls_issuer() {
        let issuer = ScriptedIssuer::with_script(&[]);
        let presenter = spawn(issuer.clone(), None);
        presenter.mount().await.unwrap();
        presenter.refresh_now().await.unwrap();
        presenter.toggle_permission(HEALTH).await.unwrap();

        time::sleep(Duration::from_secs(60)).await;
        let view = presenter.view();
        assert_eq!(view.phase, PresenterPhase::AuthRequired);
        assert!(view.permissions.is_enabled(HEALTH));
        assert_eq!(issuer.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_session_requires_sign_in() {
        let issuer = ScriptedIssuer::with_script(&[(0, Outcome::Ok), (0, Outcome::Unauthorized)]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        wait_for_token(&presenter, "T1").await;

        presenter.refresh_now().await.unwrap();
        let mut rx = presenter.subscribe();
        rx.wait_for(|view| view.phase == PresenterPhase::AuthRequired)
            .await
            .unwrap();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(issuer.call_count(), 2);

        presenter
            .set_subject(Some(SubjectId::new("wallet-ada")))
            .await
            .unwrap();
        wait_for_token(&presenter, "T3").await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_requests_pass_with_new_permissions() {
        let issuer = ScriptedIssuer::with_script(&[]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        wait_for_token(&presenter, "T1").await;

        presenter.toggle_permission(HEALTH).await.unwrap();
        let view = wait_for_token(&presenter, "T2").await;
        assert!(view.permissions.is_enabled(HEALTH));

        let calls = issuer.calls.lock().unwrap();
        assert!(!calls[0].is_enabled(HEALTH));
        assert!(calls[1].is_enabled(HEALTH));
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_discards_in_flight_request() {
        let issuer = ScriptedIssuer::with_script(&[(0, Outcome::Ok), (5_000, Outcome::Ok)]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        wait_for_token(&presenter, "T1").await;

        presenter.refresh_now().await.unwrap();
        presenter.set_subject(None).await.unwrap();

        time::sleep(Duration::from_secs(10)).await;
        let view = presenter.view();
        assert_eq!(view.phase, PresenterPhase::AuthRequired);
        assert_eq!(view.pass, None);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_stops_everything() {
        let issuer = ScriptedIssuer::with_script(&[(5_000, Outcome::Ok)]);
        let presenter = spawn(issuer.clone(), Some("wallet-ada"));
        presenter.mount().await.unwrap();
        let mut rx = presenter.subscribe();

        time::sleep(Duration::from_secs(1)).await;
        presenter.unmount().await;

        assert!(rx.changed().await.is_err());
        assert_eq!(rx.borrow().phase, PresenterPhase::Initializing);
        assert_eq!(issuer.call_count(), 1);
    }

    #[test]
    fn manual_ticks_count_down_without_going_negative() {
        let mut machine = PresenterMachine::new(
            Some(SubjectId::new("wallet-ada")),
            PermissionSet::wallet_defaults(),
            PresenterSettings {
                token_ttl: Duration::from_secs(3),
                tick_interval: Duration::from_secs(1),
            },
        );
        let request = machine.mount().unwrap();
        let token = IssuedToken {
            token: "T1".into(),
            expires_at: 3,
            issued_at: None,
        };
        assert_eq!(machine.apply(request.generation, Ok(token)), Applied::Token);

        assert!(machine.tick().is_none());
        assert!(machine.tick().is_none());
        assert_eq!(machine.view().seconds_left(), 1);

        let refresh = machine.tick().expect("refresh requested at zero");
        assert_eq!(machine.view().time_left, Duration::ZERO);
        assert_eq!(machine.view().pass, None);

        // ticks while waiting neither underflow nor re-request
        assert!(machine.tick().is_none());
        assert_eq!(machine.view().time_left, Duration::ZERO);

        let late = Err(SdkError::Generic("late".into()));
        assert_eq!(machine.apply(refresh.generation - 1, late), Applied::Stale);
    }
}
