//! Audio feedback for scan outcomes

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

/// Sound played when a scan settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Success,
    Failure,
}

/// Plays cues. Implementations may block; they run off the scanner task.
pub trait CuePlayer: Send + Sync + 'static {
    fn play(&self, cue: Cue);
}

/// Player that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&self, _cue: Cue) {}
}

const CUE_QUEUE_DEPTH: usize = 8;

/// Hands cues to a player on its own task so a slow player never holds up
/// a state transition. Cues that do not fit in the queue are dropped.
#[derive(Clone)]
pub(crate) struct CueDispatcher {
    tx: mpsc::Sender<Cue>,
}

impl CueDispatcher {
    pub(crate) fn spawn(player: Arc<dyn CuePlayer>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Cue>(CUE_QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(cue) = rx.recv().await {
                let player = Arc::clone(&player);
                if tokio::task::spawn_blocking(move || player.play(cue))
                    .await
                    .is_err()
                {
                    debug!(?cue, "cue player panicked");
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, cue: Cue) {
        if self.tx.try_send(cue).is_err() {
            debug!(?cue, "cue dropped");
        }
    }
}
