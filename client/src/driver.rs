use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use common::{LikeRequest, like_message};
use tokio::sync::{Notify, mpsc};

use crate::api::MarketApi;
use crate::clock::SystemClock;
use crate::reconciler::{Effect, LikeAction, LikeReconciler, Target};

/// Signs the canonical like messages on behalf of the user's wallet.
pub trait LikeSigner: Send + Sync {
    fn wallet_address(&self) -> String;
    /// Base58 ed25519 signature over `message`.
    fn sign(&self, message: &str) -> String;
}

/// UI-facing events produced while reconciling.
#[derive(Debug, Clone)]
pub enum UiEvent {
    CountDelta { target: Target, delta: i64 },
    Toast { message: String },
}

/// Async driver wiring the reconciler to real timers and the HTTP API.
/// `toggle` is what a like button calls; `run` must be spawned once in
/// the background.
pub struct LikeSession {
    reconciler: Arc<Mutex<LikeReconciler<SystemClock>>>,
    api: Arc<MarketApi>,
    signer: Arc<dyn LikeSigner>,
    events: mpsc::UnboundedSender<UiEvent>,
    wake: Arc<Notify>,
}

impl LikeSession {
    pub fn new(
        api: MarketApi,
        signer: Arc<dyn LikeSigner>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Arc::new(LikeSession {
            reconciler: Arc::new(Mutex::new(LikeReconciler::new(SystemClock))),
            api: Arc::new(api),
            signer,
            events,
            wake: Arc::new(Notify::new()),
        });
        (session, receiver)
    }

    pub fn seed_confirmed(&self, targets: impl IntoIterator<Item = Target>) {
        self.lock().seed_confirmed(targets);
    }

    pub fn is_liked(&self, target: &Target) -> bool {
        self.lock().is_liked(target)
    }

    pub fn has_pending(&self, target: &Target) -> bool {
        self.lock().has_pending(target)
    }

    pub fn toggle(&self, target: &Target) {
        let effects = self.lock().toggle(target);
        self.handle_effects(effects);
        self.wake.notify_one();
    }

    /// Drive the reconciler: sleep until its next deadline, then fire
    /// due sends and watchdog reverts. Runs until dropped.
    pub async fn run(self: Arc<Self>) {
        loop {
            let next_deadline = self.lock().next_deadline();
            match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
                    }
                }
                None => self.wake.notified().await,
            }

            let effects = self.lock().poll(Instant::now());
            self.handle_effects(effects);
        }
    }

    fn lock(&self) -> MutexGuard<'_, LikeReconciler<SystemClock>> {
        self.reconciler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { target, action } => self.spawn_send(target, action),
                other => forward_ui_effect(&self.events, other),
            }
        }
    }

    fn spawn_send(&self, target: Target, action: LikeAction) {
        let api = self.api.clone();
        let signer = self.signer.clone();
        let reconciler = self.reconciler.clone();
        let events = self.events.clone();
        let wake = self.wake.clone();

        tokio::spawn(async move {
            let message = like_message(action.as_str(), target.kind.as_str(), target.id);
            let request = LikeRequest {
                wallet_address: signer.wallet_address(),
                signature: signer.sign(&message),
                target_type: target.kind.as_str().to_string(),
                target_id: target.id,
                action: action.as_str().to_string(),
            };

            let result = api.toggle_like(&request).await;

            let mut guard = reconciler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match result {
                Ok(response) => {
                    if let Some(code) = &response.code {
                        // "already_liked" / "not_liked": the server is
                        // already in the intended state.
                        log::debug!("Like toggle for {:?} was a no-op: {}", target, code);
                    }
                    guard.on_success(&target);
                }
                Err(e) => {
                    log::warn!("Like request failed for {:?}: {}", target, e);
                    for effect in guard.on_failure(&target) {
                        forward_ui_effect(&events, effect);
                    }
                }
            }
            drop(guard);
            wake.notify_one();
        });
    }
}

fn forward_ui_effect(events: &mpsc::UnboundedSender<UiEvent>, effect: Effect) {
    let event = match effect {
        Effect::CountDelta { target, delta } => UiEvent::CountDelta { target, delta },
        Effect::Toast { message } => UiEvent::Toast { message },
        // Sends are handled by the session, never forwarded.
        Effect::Send { .. } => return,
    };
    // The receiver being gone just means no UI is listening.
    let _ = events.send(event);
}
