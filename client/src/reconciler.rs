//! Optimistic like/unlike reconciliation.
//!
//! The UI flips immediately; the network call is debounced so rapid
//! repeated clicks collapse into at most one request reflecting the
//! final intended state, and a watchdog reverts the flip if the server
//! never answers. The apparent state of a target is the XOR of the
//! server-confirmed set and the optimistic set.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Debounce for NFT likes. Short, NFT cards are tapped individually.
pub const DEBOUNCE_NFT: Duration = Duration::from_millis(75);
/// Debounce for collection likes.
pub const DEBOUNCE_COLLECTION: Duration = Duration::from_millis(300);
/// How long an optimistic flip may wait for the server before the UI
/// reverts.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Nft,
    Collection,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Nft => "nft",
            TargetKind::Collection => "collection",
        }
    }

    fn debounce(&self) -> Duration {
        match self {
            TargetKind::Nft => DEBOUNCE_NFT,
            TargetKind::Collection => DEBOUNCE_COLLECTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub kind: TargetKind,
    pub id: i64,
}

impl Target {
    pub fn nft(id: i64) -> Self {
        Target {
            kind: TargetKind::Nft,
            id,
        }
    }

    pub fn collection(id: i64) -> Self {
        Target {
            kind: TargetKind::Collection,
            id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeAction::Like => "like",
            LikeAction::Unlike => "unlike",
        }
    }

    fn delta(&self) -> i64 {
        match self {
            LikeAction::Like => 1,
            LikeAction::Unlike => -1,
        }
    }
}

/// What the caller must do after a state transition. The reconciler
/// itself performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Adjust derived like counters for immediate feedback.
    CountDelta { target: Target, delta: i64 },
    /// Issue the network call for the final intended action.
    Send { target: Target, action: LikeAction },
    /// Surface a warning to the user.
    Toast { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Debouncing,
    InFlight,
}

#[derive(Debug)]
struct Pending {
    phase: Phase,
    action: LikeAction,
    send_at: Instant,
    revert_at: Instant,
}

/// Per-target state machine: idle → debouncing → in-flight →
/// confirmed or reverted. Time only enters through [`Clock`] and
/// [`poll`](LikeReconciler::poll).
pub struct LikeReconciler<C: Clock> {
    clock: C,
    confirmed: HashSet<Target>,
    optimistic: HashSet<Target>,
    pending: HashMap<Target, Pending>,
}

impl<C: Clock> LikeReconciler<C> {
    pub fn new(clock: C) -> Self {
        LikeReconciler {
            clock,
            confirmed: HashSet::new(),
            optimistic: HashSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Load the server-confirmed likes, e.g. from an initial fetch.
    pub fn seed_confirmed(&mut self, targets: impl IntoIterator<Item = Target>) {
        self.confirmed.extend(targets);
    }

    /// Apparent state: confirmed XOR optimistic.
    pub fn is_liked(&self, target: &Target) -> bool {
        self.confirmed.contains(target) ^ self.optimistic.contains(target)
    }

    pub fn has_pending(&self, target: &Target) -> bool {
        self.pending.contains_key(target)
    }

    /// Flip the apparent state of `target`. Returns the effects of the
    /// flip; the network send comes later, from `poll`, once the
    /// debounce expires. Toggles on a target whose request is already
    /// in flight are ignored.
    pub fn toggle(&mut self, target: &Target) -> Vec<Effect> {
        if matches!(self.pending.get(target), Some(p) if p.phase == Phase::InFlight) {
            return Vec::new();
        }
        let now = self.clock.now();

        let action = if self.is_liked(target) {
            LikeAction::Unlike
        } else {
            LikeAction::Like
        };

        if !self.optimistic.remove(target) {
            self.optimistic.insert(target.clone());
        }

        let effects = vec![Effect::CountDelta {
            target: target.clone(),
            delta: action.delta(),
        }];

        if self.optimistic.contains(target) {
            // Apparent state now differs from the server's: (re)arm the
            // debounce. The watchdog keeps its original deadline across
            // re-toggles.
            let revert_at = match self.pending.get(target) {
                Some(entry) => entry.revert_at,
                None => now + WATCHDOG_TIMEOUT,
            };
            self.pending.insert(
                target.clone(),
                Pending {
                    phase: Phase::Debouncing,
                    action,
                    send_at: now + target.kind.debounce(),
                    revert_at,
                },
            );
        } else {
            // Net zero: the toggles cancelled out, nothing to send and
            // nothing left to revert.
            self.pending.remove(target);
        }

        effects
    }

    /// Advance the machine to `now`: fire due sends and expired
    /// watchdogs.
    pub fn poll(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        let targets: Vec<Target> = self.pending.keys().cloned().collect();

        for target in targets {
            let (watchdog_fired, send_due, action) = match self.pending.get(&target) {
                Some(entry) => (
                    now >= entry.revert_at,
                    entry.phase == Phase::Debouncing && now >= entry.send_at,
                    entry.action,
                ),
                None => continue,
            };

            if watchdog_fired {
                self.pending.remove(&target);
                effects.extend(self.revert(
                    &target,
                    action,
                    "The server did not respond in time.",
                ));
            } else if send_due {
                if let Some(entry) = self.pending.get_mut(&target) {
                    entry.phase = Phase::InFlight;
                }
                effects.push(Effect::Send {
                    target: target.clone(),
                    action,
                });
            }
        }

        effects
    }

    /// The server acknowledged the in-flight action (idempotent
    /// duplicate codes count as acknowledgement). Folds the optimistic
    /// flip into the confirmed set and clears the watchdog.
    pub fn on_success(&mut self, target: &Target) {
        let in_flight = matches!(self.pending.get(target), Some(p) if p.phase == Phase::InFlight);
        if !in_flight {
            // Stale response: the watchdog already reverted, or the
            // entry was cancelled.
            return;
        }
        let Some(entry) = self.pending.remove(target) else {
            return;
        };
        match entry.action {
            LikeAction::Like => {
                self.confirmed.insert(target.clone());
            }
            LikeAction::Unlike => {
                self.confirmed.remove(target);
            }
        }
        self.optimistic.remove(target);
    }

    /// The server rejected the in-flight action. Reverts the flip and
    /// surfaces a toast.
    pub fn on_failure(&mut self, target: &Target) -> Vec<Effect> {
        let in_flight = matches!(self.pending.get(target), Some(p) if p.phase == Phase::InFlight);
        if !in_flight {
            return Vec::new();
        }
        let Some(entry) = self.pending.remove(target) else {
            return Vec::new();
        };
        self.revert(target, entry.action, "Could not save your like.")
    }

    fn revert(&mut self, target: &Target, action: LikeAction, reason: &str) -> Vec<Effect> {
        self.optimistic.remove(target);
        vec![
            Effect::CountDelta {
                target: target.clone(),
                delta: -action.delta(),
            },
            Effect::Toast {
                message: format!("{reason} Your like was not saved."),
            },
        ]
    }

    /// Earliest instant at which `poll` has work to do, for the driver
    /// to sleep until.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|entry| match entry.phase {
                Phase::Debouncing => entry.send_at.min(entry.revert_at),
                Phase::InFlight => entry.revert_at,
            })
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn machine() -> (LikeReconciler<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (LikeReconciler::new(clock.clone()), clock)
    }

    fn sends(effects: &[Effect]) -> Vec<(Target, LikeAction)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send { target, action } => Some((target.clone(), *action)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn single_toggle_sends_once_after_debounce() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(1);

        let effects = fsm.toggle(&target);
        assert!(fsm.is_liked(&target));
        assert_eq!(
            effects,
            vec![Effect::CountDelta {
                target: target.clone(),
                delta: 1
            }]
        );

        // Nothing is sent before the debounce expires.
        assert!(fsm.poll(clock.now()).is_empty());

        clock.advance(DEBOUNCE_NFT);
        let effects = fsm.poll(clock.now());
        assert_eq!(sends(&effects), vec![(target.clone(), LikeAction::Like)]);

        // Polling again does not re-send.
        clock.advance(Duration::from_millis(10));
        assert!(fsm.poll(clock.now()).is_empty());

        fsm.on_success(&target);
        assert!(fsm.is_liked(&target));
        assert!(!fsm.has_pending(&target));
    }

    #[test]
    fn double_toggle_within_debounce_cancels_the_send() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(1);

        fsm.toggle(&target);
        clock.advance(Duration::from_millis(20));
        let effects = fsm.toggle(&target);

        // Back to the confirmed state: compensating count delta, no
        // pending work at all.
        assert_eq!(
            effects,
            vec![Effect::CountDelta {
                target: target.clone(),
                delta: -1
            }]
        );
        assert!(!fsm.is_liked(&target));
        assert!(!fsm.has_pending(&target));

        clock.advance(Duration::from_secs(10));
        assert!(fsm.poll(clock.now()).is_empty());
    }

    #[test]
    fn rapid_toggles_collapse_to_one_send_of_final_intent() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(1);

        fsm.toggle(&target); // like
        clock.advance(Duration::from_millis(10));
        fsm.toggle(&target); // cancel
        clock.advance(Duration::from_millis(10));
        fsm.toggle(&target); // like again
        assert!(fsm.is_liked(&target));

        clock.advance(DEBOUNCE_NFT);
        let effects = fsm.poll(clock.now());
        assert_eq!(sends(&effects), vec![(target, LikeAction::Like)]);
    }

    #[test]
    fn collection_debounce_is_longer_than_nft() {
        let (mut fsm, clock) = machine();
        let nft = Target::nft(1);
        let collection = Target::collection(2);

        fsm.toggle(&nft);
        fsm.toggle(&collection);

        clock.advance(DEBOUNCE_NFT);
        let effects = fsm.poll(clock.now());
        assert_eq!(sends(&effects), vec![(nft, LikeAction::Like)]);

        clock.advance(DEBOUNCE_COLLECTION - DEBOUNCE_NFT);
        let effects = fsm.poll(clock.now());
        assert_eq!(sends(&effects), vec![(collection, LikeAction::Like)]);
    }

    #[test]
    fn watchdog_reverts_when_server_never_answers() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(1);

        fsm.toggle(&target);
        clock.advance(DEBOUNCE_NFT);
        fsm.poll(clock.now());
        assert!(fsm.is_liked(&target));

        clock.advance(WATCHDOG_TIMEOUT);
        let effects = fsm.poll(clock.now());

        assert!(!fsm.is_liked(&target));
        assert!(!fsm.has_pending(&target));
        assert!(effects.contains(&Effect::CountDelta {
            target: target.clone(),
            delta: -1
        }));
        assert!(
            effects
                .iter()
                .any(|e| matches!(e, Effect::Toast { .. }))
        );

        // A response arriving after the revert is ignored.
        fsm.on_success(&target);
        assert!(!fsm.is_liked(&target));
    }

    #[test]
    fn toggle_is_ignored_while_request_is_in_flight() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(1);

        fsm.toggle(&target);
        clock.advance(DEBOUNCE_NFT);
        fsm.poll(clock.now());

        // In flight: further toggles are no-ops.
        assert!(fsm.toggle(&target).is_empty());
        assert!(fsm.is_liked(&target));

        fsm.on_success(&target);

        // After the confirmation the target is toggleable again.
        let effects = fsm.toggle(&target);
        assert!(!fsm.is_liked(&target));
        assert_eq!(
            effects,
            vec![Effect::CountDelta {
                target: target.clone(),
                delta: -1
            }]
        );
    }

    #[test]
    fn server_failure_reverts_the_flip() {
        let (mut fsm, clock) = machine();
        let target = Target::collection(9);

        fsm.toggle(&target);
        clock.advance(DEBOUNCE_COLLECTION);
        fsm.poll(clock.now());

        let effects = fsm.on_failure(&target);
        assert!(!fsm.is_liked(&target));
        assert!(effects.contains(&Effect::CountDelta {
            target: target.clone(),
            delta: -1
        }));
    }

    #[test]
    fn unlike_of_a_confirmed_like_round_trips() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(5);
        fsm.seed_confirmed([target.clone()]);
        assert!(fsm.is_liked(&target));

        let effects = fsm.toggle(&target);
        assert!(!fsm.is_liked(&target));
        assert_eq!(
            effects,
            vec![Effect::CountDelta {
                target: target.clone(),
                delta: -1
            }]
        );

        clock.advance(DEBOUNCE_NFT);
        let effects = fsm.poll(clock.now());
        assert_eq!(sends(&effects), vec![(target.clone(), LikeAction::Unlike)]);

        fsm.on_success(&target);
        assert!(!fsm.is_liked(&target));
        assert!(!fsm.has_pending(&target));
    }

    #[test]
    fn failed_unlike_restores_the_liked_state() {
        let (mut fsm, clock) = machine();
        let target = Target::nft(5);
        fsm.seed_confirmed([target.clone()]);

        fsm.toggle(&target);
        clock.advance(DEBOUNCE_NFT);
        fsm.poll(clock.now());

        let effects = fsm.on_failure(&target);
        assert!(fsm.is_liked(&target));
        // Compensates the earlier -1.
        assert!(effects.contains(&Effect::CountDelta {
            target: target.clone(),
            delta: 1
        }));
    }

    #[test]
    fn independent_targets_do_not_block_each_other() {
        let (mut fsm, clock) = machine();
        let first = Target::nft(1);
        let second = Target::nft(2);

        fsm.toggle(&first);
        clock.advance(DEBOUNCE_NFT);
        fsm.poll(clock.now()); // first is now in flight

        let effects = fsm.toggle(&second);
        assert!(!effects.is_empty());
        assert!(fsm.is_liked(&second));

        clock.advance(DEBOUNCE_NFT);
        let effects = fsm.poll(clock.now());
        assert_eq!(sends(&effects), vec![(second, LikeAction::Like)]);
    }

    #[test]
    fn next_deadline_tracks_the_earliest_pending_timer() {
        let (mut fsm, clock) = machine();
        assert!(fsm.next_deadline().is_none());

        let start = clock.now();
        fsm.toggle(&Target::collection(1));
        assert_eq!(fsm.next_deadline(), Some(start + DEBOUNCE_COLLECTION));

        fsm.toggle(&Target::nft(2));
        assert_eq!(fsm.next_deadline(), Some(start + DEBOUNCE_NFT));

        // Once in flight only the watchdog remains.
        clock.advance(DEBOUNCE_COLLECTION);
        fsm.poll(clock.now());
        assert_eq!(fsm.next_deadline(), Some(start + WATCHDOG_TIMEOUT));
    }
}
