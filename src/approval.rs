//! Approval sessions: a one-shot rendezvous between the task that submitted
//! a match and the participant who must confirm it.
//!
//! Sessions live only in memory. Each one is a slot in a shared map holding
//! the expected responder's id and the sending half of a oneshot channel;
//! the submitting task holds the receiving half and waits on it under a
//! timeout. Resolution consumes the slot, so a session can reach exactly one
//! terminal outcome, and a process restart forgets every open session.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// Identifier of an approval session, unique within the process lifetime.
pub type ApprovalId = u64;

/// Decision delivered by the expected responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Confirm the submitted result.
    Approve,
    /// Reject the submitted result.
    Cancel,
}

/// Terminal outcome of an approval session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalOutcome {
    /// The expected responder approved within the window.
    Approved,
    /// The expected responder cancelled within the window.
    Cancelled,
    /// The window elapsed with no valid response.
    Expired,
}

/// Snapshot of an open approval session, for the gateway to announce.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct PendingApproval {
    approval_id: ApprovalId,
    submitter_id: String,
    winner_id: String,
    loser_id: String,
    winner_score: i32,
    loser_score: i32,
    responder_id: String,
    opened_at: NaiveDateTime,
}

/// Receiving half of one approval session, held by the submitting task.
#[derive(Debug)]
pub struct ApprovalHandle {
    approval_id: ApprovalId,
    rx: oneshot::Receiver<Decision>,
}

impl ApprovalHandle {
    /// Id of the session this handle waits on.
    pub fn approval_id(&self) -> ApprovalId {
        self.approval_id
    }
}

#[derive(Debug)]
struct Slot {
    responder_id: String,
    tx: oneshot::Sender<Decision>,
}

/// Error returned for a resolution that does not close a session.
///
/// Neither variant changes any state; gateways typically log and drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum ResolveError {
    /// The caller is not the expected responder. The session stays open.
    #[display("Resolution ignored: caller is not the expected responder")]
    WrongResponder,
    /// No open session with this id: it was already resolved, it expired,
    /// or it never existed. The three cases are indistinguishable because
    /// closed sessions are discarded.
    #[display("Resolution ignored: no open approval session")]
    AlreadyResolved,
}

/// Manages all open approval sessions.
#[derive(Debug, Clone)]
pub struct ApprovalCoordinator {
    next_id: Arc<AtomicU64>,
    slots: Arc<Mutex<HashMap<ApprovalId, Slot>>>,
}

impl ApprovalCoordinator {
    /// Creates a new coordinator with no open sessions.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating approval coordinator");
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Opens a session awaiting a decision from `responder_id`.
    ///
    /// Returns the announceable snapshot and the handle the submitting task
    /// passes to [`Self::await_resolution`].
    #[instrument(skip(self))]
    pub fn open(
        &self,
        submitter_id: &str,
        winner_id: &str,
        loser_id: &str,
        winner_score: i32,
        loser_score: i32,
        responder_id: &str,
    ) -> (PendingApproval, ApprovalHandle) {
        let approval_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut slots = self.slots.lock().unwrap();
        slots.insert(
            approval_id,
            Slot {
                responder_id: responder_id.to_string(),
                tx,
            },
        );
        drop(slots);

        info!(
            approval_id,
            submitter_id,
            responder_id,
            "Approval session opened"
        );

        let pending = PendingApproval {
            approval_id,
            submitter_id: submitter_id.to_string(),
            winner_id: winner_id.to_string(),
            loser_id: loser_id.to_string(),
            winner_score,
            loser_score,
            responder_id: responder_id.to_string(),
            opened_at: chrono::Utc::now().naive_utc(),
        };

        (pending, ApprovalHandle { approval_id, rx })
    }

    /// Delivers a responder's decision to the waiting submission task.
    ///
    /// A decision from anyone but the expected responder is ignored and
    /// leaves the session open. A valid decision consumes the session.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the resolution closes nothing.
    #[instrument(skip(self))]
    pub fn resolve(
        &self,
        approval_id: ApprovalId,
        responder_id: &str,
        decision: Decision,
    ) -> Result<(), ResolveError> {
        let mut slots = self.slots.lock().unwrap();

        let slot = match slots.entry(approval_id) {
            Entry::Vacant(_) => {
                debug!(approval_id, "No open session for resolution");
                return Err(ResolveError::AlreadyResolved);
            }
            Entry::Occupied(entry) => {
                if entry.get().responder_id != responder_id {
                    warn!(
                        approval_id,
                        responder_id,
                        expected = %entry.get().responder_id,
                        "Resolution from wrong responder ignored"
                    );
                    return Err(ResolveError::WrongResponder);
                }
                entry.remove()
            }
        };
        drop(slots);

        if slot.tx.send(decision).is_err() {
            debug!(approval_id, "Submission task gone before delivery");
            return Err(ResolveError::AlreadyResolved);
        }

        info!(approval_id, responder_id, decision = ?decision, "Approval session resolved");
        Ok(())
    }

    /// Waits for the session's decision, up to `window`.
    ///
    /// On elapse the session is discarded; a later resolution gets
    /// [`ResolveError::AlreadyResolved`] and a fresh submission is required.
    #[instrument(skip(self, handle), fields(approval_id = handle.approval_id))]
    pub async fn await_resolution(
        &self,
        handle: ApprovalHandle,
        window: Duration,
    ) -> ApprovalOutcome {
        let approval_id = handle.approval_id;

        match tokio::time::timeout(window, handle.rx).await {
            Ok(Ok(Decision::Approve)) => {
                info!(approval_id, "Session approved");
                ApprovalOutcome::Approved
            }
            Ok(Ok(Decision::Cancel)) => {
                info!(approval_id, "Session cancelled");
                ApprovalOutcome::Cancelled
            }
            Ok(Err(_)) => {
                // Sender dropped without a decision, so the coordinator
                // already discarded the slot. Same terminal state as elapse.
                warn!(approval_id, "Session abandoned");
                ApprovalOutcome::Expired
            }
            Err(_) => {
                let mut slots = self.slots.lock().unwrap();
                slots.remove(&approval_id);
                info!(approval_id, "Session expired");
                ApprovalOutcome::Expired
            }
        }
    }

    /// Checks whether a session is still open.
    #[instrument(skip(self))]
    pub fn is_pending(&self, approval_id: ApprovalId) -> bool {
        let slots = self.slots.lock().unwrap();
        slots.contains_key(&approval_id)
    }
}

impl Default for ApprovalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session(coordinator: &ApprovalCoordinator) -> (PendingApproval, ApprovalHandle) {
        coordinator.open("7001", "7001", "7002", 5, 3, "7002")
    }

    #[tokio::test]
    async fn test_approve_reaches_waiting_task() {
        let coordinator = ApprovalCoordinator::new();
        let (pending, handle) = open_session(&coordinator);

        coordinator
            .resolve(*pending.approval_id(), "7002", Decision::Approve)
            .expect("Resolve failed");

        let outcome = coordinator
            .await_resolution(handle, Duration::from_secs(5))
            .await;
        assert_eq!(outcome, ApprovalOutcome::Approved);
        assert!(!coordinator.is_pending(*pending.approval_id()));
    }

    #[tokio::test]
    async fn test_cancel_reaches_waiting_task() {
        let coordinator = ApprovalCoordinator::new();
        let (pending, handle) = open_session(&coordinator);

        coordinator
            .resolve(*pending.approval_id(), "7002", Decision::Cancel)
            .expect("Resolve failed");

        let outcome = coordinator
            .await_resolution(handle, Duration::from_secs(5))
            .await;
        assert_eq!(outcome, ApprovalOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_wrong_responder_leaves_session_open() {
        let coordinator = ApprovalCoordinator::new();
        let (pending, handle) = open_session(&coordinator);
        let id = *pending.approval_id();

        assert_eq!(
            coordinator.resolve(id, "7001", Decision::Approve),
            Err(ResolveError::WrongResponder)
        );
        assert!(coordinator.is_pending(id));

        coordinator
            .resolve(id, "7002", Decision::Approve)
            .expect("Resolve failed");
        let outcome = coordinator
            .await_resolution(handle, Duration::from_secs(5))
            .await;
        assert_eq!(outcome, ApprovalOutcome::Approved);
    }

    #[tokio::test]
    async fn test_second_resolution_rejected() {
        let coordinator = ApprovalCoordinator::new();
        let (pending, _handle) = open_session(&coordinator);
        let id = *pending.approval_id();

        coordinator
            .resolve(id, "7002", Decision::Approve)
            .expect("Resolve failed");
        assert_eq!(
            coordinator.resolve(id, "7002", Decision::Cancel),
            Err(ResolveError::AlreadyResolved)
        );
    }

    #[tokio::test]
    async fn test_window_elapse_expires_session() {
        let coordinator = ApprovalCoordinator::new();
        let (pending, handle) = open_session(&coordinator);
        let id = *pending.approval_id();

        let outcome = coordinator
            .await_resolution(handle, Duration::from_millis(10))
            .await;
        assert_eq!(outcome, ApprovalOutcome::Expired);
        assert!(!coordinator.is_pending(id));
        assert_eq!(
            coordinator.resolve(id, "7002", Decision::Approve),
            Err(ResolveError::AlreadyResolved)
        );
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let coordinator = ApprovalCoordinator::new();
        assert_eq!(
            coordinator.resolve(999, "7002", Decision::Approve),
            Err(ResolveError::AlreadyResolved)
        );
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let coordinator = ApprovalCoordinator::new();
        let (first, _h1) = open_session(&coordinator);
        let (second, _h2) = open_session(&coordinator);
        assert_ne!(first.approval_id(), second.approval_id());
    }
}
