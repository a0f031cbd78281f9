use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PrintError;
use crate::options::PrintJobOptions;
use crate::printers::Completion;
use crate::resolver::ResolvedLocation;

pub type SessionResult = Result<Completion, PrintError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionKind {
    Print,
    Pick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Resolving,
    Presenting,
}

/// The single in-flight pick or print interaction.
#[derive(Debug)]
pub struct PrintSession {
    pub id: Uuid,
    pub kind: SessionKind,
    pub callback_id: String,
    pub created_at: String,
    pub options: PrintJobOptions,
    pub location: Option<ResolvedLocation>,
    state: SessionState,
    responder: oneshot::Sender<SessionResult>,
}

/// Read-only view of the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub kind: SessionKind,
    pub state: SessionState,
    pub callback_id: String,
    pub created_at: String,
}

/// Holds at most one [`PrintSession`].
///
/// Removing the session from the slot and sending its response happen under
/// the same lock, and only the caller that removed it can respond.
#[derive(Debug, Default)]
pub struct SessionSlot {
    active: Mutex<Option<PrintSession>>,
}

impl SessionSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the slot, or fails with `SessionBusy` leaving the open session untouched.
    pub fn open(
        self: &Arc<Self>,
        kind: SessionKind,
        callback_id: &str,
        options: PrintJobOptions,
    ) -> Result<(CompletionDelegate, SessionTicket), PrintError> {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            warn!(
                "Rejecting {:?} request {}: session {} is still open",
                kind, callback_id, current.id
            );
            return Err(PrintError::SessionBusy);
        }

        let (responder, receiver) = oneshot::channel();
        let id = Uuid::new_v4();
        let state = match kind {
            SessionKind::Print => SessionState::Resolving,
            SessionKind::Pick => SessionState::Presenting,
        };

        *active = Some(PrintSession {
            id,
            kind,
            callback_id: callback_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            options,
            location: None,
            state,
            responder,
        });
        info!("Opened {:?} session {} for callback {}", kind, id, callback_id);

        let delegate = CompletionDelegate {
            session_id: id,
            slot: Arc::clone(self),
        };
        let ticket = SessionTicket {
            id,
            slot: Arc::clone(self),
            receiver,
        };
        Ok((delegate, ticket))
    }

    /// Moves a resolved session to `Presenting`. False if it was closed meanwhile.
    pub fn mark_presenting(&self, id: Uuid, location: Option<ResolvedLocation>) -> bool {
        let mut active = self.active.lock();
        match active.as_mut() {
            Some(session) if session.id == id => {
                session.state = SessionState::Presenting;
                session.location = location;
                true
            }
            _ => false,
        }
    }

    /// Tears down session `id` and delivers its response. No-op for any other id.
    pub fn close(&self, id: Uuid, result: SessionResult) -> bool {
        let mut active = self.active.lock();
        if !matches!(active.as_ref(), Some(session) if session.id == id) {
            return false;
        }
        let Some(session) = active.take() else {
            return false;
        };

        match &result {
            Ok(completion) => info!(
                "Closing {:?} session {} ({})",
                session.kind,
                session.id,
                completion.label()
            ),
            Err(e) => warn!("Closing {:?} session {} with error: {}", session.kind, session.id, e),
        }
        if session.responder.send(result).is_err() {
            warn!("Caller of session {} is gone, response dropped", id);
        }
        true
    }

    /// Host teardown: closes whatever session is open as cancelled.
    pub fn release(&self) -> Option<Uuid> {
        let id = self.active.lock().as_ref().map(|s| s.id)?;
        self.close(id, Ok(Completion::Cancelled)).then_some(id)
    }

    pub fn state(&self) -> SessionState {
        self.active
            .lock()
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn snapshot(&self) -> Option<SessionInfo> {
        self.active.lock().as_ref().map(|s| SessionInfo {
            id: s.id,
            kind: s.kind,
            state: s.state,
            callback_id: s.callback_id.clone(),
            created_at: s.created_at.clone(),
        })
    }
}

/// Handle given to the print UI to report the outcome of one session.
///
/// Cloning is allowed; only the first signal for the session is delivered.
#[derive(Debug, Clone)]
pub struct CompletionDelegate {
    session_id: Uuid,
    slot: Arc<SessionSlot>,
}

impl CompletionDelegate {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns false when the session was already closed and the signal ignored.
    pub fn finish(&self, completion: Completion) -> bool {
        let label = completion.label();
        let accepted = self.slot.close(self.session_id, Ok(completion));
        if !accepted {
            warn!(
                "Ignoring {} signal for closed print session {}",
                label, self.session_id
            );
        }
        accepted
    }
}

/// The requesting side of a session. Dropping it releases the session.
#[derive(Debug)]
pub struct SessionTicket {
    id: Uuid,
    slot: Arc<SessionSlot>,
    receiver: oneshot::Receiver<SessionResult>,
}

impl SessionTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn outcome(mut self) -> SessionResult {
        match (&mut self.receiver).await {
            Ok(result) => result,
            Err(_) => Err(PrintError::PrintSubsystem(
                "print session ended without a response".to_string(),
            )),
        }
    }
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        if self.slot.close(self.id, Ok(Completion::Cancelled)) {
            warn!("Released print session {} abandoned by its caller", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(slot: &Arc<SessionSlot>, callback_id: &str) -> (CompletionDelegate, SessionTicket) {
        slot.open(SessionKind::Print, callback_id, PrintJobOptions::default())
            .expect("slot is free")
    }

    #[test]
    fn test_second_open_is_busy() {
        let slot = SessionSlot::new();
        let (_delegate, ticket) = open(&slot, "cb-1");

        let second = slot.open(SessionKind::Pick, "cb-2", PrintJobOptions::default());
        assert!(matches!(second, Err(PrintError::SessionBusy)));

        let info = slot.snapshot().expect("first session still open");
        assert_eq!(info.id, ticket.id());
        assert_eq!(info.callback_id, "cb-1");
        assert_eq!(info.state, SessionState::Resolving);
    }

    #[tokio::test]
    async fn test_only_first_signal_is_delivered() {
        let slot = SessionSlot::new();
        let (delegate, ticket) = open(&slot, "cb-1");
        let duplicate = delegate.clone();

        assert!(delegate.finish(Completion::Completed { printer_id: None }));
        assert!(!duplicate.finish(Completion::Failed("late".to_string())));
        assert_eq!(slot.state(), SessionState::Idle);

        assert_eq!(
            ticket.outcome().await,
            Ok(Completion::Completed { printer_id: None })
        );
    }

    #[tokio::test]
    async fn test_late_signal_does_not_touch_new_session() {
        let slot = SessionSlot::new();
        let (old_delegate, old_ticket) = open(&slot, "cb-1");
        assert!(old_delegate.finish(Completion::Cancelled));
        assert_eq!(old_ticket.outcome().await, Ok(Completion::Cancelled));

        let (_delegate, ticket) = open(&slot, "cb-2");
        assert!(!old_delegate.finish(Completion::Completed { printer_id: None }));
        assert_eq!(slot.snapshot().map(|s| s.id), Some(ticket.id()));
    }

    #[tokio::test]
    async fn test_release_cancels_open_session() {
        let slot = SessionSlot::new();
        let (delegate, ticket) = open(&slot, "cb-1");
        assert!(slot.mark_presenting(ticket.id(), None));
        assert_eq!(slot.state(), SessionState::Presenting);

        assert_eq!(slot.release(), Some(ticket.id()));
        assert!(!delegate.finish(Completion::Cancelled));
        assert_eq!(ticket.outcome().await, Ok(Completion::Cancelled));
        assert_eq!(slot.release(), None);
    }

    #[test]
    fn test_dropped_ticket_frees_slot() {
        let slot = SessionSlot::new();
        let (delegate, ticket) = open(&slot, "cb-1");
        drop(ticket);

        assert_eq!(slot.state(), SessionState::Idle);
        assert!(!delegate.finish(Completion::Completed { printer_id: None }));
        assert!(!slot.mark_presenting(delegate.session_id(), None));
    }
}
