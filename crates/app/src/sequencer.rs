//! Per-group sequencing of inbound messages.
//!
//! Each group gets one worker task with a bounded mailbox. Messages of a
//! group are dispatched one at a time in arrival order, while different
//! groups proceed concurrently. The worker owns the group's
//! [`ConversationSession`], so sessions never leak across groups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use hassbridge_domain::id::GroupId;
use hassbridge_domain::message::InboundMessage;

use crate::dispatcher::{ConversationSession, Dispatch, DispatchOutcome};

/// Queued messages per group before new ones are rejected.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("mailbox of group {group_id} is full")]
    MailboxFull { group_id: GroupId },
    #[error("worker of group {group_id} stopped before answering")]
    Stopped { group_id: GroupId },
}

struct Job {
    message: InboundMessage,
    respond_to: Option<oneshot::Sender<DispatchOutcome>>,
}

/// Routes messages to per-group workers, spawning them on first use.
pub struct Sequencer<D> {
    dispatcher: Arc<D>,
    capacity: usize,
    mailboxes: Mutex<HashMap<GroupId, mpsc::Sender<Job>>>,
}

impl<D: Dispatch> Sequencer<D> {
    #[must_use]
    pub fn new(dispatcher: D) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            capacity: DEFAULT_MAILBOX_CAPACITY,
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Number of groups with a live worker.
    #[must_use]
    pub fn active_groups(&self) -> usize {
        self.lock()
            .values()
            .filter(|mailbox| !mailbox.is_closed())
            .count()
    }

    /// Queue a message without waiting for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::MailboxFull`] when the group is backed up;
    /// the message is dropped.
    pub fn submit(&self, message: InboundMessage) -> Result<(), SequencerError> {
        self.enqueue(Job {
            message,
            respond_to: None,
        })
    }

    /// Queue a message and wait until its group worker has dispatched it.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::MailboxFull`] when the group is backed up
    /// - [`SequencerError::Stopped`] when the worker died before answering
    pub async fn dispatch(&self, message: InboundMessage) -> Result<DispatchOutcome, SequencerError> {
        let group_id = message.group_id.clone();
        let (respond_to, outcome) = oneshot::channel();
        self.enqueue(Job {
            message,
            respond_to: Some(respond_to),
        })?;
        outcome
            .await
            .map_err(|_| SequencerError::Stopped { group_id })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<GroupId, mpsc::Sender<Job>>> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, job: Job) -> Result<(), SequencerError> {
        let group_id = job.message.group_id.clone();
        let mut mailboxes = self.lock();
        let mailbox = mailboxes
            .entry(group_id.clone())
            .or_insert_with(|| self.spawn(&group_id));

        let job = match mailbox.try_send(job) {
            Ok(()) => return Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%group_id, capacity = self.capacity, "group mailbox full, dropping message");
                return Err(SequencerError::MailboxFull { group_id });
            }
            Err(mpsc::error::TrySendError::Closed(job)) => job,
        };

        tracing::warn!(%group_id, "group worker stopped, restarting");
        let fresh = self.spawn(&group_id);
        let result = fresh
            .try_send(job)
            .map_err(|_| SequencerError::Stopped {
                group_id: group_id.clone(),
            });
        mailboxes.insert(group_id, fresh);
        result
    }

    fn spawn(&self, group_id: &GroupId) -> mpsc::Sender<Job> {
        let (sender, inbox) = mpsc::channel(self.capacity);
        tracing::debug!(%group_id, "starting group worker");
        tokio::spawn(run_group(
            Arc::clone(&self.dispatcher),
            group_id.clone(),
            inbox,
        ));
        sender
    }
}

async fn run_group<D: Dispatch>(dispatcher: Arc<D>, group_id: GroupId, mut inbox: mpsc::Receiver<Job>) {
    let mut session = ConversationSession::default();
    while let Some(job) = inbox.recv().await {
        let outcome = dispatcher.dispatch(job.message, &mut session).await;
        if let Some(respond_to) = job.respond_to {
            let _ = respond_to.send(outcome);
        }
    }
    tracing::debug!(%group_id, "group worker finished");
}
