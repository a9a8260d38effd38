//! The Interaction Service (§4.10): the User Interaction Protocol (UIP)
//! boundary. Requests and responses are ordinary `DomainEvent`s; this
//! service's job is staleness checking (I2 — a response only resolves the
//! exact interaction the task is currently waiting on) and giving a
//! synchronous caller (e.g. a CLI) a way to block on a response.

use std::time::Duration;

use seed_domain::{DomainEvent, Error, InteractionRequest, InteractionResponse, Result, StoredEvent};
use seed_eventstore::EventStore;

pub struct InteractionService<'a> {
    event_store: &'a EventStore,
}

impl<'a> InteractionService<'a> {
    pub fn new(event_store: &'a EventStore) -> Self {
        Self { event_store }
    }

    /// Append a `UserInteractionRequested` event for `task_id`. Returns the
    /// interaction id for convenience (it's also on `request`).
    pub fn request_interaction(
        &self,
        task_id: &str,
        request: InteractionRequest,
        author_actor_id: &str,
    ) -> Result<String> {
        let interaction_id = request.interaction_id.clone();
        self.event_store.append_one(DomainEvent::UserInteractionRequested {
            task_id: task_id.to_string(),
            request,
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(interaction_id)
    }

    /// Replay `task_id`'s stream to find the interaction request the task
    /// is currently waiting on, if any (the last `Requested` not yet
    /// followed by a `Responded` for the same id).
    pub fn pending_interaction(&self, task_id: &str) -> Option<InteractionRequest> {
        let events = self.event_store.read_stream(task_id, 0);
        let mut pending: Option<InteractionRequest> = None;
        for stored in events {
            match stored.event {
                DomainEvent::UserInteractionRequested { request, .. } => pending = Some(request),
                DomainEvent::UserInteractionResponded { response, .. } => {
                    if pending.as_ref().map(|r| r.interaction_id.as_str()) == Some(response.interaction_id.as_str()) {
                        pending = None;
                    }
                }
                _ => {}
            }
        }
        pending
    }

    /// Validate and append a `UserInteractionResponded` event.
    ///
    /// Errors with `NoPendingInteraction` if the task isn't waiting on
    /// anything, and `StaleInteraction` if `response.interaction_id`
    /// doesn't match the one it's actually waiting on (I2) — a response to
    /// an interaction that has already been superseded is rejected rather
    /// than silently accepted.
    pub fn respond_to_interaction(
        &self,
        task_id: &str,
        response: InteractionResponse,
        author_actor_id: &str,
    ) -> Result<InteractionRequest> {
        let Some(pending) = self.pending_interaction(task_id) else {
            return Err(Error::NoPendingInteraction { task_id: task_id.to_string() });
        };
        if pending.interaction_id != response.interaction_id {
            return Err(Error::StaleInteraction {
                expected: pending.interaction_id,
                got: response.interaction_id,
            });
        }
        self.event_store.append_one(DomainEvent::UserInteractionResponded {
            task_id: task_id.to_string(),
            response,
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(pending)
    }

    /// Block until `interaction_id` is answered or `timeout` elapses, by
    /// polling the event store's live subscription. Used by synchronous
    /// callers (e.g. a CLI) that can't just react to the next routed
    /// event the way the Runtime Manager does.
    pub async fn wait_for_response(
        &self,
        task_id: &str,
        interaction_id: &str,
        timeout: Duration,
    ) -> Option<InteractionResponse> {
        if let Some(found) = self.find_response(task_id, interaction_id) {
            return Some(found);
        }
        let mut rx = self.event_store.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(stored)) => {
                    if let Some(response) = Self::match_response(&stored, task_id, interaction_id) {
                        return Some(response);
                    }
                }
                Ok(Err(_)) | Err(_) => return None,
            }
        }
    }

    fn find_response(&self, task_id: &str, interaction_id: &str) -> Option<InteractionResponse> {
        self.event_store
            .read_stream(task_id, 0)
            .into_iter()
            .find_map(|stored| Self::match_response(&stored, task_id, interaction_id))
    }

    fn match_response(stored: &StoredEvent, task_id: &str, interaction_id: &str) -> Option<InteractionResponse> {
        match &stored.event {
            DomainEvent::UserInteractionResponded { task_id: t, response, .. }
                if t == task_id && response.interaction_id == interaction_id =>
            {
                Some(response.clone())
            }
            _ => None,
        }
    }
}
