//! Events emitted by the core, in the order operations are applied.

use crate::{Address, Amount, RequestId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Created {
        request_id: RequestId,
        payee: Address,
        payer: Address,
        creator: Address,
        data: String,
    },
    NewSubPayee {
        request_id: RequestId,
        sub_payee: Address,
    },
    Accepted {
        request_id: RequestId,
    },
    Canceled {
        request_id: RequestId,
    },
    UpdateExpectedAmount {
        request_id: RequestId,
        payee_index: usize,
        delta: Amount,
    },
    UpdateBalance {
        request_id: RequestId,
        payee_index: usize,
        delta: Amount,
    },
}

impl LedgerEvent {
    pub fn request_id(&self) -> &RequestId {
        match self {
            LedgerEvent::Created { request_id, .. }
            | LedgerEvent::NewSubPayee { request_id, .. }
            | LedgerEvent::Accepted { request_id }
            | LedgerEvent::Canceled { request_id }
            | LedgerEvent::UpdateExpectedAmount { request_id, .. }
            | LedgerEvent::UpdateBalance { request_id, .. } => request_id,
        }
    }

    /// Short event name as used by indexers.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Created { .. } => "Created",
            LedgerEvent::NewSubPayee { .. } => "NewSubPayee",
            LedgerEvent::Accepted { .. } => "Accepted",
            LedgerEvent::Canceled { .. } => "Canceled",
            LedgerEvent::UpdateExpectedAmount { .. } => "UpdateExpectedAmount",
            LedgerEvent::UpdateBalance { .. } => "UpdateBalance",
        }
    }
}

/// Append-only event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Drop events past `len`. Only rollback shortens the log.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    pub fn all(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events emitted at or after position `from`.
    pub fn since(&self, from: usize) -> &[LedgerEvent] {
        &self.events[from.min(self.events.len())..]
    }

    pub fn for_request<'a>(&'a self, id: &'a RequestId) -> impl Iterator<Item = &'a LedgerEvent> {
        self.events.iter().filter(move |e| e.request_id() == id)
    }
}
