use tracing::debug;

use crate::model::{Panel, WorkloadRef};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FetchKind {
    Workloads,
    Top,
    Identity,
    Namespaces,
    Contexts,
    Details,
    Metrics,
}

const KIND_COUNT: usize = 7;

impl FetchKind {
    fn slot(self) -> usize {
        self as usize
    }
}

/// The view state a fetch was requested for. A result is only applied while it still matches.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchScope {
    pub context: String,
    pub namespace: String,
    pub target: Option<WorkloadRef>,
    /// Selector panel a listing fills; listings share one buffer.
    pub selector: Option<Panel>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchTicket {
    pub kind: FetchKind,
    pub seq: u64,
    pub scope: FetchScope,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FetchPhase {
    Idle,
    InFlight,
    Completed,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Completion {
    Apply,
    Stale,
}

#[derive(Debug, Default, Clone)]
struct Slot {
    in_flight: Option<u64>,
    last_applied: Option<u64>,
    completed: bool,
}

#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    slots: [Slot; KIND_COUNT],
    next_seq: u64,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            next_seq: 1,
        }
    }

    pub fn phase(&self, kind: FetchKind) -> FetchPhase {
        let slot = &self.slots[kind.slot()];
        if slot.in_flight.is_some() {
            FetchPhase::InFlight
        } else if slot.completed {
            FetchPhase::Completed
        } else {
            FetchPhase::Idle
        }
    }

    /// Skipped, never queued, while the previous fetch of this kind is still running.
    pub fn trigger_periodic(&mut self, kind: FetchKind, scope: FetchScope) -> Option<FetchTicket> {
        if let Some(seq) = self.slots[kind.slot()].in_flight {
            debug!(?kind, seq, "periodic tick skipped, fetch still in flight");
            return None;
        }
        Some(self.issue(kind, scope))
    }

    /// Always issues; an older in-flight fetch of the same kind is superseded.
    pub fn trigger_immediate(&mut self, kind: FetchKind, scope: FetchScope) -> FetchTicket {
        if let Some(seq) = self.slots[kind.slot()].in_flight {
            debug!(?kind, seq, "superseding in-flight fetch");
        }
        self.issue(kind, scope)
    }

    fn issue(&mut self, kind: FetchKind, scope: FetchScope) -> FetchTicket {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = &mut self.slots[kind.slot()];
        slot.in_flight = Some(seq);
        slot.completed = false;
        FetchTicket { kind, seq, scope }
    }

    pub fn complete(&mut self, ticket: &FetchTicket, current: &FetchScope) -> Completion {
        let slot = &mut self.slots[ticket.kind.slot()];
        if slot.in_flight == Some(ticket.seq) {
            slot.in_flight = None;
            slot.completed = true;
        }

        if ticket.scope != *current {
            debug!(kind = ?ticket.kind, seq = ticket.seq, "dropping result for abandoned scope");
            return Completion::Stale;
        }
        if slot.last_applied.is_some_and(|applied| applied > ticket.seq) {
            debug!(kind = ?ticket.kind, seq = ticket.seq, "dropping result older than applied one");
            return Completion::Stale;
        }
        slot.last_applied = Some(ticket.seq);
        Completion::Apply
    }
}
