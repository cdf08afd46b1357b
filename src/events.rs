use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{BorrowerId, InstallmentId, LoanId};

/// all events that can be emitted by the billing engine
///
/// Events are recorded only after the unit of work that produced them has
/// committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    BorrowerRegistered {
        borrower_id: BorrowerId,
        timestamp: DateTime<Utc>,
    },
    LoanIssued {
        loan_id: LoanId,
        borrower_id: BorrowerId,
        principal: Money,
        total_due: Money,
        weekly_installment: Money,
        term_weeks: u32,
        timestamp: DateTime<Utc>,
    },
    LoanClosed {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentApplied {
        loan_id: LoanId,
        installment_id: InstallmentId,
        sequence: u32,
        amount: Money,
        remaining_balance: Money,
        timestamp: DateTime<Utc>,
    },

    // delinquency events
    DelinquencyChanged {
        borrower_id: BorrowerId,
        loan_id: LoanId,
        delinquent: bool,
        longest_streak: u32,
        timestamp: DateTime<Utc>,
    },
}

/// journal size used when none is configured
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// bounded event journal
///
/// Once `capacity` events are held, recording a new one drops the oldest.
/// The number of dropped events is kept until the journal is drained.
#[derive(Debug)]
pub struct EventStore {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// a zero capacity keeps nothing
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn emit(&mut self, event: Event) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event);
        }
    }

    /// drain the journal and reset the dropped counter
    pub fn take_events(&mut self) -> Vec<Event> {
        self.dropped = 0;
        self.events.drain(..).collect()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// events discarded since the last drain
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
