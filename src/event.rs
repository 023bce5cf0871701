// src/event.rs

//! Execution event bus
//!
//! Typed events fire around validate, execute, and rollback. Subscribers
//! run synchronously on the executor thread before the next step
//! proceeds, so a subscriber observes the filesystem exactly as the
//! operation left it. Subscriptions last for one execution.

use crate::operation::OperationDesc;
use strum_macros::Display;

/// Kind of execution event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EventKind {
    #[strum(serialize = "operation.pre")]
    OperationPre,
    #[strum(serialize = "operation.post")]
    OperationPost,
    #[strum(serialize = "operation.validate.pre")]
    ValidatePre,
    #[strum(serialize = "operation.validate.post")]
    ValidatePost,
    #[strum(serialize = "operation.rollback.pre")]
    RollbackPre,
    #[strum(serialize = "operation.rollback.post")]
    RollbackPost,
}

/// One execution event
///
/// Post events carry the error message when the step failed.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub operation_id: String,
    pub desc: OperationDesc,
    pub error: Option<String>,
}

type Subscriber = Box<dyn Fn(&Event) + Send>;

/// Synchronous event sink for one execution
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for the duration of one execution
    pub fn subscribe(&mut self, subscriber: impl Fn(&Event) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver an event to every subscriber, in subscription order
    pub fn emit(&self, event: &Event) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }

    /// Drop all subscribers (end of execution)
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
