//! Order lifecycle events and the sinks that receive them
//!
//! Emission is fire-and-forget: a sink never blocks an order and never
//! reports failure back.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::types::{OrderId, UnitId};
use crate::orders::order::{ExecutionResult, OrderKindTag};
use crate::units::Recovery;

/// Something worth telling the UI about
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: OrderId,
        unit: UnitId,
        kind: OrderKindTag,
    },
    Validated {
        order_id: OrderId,
        valid: bool,
        messages: Vec<String>,
    },
    Started {
        order_id: OrderId,
        unit: UnitId,
    },
    Progress {
        order_id: OrderId,
        fraction: f64,
        recovered: Recovery,
    },
    Executed {
        result: ExecutionResult,
    },
    Cancelled {
        order_id: OrderId,
        unit: UnitId,
    },
    UnitDestroyed {
        unit: UnitId,
        by: UnitId,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            OrderEvent::Created { order_id, .. }
            | OrderEvent::Validated { order_id, .. }
            | OrderEvent::Started { order_id, .. }
            | OrderEvent::Progress { order_id, .. }
            | OrderEvent::Cancelled { order_id, .. } => Some(*order_id),
            OrderEvent::Executed { result } => Some(result.order_id),
            OrderEvent::UnitDestroyed { .. } => None,
        }
    }
}

/// Receives order events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OrderEvent);
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: OrderEvent) {}
}

/// Writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: OrderEvent) {
        match &event {
            OrderEvent::Progress { .. } | OrderEvent::Validated { .. } => {
                tracing::debug!(?event, "order event")
            }
            OrderEvent::Executed { result } if !result.success => {
                tracing::warn!(order = %result.order_id, error = ?result.error, "order failed")
            }
            _ => tracing::info!(?event, "order event"),
        }
    }
}

/// Keeps every event in memory (tests, replays)
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<OrderEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: OrderEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

/// Forwards events over an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<OrderEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: OrderEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}
