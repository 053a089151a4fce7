//! Order state machine shared by every order kind
//!
//! ```text
//! Pending ──validate──> Valid ──execute──> Executing ──> Completed
//!    │  <──validate──>  Invalid                │
//!    └──────────── cancel (any non-terminal) ──┴──────> Cancelled
//! ```
//!
//! Kind-specific behaviour is dispatched over [`OrderKind`]. An executing
//! order is stopped through its [`OrderControl`], which the queue keeps a
//! clone of while the order itself is owned by the running task.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::core::types::{OrderId, UnitId};
use crate::orders::attack::{AttackOrder, AttackOutcome, AttackParams};
use crate::orders::constants::DEFAULT_PRIORITY;
use crate::orders::context::{OrderContext, VisualHandle};
use crate::orders::events::OrderEvent;
use crate::orders::wait::{WaitDuration, WaitModality, WaitOrder, WaitOutcome};

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Valid,
    Invalid,
    Executing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Validation may (re)run in these states
    pub fn can_validate(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Valid | OrderStatus::Invalid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Valid => "valid",
            OrderStatus::Invalid => "invalid",
            OrderStatus::Executing => "executing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Kind tag without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKindTag {
    Attack,
    Wait,
}

impl fmt::Display for OrderKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKindTag::Attack => f.write_str("attack"),
            OrderKindTag::Wait => f.write_str("wait"),
        }
    }
}

/// Kind-specific order state
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderKind {
    Attack(AttackOrder),
    Wait(WaitOrder),
}

impl OrderKind {
    pub fn tag(&self) -> OrderKindTag {
        match self {
            OrderKind::Attack(_) => OrderKindTag::Attack,
            OrderKind::Wait(_) => OrderKindTag::Wait,
        }
    }

    pub fn as_attack(&self) -> Option<&AttackOrder> {
        match self {
            OrderKind::Attack(a) => Some(a),
            OrderKind::Wait(_) => None,
        }
    }

    pub fn as_wait(&self) -> Option<&WaitOrder> {
        match self {
            OrderKind::Wait(w) => Some(w),
            OrderKind::Attack(_) => None,
        }
    }
}

// ============================================================================
// STOP SIGNAL
// ============================================================================

/// Why an order was told to stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    Interrupted(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::Interrupted(reason) => write!(f, "interrupted: {}", reason),
        }
    }
}

/// Shared handle that stops an order; the first reason wins
#[derive(Debug, Clone)]
pub struct OrderControl {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl OrderControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop; returns false if a stop was already requested
    pub fn stop(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.tx.borrow().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> StopListener {
        StopListener { rx: self.tx.subscribe() }
    }
}

impl Default for OrderControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Awaitable side of an [`OrderControl`]
#[derive(Debug)]
pub struct StopListener {
    rx: watch::Receiver<Option<StopReason>>,
}

impl StopListener {
    /// Resolves once a stop is requested (immediately if it already was)
    pub async fn stopped(&mut self) -> StopReason {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                // Control dropped without stopping: never resolves
                std::future::pending::<()>().await;
            }
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Kind-specific execution outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Attack(AttackOutcome),
    Wait(WaitOutcome),
}

/// What `execute` returns; failures are data, never panics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub order_id: OrderId,
    pub unit: UnitId,
    pub success: bool,
    pub outcome: Option<ExecutionOutcome>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(order_id: OrderId, unit: UnitId, outcome: ExecutionOutcome) -> Self {
        Self {
            order_id,
            unit,
            success: true,
            outcome: Some(outcome),
            error: None,
        }
    }

    pub fn failed(order_id: OrderId, unit: UnitId, error: impl Into<String>) -> Self {
        Self {
            order_id,
            unit,
            success: false,
            outcome: None,
            error: Some(error.into()),
        }
    }
}

/// Serializable view of an order
#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub unit: UnitId,
    pub kind: OrderKindTag,
    pub status: OrderStatus,
    pub priority: i32,
    pub messages: Vec<String>,
    pub created_at: SystemTime,
    pub details: OrderKind,
    pub result: Option<ExecutionResult>,
    pub summary: String,
}

// ============================================================================
// ORDER
// ============================================================================

/// A command issued to one unit
#[derive(Debug)]
pub struct Order {
    id: OrderId,
    unit: UnitId,
    status: OrderStatus,
    priority: i32,
    messages: Vec<String>,
    visuals: Vec<VisualHandle>,
    created_at: SystemTime,
    kind: OrderKind,
    control: OrderControl,
    result: Option<ExecutionResult>,
    ctx: OrderContext,
}

impl Order {
    pub fn new(ctx: OrderContext, unit: UnitId, kind: OrderKind) -> Self {
        let mut order = Self {
            id: OrderId::new(),
            unit,
            status: OrderStatus::Pending,
            priority: DEFAULT_PRIORITY,
            messages: Vec::new(),
            visuals: Vec::new(),
            created_at: SystemTime::now(),
            kind,
            control: OrderControl::new(),
            result: None,
            ctx,
        };

        if order.ctx.visuals.is_some() {
            let shapes = match &order.kind {
                OrderKind::Attack(a) => a.visuals(&order.ctx, unit),
                OrderKind::Wait(w) => w.visuals(&order.ctx, unit),
            };
            order.visuals = shapes.into_iter().filter_map(|g| order.ctx.draw(g)).collect();
        }

        tracing::debug!(order = %order.id, %unit, kind = %order.kind.tag(), "order created");
        order.ctx.emit(OrderEvent::Created {
            order_id: order.id,
            unit,
            kind: order.kind.tag(),
        });
        order
    }

    pub fn attack(ctx: OrderContext, unit: UnitId, params: AttackParams) -> Self {
        Self::new(ctx, unit, OrderKind::Attack(AttackOrder::new(params)))
    }

    pub fn wait(ctx: OrderContext, unit: UnitId, modality: WaitModality, duration: WaitDuration) -> Self {
        Self::new(ctx, unit, OrderKind::Wait(WaitOrder::new(modality, duration)))
    }

    /// Timed wait helper
    pub fn wait_for(ctx: OrderContext, unit: UnitId, modality: WaitModality, duration: Duration) -> Self {
        Self::wait(ctx, unit, modality, WaitDuration::Timed(duration))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn kind(&self) -> &OrderKind {
        &self.kind
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.len()
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    pub fn context(&self) -> &OrderContext {
        &self.ctx
    }

    /// Clone of the stop handle, usable while the order runs elsewhere
    pub fn control(&self) -> OrderControl {
        self.control.clone()
    }

    /// Check the order against current world state
    ///
    /// Clears and repopulates the messages. Returns false without touching
    /// anything when the order is executing or finished.
    pub fn validate(&mut self) -> bool {
        if !self.status.can_validate() {
            return false;
        }

        self.messages.clear();
        let valid = match &mut self.kind {
            OrderKind::Attack(a) => a.validate(&self.ctx, self.unit, &mut self.messages),
            OrderKind::Wait(w) => w.validate(&self.ctx, self.unit, &mut self.messages),
        };
        self.status = if valid { OrderStatus::Valid } else { OrderStatus::Invalid };

        tracing::debug!(order = %self.id, valid, messages = ?self.messages, "order validated");
        self.ctx.emit(OrderEvent::Validated {
            order_id: self.id,
            valid,
            messages: self.messages.clone(),
        });
        valid
    }

    pub(crate) fn mark_invalid(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
        self.status = OrderStatus::Invalid;
    }

    /// Carry the order out
    ///
    /// Only a `Valid` order runs. Every fault ends up in the returned result;
    /// a failed run still leaves the order `Completed`, a cancelled one
    /// `Cancelled`.
    pub async fn execute(&mut self) -> ExecutionResult {
        if let Some(reason) = self.control.reason() {
            self.cancel();
            let result = ExecutionResult::failed(self.id, self.unit, format!("stopped before execution ({})", reason));
            self.result = Some(result.clone());
            return result;
        }

        if self.status != OrderStatus::Valid {
            return ExecutionResult::failed(
                self.id,
                self.unit,
                format!("order is {} and cannot execute", self.status),
            );
        }

        self.status = OrderStatus::Executing;
        tracing::info!(order = %self.id, unit = %self.unit, kind = %self.kind.tag(), "executing order");
        self.ctx.emit(OrderEvent::Started {
            order_id: self.id,
            unit: self.unit,
        });

        let mut stop = self.control.subscribe();
        let outcome = match &mut self.kind {
            OrderKind::Attack(a) => a
                .execute(&self.ctx, self.unit, &mut stop)
                .await
                .map(ExecutionOutcome::Attack),
            OrderKind::Wait(w) => w
                .execute(&self.ctx, self.id, self.unit, &mut stop)
                .await
                .map(ExecutionOutcome::Wait),
        };
        self.teardown_visuals();

        let result = if self.control.reason() == Some(StopReason::Cancelled) {
            self.status = OrderStatus::Cancelled;
            self.ctx.emit(OrderEvent::Cancelled {
                order_id: self.id,
                unit: self.unit,
            });
            ExecutionResult {
                order_id: self.id,
                unit: self.unit,
                success: false,
                outcome: outcome.ok(),
                error: Some("cancelled during execution".into()),
            }
        } else {
            self.status = OrderStatus::Completed;
            match outcome {
                Ok(outcome) => ExecutionResult::succeeded(self.id, self.unit, outcome),
                Err(e) => ExecutionResult::failed(self.id, self.unit, e.to_string()),
            }
        };

        if result.success {
            tracing::info!(order = %self.id, "order completed");
        } else {
            tracing::warn!(order = %self.id, status = %self.status, error = ?result.error, "order did not succeed");
        }
        self.ctx.emit(OrderEvent::Executed { result: result.clone() });
        self.result = Some(result.clone());
        result
    }

    /// Abandon the order
    ///
    /// Idempotent; returns false for orders already finished. An order that
    /// is executing elsewhere is stopped through its control instead.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.control.stop(StopReason::Cancelled);
        if self.status == OrderStatus::Executing {
            return true;
        }

        if let OrderKind::Wait(w) = &mut self.kind {
            w.release(&self.ctx, self.id, self.unit);
        }
        self.teardown_visuals();
        self.status = OrderStatus::Cancelled;

        tracing::info!(order = %self.id, unit = %self.unit, "order cancelled");
        self.ctx.emit(OrderEvent::Cancelled {
            order_id: self.id,
            unit: self.unit,
        });
        true
    }

    /// End the order early; before execution this is a cancel
    pub fn interrupt(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if self.status == OrderStatus::Executing {
            return self.control.stop(StopReason::Interrupted(reason.into()));
        }
        self.cancel()
    }

    pub fn serialize(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            unit: self.unit,
            kind: self.kind.tag(),
            status: self.status,
            priority: self.priority,
            messages: self.messages.clone(),
            created_at: self.created_at,
            details: self.kind.clone(),
            result: self.result.clone(),
            summary: self.summary(),
        }
    }

    /// One-line human description
    pub fn summary(&self) -> String {
        let detail = match &self.kind {
            OrderKind::Attack(a) => a.summary(),
            OrderKind::Wait(w) => w.summary(),
        };
        format!("{} [{}] {}: {}", self.kind.tag(), self.status, self.unit, detail)
    }

    fn teardown_visuals(&mut self) {
        for handle in self.visuals.drain(..) {
            self.ctx.erase(handle);
        }
    }
}

// An order dropped before it finished (an abandoned run, or a caller
// discarding it) must not leave modifiers or visuals behind
impl Drop for Order {
    fn drop(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        if let OrderKind::Wait(w) = &mut self.kind {
            w.release(&self.ctx, self.id, self.unit);
        }
        self.teardown_visuals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Side, WorldPos};
    use crate::hexgrid::HexGrid;
    use crate::orders::context::VisualRegistry;
    use crate::orders::events::EventLog;
    use crate::units::{TacticalUnit, UnitProvider, UnitRoster, UnitType};

    struct Fixture {
        ctx: OrderContext,
        roster: Arc<UnitRoster>,
        visuals: Arc<VisualRegistry>,
        events: Arc<EventLog>,
        blue: UnitId,
    }

    fn fixture() -> Fixture {
        let roster = Arc::new(UnitRoster::new());
        let blue = roster.insert(TacticalUnit::new("Recon", Side::Blue, UnitType::Recon, WorldPos::ORIGIN));
        let visuals = Arc::new(VisualRegistry::new());
        let events = Arc::new(EventLog::new());
        let ctx = OrderContext::with_grid(HexGrid::new(100.0, WorldPos::ORIGIN), roster.clone())
            .with_visuals(visuals.clone())
            .with_events(events.clone());
        Fixture {
            ctx,
            roster,
            visuals,
            events,
            blue,
        }
    }

    #[test]
    fn test_new_order_is_pending_with_visuals() {
        let fx = fixture();
        let order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Alert, WaitDuration::Turns(2));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.visual_count() > 0);
        assert_eq!(fx.visuals.len(), order.visual_count());
        assert!(matches!(fx.events.events()[0], OrderEvent::Created { .. }));
    }

    #[test]
    fn test_validate_is_reentrant() {
        let fx = fixture();
        let mut order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Rest, WaitDuration::Turns(1));

        fx.roster.set_under_fire(fx.blue, true).unwrap();
        assert!(!order.validate());
        assert_eq!(order.status(), OrderStatus::Invalid);
        assert_eq!(order.messages().len(), 1);

        fx.roster.set_under_fire(fx.blue, false).unwrap();
        assert!(order.validate());
        assert_eq!(order.status(), OrderStatus::Valid);
        assert!(order.messages().is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent_and_clears_visuals() {
        let fx = fixture();
        let mut order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Hidden, WaitDuration::Turns(1));
        assert!(order.cancel());
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(fx.visuals.is_empty());
        assert!(!order.cancel());
        assert!(!order.validate());
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_requires_valid() {
        let fx = fixture();
        let mut order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Alert, WaitDuration::Turns(1));
        let result = order.execute().await;
        assert!(!result.success);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_runs_once() {
        let fx = fixture();
        let mut order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Alert, WaitDuration::Turns(1));
        assert!(order.validate());

        let first = order.execute().await;
        assert!(first.success);
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(fx.visuals.is_empty());

        let second = order.execute().await;
        assert!(!second.success);
        assert_eq!(order.last_result(), Some(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_before_execution_is_cancelled() {
        let fx = fixture();
        let mut order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Alert, WaitDuration::Turns(1));
        order.validate();
        order.control().stop(StopReason::Cancelled);

        let result = order.execute().await;
        assert!(!result.success);
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_stop_listener_sees_first_reason() {
        let control = OrderControl::new();
        let mut listener = control.subscribe();
        assert!(control.stop(StopReason::Interrupted("contact".into())));
        assert!(!control.stop(StopReason::Cancelled));
        assert_eq!(listener.stopped().await, StopReason::Interrupted("contact".into()));
    }

    #[test]
    fn test_snapshot_serializes() {
        let fx = fixture();
        let order = Order::wait(fx.ctx.clone(), fx.blue, WaitModality::Rest, WaitDuration::Turns(3)).with_priority(4);
        let snapshot = order.serialize();
        assert_eq!(snapshot.priority, 4);
        assert!(snapshot.summary.starts_with("wait [pending]"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["details"]["kind"], "wait");
    }
}
