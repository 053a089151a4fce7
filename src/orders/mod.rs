//! Orders: the order state machine, its two kinds and the per-side queue
//!
//! An [`Order`] is built with an [`OrderContext`] carrying every outside
//! collaborator, validated against the grid and the unit provider, then
//! submitted to its side's [`OrderQueue`] which drives execution.

pub mod attack;
pub mod constants;
pub mod context;
pub mod events;
pub mod order;
pub mod queue;
pub mod wait;

pub use attack::{hit_probability, AttackOrder, AttackOutcome, AttackParams, AttackTarget};
pub use context::{
    FixedRandom, OrderContext, RandomSource, SeededRandom, ThreadRandom, VisualGeometry, VisualHandle,
    VisualRegistry, VisualSink,
};
pub use events::{ChannelEventSink, EventLog, EventSink, NullEventSink, OrderEvent, TracingEventSink};
pub use order::{
    ExecutionOutcome, ExecutionResult, Order, OrderControl, OrderKind, OrderKindTag, OrderSnapshot, OrderStatus,
    StopListener, StopReason,
};
pub use queue::{Disposition, HistoryEntry, OrderQueue, QueueError, QueueStats, RunSummary, ValidationReport};
pub use wait::{WaitDuration, WaitModality, WaitOrder, WaitOutcome};
