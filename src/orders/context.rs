//! Collaborators injected into every order
//!
//! Grid, units, visual sink, event sink, randomness and config are handed
//! to orders explicitly; nothing is read from ambient globals.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{UnitId, WorldPos};
use crate::hexgrid::{HexGrid, SharedGrid};
use crate::orders::events::{EventSink, NullEventSink, OrderEvent};
use crate::units::UnitProvider;

// ============================================================================
// VISUALS
// ============================================================================

/// Geometry an order asks the display to draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VisualGeometry {
    Line { from: WorldPos, to: WorldPos },
    Circle { center: WorldPos, radius: f64 },
    Marker { position: WorldPos, label: String },
}

/// Opaque handle to something on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

/// Display collaborator; best effort, may fail or be absent
pub trait VisualSink: Send + Sync {
    fn create(&self, geometry: VisualGeometry) -> Result<VisualHandle>;
    fn remove(&self, handle: VisualHandle) -> Result<()>;
}

/// In-memory visual sink
#[derive(Debug, Default)]
pub struct VisualRegistry {
    next: AtomicU64,
    shapes: Mutex<AHashMap<VisualHandle, VisualGeometry>>,
}

impl VisualRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: VisualHandle) -> Option<VisualGeometry> {
        self.shapes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&handle)
            .cloned()
    }
}

impl VisualSink for VisualRegistry {
    fn create(&self, geometry: VisualGeometry) -> Result<VisualHandle> {
        let handle = VisualHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.shapes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle, geometry);
        Ok(handle)
    }

    fn remove(&self, handle: VisualHandle) -> Result<()> {
        self.shapes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| TacticsError::Visual(format!("unknown handle {}", handle.0)))
    }
}

// ============================================================================
// RANDOMNESS
// ============================================================================

/// Uniform [0, 1) source for hit rolls and damage jitter
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Deterministic ChaCha stream
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<ChaCha8Rng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        self.rng.lock().unwrap_or_else(|e| e.into_inner()).gen::<f64>()
    }
}

/// Thread-local OS-seeded generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Replays a fixed list of draws, then repeats the last one
#[derive(Debug)]
pub struct FixedRandom {
    values: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl FixedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            last: Mutex::new(0.0),
        }
    }
}

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(v) = self.values.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            *last = v;
        }
        *last
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything an order needs from the outside world
#[derive(Clone)]
pub struct OrderContext {
    pub grid: SharedGrid,
    pub units: Arc<dyn UnitProvider>,
    pub visuals: Option<Arc<dyn VisualSink>>,
    pub events: Arc<dyn EventSink>,
    pub rng: Arc<dyn RandomSource>,
    pub config: Arc<EngineConfig>,
}

impl OrderContext {
    /// Context with no visuals, no event listener, OS randomness and default config
    pub fn new(grid: SharedGrid, units: Arc<dyn UnitProvider>) -> Self {
        Self {
            grid,
            units,
            visuals: None,
            events: Arc::new(NullEventSink),
            rng: Arc::new(ThreadRandom),
            config: Arc::new(EngineConfig::default()),
        }
    }

    pub fn with_grid(grid: HexGrid, units: Arc<dyn UnitProvider>) -> Self {
        Self::new(Arc::new(RwLock::new(grid)), units)
    }

    pub fn with_visuals(mut self, visuals: Arc<dyn VisualSink>) -> Self {
        self.visuals = Some(visuals);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn emit(&self, event: OrderEvent) {
        self.events.emit(event);
    }

    /// Read access to the grid; a poisoned lock still holds a whole grid
    pub fn read_grid(&self) -> RwLockReadGuard<'_, HexGrid> {
        self.grid.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn occupant_at(&self, pos: WorldPos) -> Option<UnitId> {
        self.read_grid().occupant_at(pos)
    }

    /// Draw something if a visual sink is attached; failures are logged only
    pub fn draw(&self, geometry: VisualGeometry) -> Option<VisualHandle> {
        let sink = self.visuals.as_ref()?;
        match sink.create(geometry) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::debug!(error = %e, "visual sink refused geometry");
                None
            }
        }
    }

    pub fn erase(&self, handle: VisualHandle) {
        if let Some(sink) = &self.visuals {
            if let Err(e) = sink.remove(handle) {
                tracing::debug!(error = %e, "visual sink failed to remove handle");
            }
        }
    }
}

impl fmt::Debug for OrderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderContext")
            .field("has_visuals", &self.visuals.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
