//! Wait orders: hold position in a posture for a time or a number of turns
//!
//! The posture's stat modifiers are applied when the wait starts and removed
//! exactly once when it ends, however it ends. While waiting the unit
//! recovers morale, ammunition and fatigue at the posture's rate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TacticsError};
use crate::core::types::{OrderId, UnitId};
use crate::orders::constants::{
    ALERT_MODIFIERS, ALERT_RECOVERY, HIDDEN_MODIFIERS, HIDDEN_RECOVERY, REST_MODIFIERS, REST_RECOVERY,
};
use crate::orders::context::{OrderContext, VisualGeometry};
use crate::orders::events::OrderEvent;
use crate::orders::order::{StopListener, StopReason};
use crate::units::{ModifierOrigin, Recovery, Stat};

/// Posture held during the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitModality {
    Alert,
    Rest,
    Hidden,
}

impl WaitModality {
    /// Stat modifiers in percent
    pub fn modifiers(&self) -> &'static [(Stat, f64)] {
        match self {
            WaitModality::Alert => ALERT_MODIFIERS,
            WaitModality::Rest => REST_MODIFIERS,
            WaitModality::Hidden => HIDDEN_MODIFIERS,
        }
    }

    /// Base recovery per game minute
    pub fn recovery_per_minute(&self) -> Recovery {
        match self {
            WaitModality::Alert => ALERT_RECOVERY,
            WaitModality::Rest => REST_RECOVERY,
            WaitModality::Hidden => HIDDEN_RECOVERY,
        }
    }
}

impl fmt::Display for WaitModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitModality::Alert => f.write_str("alert"),
            WaitModality::Rest => f.write_str("rest"),
            WaitModality::Hidden => f.write_str("hidden"),
        }
    }
}

/// How long to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitDuration {
    Timed(Duration),
    Turns(u32),
}

impl WaitDuration {
    pub fn is_zero(&self) -> bool {
        match self {
            WaitDuration::Timed(d) => d.is_zero(),
            WaitDuration::Turns(n) => *n == 0,
        }
    }
}

impl fmt::Display for WaitDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitDuration::Timed(d) => write!(f, "{:.1}s", d.as_secs_f64()),
            WaitDuration::Turns(1) => f.write_str("1 turn"),
            WaitDuration::Turns(n) => write!(f, "{} turns", n),
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitOutcome {
    pub modality: WaitModality,
    pub elapsed_secs: f64,
    pub turns_elapsed: u32,
    /// Ran for the full requested duration
    pub completed: bool,
    pub interrupted: Option<String>,
    pub recovered: Recovery,
}

/// Wait state
#[derive(Debug, Clone, Serialize)]
pub struct WaitOrder {
    modality: WaitModality,
    duration: WaitDuration,
    /// Modifier deltas currently on the unit under this order's origin
    applied: Vec<(Stat, f64)>,
    recovered: Recovery,
    elapsed: Duration,
    turns_elapsed: u32,
    interrupted: Option<String>,
}

impl WaitOrder {
    pub fn new(modality: WaitModality, duration: WaitDuration) -> Self {
        Self {
            modality,
            duration,
            applied: Vec::new(),
            recovered: Recovery::default(),
            elapsed: Duration::ZERO,
            turns_elapsed: 0,
            interrupted: None,
        }
    }

    pub fn modality(&self) -> WaitModality {
        self.modality
    }

    pub fn duration(&self) -> WaitDuration {
        self.duration
    }

    pub fn applied_modifiers(&self) -> &[(Stat, f64)] {
        &self.applied
    }

    pub fn recovered(&self) -> Recovery {
        self.recovered
    }

    pub fn interrupted(&self) -> Option<&str> {
        self.interrupted.as_deref()
    }

    /// Fraction of the requested duration already waited
    pub fn progress(&self) -> f64 {
        let fraction = match self.duration {
            WaitDuration::Timed(total) if !total.is_zero() => self.elapsed.as_secs_f64() / total.as_secs_f64(),
            WaitDuration::Turns(n) if n > 0 => f64::from(self.turns_elapsed) / f64::from(n),
            _ => 1.0,
        };
        fraction.min(1.0)
    }

    fn finished(&self) -> bool {
        match self.duration {
            WaitDuration::Timed(total) => self.elapsed >= total,
            WaitDuration::Turns(n) => self.turns_elapsed >= n,
        }
    }

    pub(crate) fn validate(&mut self, ctx: &OrderContext, unit: UnitId, messages: &mut Vec<String>) -> bool {
        let Some(snapshot) = ctx.units.snapshot(unit) else {
            messages.push("unit not found".into());
            return false;
        };
        if snapshot.is_destroyed() {
            messages.push("unit is destroyed".into());
            return false;
        }
        if self.modality == WaitModality::Rest && snapshot.under_fire {
            messages.push("cannot rest while under enemy fire".into());
            return false;
        }
        if self.duration.is_zero() {
            messages.push("wait duration must be positive".into());
            return false;
        }
        true
    }

    pub(crate) async fn execute(
        &mut self,
        ctx: &OrderContext,
        order_id: OrderId,
        unit: UnitId,
        stop: &mut StopListener,
    ) -> Result<WaitOutcome> {
        let origin = ModifierOrigin::Order(order_id);
        let deltas = self.modality.modifiers();
        ctx.units.apply_modifiers(unit, &origin, deltas)?;
        self.applied = deltas.to_vec();
        tracing::debug!(%unit, modality = %self.modality, "wait modifiers applied");

        let run = self.run(ctx, order_id, unit, stop).await;
        self.release(ctx, order_id, unit);
        run?;

        Ok(WaitOutcome {
            modality: self.modality,
            elapsed_secs: self.elapsed.as_secs_f64(),
            turns_elapsed: self.turns_elapsed,
            completed: self.interrupted.is_none() && self.finished(),
            interrupted: self.interrupted.clone(),
            recovered: self.recovered,
        })
    }

    async fn run(
        &mut self,
        ctx: &OrderContext,
        order_id: OrderId,
        unit: UnitId,
        stop: &mut StopListener,
    ) -> Result<()> {
        let config = &ctx.config.wait;
        let progress_every = config.progress_every.max(1);
        let mut steps: u32 = 0;

        while !self.finished() {
            let (step, minutes) = match self.duration {
                WaitDuration::Timed(total) => {
                    let step = config.tick().min(total - self.elapsed);
                    (step, step.as_secs_f64() / 60.0)
                }
                WaitDuration::Turns(_) => (config.turn_duration(), config.turn_minutes),
            };

            tokio::select! {
                biased;
                reason = stop.stopped() => {
                    if let StopReason::Interrupted(why) = reason {
                        tracing::info!(%unit, reason = %why, "wait interrupted");
                        self.interrupted = Some(why);
                    }
                    return Ok(());
                }
                _ = tokio::time::sleep(step) => {}
            }

            self.elapsed += step;
            if let WaitDuration::Turns(_) = self.duration {
                self.turns_elapsed += 1;
            }
            self.recover_for(ctx, unit, minutes)?;

            steps += 1;
            if steps % progress_every == 0 {
                ctx.emit(OrderEvent::Progress {
                    order_id,
                    fraction: self.progress(),
                    recovered: self.recovered,
                });
            }
        }
        Ok(())
    }

    fn recover_for(&mut self, ctx: &OrderContext, unit: UnitId, minutes: f64) -> Result<()> {
        let snapshot = ctx.units.snapshot(unit).ok_or(TacticsError::UnitNotFound(unit))?;
        let rate = self.modality.recovery_per_minute();
        let scale = |stat| (1.0 + snapshot.modifier_total(stat) / 100.0).max(0.0);

        let amount = Recovery {
            morale: rate.morale * minutes * scale(Stat::MoraleRecovery),
            ammunition: rate.ammunition * minutes,
            fatigue: rate.fatigue * minutes * scale(Stat::FatigueRecovery),
        };
        let applied = ctx.units.recover(unit, &amount)?;
        self.recovered.add(&applied);
        Ok(())
    }

    /// Strip this order's modifiers if they are still applied
    pub(crate) fn release(&mut self, ctx: &OrderContext, order_id: OrderId, unit: UnitId) {
        if self.applied.is_empty() {
            return;
        }
        match ctx.units.remove_modifiers(unit, &ModifierOrigin::Order(order_id)) {
            Ok(removed) => tracing::debug!(%unit, removed, "wait modifiers removed"),
            Err(e) => tracing::warn!(%unit, error = %e, "failed to remove wait modifiers"),
        }
        self.applied.clear();
    }

    /// Ring around the unit plus a posture label
    pub(crate) fn visuals(&self, ctx: &OrderContext, unit: UnitId) -> Vec<VisualGeometry> {
        let Some(position) = ctx.units.snapshot(unit).map(|u| u.position) else {
            return Vec::new();
        };
        let radius = ctx.read_grid().hex_size();
        vec![
            VisualGeometry::Circle {
                center: position,
                radius,
            },
            VisualGeometry::Marker {
                position,
                label: self.modality.to_string(),
            },
        ]
    }

    pub(crate) fn summary(&self) -> String {
        let mut text = format!("{} for {}", self.modality, self.duration);
        if !self.recovered.is_zero() {
            text.push_str(&format!(
                ", recovered morale {:.1} ammo {:.1} fatigue {:.1}",
                self.recovered.morale, self.recovered.ammunition, self.recovered.fatigue
            ));
        }
        if let Some(reason) = &self.interrupted {
            text.push_str(&format!(" (interrupted: {})", reason));
        }
        text
    }
}
