//! World/unit provider: the orders' only window onto unit state
//!
//! Orders read a snapshot at validation time and route every mutation
//! through the provider, so the provider owns consistency. `UnitRoster` is
//! the in-memory implementation; a host application can supply its own.

use std::sync::RwLock;

use ahash::AHashMap;

use crate::core::error::{Result, TacticsError};
use crate::core::types::{Side, UnitId, WorldPos};
use crate::units::unit::{DamageReport, Modifier, ModifierOrigin, Recovery, Stat, TacticalUnit};
use crate::units::unit_type::UnitType;

/// Synchronous access to units for validation and execution
pub trait UnitProvider: Send + Sync {
    /// Current state of a unit
    fn snapshot(&self, id: UnitId) -> Option<TacticalUnit>;

    /// Maximum engagement range for a unit type
    fn max_range(&self, unit_type: UnitType) -> f64 {
        unit_type.max_range()
    }

    /// Spend ammunition; returns what is left
    fn consume_ammunition(&self, id: UnitId, amount: f64) -> Result<f64>;

    fn apply_damage(&self, id: UnitId, damage: f64) -> Result<DamageReport>;

    fn set_under_fire(&self, id: UnitId, under_fire: bool) -> Result<()>;

    fn apply_modifiers(&self, id: UnitId, origin: &ModifierOrigin, deltas: &[(Stat, f64)]) -> Result<()>;

    /// Strip every modifier from `origin`; returns how many were removed
    fn remove_modifiers(&self, id: UnitId, origin: &ModifierOrigin) -> Result<usize>;

    /// Apply recovery; returns the amounts actually applied
    fn recover(&self, id: UnitId, recovery: &Recovery) -> Result<Recovery>;
}

/// In-memory unit store
#[derive(Debug, Default)]
pub struct UnitRoster {
    units: RwLock<AHashMap<UnitId, TacticalUnit>>,
}

impl UnitRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit, returning its id
    pub fn insert(&self, unit: TacticalUnit) -> UnitId {
        let id = unit.id;
        self.write().insert(id, unit);
        id
    }

    pub fn remove(&self, id: UnitId) -> Option<TacticalUnit> {
        self.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn ids_for_side(&self, side: Side) -> Vec<UnitId> {
        self.read()
            .values()
            .filter(|u| u.side == side)
            .map(|u| u.id)
            .collect()
    }

    pub fn set_position(&self, id: UnitId, position: WorldPos) -> Result<()> {
        self.with_unit(id, |unit| unit.position = position)
    }

    /// Run a closure against a unit under the write lock
    pub fn with_unit<T>(&self, id: UnitId, f: impl FnOnce(&mut TacticalUnit) -> T) -> Result<T> {
        let mut units = self.write();
        let unit = units.get_mut(&id).ok_or(TacticsError::UnitNotFound(id))?;
        Ok(f(unit))
    }

    // A poisoned lock still holds consistent unit data: every mutation
    // completes inside a single closure.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, AHashMap<UnitId, TacticalUnit>> {
        self.units.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AHashMap<UnitId, TacticalUnit>> {
        self.units.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl UnitProvider for UnitRoster {
    fn snapshot(&self, id: UnitId) -> Option<TacticalUnit> {
        self.read().get(&id).cloned()
    }

    fn consume_ammunition(&self, id: UnitId, amount: f64) -> Result<f64> {
        self.with_unit(id, |unit| {
            if unit.ammunition < amount {
                return Err(TacticsError::InsufficientAmmunition {
                    needed: amount.ceil() as u32,
                    available: unit.ammunition.floor() as u32,
                });
            }
            unit.ammunition -= amount;
            Ok(unit.ammunition)
        })?
    }

    fn apply_damage(&self, id: UnitId, damage: f64) -> Result<DamageReport> {
        self.with_unit(id, |unit| unit.take_damage(damage))
    }

    fn set_under_fire(&self, id: UnitId, under_fire: bool) -> Result<()> {
        self.with_unit(id, |unit| unit.under_fire = under_fire)
    }

    fn apply_modifiers(&self, id: UnitId, origin: &ModifierOrigin, deltas: &[(Stat, f64)]) -> Result<()> {
        self.with_unit(id, |unit| {
            unit.modifiers.extend(deltas.iter().map(|&(stat, percent)| Modifier {
                stat,
                percent,
                origin: origin.clone(),
            }));
        })
    }

    fn remove_modifiers(&self, id: UnitId, origin: &ModifierOrigin) -> Result<usize> {
        self.with_unit(id, |unit| {
            let before = unit.modifiers.len();
            unit.modifiers.retain(|m| &m.origin != origin);
            before - unit.modifiers.len()
        })
    }

    fn recover(&self, id: UnitId, recovery: &Recovery) -> Result<Recovery> {
        self.with_unit(id, |unit| {
            if unit.is_destroyed() {
                return Err(TacticsError::UnitDestroyed(id));
            }
            Ok(unit.recover(recovery))
        })?
    }
}
