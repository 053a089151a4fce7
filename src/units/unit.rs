//! Tactical units as seen by the order engine
//!
//! A unit carries only what order resolution reads or writes: position,
//! health, ammunition, morale, fatigue, cover and stat modifiers.

use serde::{Deserialize, Serialize};

use crate::core::types::{OrderId, Side, UnitId, WorldPos};
use crate::units::constants::{MAX_FATIGUE, MAX_MORALE};
use crate::units::unit_type::UnitType;

/// How protected a unit is from incoming fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoverTier {
    #[default]
    None,
    Light,
    Heavy,
    Full,
}

impl CoverTier {
    /// Hit probability multiplier
    pub fn hit_factor(&self) -> f64 {
        match self {
            CoverTier::None => 1.0,
            CoverTier::Light => 0.7,
            CoverTier::Heavy => 0.4,
            CoverTier::Full => 0.2,
        }
    }
}

/// Stats that orders may modify (in percent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Vision,
    ReactionSpeed,
    DefenseOnContact,
    FatigueRecovery,
    MoraleRecovery,
}

/// Who applied a modifier, so it can be stripped selectively
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierOrigin {
    Order(OrderId),
    System(String),
}

/// A percentage modifier on one stat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub stat: Stat,
    pub percent: f64,
    pub origin: ModifierOrigin,
}

/// Resource recovery amounts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Recovery {
    pub morale: f64,
    pub ammunition: f64,
    /// Fatigue removed (positive = less tired)
    pub fatigue: f64,
}

impl Recovery {
    pub fn add(&mut self, other: &Recovery) {
        self.morale += other.morale;
        self.ammunition += other.ammunition;
        self.fatigue += other.fatigue;
    }

    pub fn is_zero(&self) -> bool {
        self.morale == 0.0 && self.ammunition == 0.0 && self.fatigue == 0.0
    }
}

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    pub damage_applied: f64,
    pub remaining_health: f64,
    pub destroyed: bool,
}

/// A unit on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalUnit {
    pub id: UnitId,
    pub name: String,
    pub side: Side,
    pub unit_type: UnitType,
    pub position: WorldPos,
    pub health: f64,
    pub max_health: f64,
    pub ammunition: f64,
    pub max_ammunition: f64,
    /// 0-100; `None` for units that do not track morale
    pub morale: Option<f64>,
    /// 0-100, higher is more tired
    pub fatigue: f64,
    pub firepower: f64,
    pub cover: CoverTier,
    /// Currently receiving enemy fire
    pub under_fire: bool,
    pub modifiers: Vec<Modifier>,
}

impl TacticalUnit {
    /// New unit with its type's default properties, full health and ammunition
    pub fn new(name: impl Into<String>, side: Side, unit_type: UnitType, position: WorldPos) -> Self {
        let props = unit_type.default_properties();
        Self {
            id: UnitId::new(),
            name: name.into(),
            side,
            unit_type,
            position,
            health: props.max_health,
            max_health: props.max_health,
            ammunition: props.max_ammunition,
            max_ammunition: props.max_ammunition,
            morale: props.tracks_morale.then_some(MAX_MORALE),
            fatigue: 0.0,
            firepower: props.firepower,
            cover: CoverTier::None,
            under_fire: false,
            modifiers: Vec::new(),
        }
    }

    pub fn with_cover(mut self, cover: CoverTier) -> Self {
        self.cover = cover;
        self
    }

    pub fn with_morale(mut self, morale: Option<f64>) -> Self {
        self.morale = morale;
        self
    }

    pub fn with_ammunition(mut self, ammunition: f64) -> Self {
        self.ammunition = ammunition;
        self
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    /// Sum of every modifier on `stat`, in percent
    pub fn modifier_total(&self, stat: Stat) -> f64 {
        self.modifiers
            .iter()
            .filter(|m| m.stat == stat)
            .map(|m| m.percent)
            .sum()
    }

    pub fn modifiers_from(&self, origin: &ModifierOrigin) -> impl Iterator<Item = &Modifier> + '_ {
        let origin = origin.clone();
        self.modifiers.iter().filter(move |m| m.origin == origin)
    }

    /// Apply damage, clamping health at zero
    pub fn take_damage(&mut self, damage: f64) -> DamageReport {
        let applied = damage.max(0.0).min(self.health.max(0.0));
        self.health = (self.health - applied).max(0.0);
        DamageReport {
            damage_applied: applied,
            remaining_health: self.health,
            destroyed: self.is_destroyed(),
        }
    }

    /// Apply recovery within stat bounds; returns what actually changed
    pub fn recover(&mut self, recovery: &Recovery) -> Recovery {
        let mut applied = Recovery::default();

        if let Some(morale) = self.morale {
            let next = (morale + recovery.morale).clamp(0.0, MAX_MORALE);
            applied.morale = next - morale;
            self.morale = Some(next);
        }

        let ammo = (self.ammunition + recovery.ammunition).clamp(0.0, self.max_ammunition);
        applied.ammunition = ammo - self.ammunition;
        self.ammunition = ammo;

        let fatigue = (self.fatigue - recovery.fatigue).clamp(0.0, MAX_FATIGUE);
        applied.fatigue = self.fatigue - fatigue;
        self.fatigue = fatigue;

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infantry() -> TacticalUnit {
        TacticalUnit::new("1st Platoon", Side::Blue, UnitType::Infantry, WorldPos::ORIGIN)
    }

    #[test]
    fn test_new_unit_uses_type_defaults() {
        let unit = infantry();
        assert_eq!(unit.health, unit.max_health);
        assert_eq!(unit.morale, Some(100.0));
        assert!(!unit.is_destroyed());

        let guns = TacticalUnit::new("Battery A", Side::Blue, UnitType::FieldArtillery, WorldPos::ORIGIN);
        assert_eq!(guns.morale, None);
    }

    #[test]
    fn test_cover_factors_ordered() {
        assert!(CoverTier::Full.hit_factor() < CoverTier::Heavy.hit_factor());
        assert!(CoverTier::Heavy.hit_factor() < CoverTier::Light.hit_factor());
        assert!(CoverTier::Light.hit_factor() < CoverTier::None.hit_factor());
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut unit = infantry();
        let report = unit.take_damage(250.0);
        assert_eq!(report.damage_applied, 100.0);
        assert_eq!(report.remaining_health, 0.0);
        assert!(report.destroyed);
    }

    #[test]
    fn test_modifier_totals_by_stat() {
        let mut unit = infantry();
        let order = ModifierOrigin::Order(OrderId::new());
        unit.modifiers.push(Modifier {
            stat: Stat::Vision,
            percent: 20.0,
            origin: order.clone(),
        });
        unit.modifiers.push(Modifier {
            stat: Stat::Vision,
            percent: -5.0,
            origin: ModifierOrigin::System("night".into()),
        });
        assert_eq!(unit.modifier_total(Stat::Vision), 15.0);
        assert_eq!(unit.modifier_total(Stat::ReactionSpeed), 0.0);
        assert_eq!(unit.modifiers_from(&order).count(), 1);
    }

    #[test]
    fn test_modifiers_from_outlives_borrowed_origin() {
        let mut unit = infantry();
        unit.modifiers.push(Modifier {
            stat: Stat::DefenseOnContact,
            percent: 30.0,
            origin: ModifierOrigin::System("dug in".into()),
        });
        let from_system: Vec<&Modifier> = {
            let origin = ModifierOrigin::System("dug in".into());
            unit.modifiers_from(&origin).collect()
        };
        assert_eq!(from_system.len(), 1);
        assert_eq!(from_system[0].percent, 30.0);
    }

    #[test]
    fn test_recovery_respects_bounds() {
        let mut unit = infantry().with_morale(Some(95.0)).with_ammunition(29.0);
        unit.fatigue = 3.0;

        let applied = unit.recover(&Recovery {
            morale: 10.0,
            ammunition: 5.0,
            fatigue: 10.0,
        });

        assert_eq!(unit.morale, Some(100.0));
        assert_eq!(unit.ammunition, 30.0);
        assert_eq!(unit.fatigue, 0.0);
        assert_eq!(applied.morale, 5.0);
        assert_eq!(applied.ammunition, 1.0);
        assert_eq!(applied.fatigue, 3.0);
    }
}
