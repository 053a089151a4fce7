//! Attack orders: fire on a hostile unit or a map point
//!
//! Validation computes distance, line of sight, hit probability and expected
//! damage once; execution spends ammunition, waits out the resolution delay,
//! rolls the hit and applies damage through the unit provider.

use serde::{Deserialize, Serialize};

use crate::core::config::CombatConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{UnitId, WorldPos};
use crate::hexgrid::line_of_sight::{self, LosReport};
use crate::hexgrid::Zone;
use crate::orders::context::{OrderContext, VisualGeometry};
use crate::orders::events::OrderEvent;
use crate::orders::order::StopListener;
use crate::units::CoverTier;

/// What is being fired on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackTarget {
    Unit(UnitId),
    Point(WorldPos),
}

/// Caller-supplied attack parameters
#[derive(Debug, Clone, Default)]
pub struct AttackParams {
    pub target: Option<AttackTarget>,
    /// `None` picks by unit type (artillery fires indirect)
    pub direct_fire: Option<bool>,
    /// Optional fire arc the target must lie in
    pub sector: Option<Zone>,
}

impl AttackParams {
    pub fn unit(target: UnitId) -> Self {
        Self {
            target: Some(AttackTarget::Unit(target)),
            ..Self::default()
        }
    }

    pub fn point(target: WorldPos) -> Self {
        Self {
            target: Some(AttackTarget::Point(target)),
            ..Self::default()
        }
    }

    pub fn direct(mut self, direct: bool) -> Self {
        self.direct_fire = Some(direct);
        self
    }

    pub fn within_sector(mut self, sector: Zone) -> Self {
        self.sector = Some(sector);
        self
    }
}

/// Result of resolving the shot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub target_unit: Option<UnitId>,
    pub roll: f64,
    pub hit: bool,
    pub damage: u32,
    pub destroyed: bool,
    pub ammunition_remaining: f64,
}

/// Attack state
#[derive(Debug, Clone, Serialize)]
pub struct AttackOrder {
    target: Option<AttackTarget>,
    direct_fire: Option<bool>,
    #[serde(skip)]
    sector: Option<Zone>,
    distance: f64,
    max_range: f64,
    used_line_of_sight: bool,
    has_line_of_sight: bool,
    los: Option<LosReport>,
    hit_probability: f64,
    estimated_damage: u32,
    realized_damage: Option<u32>,
}

impl AttackOrder {
    pub fn new(params: AttackParams) -> Self {
        Self {
            target: params.target,
            direct_fire: params.direct_fire,
            sector: params.sector,
            distance: 0.0,
            max_range: 0.0,
            used_line_of_sight: false,
            has_line_of_sight: false,
            los: None,
            hit_probability: 0.0,
            estimated_damage: 0,
            realized_damage: None,
        }
    }

    pub fn target(&self) -> Option<AttackTarget> {
        self.target
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn has_line_of_sight(&self) -> bool {
        self.has_line_of_sight
    }

    /// Whether the last validation traced a sight line (direct fire)
    pub fn used_line_of_sight(&self) -> bool {
        self.used_line_of_sight
    }

    pub fn los_report(&self) -> Option<&LosReport> {
        self.los.as_ref()
    }

    pub fn hit_probability(&self) -> f64 {
        self.hit_probability
    }

    pub fn estimated_damage(&self) -> u32 {
        self.estimated_damage
    }

    pub fn realized_damage(&self) -> Option<u32> {
        self.realized_damage
    }

    pub(crate) fn validate(&mut self, ctx: &OrderContext, unit: UnitId, messages: &mut Vec<String>) -> bool {
        let target = self.target;
        let sector = self.sector.clone();
        let direct_fire = self.direct_fire;
        *self = Self {
            target,
            direct_fire,
            sector,
            ..Self::new(AttackParams::default())
        };

        let Some(attacker) = ctx.units.snapshot(unit) else {
            messages.push("attacking unit not found".into());
            return false;
        };
        if attacker.is_destroyed() {
            messages.push("attacking unit is destroyed".into());
            return false;
        }

        let Some(target) = self.target else {
            messages.push("no target".into());
            return false;
        };
        let (target_pos, cover) = match target {
            AttackTarget::Unit(id) => {
                let Some(victim) = ctx.units.snapshot(id) else {
                    messages.push("target unit not found".into());
                    return false;
                };
                if victim.side == attacker.side {
                    messages.push("cannot attack a unit on the same side".into());
                    return false;
                }
                if victim.is_destroyed() {
                    messages.push("target is already destroyed".into());
                    return false;
                }
                (victim.position, victim.cover)
            }
            AttackTarget::Point(pos) => (pos, CoverTier::None),
        };

        if let Some(sector) = &self.sector {
            if !sector.contains_point(target_pos) {
                messages.push("target outside assigned sector".into());
                return false;
            }
        }

        self.distance = attacker.position.distance(&target_pos);
        self.max_range = ctx.units.max_range(attacker.unit_type);
        if self.distance > self.max_range {
            messages.push(format!(
                "target out of range ({:.0} > {:.0})",
                self.distance, self.max_range
            ));
            return false;
        }

        let combat = &ctx.config.combat;
        let shot = f64::from(combat.ammo_per_shot);
        if attacker.ammunition < shot {
            messages.push(format!(
                "insufficient ammunition ({:.0} available, {:.0} needed)",
                attacker.ammunition, shot
            ));
            return false;
        }

        self.used_line_of_sight = self
            .direct_fire
            .unwrap_or(!attacker.unit_type.fires_indirect());
        if self.used_line_of_sight {
            let report = {
                let grid = ctx.read_grid();
                line_of_sight::trace(&grid, attacker.position, target_pos, combat)
            };
            self.has_line_of_sight = report.clear;
            self.los = Some(report);
        } else {
            self.has_line_of_sight = true;
        }

        self.hit_probability = hit_probability(
            combat,
            self.distance,
            self.max_range,
            self.has_line_of_sight,
            cover,
            attacker.morale,
        );
        self.estimated_damage = (attacker.firepower * self.hit_probability).round() as u32;

        tracing::debug!(
            %unit,
            distance = self.distance,
            los = self.has_line_of_sight,
            p = self.hit_probability,
            "attack validated"
        );
        true
    }

    pub(crate) async fn execute(
        &mut self,
        ctx: &OrderContext,
        unit: UnitId,
        stop: &mut StopListener,
    ) -> Result<AttackOutcome> {
        let attacker = ctx.units.snapshot(unit).ok_or(TacticsError::UnitNotFound(unit))?;
        if attacker.is_destroyed() {
            return Err(TacticsError::UnitDestroyed(unit));
        }
        let target = self
            .target
            .ok_or_else(|| TacticsError::InvalidGeometry("attack has no target".into()))?;

        if let AttackTarget::Unit(id) = target {
            let victim = ctx.units.snapshot(id).ok_or(TacticsError::UnitNotFound(id))?;
            if victim.is_destroyed() {
                return Err(TacticsError::TargetDestroyed(id));
            }
        }

        let combat = &ctx.config.combat;
        let ammunition_remaining = ctx
            .units
            .consume_ammunition(unit, f64::from(combat.ammo_per_shot))?;

        let delay = combat.resolution_delay();
        if !delay.is_zero() {
            tokio::select! {
                biased;
                reason = stop.stopped() => {
                    return Err(TacticsError::Interrupted(reason.to_string()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let target_unit = match target {
            AttackTarget::Unit(id) => Some(id),
            AttackTarget::Point(pos) => ctx.occupant_at(pos),
        };
        if let Some(victim) = target_unit {
            if let Err(e) = ctx.units.set_under_fire(victim, true) {
                tracing::debug!(error = %e, "could not flag target as under fire");
            }
        }

        let roll = ctx.rng.next_unit();
        let hit = roll < self.hit_probability;
        let mut damage = 0;
        let mut destroyed = false;

        if hit {
            let jitter = (ctx.rng.next_unit() * 2.0 - 1.0) * combat.damage_jitter;
            damage = (attacker.firepower * (1.0 + jitter)).round().max(0.0) as u32;
            if let Some(victim) = target_unit {
                let report = ctx.units.apply_damage(victim, f64::from(damage))?;
                // Only the hit that takes health to zero counts as the kill
                destroyed = report.destroyed && report.damage_applied > 0.0;
                if destroyed {
                    tracing::info!(%victim, by = %unit, "unit destroyed");
                    ctx.emit(OrderEvent::UnitDestroyed { unit: victim, by: unit });
                }
            }
        }
        self.realized_damage = Some(damage);

        tracing::info!(%unit, roll, hit, damage, destroyed, "attack resolved");
        Ok(AttackOutcome {
            target_unit,
            roll,
            hit,
            damage,
            destroyed,
            ammunition_remaining,
        })
    }

    /// Fire line from the attacker to the target
    pub(crate) fn visuals(&self, ctx: &OrderContext, unit: UnitId) -> Vec<VisualGeometry> {
        let Some(from) = ctx.units.snapshot(unit).map(|u| u.position) else {
            return Vec::new();
        };
        let to = match self.target {
            Some(AttackTarget::Unit(id)) => ctx.units.snapshot(id).map(|u| u.position),
            Some(AttackTarget::Point(pos)) => Some(pos),
            None => None,
        };
        to.map(|to| vec![VisualGeometry::Line { from, to }])
            .unwrap_or_default()
    }

    pub(crate) fn summary(&self) -> String {
        let target = match self.target {
            Some(AttackTarget::Unit(id)) => id.to_string(),
            Some(AttackTarget::Point(p)) => format!("({:.0}, {:.0})", p.x, p.y),
            None => "nothing".to_string(),
        };
        match self.realized_damage {
            Some(damage) => format!("fire on {} dealt {} damage", target, damage),
            None => format!(
                "fire on {} at {:.0}m, p={:.2}, est. {} damage",
                target, self.distance, self.hit_probability, self.estimated_damage
            ),
        }
    }
}

/// Chance to hit, clamped to [0.01, 0.99]
///
/// Base probability falls off linearly to half at maximum range, then is
/// scaled by the no-LOS penalty, the target's cover and the attacker's
/// morale when it tracks morale.
pub fn hit_probability(
    config: &CombatConfig,
    distance: f64,
    max_range: f64,
    has_line_of_sight: bool,
    cover: CoverTier,
    morale: Option<f64>,
) -> f64 {
    let ratio = if max_range > 0.0 {
        (distance / max_range).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let mut p = config.base_hit_probability * (0.5 + 0.5 * (1.0 - ratio));
    if !has_line_of_sight {
        p *= config.no_los_factor;
    }
    p *= cover.hit_factor();
    if let Some(morale) = morale {
        p *= morale / 100.0;
    }
    if p.is_nan() {
        return 0.01;
    }
    p.clamp(0.01, 0.99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::config::EngineConfig;
    use crate::core::types::Side;
    use crate::hexgrid::{HexGrid, TerrainDescriptor};
    use crate::orders::context::FixedRandom;
    use crate::orders::order::OrderControl;
    use crate::units::{TacticalUnit, UnitProvider, UnitRoster, UnitType};

    fn config() -> CombatConfig {
        CombatConfig::default()
    }

    struct Range {
        ctx: OrderContext,
        roster: Arc<UnitRoster>,
        shooter: UnitId,
        target: UnitId,
    }

    fn range(shooter_type: UnitType, distance: f64, rolls: Vec<f64>) -> Range {
        let roster = Arc::new(UnitRoster::new());
        let shooter = roster.insert(TacticalUnit::new("shooter", Side::Blue, shooter_type, WorldPos::ORIGIN));
        let target = roster.insert(TacticalUnit::new(
            "target",
            Side::Red,
            UnitType::Infantry,
            WorldPos::new(distance, 0.0),
        ));
        let mut engine = EngineConfig::default();
        engine.combat.resolution_delay_ms = 0;
        let ctx = OrderContext::with_grid(HexGrid::new(100.0, WorldPos::ORIGIN), roster.clone())
            .with_rng(Arc::new(FixedRandom::new(rolls)))
            .with_config(engine);
        Range {
            ctx,
            roster,
            shooter,
            target,
        }
    }

    #[test]
    fn test_probability_point_blank_open() {
        let p = hit_probability(&config(), 0.0, 500.0, true, CoverTier::None, None);
        assert!((p - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_probability_halves_at_max_range() {
        let p = hit_probability(&config(), 500.0, 500.0, true, CoverTier::None, None);
        assert!((p - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_probability_penalties_stack() {
        let p = hit_probability(&config(), 0.0, 500.0, false, CoverTier::Heavy, Some(50.0));
        assert!((p - 0.70 * 0.3 * 0.4 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_probability_clamped() {
        let low = hit_probability(&config(), 500.0, 500.0, false, CoverTier::Full, Some(1.0));
        assert_eq!(low, 0.01);

        let mut generous = config();
        generous.base_hit_probability = 5.0;
        let high = hit_probability(&generous, 0.0, 500.0, true, CoverTier::None, None);
        assert_eq!(high, 0.99);
    }

    #[test]
    fn test_same_side_is_invalid() {
        let r = range(UnitType::Infantry, 100.0, vec![]);
        let friend = r
            .roster
            .insert(TacticalUnit::new("friend", Side::Blue, UnitType::Infantry, WorldPos::new(50.0, 0.0)));
        let mut attack = AttackOrder::new(AttackParams::unit(friend));
        let mut messages = Vec::new();
        assert!(!attack.validate(&r.ctx, r.shooter, &mut messages));
        assert!(messages[0].contains("same side"));
    }

    #[test]
    fn test_missing_target_is_invalid() {
        let r = range(UnitType::Infantry, 100.0, vec![]);
        let mut attack = AttackOrder::new(AttackParams::default());
        let mut messages = Vec::new();
        assert!(!attack.validate(&r.ctx, r.shooter, &mut messages));
        assert_eq!(messages, vec!["no target".to_string()]);
    }

    #[test]
    fn test_out_of_range_message() {
        let r = range(UnitType::Infantry, 600.0, vec![]);
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        let mut messages = Vec::new();
        assert!(!attack.validate(&r.ctx, r.shooter, &mut messages));
        assert!(messages[0].contains("out of range"));
    }

    #[test]
    fn test_empty_magazine_is_invalid() {
        let r = range(UnitType::Infantry, 100.0, vec![]);
        r.roster.with_unit(r.shooter, |u| u.ammunition = 0.0).unwrap();
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        let mut messages = Vec::new();
        assert!(!attack.validate(&r.ctx, r.shooter, &mut messages));
        assert!(messages[0].contains("insufficient ammunition"));
    }

    #[test]
    fn test_sector_excludes_target() {
        let r = range(UnitType::Infantry, 100.0, vec![]);
        // Arc facing away from the target (which sits on +x)
        let sector = Zone::sector(WorldPos::ORIGIN, 180.0, 60.0, 400.0, 8).unwrap();
        let mut attack = AttackOrder::new(AttackParams::unit(r.target).within_sector(sector));
        let mut messages = Vec::new();
        assert!(!attack.validate(&r.ctx, r.shooter, &mut messages));
        assert_eq!(messages, vec!["target outside assigned sector".to_string()]);
    }

    #[test]
    fn test_indirect_fire_ignores_buildings() {
        let r = range(UnitType::FieldArtillery, 1000.0, vec![]);
        {
            let mut grid = r.ctx.grid.write().unwrap();
            grid.materialize(
                crate::hexgrid::Bounds::new(WorldPos::new(-200.0, -200.0), WorldPos::new(1200.0, 200.0)),
                &crate::hexgrid::OpenTerrain,
            );
            for coord in grid.cells().map(|c| c.coord).collect::<Vec<_>>() {
                grid.set_terrain(coord, TerrainDescriptor::building());
            }
        }
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        let mut messages = Vec::new();
        assert!(attack.validate(&r.ctx, r.shooter, &mut messages));
        assert!(!attack.used_line_of_sight());
        assert!(attack.has_line_of_sight());
    }

    #[test]
    fn test_estimated_damage_rounds_expected_value() {
        let r = range(UnitType::Infantry, 0.0, vec![]);
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        let mut messages = Vec::new();
        assert!(attack.validate(&r.ctx, r.shooter, &mut messages));
        // Same hex falls under a zero threshold: 20 * 0.70 * 0.3
        assert!(!attack.has_line_of_sight());
        assert_eq!(attack.estimated_damage(), 4);

        let mut engine = (*r.ctx.config).clone();
        engine.combat.los_adjacent_clear = true;
        let ctx = r.ctx.clone().with_config(engine);
        assert!(attack.validate(&ctx, r.shooter, &mut messages));
        // infantry firepower 20 * p 0.70
        assert_eq!(attack.estimated_damage(), 14);
    }

    #[tokio::test]
    async fn test_hit_applies_damage() {
        // roll 0.0 hits, jitter draw 0.5 means no jitter
        let r = range(UnitType::Infantry, 100.0, vec![0.0, 0.5]);
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        assert!(attack.validate(&r.ctx, r.shooter, &mut Vec::new()));

        let control = OrderControl::new();
        let outcome = attack.execute(&r.ctx, r.shooter, &mut control.subscribe()).await.unwrap();
        assert!(outcome.hit);
        assert_eq!(outcome.damage, 20);
        assert!(!outcome.destroyed);
        assert_eq!(outcome.ammunition_remaining, 29.0);

        let victim = r.roster.snapshot(r.target).unwrap();
        assert_eq!(victim.health, 80.0);
        assert!(victim.under_fire);
    }

    #[tokio::test]
    async fn test_miss_leaves_target_untouched() {
        let r = range(UnitType::Infantry, 100.0, vec![0.99]);
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        assert!(attack.validate(&r.ctx, r.shooter, &mut Vec::new()));

        let control = OrderControl::new();
        let outcome = attack.execute(&r.ctx, r.shooter, &mut control.subscribe()).await.unwrap();
        assert!(!outcome.hit);
        assert_eq!(outcome.damage, 0);
        assert_eq!(r.roster.snapshot(r.target).unwrap().health, 100.0);
        assert_eq!(attack.realized_damage(), Some(0));
    }

    #[tokio::test]
    async fn test_point_target_hits_occupant() {
        let r = range(UnitType::Infantry, 100.0, vec![0.0, 0.5]);
        let aim = WorldPos::new(100.0, 0.0);
        {
            let mut grid = r.ctx.grid.write().unwrap();
            grid.materialize(
                crate::hexgrid::Bounds::new(WorldPos::new(-300.0, -300.0), WorldPos::new(300.0, 300.0)),
                &crate::hexgrid::OpenTerrain,
            );
            assert!(grid.set_occupant(aim, r.target));
        }

        let mut attack = AttackOrder::new(AttackParams::point(aim));
        assert!(attack.validate(&r.ctx, r.shooter, &mut Vec::new()));
        let control = OrderControl::new();
        let outcome = attack.execute(&r.ctx, r.shooter, &mut control.subscribe()).await.unwrap();
        assert_eq!(outcome.target_unit, Some(r.target));
        assert_eq!(r.roster.snapshot(r.target).unwrap().health, 80.0);
    }

    #[tokio::test]
    async fn test_dead_target_is_not_fired_on() {
        let r = range(UnitType::Infantry, 100.0, vec![0.0, 0.5]);
        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        assert!(attack.validate(&r.ctx, r.shooter, &mut Vec::new()));
        r.roster.apply_damage(r.target, 1000.0).unwrap();

        let control = OrderControl::new();
        let result = attack.execute(&r.ctx, r.shooter, &mut control.subscribe()).await;
        assert!(matches!(result, Err(TacticsError::TargetDestroyed(id)) if id == r.target));
        assert_eq!(r.roster.snapshot(r.shooter).unwrap().ammunition, 30.0);
    }

    #[tokio::test]
    async fn test_dead_occupant_is_not_killed_twice() {
        let r = range(UnitType::Infantry, 100.0, vec![0.0, 0.5]);
        let aim = WorldPos::new(150.0, 86.0);
        {
            let mut grid = r.ctx.grid.write().unwrap();
            grid.materialize(
                crate::hexgrid::Bounds::new(WorldPos::new(-300.0, -300.0), WorldPos::new(300.0, 300.0)),
                &crate::hexgrid::OpenTerrain,
            );
            assert!(grid.set_occupant(aim, r.target));
        }
        r.roster.apply_damage(r.target, 1000.0).unwrap();

        let mut attack = AttackOrder::new(AttackParams::point(aim));
        assert!(attack.validate(&r.ctx, r.shooter, &mut Vec::new()));
        let control = OrderControl::new();
        let outcome = attack.execute(&r.ctx, r.shooter, &mut control.subscribe()).await.unwrap();
        assert!(outcome.hit);
        assert_eq!(outcome.target_unit, Some(r.target));
        assert!(!outcome.destroyed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_delay_aborts() {
        let r = range(UnitType::Infantry, 100.0, vec![0.0, 0.5]);
        let mut engine = (*r.ctx.config).clone();
        engine.combat.resolution_delay_ms = 250;
        let ctx = r.ctx.clone().with_config(engine);

        let mut attack = AttackOrder::new(AttackParams::unit(r.target));
        assert!(attack.validate(&ctx, r.shooter, &mut Vec::new()));

        let control = OrderControl::new();
        control.stop(crate::orders::order::StopReason::Cancelled);
        let result = attack.execute(&ctx, r.shooter, &mut control.subscribe()).await;
        assert!(matches!(result, Err(TacticsError::Interrupted(_))));
        assert_eq!(r.roster.snapshot(r.target).unwrap().health, 100.0);
    }
}
