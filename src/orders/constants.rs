//! Order constants - modality modifier tables and recovery rates

use crate::units::{Recovery, Stat};

// ============================================================================
// WAIT MODALITY MODIFIERS (percent)
// ============================================================================

pub const ALERT_MODIFIERS: &[(Stat, f64)] = &[
    (Stat::Vision, 20.0),
    (Stat::ReactionSpeed, 25.0),
    (Stat::DefenseOnContact, 15.0),
    (Stat::FatigueRecovery, -10.0),
];

pub const REST_MODIFIERS: &[(Stat, f64)] = &[
    (Stat::Vision, -30.0),
    (Stat::ReactionSpeed, -40.0),
    (Stat::DefenseOnContact, -25.0),
    (Stat::FatigueRecovery, 50.0),
    (Stat::MoraleRecovery, 30.0),
];

pub const HIDDEN_MODIFIERS: &[(Stat, f64)] = &[
    (Stat::Vision, -10.0),
    (Stat::ReactionSpeed, -10.0),
    (Stat::DefenseOnContact, 30.0),
    (Stat::FatigueRecovery, 10.0),
];

// ============================================================================
// RECOVERY PER GAME MINUTE
// ============================================================================

pub const ALERT_RECOVERY: Recovery = Recovery {
    morale: 1.0,
    ammunition: 1.0,
    fatigue: 2.0,
};

pub const REST_RECOVERY: Recovery = Recovery {
    morale: 5.0,
    ammunition: 2.0,
    fatigue: 10.0,
};

pub const HIDDEN_RECOVERY: Recovery = Recovery {
    morale: 2.0,
    ammunition: 1.0,
    fatigue: 5.0,
};

// Default priority for newly created orders
pub const DEFAULT_PRIORITY: i32 = 0;
