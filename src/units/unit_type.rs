//! Unit types and their default properties

use serde::{Deserialize, Serialize};

use crate::units::constants::{
    ARMOR_MAX_RANGE, DEFAULT_MAX_RANGE, FIELD_ARTILLERY_MAX_RANGE, INFANTRY_MAX_RANGE,
};

/// Type of military unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Infantry,       // Rifles and squad weapons
    Mechanized,     // Infantry in carriers
    Armor,          // Tanks
    FieldArtillery, // Indirect fire
    Recon,          // Light, fast, scouts
    Engineer,       // Obstacles, breaching
    Headquarters,   // Command post
}

/// Default properties for a unit type
#[derive(Debug, Clone, PartialEq)]
pub struct UnitProperties {
    pub max_health: f64,
    pub firepower: f64,
    pub max_ammunition: f64,
    pub tracks_morale: bool,
}

impl UnitType {
    /// Maximum engagement range in world units
    pub fn max_range(&self) -> f64 {
        match self {
            UnitType::Armor => ARMOR_MAX_RANGE,
            UnitType::FieldArtillery => FIELD_ARTILLERY_MAX_RANGE,
            UnitType::Infantry => INFANTRY_MAX_RANGE,
            _ => DEFAULT_MAX_RANGE,
        }
    }

    /// Does this unit fire over terrain rather than along a sight line?
    pub fn fires_indirect(&self) -> bool {
        matches!(self, UnitType::FieldArtillery)
    }

    /// Get default properties for this unit type
    pub fn default_properties(&self) -> UnitProperties {
        match self {
            UnitType::Infantry => UnitProperties {
                max_health: 100.0,
                firepower: 20.0,
                max_ammunition: 30.0,
                tracks_morale: true,
            },
            UnitType::Mechanized => UnitProperties {
                max_health: 140.0,
                firepower: 30.0,
                max_ammunition: 30.0,
                tracks_morale: true,
            },
            UnitType::Armor => UnitProperties {
                max_health: 200.0,
                firepower: 60.0,
                max_ammunition: 20.0,
                tracks_morale: true,
            },
            UnitType::FieldArtillery => UnitProperties {
                max_health: 80.0,
                firepower: 80.0,
                max_ammunition: 12.0,
                tracks_morale: false,
            },
            UnitType::Recon => UnitProperties {
                max_health: 70.0,
                firepower: 12.0,
                max_ammunition: 20.0,
                tracks_morale: true,
            },
            UnitType::Engineer => UnitProperties {
                max_health: 90.0,
                firepower: 10.0,
                max_ammunition: 15.0,
                tracks_morale: true,
            },
            UnitType::Headquarters => UnitProperties {
                max_health: 60.0,
                firepower: 5.0,
                max_ammunition: 10.0,
                tracks_morale: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_ranges() {
        assert_eq!(UnitType::Armor.max_range(), 3000.0);
        assert_eq!(UnitType::FieldArtillery.max_range(), 20000.0);
        assert_eq!(UnitType::Infantry.max_range(), 500.0);
        assert_eq!(UnitType::Recon.max_range(), 1000.0);
        assert_eq!(UnitType::Headquarters.max_range(), 1000.0);
    }

    #[test]
    fn test_only_artillery_fires_indirect() {
        assert!(UnitType::FieldArtillery.fires_indirect());
        assert!(!UnitType::Armor.fires_indirect());
        assert!(!UnitType::Infantry.fires_indirect());
    }

    #[test]
    fn test_armor_outguns_infantry() {
        let armor = UnitType::Armor.default_properties();
        let infantry = UnitType::Infantry.default_properties();
        assert!(armor.firepower > infantry.firepower);
        assert!(armor.max_health > infantry.max_health);
    }
}
