//! Core type definitions used throughout the kernel

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Simulation step counter. One step corresponds to one hour of base time.
pub type Step = u64;

/// Resource identifier (`"He3_kg"`, `"H2O_kg"`, `"shells"`, ...).
///
/// Resources form an open, configuration-defined set, so they stay strings
/// rather than a closed enum.
pub type ResourceId = String;

/// Unique identifier for agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sector enumeration. Order here is the canonical pipeline order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SectorId {
    Energy,
    Science,
    Manufacturing,
    EquipmentManufacturing,
    Transportation,
    Construction,
}

impl SectorId {
    /// All sectors in canonical order.
    pub const ALL: [SectorId; 6] = [
        SectorId::Energy,
        SectorId::Science,
        SectorId::Manufacturing,
        SectorId::EquipmentManufacturing,
        SectorId::Transportation,
        SectorId::Construction,
    ];

    /// Power-consuming sectors, i.e. everything but energy, in step order.
    pub const CONSUMERS: [SectorId; 5] = [
        SectorId::Science,
        SectorId::Manufacturing,
        SectorId::EquipmentManufacturing,
        SectorId::Transportation,
        SectorId::Construction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectorId::Energy => "energy",
            SectorId::Science => "science",
            SectorId::Manufacturing => "manufacturing",
            SectorId::EquipmentManufacturing => "equipment_manufacturing",
            SectorId::Transportation => "transportation",
            SectorId::Construction => "construction",
        }
    }

    pub fn parse(s: &str) -> Option<SectorId> {
        SectorId::ALL.iter().copied().find(|id| id.as_str() == s)
    }
}

impl std::fmt::Display for SectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Earth,
    Moon,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Earth => f.write_str("Earth"),
            Location::Moon => f.write_str("Moon"),
        }
    }
}

/// Well-known resource ids. Configuration may introduce more.
pub mod res {
    pub const H2O: &str = "H2O_kg";
    pub const H2: &str = "H2_kg";
    pub const O2: &str = "O2_kg";
    pub const REGOLITH: &str = "FeTiO3_kg";
    pub const METAL: &str = "Metal_kg";
    pub const HE3: &str = "He3_kg";
    pub const ROCKET_FUEL: &str = "rocket_fuel_kg";
    pub const SHELLS: &str = "shells";
}

/// Equipment type for a module id (`"comp_science_rover"` -> `"Science_Rover_EQ"`).
pub fn equipment_for_module(module_id: &str) -> Option<&'static str> {
    match module_id {
        "comp_science_rover" => Some("Science_Rover_EQ"),
        "comp_energy_generator" => Some("Energy_Generator_EQ"),
        "comp_habitation_module" => Some("Habitation_Module_EQ"),
        "comp_isru_robot" => Some("ISRU_Robot_EQ"),
        "comp_rocket" => Some("Rocket_EQ"),
        "comp_printing_robot" => Some("Printing_Robot_EQ"),
        "comp_assembly_robot" => Some("Assembly_Robot_EQ"),
        _ => None,
    }
}

/// Sector that receives a completed module.
pub fn sector_for_module(module_id: &str) -> SectorId {
    match module_id {
        "comp_science_rover" => SectorId::Science,
        "comp_energy_generator" => SectorId::Energy,
        "comp_isru_robot" => SectorId::Manufacturing,
        "comp_rocket" => SectorId::Transportation,
        _ => SectorId::Construction,
    }
}

/// Min/max inventory thresholds driving deficiency-based task priorities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferTarget {
    pub min: f64,
    pub max: f64,
}

impl BufferTarget {
    /// Deficiency relative to the current stock: `max(0, min - current)`.
    pub fn deficiency(&self, current: f64) -> f64 {
        (self.min - current).max(0.0)
    }
}
