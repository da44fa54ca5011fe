//! Typed catalog records as served back out of the cache.

use super::ModelType;

/// Model identity of a piece of gear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GearModel {
    pub primary_id: i32,
    pub secondary_id: i32,
    pub imc_variant: i32,
    pub is_weapon: bool,
}

/// An equipment entry from the `items` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gear {
    pub exd_id: u32,
    pub name: String,
    /// Abbreviated slot ("met", "top", ...).
    pub slot: Option<String>,
    /// Full slot name, the gear's secondary category.
    pub slot_full: Option<String>,
    pub icon_id: u32,
    pub model: GearModel,
    /// Index (within the same listing) of the other half of a main-hand /
    /// off-hand pair that came out of the same data row.
    pub paired_with: Option<usize>,
}

/// Which creature family a [`Companion`] was listed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionKind {
    Minion,
    Mount,
    Pet,
}

/// Model identity of a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonsterModel {
    pub model_type: ModelType,
    pub primary_id: i32,
    pub secondary_id: i32,
    pub imc_variant: i32,
}

/// A minion, mount or pet from the `monsters` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion {
    pub kind: CompanionKind,
    pub name: String,
    pub category: String,
    pub model: MonsterModel,
}

/// A housing item from the `housing` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Furniture {
    pub name: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub icon_id: u32,
    pub primary_id: i32,
}

/// A UI asset from the `ui` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiEntry {
    pub name: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub path: Option<String>,
    pub icon_id: u32,
}
