//! Filtered listings of the catalog tables.

use tracing::instrument;

use crate::Database;
use crate::error::Result;
use crate::models::{Companion, CompanionKind, Furniture, Gear, GearModel, MonsterModel, UiEntry};
use crate::projector;
use crate::query::{Join, Predicate};
use crate::row::CacheRow;

/// Stored `monsters.category` of each creature family.
pub mod category {
    pub const MINIONS: &str = "Minions";
    pub const MOUNTS: &str = "Mounts";
    pub const ORNAMENTS: &str = "Ornaments";
    pub const PETS: &str = "Pets";
}

/// Gear names carry these markers when one data row yields both weapon halves.
const MAIN_HAND_MARKER: &str = "Main Hand";
const OFF_HAND_MARKER: &str = "Off Hand";

fn name_filter(substring: Option<&str>) -> Option<Predicate> {
    substring.map(|substring| Predicate::contains("name", substring))
}

/// Read-only access to the catalog tables of one store.
#[derive(Clone, Copy)]
pub struct Catalog<'a> {
    db: &'a Database,
}
impl<'a> Catalog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Equipment, optionally filtered by a name substring.
    ///
    /// Main-hand and off-hand entries that came out of the same data row
    /// (same `exd_id`) point at each other through [`Gear::paired_with`].
    #[instrument(level = "debug", skip(self))]
    pub async fn list_gear(&self, substring: Option<&str>) -> Result<Vec<Gear>> {
        let predicate = name_filter(substring);
        let mut gear = projector::fetch(self.db.pool(), "items", predicate.as_ref(), read_gear).await?;
        pair_weapons(&mut gear);
        Ok(gear)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list_minions(&self, substring: Option<&str>) -> Result<Vec<Companion>> {
        self.list_companions(CompanionKind::Minion, Predicate::equals("category", category::MINIONS), substring)
            .await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list_pets(&self, substring: Option<&str>) -> Result<Vec<Companion>> {
        self.list_companions(CompanionKind::Pet, Predicate::equals("category", category::PETS), substring).await
    }

    /// Mounts and ornaments, or only the given category of them.
    #[instrument(level = "debug", skip(self))]
    pub async fn list_mounts(&self, substring: Option<&str>, category: Option<&str>) -> Result<Vec<Companion>> {
        let scope = match category {
            Some(category) => Predicate::equals("category", category),
            None => Predicate::group([
                Predicate::equals("category", category::MOUNTS),
                Predicate::equals("category", category::ORNAMENTS).with_join(Join::Or),
            ]),
        };
        self.list_companions(CompanionKind::Mount, scope, substring).await
    }

    async fn list_companions(
        &self,
        kind: CompanionKind,
        scope: Predicate,
        substring: Option<&str>,
    ) -> Result<Vec<Companion>> {
        let mut predicate = Predicate::group([scope]);
        if let Some(filter) = name_filter(substring) {
            predicate.push(filter);
        }
        projector::fetch(self.db.pool(), "monsters", Some(&predicate), |row| read_companion(kind, row)).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list_furniture(&self, substring: Option<&str>) -> Result<Vec<Furniture>> {
        let predicate = name_filter(substring);
        projector::fetch(self.db.pool(), "housing", predicate.as_ref(), |row| {
            Ok(Furniture {
                name: row.require_string("name")?,
                category: row.get_string("category")?,
                subcategory: row.get_string("subcategory")?,
                icon_id: row.get_u32("icon_id")?,
                primary_id: row.get_i32("primary_id")?,
            })
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list_ui(&self, substring: Option<&str>) -> Result<Vec<UiEntry>> {
        let predicate = name_filter(substring);
        projector::fetch(self.db.pool(), "ui", predicate.as_ref(), |row| {
            Ok(UiEntry {
                name: row.require_string("name")?,
                category: row.get_string("category")?,
                subcategory: row.get_string("subcategory")?,
                path: row.get_string("path")?,
                icon_id: row.get_u32("icon_id")?,
            })
        })
        .await
    }
}

fn read_gear(row: &CacheRow<'_>) -> Result<Gear> {
    Ok(Gear {
        exd_id: row.get_u32("exd_id")?,
        name: row.require_string("name")?,
        slot: row.get_string("slot")?,
        slot_full: row.get_string("slot_full")?,
        icon_id: row.get_u32("icon_id")?,
        model: GearModel {
            primary_id: row.get_i32("primary_id")?,
            secondary_id: row.get_i32("secondary_id")?,
            imc_variant: row.get_i32("imc_variant")?,
            is_weapon: row.get_bool("is_weapon")?,
        },
        paired_with: None,
    })
}

fn read_companion(kind: CompanionKind, row: &CacheRow<'_>) -> Result<Companion> {
    Ok(Companion {
        kind,
        name: row.require_string("name")?,
        category: row.require_string("category")?,
        model: MonsterModel {
            model_type: row.require_string("model_type")?.parse()?,
            primary_id: row.get_i32("primary_id")?,
            secondary_id: row.get_i32("secondary_id")?,
            imc_variant: row.get_i32("imc_variant")?,
        },
    })
}

/// Link each main hand to the first not-yet-paired off hand of its data row.
fn pair_weapons(gear: &mut [Gear]) {
    let off_hands: Vec<usize> = (0..gear.len()).filter(|&i| gear[i].name.contains(OFF_HAND_MARKER)).collect();
    for main in 0..gear.len() {
        if !gear[main].name.contains(MAIN_HAND_MARKER) {
            continue;
        }
        let exd_id = gear[main].exd_id;
        let partner = off_hands
            .iter()
            .copied()
            .find(|&off| gear[off].exd_id == exd_id && gear[off].paired_with.is_none());
        if let Some(off) = partner {
            gear[main].paired_with = Some(off);
            gear[off].paired_with = Some(main);
        }
    }
}
