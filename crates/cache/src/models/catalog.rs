//! Raw catalog entries as enumerated by the catalog extractors.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use exn::OptionExt;

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// One family of catalog entries an extractor can enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogDomain {
    Equipment,
    Minions,
    Mounts,
    /// Mount ornaments, stored alongside mounts.
    Ornaments,
    Pets,
    Furniture,
    Ui(UiKind),
}
impl Display for CatalogDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Equipment => f.write_str("equipment"),
            Self::Minions => f.write_str("minions"),
            Self::Mounts => f.write_str("mounts"),
            Self::Ornaments => f.write_str("ornaments"),
            Self::Pets => f.write_str("pets"),
            Self::Furniture => f.write_str("furniture"),
            Self::Ui(kind) => write!(f, "ui/{kind}"),
        }
    }
}

/// The UI asset families that together make up the `ui` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiKind {
    Actions,
    LoadingImages,
    Maps,
    MapSymbols,
    OnlineStatus,
    Status,
    Weather,
    Uld,
}
impl UiKind {
    /// Every UI family, in population order.
    pub const ALL: [UiKind; 8] = [
        UiKind::Actions,
        UiKind::LoadingImages,
        UiKind::Maps,
        UiKind::MapSymbols,
        UiKind::OnlineStatus,
        UiKind::Status,
        UiKind::Weather,
        UiKind::Uld,
    ];
}
impl Display for UiKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            UiKind::Actions => "actions",
            UiKind::LoadingImages => "loading-images",
            UiKind::Maps => "maps",
            UiKind::MapSymbols => "map-symbols",
            UiKind::OnlineStatus => "online-status",
            UiKind::Status => "status",
            UiKind::Weather => "weather",
            UiKind::Uld => "uld",
        })
    }
}

/// Model family of a creature-like catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Monster,
    DemiHuman,
    Human,
    Equipment,
    Weapon,
}
impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Monster => "Monster",
            ModelType::DemiHuman => "DemiHuman",
            ModelType::Human => "Human",
            ModelType::Equipment => "Equipment",
            ModelType::Weapon => "Weapon",
        }
    }
}
impl FromStr for ModelType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "monster" => Self::Monster,
            "demihuman" => Self::DemiHuman,
            "human" => Self::Human,
            "equipment" => Self::Equipment,
            "weapon" => Self::Weapon,
            _ => exn::bail!(ErrorKind::InvalidData("model type")),
        })
    }
}
impl Display for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Identity of the model backing a catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelInfo {
    pub primary_id: i32,
    pub secondary_id: i32,
    pub imc_variant: i32,
    /// Gear only.
    pub is_weapon: bool,
    /// Creatures only.
    pub model_type: Option<ModelType>,
}

/// A catalog entry as enumerated (uncached) by an extractor.
///
/// Not every field is meaningful for every domain: `exd_id` and `slot` are
/// gear only, `ui_path` is UI only, and UI entries have no model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogItem {
    pub name: String,
    /// Row of the source data sheet the entry came from.
    pub exd_id: u32,
    pub primary_category: Option<String>,
    pub secondary_category: Option<String>,
    pub tertiary_category: Option<String>,
    pub icon_id: u32,
    /// Abbreviated equipment slot ("met", "top", ...).
    pub slot: Option<String>,
    pub ui_path: Option<String>,
    pub model: Option<ModelInfo>,
}
impl CatalogItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_categories(mut self, secondary: impl Into<String>, tertiary: Option<&str>) -> Self {
        self.secondary_category = Some(secondary.into());
        self.tertiary_category = tertiary.map(str::to_string);
        self
    }

    pub fn with_icon(mut self, icon_id: u32) -> Self {
        self.icon_id = icon_id;
        self
    }

    pub fn with_model(mut self, model: ModelInfo) -> Self {
        self.model = Some(model);
        self
    }

    /// Model info, required for every domain except UI.
    pub(crate) fn require_model(&self) -> Result<&ModelInfo, Error> {
        self.model.as_ref().ok_or_raise(|| ErrorKind::InvalidData("model info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Monster", ModelType::Monster)]
    #[case("demihuman", ModelType::DemiHuman)]
    #[case("Demi-Human", ModelType::DemiHuman)]
    #[case("WEAPON", ModelType::Weapon)]
    fn test_model_type_parse(#[case] input: &str, #[case] expected: ModelType) {
        assert_eq!(input.parse::<ModelType>().unwrap(), expected);
    }

    #[test]
    fn test_model_type_display_round_trips() {
        for model_type in [ModelType::Monster, ModelType::DemiHuman, ModelType::Human] {
            assert_eq!(model_type.to_string().parse::<ModelType>().unwrap(), model_type);
        }
    }

    #[test]
    fn test_domain_display() {
        assert_eq!(CatalogDomain::Mounts.to_string(), "mounts");
        assert_eq!(CatalogDomain::Ui(UiKind::MapSymbols).to_string(), "ui/map-symbols");
    }

    #[test]
    fn test_require_model() {
        let item = CatalogItem::new("Status Icon");
        assert!(matches!(&*item.require_model().unwrap_err(), ErrorKind::InvalidData("model info")));
        let item = item.with_model(ModelInfo::default());
        assert!(item.require_model().is_ok());
    }
}
