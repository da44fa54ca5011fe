mod catalog;
mod dependency;
mod language;
mod records;
mod version;

pub use self::catalog::{CatalogDomain, CatalogItem, ModelInfo, ModelType, UiKind};
pub use self::dependency::{DependencyLevel, DependencyRoot};
pub use self::language::Language;
pub use self::records::{Companion, CompanionKind, Furniture, Gear, GearModel, MonsterModel, UiEntry};
pub use self::version::Version;

/// Lowercase and strip everything but ASCII alphanumerics, so that
/// "Main Hand", "main-hand" and "MAINHAND" all compare equal.
pub(crate) fn sanitize(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_lowercase()).collect()
}
