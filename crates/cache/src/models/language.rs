use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// Content language of the game client.
///
/// Catalog names are localized, so the cache must be rebuilt whenever the
/// language changes. The display name is what gets written to the `language`
/// meta entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    English,
    Japanese,
    German,
    French,
    Korean,
    Chinese,
}
impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::German => "German",
            Language::French => "French",
            Language::Korean => "Korean",
            Language::Chinese => "Chinese",
        }
    }

    /// Short code used by the client's data files.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Japanese => "ja",
            Language::German => "de",
            Language::French => "fr",
            Language::Korean => "ko",
            Language::Chinese => "chs",
        }
    }

    /// Mount ornaments haven't shipped on the Korean and Chinese clients.
    pub fn has_ornaments(&self) -> bool {
        !matches!(self, Language::Korean | Language::Chinese)
    }
}
impl FromStr for Language {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "en" | "english" => Self::English,
            "ja" | "jp" | "japanese" => Self::Japanese,
            "de" | "german" => Self::German,
            "fr" | "french" => Self::French,
            "ko" | "kr" | "korean" => Self::Korean,
            "chs" | "zh" | "cn" | "chinese" => Self::Chinese,
            _ => exn::bail!(ErrorKind::InvalidData("language")),
        })
    }
}
impl TryFrom<String> for Language {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}
impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}
impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
