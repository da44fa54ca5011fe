use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// A dotted numeric version (`major.minor[.build[.revision...]]`).
///
/// Used both for the cache schema version and for the game client version.
/// Versions compare component-wise, and a different number of components
/// means a different version: `1.0` is not `1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(Vec<u32>);
impl Version {
    pub fn new(parts: impl Into<Vec<u32>>) -> Self {
        Self(parts.into())
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }
}
impl FromStr for Version {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| exn::Exn::from(ErrorKind::InvalidData("version"))))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.len() < 2 {
            exn::bail!(ErrorKind::InvalidData("version"));
        }
        Ok(Self(parts))
    }
}
impl TryFrom<String> for Version {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}
impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}
impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0.0.1.0", &[0, 0, 1, 0])]
    #[case("2024.03.27.0000.0000", &[2024, 3, 27, 0, 0])]
    #[case(" 1.2 ", &[1, 2])]
    fn test_parse(#[case] input: &str, #[case] expected: &[u32]) {
        assert_eq!(input.parse::<Version>().unwrap().parts(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("1..2")]
    #[case("1.2.x")]
    #[case("-1.0")]
    fn test_parse_invalid(#[case] input: &str) {
        let err = input.parse::<Version>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("version")));
    }

    #[test]
    fn test_component_count_matters() {
        assert_ne!("1.0".parse::<Version>().unwrap(), "1.0.0".parse::<Version>().unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::new([0, 0, 1, 0]).to_string(), "0.0.1.0");
        // Leading zeroes are not preserved, only the numeric value is.
        assert_eq!("2024.03.27".parse::<Version>().unwrap().to_string(), "2024.3.27");
    }
}
