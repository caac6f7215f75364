use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identity of an asset or sub-asset.
///
/// Survives renames and moves; the path of an asset is just where its GUID
/// currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Accepts the plain hyphenated form as well as `{...}` braced GUIDs.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim().trim_start_matches('{').trim_end_matches('}');
        Uuid::try_parse(trimmed).map(Self).or_raise(|| ErrorKind::InvalidGuid(value.to_string()))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}
impl FromStr for Guid {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("67e55044-10b1-426f-9247-bb680e5fe0c8")]
    #[case("{67e55044-10b1-426f-9247-bb680e5fe0c8}")]
    #[case("67E55044-10B1-426F-9247-BB680E5FE0C8")]
    fn test_parse_accepts(#[case] input: &str) {
        let guid = Guid::parse(input).unwrap();
        assert_eq!(guid.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[rstest]
    #[case("")]
    #[case("Textures/stone.png")]
    #[case("67e55044-10b1-426f-9247")]
    fn test_parse_rejects(#[case] input: &str) {
        let err = Guid::parse(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidGuid(_)));
    }

    #[test]
    fn test_display_round_trips() {
        let guid = Guid::from_u128(0x67e5_5044_10b1_426f_9247_bb68_0e5f_e0c8);
        assert_eq!(guid.to_string().parse::<Guid>().unwrap(), guid);
    }

    #[test]
    fn test_serde_is_transparent() {
        let guid = Guid::from_u128(1);
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000001\"");
        assert_eq!(serde_json::from_str::<Guid>(&json).unwrap(), guid);
    }
}
