use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// CQL consistency level
///
/// Discriminants are the native protocol codes, so configuration may name a level
/// (`"LOCAL_QUORUM"`, case-insensitive) or give its code (`6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Consistency {
    Any = 0,
    #[default]
    One = 1,
    Two = 2,
    Three = 3,
    Quorum = 4,
    All = 5,
    LocalQuorum = 6,
    EachQuorum = 7,
    Serial = 8,
    LocalSerial = 9,
    LocalOne = 10,
}

impl Consistency {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::iter().find(|level| level.code() == code)
    }

    /// Parse either a level name or its numeric code
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.parse::<u8>() {
            Ok(code) => Self::from_code(code),
            Err(_) => Self::from_str(value).ok(),
        }
    }
}

#[cfg(feature = "scylla")]
impl From<Consistency> for scylla::statement::Consistency {
    fn from(level: Consistency) -> Self {
        use scylla::statement::Consistency as Driver;

        match level {
            Consistency::Any => Driver::Any,
            Consistency::One => Driver::One,
            Consistency::Two => Driver::Two,
            Consistency::Three => Driver::Three,
            Consistency::Quorum => Driver::Quorum,
            Consistency::All => Driver::All,
            Consistency::LocalQuorum => Driver::LocalQuorum,
            Consistency::EachQuorum => Driver::EachQuorum,
            Consistency::Serial => Driver::Serial,
            Consistency::LocalSerial => Driver::LocalSerial,
            Consistency::LocalOne => Driver::LocalOne,
        }
    }
}
