use std::fmt;

use serde::{Deserialize, Serialize};

/// Level format version, the `major.minor` pair declared in template
/// metadata. Major must match between a session and its replay consumer;
/// minor may drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapVersion {
    pub major: i32,
    pub minor: i32,
}

impl MapVersion {
    pub fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }

    /// Parse a `major.minor` string. Malformed input keeps the default
    /// `0.0`, it is never an error.
    pub fn parse_lenient(s: &str) -> Self {
        let mut v = Self::default();
        if let Some((major, minor)) = s.trim().split_once('.')
            && let (Ok(major), Ok(minor)) = (major.parse(), minor.parse())
        {
            v.major = major;
            v.minor = minor;
        }
        v
    }

    pub fn compatible_with(&self, other: &MapVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for MapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Session outcome. `None` is live; the other three are terminal until
/// the timer is extended or the session is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    None,
    Time,
    Goal,
    Fall,
}

impl Outcome {
    pub fn to_i32(self) -> i32 {
        match self {
            Outcome::None => 0,
            Outcome::Time => 1,
            Outcome::Goal => 2,
            Outcome::Fall => 3,
        }
    }

    /// Unknown values decode as `None` rather than failing the stream.
    pub fn from_i32(v: i32) -> Outcome {
        match v {
            1 => Outcome::Time,
            2 => Outcome::Goal,
            3 => Outcome::Fall,
            _ => Outcome::None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Outcome::None
    }
}

/// What an item gives the ball when picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemKind {
    /// Consumed slot, skipped by pickup tests.
    #[default]
    None,
    Coin,
    Grow,
    Shrink,
    Clock,
}

impl ItemKind {
    pub fn to_i32(self) -> i32 {
        match self {
            ItemKind::None => 0,
            ItemKind::Coin => 1,
            ItemKind::Grow => 2,
            ItemKind::Shrink => 3,
            ItemKind::Clock => 4,
        }
    }

    pub fn from_i32(v: i32) -> ItemKind {
        match v {
            1 => ItemKind::Coin,
            2 => ItemKind::Grow,
            3 => ItemKind::Shrink,
            4 => ItemKind::Clock,
            _ => ItemKind::None,
        }
    }
}

/// Result of a trigger-volume test against the ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTest {
    Outside,
    /// Fully inside; the trigger fires.
    Inside,
    /// Overlapping the boundary; nothing fires yet.
    Touch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parses_major_minor() {
        let v = MapVersion::parse_lenient("2.10");
        assert_eq!(v, MapVersion::new(2, 10));
    }

    #[test]
    fn malformed_version_keeps_default() {
        assert_eq!(MapVersion::parse_lenient(""), MapVersion::default());
        assert_eq!(MapVersion::parse_lenient("abc"), MapVersion::default());
        assert_eq!(MapVersion::parse_lenient("3"), MapVersion::default());
        assert_eq!(MapVersion::parse_lenient("3.x"), MapVersion::default());
    }

    #[test]
    fn compatibility_is_major_only() {
        let a = MapVersion::new(2, 0);
        assert!(a.compatible_with(&MapVersion::new(2, 9)));
        assert!(!a.compatible_with(&MapVersion::new(3, 0)));
    }

    #[test]
    fn outcome_codes_round_trip() {
        for o in [Outcome::None, Outcome::Time, Outcome::Goal, Outcome::Fall] {
            assert_eq!(Outcome::from_i32(o.to_i32()), o);
        }
        assert_eq!(Outcome::from_i32(99), Outcome::None);
    }

    #[test]
    fn item_kind_codes_round_trip() {
        for k in [
            ItemKind::None,
            ItemKind::Coin,
            ItemKind::Grow,
            ItemKind::Shrink,
            ItemKind::Clock,
        ] {
            assert_eq!(ItemKind::from_i32(k.to_i32()), k);
        }
        assert_eq!(ItemKind::from_i32(-1), ItemKind::None);
    }
}
