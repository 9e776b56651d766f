use crate::error::{MatchError, MatchResult};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How candidate neighbours are searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatcherKind {
    /// Exhaustive comparison against every training row
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "MAT_BF"))]
    BruteForce,
    /// Best-bin-first kd-tree with a bounded number of checks
    #[cfg_attr(feature = "serde", serde(rename = "MAT_FLANN"))]
    Flann,
}

/// Which neighbours become matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectorKind {
    #[cfg_attr(feature = "serde", serde(rename = "SEL_NN"))]
    NearestNeighbor,
    /// Two nearest neighbours filtered by the distance-ratio test
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "SEL_KNN"))]
    KNearest,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::BruteForce => "MAT_BF",
            MatcherKind::Flann => "MAT_FLANN",
        }
    }
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::NearestNeighbor => "SEL_NN",
            SelectorKind::KNearest => "SEL_KNN",
        }
    }

    /// Number of neighbours retrieved per query
    pub fn k(&self) -> usize {
        match self {
            SelectorKind::NearestNeighbor => 1,
            SelectorKind::KNearest => 2,
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `MAT_BF` / `MAT_FLANN` as well as the bare `BF` / `FLANN`
impl FromStr for MatcherKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        match name.trim_start_matches("MAT_") {
            "BF" => Ok(MatcherKind::BruteForce),
            "FLANN" => Ok(MatcherKind::Flann),
            _ => Err(MatchError::UnsupportedStrategy(s.trim().to_string())),
        }
    }
}

/// Accepts `SEL_NN` / `SEL_KNN` as well as the bare `NN` / `KNN`
impl FromStr for SelectorKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        match name.trim_start_matches("SEL_") {
            "NN" => Ok(SelectorKind::NearestNeighbor),
            "KNN" => Ok(SelectorKind::KNearest),
            _ => Err(MatchError::UnsupportedStrategy(s.trim().to_string())),
        }
    }
}

/// Matching policy. The distance metric is not configurable: it follows
/// from the descriptor variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MatcherConfig {
    pub kind: MatcherKind,
    pub selector: SelectorKind,
    /// Distance ratio for the KNN test, best < ratio * second
    pub ratio: f32,
    /// Keep only mutual nearest neighbours (NN selector only)
    pub cross_check: bool,
    /// Leaf checks per query for the kd-tree search
    pub flann_checks: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            kind: MatcherKind::BruteForce,
            selector: SelectorKind::KNearest,
            ratio: 0.8,
            cross_check: false,
            flann_checks: 32,
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> MatchResult<()> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(MatchError::InvalidParameter {
                name: "matcher.ratio",
                reason: format!("{} is outside (0, 1]", self.ratio),
            });
        }
        if self.flann_checks == 0 {
            return Err(MatchError::InvalidParameter {
                name: "matcher.flann_checks",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_original_identifiers() {
        assert_eq!("MAT_BF".parse::<MatcherKind>().unwrap(), MatcherKind::BruteForce);
        assert_eq!("mat_flann".parse::<MatcherKind>().unwrap(), MatcherKind::Flann);
        assert_eq!("SEL_KNN".parse::<SelectorKind>().unwrap(), SelectorKind::KNearest);
        assert_eq!(" nn ".parse::<SelectorKind>().unwrap(), SelectorKind::NearestNeighbor);
        assert!("MAT_HASH".parse::<MatcherKind>().is_err());
        for kind in [MatcherKind::BruteForce, MatcherKind::Flann] {
            assert_eq!(kind.to_string().parse::<MatcherKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_validate_ratio_range() {
        let mut cfg = MatcherConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.ratio = 1.0;
        assert!(cfg.validate().is_ok());
        cfg.ratio = 0.0;
        assert!(cfg.validate().is_err());
        cfg.ratio = 1.2;
        assert!(matches!(cfg.validate(), Err(MatchError::InvalidParameter { name: "matcher.ratio", .. })));
    }
}
