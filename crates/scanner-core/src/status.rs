use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Engagement verdict. The first three are the canonical classifications;
/// `UnderReview` is what unrecognizable model output resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskStatus {
    /// 수임 불가
    Unacceptable,
    /// 안전장치 적용 시 수임 가능
    AcceptableWithSafeguards,
    /// 수임 가능
    Acceptable,
    /// 검토 중
    UnderReview,
}

const UNACCEPTABLE_MARKER: &str = "수임 불가";
const SAFEGUARDS_MARKER: &str = "안전장치";
const ACCEPTABLE_MARKER: &str = "수임 가능";

impl RiskStatus {
    pub const CANONICAL: [RiskStatus; 3] = [
        RiskStatus::Unacceptable,
        RiskStatus::AcceptableWithSafeguards,
        RiskStatus::Acceptable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Unacceptable => "수임 불가",
            RiskStatus::AcceptableWithSafeguards => "안전장치 적용 시 수임 가능",
            RiskStatus::Acceptable => "수임 가능",
            RiskStatus::UnderReview => "검토 중",
        }
    }

    /// Badge color used by report front ends.
    pub fn color(self) -> &'static str {
        match self {
            RiskStatus::Unacceptable => "#d32f2f",
            RiskStatus::AcceptableWithSafeguards => "#ed6c02",
            RiskStatus::Acceptable => "#2e7d32",
            RiskStatus::UnderReview => "#455a64",
        }
    }

    pub fn is_canonical(self) -> bool {
        self != RiskStatus::UnderReview
    }

    /// Map free-form model output onto a status. Total: never fails.
    ///
    /// An exact canonical phrase (after trimming) wins. Otherwise marker
    /// substrings are checked in priority order: unacceptable, safeguards,
    /// acceptable. "안전장치 적용 시 수임 가능" contains the acceptable marker
    /// too, which is why the safeguards check has to run first.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(exact) = Self::CANONICAL.into_iter().find(|s| s.as_str() == trimmed) {
            return exact;
        }

        if trimmed.contains(UNACCEPTABLE_MARKER) {
            RiskStatus::Unacceptable
        } else if trimmed.contains(SAFEGUARDS_MARKER) {
            RiskStatus::AcceptableWithSafeguards
        } else if trimmed.contains(ACCEPTABLE_MARKER) {
            RiskStatus::Acceptable
        } else {
            RiskStatus::UnderReview
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

impl Serialize for RiskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}
