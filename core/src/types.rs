//! Shared primitive types used across the toolkit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tenant identifier as stored in the dashboard database.
pub type TenantId = String;

/// The canonical run identifier.
pub type RunId = String;

/// Scenario identifiers are stable, human-readable slugs.
pub type ScenarioId = String;

/// Ad platforms the generator knows how to shape.
/// Variants are appended only; the wire names are persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    #[default]
    GoogleAds,
    Facebook,
    Instagram,
    TikTok,
    LinkedIn,
    MicrosoftAds,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::GoogleAds,
        Platform::Facebook,
        Platform::Instagram,
        Platform::TikTok,
        Platform::LinkedIn,
        Platform::MicrosoftAds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleAds    => "GoogleAds",
            Self::Facebook     => "Facebook",
            Self::Instagram    => "Instagram",
            Self::TikTok       => "TikTok",
            Self::LinkedIn     => "LinkedIn",
            Self::MicrosoftAds => "MicrosoftAds",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Accepts the wire name case-insensitively, plus the common
    /// snake/kebab spellings used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "googleads" | "google"      => Ok(Self::GoogleAds),
            "facebook" | "meta"         => Ok(Self::Facebook),
            "instagram"                 => Ok(Self::Instagram),
            "tiktok"                    => Ok(Self::TikTok),
            "linkedin"                  => Ok(Self::LinkedIn),
            "microsoftads" | "bing"     => Ok(Self::MicrosoftAds),
            _ => Err(format!("unsupported platform '{s}'")),
        }
    }
}

/// The shape a metric follows across the days of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendProfile {
    Stable,
    Growth,
    Decline,
}

impl fmt::Display for TrendProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stable  => "STABLE",
            Self::Growth  => "GROWTH",
            Self::Decline => "DECLINE",
        })
    }
}

impl FromStr for TrendProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STABLE"  => Ok(Self::Stable),
            "GROWTH"  => Ok(Self::Growth),
            "DECLINE" => Ok(Self::Decline),
            _ => Err(format!("unknown trend profile '{s}'")),
        }
    }
}
