//! Core domain types for trip batches.

use crate::error::CleaningError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of bike used for a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BikeType {
    Classic,
    Docked,
    Electric,
}

impl BikeType {
    /// Canonical label written to the cleaned output.
    pub fn as_str(&self) -> &'static str {
        match self {
            BikeType::Classic => "classic",
            BikeType::Docked => "docked",
            BikeType::Electric => "electric",
        }
    }
}

impl FromStr for BikeType {
    type Err = CleaningError;

    /// Accepts both raw feed labels (`classic_bike`) and canonical labels
    /// (`classic`), so already-recoded batches pass through unchanged.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "classic_bike" | "classic" => Ok(BikeType::Classic),
            "docked_bike" | "docked" => Ok(BikeType::Docked),
            "electric_bike" | "electric" => Ok(BikeType::Electric),
            other => Err(CleaningError::UnknownCategory {
                column: crate::schema::RIDEABLE_TYPE.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BikeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rider cohort: annual member or casual (single-ride / day-pass) user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    Member,
    Casual,
}

impl UserType {
    /// Canonical label written to the cleaned output.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Member => "member",
            UserType::Casual => "casual",
        }
    }
}

impl FromStr for UserType {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "member" => Ok(UserType::Member),
            "casual" => Ok(UserType::Casual),
            other => Err(CleaningError::UnknownCategory {
                column: crate::schema::MEMBER_CASUAL.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
