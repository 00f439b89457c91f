//! Member classification used by the report filters.
//!
//! The two partner companies are told apart by the length of a rider's
//! working id: ids shorter than [`KETA_ID_MIN_LEN`] characters belong to
//! Hunger, longer ones to Keta. The rule lives here and nowhere else.

use crate::error::ReportError;
use crate::types::{Group, Member};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Working ids with at least this many characters are Keta ids.
pub const KETA_ID_MIN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Company {
    Hunger,
    Keta,
}

impl Company {
    pub fn as_str(self) -> &'static str {
        match self {
            Company::Hunger => "hunger",
            Company::Keta => "keta",
        }
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Company a working id belongs to. An empty id counts as Hunger.
pub fn company_of(working_id: &str) -> Company {
    if working_id.chars().count() < KETA_ID_MIN_LEN {
        Company::Hunger
    } else {
        Company::Keta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    All,
    Hunger,
    Keta,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::All => "all",
            FilterType::Hunger => "hunger",
            FilterType::Keta => "keta",
        }
    }

    pub fn includes(self, member: &Member) -> bool {
        match self {
            FilterType::All => true,
            FilterType::Hunger => company_of(&member.working_id) == Company::Hunger,
            FilterType::Keta => company_of(&member.working_id) == Company::Keta,
        }
    }
}

impl From<Company> for FilterType {
    fn from(c: Company) -> Self {
        match c {
            Company::Hunger => FilterType::Hunger,
            Company::Keta => FilterType::Keta,
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(FilterType::All),
            "hunger" | "categorya" | "a" => Ok(FilterType::Hunger),
            "keta" | "categoryb" | "b" => Ok(FilterType::Keta),
            other => Err(ReportError::InvalidFilter(other.to_string())),
        }
    }
}

/// What a report page currently shows: a company filter and, on housing
/// pages, a single housing (matched against the group id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub filter: FilterType,
    pub housing_id: Option<String>,
}

impl Selection {
    pub fn all() -> Self {
        Selection::default()
    }

    pub fn company(filter: FilterType) -> Self {
        Selection {
            filter,
            housing_id: None,
        }
    }

    pub fn with_housing(mut self, housing_id: impl Into<String>) -> Self {
        self.housing_id = Some(housing_id.into());
        self
    }

    pub fn is_all(&self) -> bool {
        self.filter == FilterType::All && self.housing_id.is_none()
    }

    pub fn includes(&self, group: &Group, member: &Member) -> bool {
        if let Some(h) = &self.housing_id {
            if group.group_id != *h {
                return false;
            }
        }
        self.filter.includes(member)
    }
}
