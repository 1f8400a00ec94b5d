//! Client-side sorting of already-fetched call lists

use crate::types::Call;
use crate::utils::fold_text;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Column a call list can be ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    /// Call timestamp
    #[default]
    Date,
    /// Customer display name
    CustomerName,
    /// Agent display name
    AgentName,
    /// Duration in seconds
    Duration,
    /// Satisfaction score, missing counted as zero
    SatisfactionScore,
}

impl SortColumn {
    /// Column name in the backend's call collections
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::CustomerName => "customer_name",
            Self::AgentName => "agent_name",
            Self::Duration => "duration",
            Self::SatisfactionScore => "satisfaction_score",
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Date => "date",
            Self::CustomerName => "customerName",
            Self::AgentName => "agentName",
            Self::Duration => "duration",
            Self::SatisfactionScore => "satisfactionScore",
        };
        f.write_str(name)
    }
}

impl FromStr for SortColumn {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "date" => Ok(Self::Date),
            "customerName" | "customer_name" => Ok(Self::CustomerName),
            "agentName" | "agent_name" => Ok(Self::AgentName),
            "duration" => Ok(Self::Duration),
            "satisfactionScore" | "satisfaction_score" => Ok(Self::SatisfactionScore),
            other => Err(crate::Error::validation(
                "sort",
                format!("unknown sort column '{other}'"),
            )),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

impl SortDirection {
    /// The opposite direction
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Whether this is ascending order
    #[must_use]
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::Asc)
    }

    /// Apply the direction to an ascending comparison
    #[must_use]
    pub const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_ascending() { "asc" } else { "desc" })
    }
}

/// Current sort selection of a call table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortState {
    /// Column being sorted
    pub column: SortColumn,
    /// Direction of the sort
    pub direction: SortDirection,
}

impl SortState {
    /// Ascending sort on `column`
    #[must_use]
    pub const fn ascending(column: SortColumn) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    /// Selection after the user picks `column`
    ///
    /// Picking the current column flips the direction; any other column
    /// starts ascending.
    #[must_use]
    pub fn toggle(self, column: SortColumn) -> Self {
        if self.column == column {
            Self {
                column,
                direction: self.direction.flipped(),
            }
        } else {
            Self::ascending(column)
        }
    }
}

/// Compare text the way a locale-aware collator would for plain names
fn compare_text(a: &str, b: &str) -> Ordering {
    fold_text(a).cmp(&fold_text(b)).then_with(|| a.cmp(b))
}

/// Ascending comparison of two calls on one column
#[must_use]
pub fn compare_calls(a: &Call, b: &Call, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Date => a.date.cmp(&b.date),
        SortColumn::CustomerName => compare_text(&a.customer_name, &b.customer_name),
        SortColumn::AgentName => compare_text(&a.agent_name, &b.agent_name),
        SortColumn::Duration => a.duration.total_cmp(&b.duration),
        SortColumn::SatisfactionScore => a.score_or_zero().total_cmp(&b.score_or_zero()),
    }
}

/// Stable in-place sort of a call list
pub fn sort_calls(calls: &mut [Call], state: SortState) {
    calls.sort_by(|a, b| state.direction.apply(compare_calls(a, b, state.column)));
}

/// Sorted copy of a call list
#[must_use]
pub fn sorted_calls(calls: &[Call], state: SortState) -> Vec<Call> {
    let mut out = calls.to_vec();
    sort_calls(&mut out, state);
    out
}
