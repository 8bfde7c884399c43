use serde::Serialize;

use crate::aggregate::Aggregation;

/// Background color of the toolbar badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Green,
    Orange,
    Red,
    Gray,
}

impl BadgeColor {
    /// Material palette values used by the extension icon.
    pub fn hex(self) -> &'static str {
        match self {
            BadgeColor::Green => "#4CAF50",
            BadgeColor::Orange => "#FF9800",
            BadgeColor::Red => "#F44336",
            BadgeColor::Gray => "#9E9E9E",
        }
    }
}

impl std::fmt::Display for BadgeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BadgeColor::Green => write!(f, "green"),
            BadgeColor::Orange => write!(f, "orange"),
            BadgeColor::Red => write!(f, "red"),
            BadgeColor::Gray => write!(f, "gray"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeState {
    /// Count, `?` (unconfigured), `!` (fetch failed) or empty
    pub text: String,
    pub color: BadgeColor,
}

impl BadgeState {
    fn new(text: impl Into<String>, color: BadgeColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    /// State shown before the first cycle completes.
    pub fn initial() -> Self {
        Self::new("?", BadgeColor::Gray)
    }
}

/// Green for 1-3, orange for 4-8, red from 9 up. Zero shows no text.
pub fn derive(configured: bool, fetch_failed: bool, count: u64) -> BadgeState {
    if !configured {
        return BadgeState::new("?", BadgeColor::Gray);
    }
    if fetch_failed {
        return BadgeState::new("!", BadgeColor::Gray);
    }
    match count {
        0 => BadgeState::new("", BadgeColor::Green),
        1..=3 => BadgeState::new(count.to_string(), BadgeColor::Green),
        4..=8 => BadgeState::new(count.to_string(), BadgeColor::Orange),
        _ => BadgeState::new(count.to_string(), BadgeColor::Red),
    }
}

pub fn from_aggregation(aggregation: &Aggregation) -> BadgeState {
    derive(aggregation.configured, aggregation.failed, aggregation.total_count)
}
