//! End-of-session summary for the result screen
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::LEGEND_SCORE;
use crate::numbers::round_f32_to_i32;
use crate::state::{EndReason, EventKind, SessionSnapshot};

/// Overall verdict on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Held out to the end with a big score
    Legend,
    /// Held out to the end
    Solid,
    /// Confidence gave out before the halfway point
    Shaken,
    /// Confidence gave out in the second half
    Rattled,
}

impl Rating {
    #[must_use]
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Legend => "The corner will remember you.",
            Self::Solid => "You held the line.",
            Self::Shaken => "You packed up early.",
            Self::Rattled => "So close to the finish.",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legend => write!(f, "legend"),
            Self::Solid => write!(f, "solid"),
            Self::Shaken => write!(f, "shaken"),
            Self::Rattled => write!(f, "rattled"),
        }
    }
}

/// Complete summary of a finished (or torn down) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub rating: Rating,
    pub headline: String,
    pub score: i64,
    pub end_reason: Option<EndReason>,
    pub seconds_survived: f32,
    pub events: Vec<EventKind>,
    pub reactions: BTreeMap<String, u32>,
    pub final_confidence: i32,
    pub sign_degradation_pct: i32,
    pub group_size: u32,
}

impl SessionResults {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let rating = rate(snapshot);
        Self {
            rating,
            headline: rating.headline().to_string(),
            score: snapshot.score,
            end_reason: snapshot.end_reason,
            seconds_survived: snapshot.elapsed(),
            events: snapshot.events_triggered.clone(),
            reactions: snapshot.reactions.clone(),
            final_confidence: round_f32_to_i32(snapshot.confidence),
            sign_degradation_pct: round_f32_to_i32(snapshot.sign_degradation * 100.0),
            group_size: snapshot.group_size,
        }
    }

    /// Total reactions recorded across every id.
    #[must_use]
    pub fn total_reactions(&self) -> u32 {
        self.reactions.values().copied().sum()
    }
}

/// A session still running (or torn down early) rates on its confidence path:
/// only a time-out counts as surviving.
fn rate(snapshot: &SessionSnapshot) -> Rating {
    match snapshot.end_reason {
        Some(EndReason::Time) if snapshot.score >= LEGEND_SCORE => Rating::Legend,
        Some(EndReason::Time) => Rating::Solid,
        _ if snapshot.elapsed() < snapshot.session_duration / 2.0 => Rating::Shaken,
        _ => Rating::Rattled,
    }
}
