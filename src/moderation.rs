// Moderation Gate - abuse reports, and removal past the threshold
//
// Reports are not deduplicated per reporter: every call counts.

use serde::Serialize;
use tracing::{info, warn};

use crate::character::{CharacterId, REPORT_THRESHOLD};
use crate::error::{RankingError, RankingResult};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Reported { name: String, reports: u32 },
    Deleted { name: String },
}

impl ReportOutcome {
    pub fn message(&self) -> String {
        match self {
            ReportOutcome::Reported { name, .. } => format!("{} has been reported.", name),
            ReportOutcome::Deleted { name } => format!("{} has been deleted.", name),
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ReportOutcome::Deleted { .. })
    }
}

pub async fn report_character(store: &Store, character_id: CharacterId) -> RankingResult<ReportOutcome> {
    let outcome = store
        .record_report(character_id, REPORT_THRESHOLD)
        .await?
        .ok_or_else(RankingError::character_not_found)?;

    match &outcome {
        ReportOutcome::Deleted { name } => {
            warn!(character_id, %name, "character removed after repeated reports");
        }
        ReportOutcome::Reported { reports, .. } => {
            info!(character_id, reports, "character reported");
        }
    }

    Ok(outcome)
}
