use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::common::ListQuery;
use crate::services::database::{Document, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    #[default]
    Completed,
    Reviewed,
    Rejected,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 4] = [
        MatchStatus::Pending,
        MatchStatus::Completed,
        MatchStatus::Reviewed,
        MatchStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Completed => "completed",
            MatchStatus::Reviewed => "reviewed",
            MatchStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw)
    }

    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMatchStatusRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Records a review decision. The reviewer is stamped only when known, and
/// blank notes leave earlier review notes in place.
pub fn apply_status(
    document: &mut Document,
    status: MatchStatus,
    reviewer: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) {
    document.insert("status".to_string(), Value::from(status.as_str()));
    if let Some(reviewer) = reviewer {
        document.insert("reviewedBy".to_string(), Value::from(reviewer));
        document.insert("reviewedAt".to_string(), timestamp(now));
    }
    if let Some(notes) = notes.filter(|notes| !notes.is_empty()) {
        document.insert("reviewNotes".to_string(), Value::from(notes));
    }
}

/// Flips `isShortlisted`, stamping who shortlisted and when. Returns the new flag.
pub fn toggle_shortlist(document: &mut Document, user: Option<&str>, now: DateTime<Utc>) -> bool {
    let shortlisted = !document
        .get("isShortlisted")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    document.insert("isShortlisted".to_string(), Value::Bool(shortlisted));
    if shortlisted {
        if let Some(user) = user {
            document.insert("shortlistedBy".to_string(), Value::from(user));
        }
        document.insert("shortlistedAt".to_string(), timestamp(now));
    } else {
        document.remove("shortlistedBy");
        document.remove("shortlistedAt");
    }
    shortlisted
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFilters {
    pub job_id: Option<String>,
    pub resume_id: Option<String>,
    pub status: Option<String>,
    pub recommendation: Option<String>,
    pub min_score: Option<f64>,
}

impl MatchFilters {
    /// An unparseable or zero `minScore` applies no score bound.
    pub fn from_query(query: &ListQuery) -> Self {
        let value = |key: &str| query.get(key).map(str::to_string);
        Self {
            job_id: value("jobId"),
            resume_id: value("resumeId"),
            status: value("status"),
            recommendation: value("recommendation"),
            min_score: query
                .get("minScore")
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|score| score.is_finite() && *score != 0.0),
        }
    }

    pub fn to_filter(&self, tenant_id: &str) -> Filter {
        let filter = Filter::for_tenant(tenant_id)
            .equals_opt("jobId", self.job_id.as_deref())
            .equals_opt("resumeId", self.resume_id.as_deref())
            .equals_opt("status", self.status.as_deref())
            .equals_opt("recommendation", self.recommendation.as_deref());

        match self.min_score {
            Some(min_score) => filter.at_least("overallScore", min_score),
            None => filter,
        }
    }
}
