use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::common::{to_document, trimmed, trimmed_opt, ListQuery};
use crate::services::database::{Collection, Document, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteType {
    #[default]
    General,
    Interview,
    Screening,
    Feedback,
    FollowUp,
}

/// Kind of record a note is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedType {
    Job,
    Resume,
    Match,
}

impl RelatedType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelatedType::Job => "job",
            RelatedType::Resume => "resume",
            RelatedType::Match => "match",
        }
    }

    pub fn collection(self) -> Collection {
        match self {
            RelatedType::Job => Collection::Jobs,
            RelatedType::Resume => Collection::Resumes,
            RelatedType::Match => Collection::Matches,
        }
    }

    // Model name stored next to the id, e.g. "Resume"
    pub fn model_name(self) -> &'static str {
        match self {
            RelatedType::Job => "Job",
            RelatedType::Resume => "Resume",
            RelatedType::Match => "Match",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedToRequest {
    #[serde(rename = "type")]
    pub related_type: RelatedType,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub related_to: RelatedToRequest,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 2000, message = "Content must be 1 to 2000 characters"))]
    pub content: String,
    #[serde(default, rename = "type")]
    pub note_type: NoteType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_private: bool,
}

/// Partial note update; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    #[serde(
        default,
        deserialize_with = "trimmed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(min = 1, max = 2000, message = "Content must be 1 to 2000 characters"))]
    pub content: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl UpdateNoteRequest {
    pub fn into_changes(mut self) -> Result<Document, serde_json::Error> {
        self.tags = self.tags.map(trim_tags);
        to_document(&self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedTo {
    #[serde(rename = "type")]
    pub related_type: RelatedType,
    pub id: String,
    pub model: &'static str,
}

// Stored shape of a note
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub tenant_id: String,
    pub user_id: String,
    pub related_to: RelatedTo,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub is_private: bool,
    pub metadata: NoteMetadata,
}

impl Note {
    pub fn from_request(
        request: CreateNoteRequest,
        tenant_id: &str,
        user_id: &str,
        metadata: NoteMetadata,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            related_to: RelatedTo {
                related_type: request.related_to.related_type,
                id: request.related_to.id,
                model: request.related_to.related_type.model_name(),
            },
            content: request.content,
            note_type: request.note_type,
            tags: trim_tags(request.tags),
            is_pinned: request.is_pinned,
            is_private: request.is_private,
            metadata,
        }
    }

    pub fn into_document(self) -> Result<Document, serde_json::Error> {
        to_document(&self)
    }
}

fn trim_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Flips `isPinned`; a note without the flag counts as unpinned.
pub fn toggle_pin(document: &mut Document) {
    let pinned = document
        .get("isPinned")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    document.insert("isPinned".to_string(), Value::Bool(!pinned));
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteFilters {
    pub note_type: Option<String>,
    pub user_id: Option<String>,
    pub related_type: Option<String>,
    pub related_id: Option<String>,
    pub is_pinned: Option<bool>,
}

impl NoteFilters {
    pub fn from_query(query: &ListQuery) -> Self {
        let value = |key: &str| query.get(key).map(str::to_string);
        Self {
            note_type: value("type"),
            user_id: value("userId"),
            related_type: value("relatedType"),
            related_id: value("relatedId"),
            // Only the literal booleans filter; anything else is ignored
            is_pinned: match query.get("isPinned") {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            },
        }
    }

    pub fn to_filter(&self, tenant_id: &str) -> Filter {
        let filter = Filter::for_tenant(tenant_id)
            .equals_opt("type", self.note_type.as_deref())
            .equals_opt("userId", self.user_id.as_deref())
            .equals_opt("relatedTo.type", self.related_type.as_deref())
            .equals_opt("relatedTo.id", self.related_id.as_deref());

        match self.is_pinned {
            Some(pinned) => filter.equals("isPinned", pinned),
            None => filter,
        }
    }
}
