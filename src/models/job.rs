use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::common::{
    to_document, trimmed, trimmed_opt, ListQuery, PaginatedResponse, PaginationMeta,
};
use crate::services::database::{lookup, Document, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Closed,
    Archived,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Draft,
        JobStatus::Active,
        JobStatus::Paused,
        JobStatus::Closed,
        JobStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Closed => "closed",
            JobStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw)
    }

    /// "draft, active, paused, closed, archived"
    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    #[default]
    Mid,
    Senior,
    Lead,
    Executive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Remote,
    #[default]
    Onsite,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryPeriod {
    Hourly,
    Monthly,
    #[default]
    Yearly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobLocation {
    #[serde(rename = "type", default)]
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub period: SalaryPeriod,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceYears {
    #[serde(default)]
    pub min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSkills {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub preferred: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description must be 1 to 5000 characters"
    ))]
    pub description: String,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 100, message = "Department cannot exceed 100 characters"))]
    pub department: Option<String>,
    #[serde(default)]
    pub location: JobLocation,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    pub experience_years: Option<ExperienceYears>,
    pub salary: Option<SalaryRange>,
    #[serde(default)]
    pub skills: JobSkills,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub status: JobStatus,
    pub deadline: Option<DateTime<Utc>>,
}

/// Partial job update; only the fields present in the body are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[serde(
        default,
        deserialize_with = "trimmed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description must be 1 to 5000 characters"
    ))]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "trimmed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(max = 100, message = "Department cannot exceed 100 characters"))]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<JobLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<EmploymentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<ExperienceYears>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<SalaryRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<JobSkills>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsibilities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl UpdateJobRequest {
    pub fn into_changes(self) -> Result<Document, serde_json::Error> {
        to_document(&self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

// Stored shape of a job posting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub tenant_id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub location: JobLocation,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<ExperienceYears>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<SalaryRange>,
    pub skills: JobSkills,
    pub responsibilities: Vec<String>,
    pub qualifications: Vec<String>,
    pub benefits: Vec<String>,
    pub status: JobStatus,
    pub applicants_count: u64,
    pub views_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl Job {
    pub fn from_request(request: CreateJobRequest, tenant_id: &str, now: DateTime<Utc>) -> Self {
        let expired = request.deadline.map_or(false, |deadline| deadline < now);
        let status = if expired && request.status == JobStatus::Active {
            JobStatus::Closed
        } else {
            request.status
        };

        Self {
            tenant_id: tenant_id.to_string(),
            title: request.title,
            description: request.description,
            department: request.department,
            location: request.location,
            employment_type: request.employment_type,
            experience_level: request.experience_level,
            experience_years: request.experience_years,
            salary: request.salary,
            skills: request.skills,
            responsibilities: request.responsibilities,
            qualifications: request.qualifications,
            benefits: request.benefits,
            status,
            applicants_count: 0,
            views_count: 0,
            deadline: request.deadline,
        }
    }

    pub fn into_document(self) -> Result<Document, serde_json::Error> {
        to_document(&self)
    }
}

/// True when an active job's deadline lies before `now`; such a job must be closed on save.
pub fn is_expired_active(document: &Document, now: DateTime<Utc>) -> bool {
    let active = lookup(document, "status").and_then(Value::as_str) == Some("active");
    let expired = lookup(document, "deadline")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map_or(false, |deadline| deadline.with_timezone(&Utc) < now);
    active && expired
}

/// Closes an active job whose deadline has passed. Returns true when it did.
pub fn close_if_expired(document: &mut Document, now: DateTime<Utc>) -> bool {
    if !is_expired_active(document, now) {
        return false;
    }
    document.insert(
        "status".to_string(),
        Value::from(JobStatus::Closed.as_str()),
    );
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    #[serde(rename = "_id")]
    pub status: String,
    pub count: u64,
    pub total_applicants: i64,
    pub total_views: i64,
}

// Body of `GET /api/jobs/stats/summary`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total_jobs: u64,
    pub active_jobs: u64,
    pub status_breakdown: Vec<StatusBreakdown>,
    pub total_applicants: i64,
    pub total_views: i64,
}

impl JobStats {
    /// Aggregates one tenant's jobs. Breakdown entries appear in first-seen order.
    pub fn from_documents(jobs: &[Document]) -> Self {
        let mut stats = Self::default();

        for job in jobs {
            let status = lookup(job, "status")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let applicants = lookup(job, "applicantsCount")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let views = lookup(job, "viewsCount").and_then(Value::as_i64).unwrap_or(0);

            stats.total_jobs += 1;
            if status == JobStatus::Active.as_str() {
                stats.active_jobs += 1;
            }
            stats.total_applicants = stats.total_applicants.saturating_add(applicants);
            stats.total_views = stats.total_views.saturating_add(views);

            match stats
                .status_breakdown
                .iter_mut()
                .find(|entry| entry.status == status)
            {
                Some(entry) => {
                    entry.count += 1;
                    entry.total_applicants = entry.total_applicants.saturating_add(applicants);
                    entry.total_views = entry.total_views.saturating_add(views);
                }
                None => stats.status_breakdown.push(StatusBreakdown {
                    status: status.to_string(),
                    count: 1,
                    total_applicants: applicants,
                    total_views: views,
                }),
            }
        }

        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilters {
    pub status: Option<String>,
    pub employment_type: Option<String>,
    pub experience_level: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
}

impl JobFilters {
    pub fn from_query(query: &ListQuery) -> Self {
        let value = |key: &str| query.get(key).map(str::to_string);
        Self {
            status: value("status"),
            employment_type: value("employmentType"),
            experience_level: value("experienceLevel"),
            location: value("location"),
            search: value("search"),
        }
    }

    pub fn to_filter(&self, tenant_id: &str) -> Filter {
        let filter = Filter::for_tenant(tenant_id)
            .equals_opt("status", self.status.as_deref())
            .equals_opt("employmentType", self.employment_type.as_deref())
            .equals_opt("experienceLevel", self.experience_level.as_deref())
            .equals_opt("location.type", self.location.as_deref());

        match &self.search {
            Some(search) => filter.search(&["title", "description"], search),
            None => filter,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobListPagination {
    #[serde(flatten)]
    pub meta: PaginationMeta,
    /// Same value as `totalPages`, kept for dashboard consumers reading `pages`.
    pub pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobListData {
    pub jobs: Vec<Document>,
    pub pagination: JobListPagination,
}

// Body of `GET /api/jobs`
#[derive(Debug, Clone, Serialize)]
pub struct JobListResponse {
    pub success: bool,
    pub data: JobListData,
}

impl From<PaginatedResponse<Document>> for JobListResponse {
    fn from(response: PaginatedResponse<Document>) -> Self {
        let pages = response.pagination.total_pages;
        Self {
            success: response.success,
            data: JobListData {
                jobs: response.data,
                pagination: JobListPagination {
                    meta: response.pagination,
                    pages,
                },
            },
        }
    }
}
