use crate::models::common::ListQuery;
use crate::services::database::Filter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterviewKitFilters {
    pub job_id: Option<String>,
    pub resume_id: Option<String>,
    pub generation_status: Option<String>,
}

impl InterviewKitFilters {
    pub fn from_query(query: &ListQuery) -> Self {
        let value = |key: &str| query.get(key).map(str::to_string);
        Self {
            job_id: value("jobId"),
            resume_id: value("resumeId"),
            generation_status: value("generationStatus"),
        }
    }

    pub fn to_filter(&self, tenant_id: &str) -> Filter {
        Filter::for_tenant(tenant_id)
            .equals_opt("jobId", self.job_id.as_deref())
            .equals_opt("resumeId", self.resume_id.as_deref())
            .equals_opt("generationStatus", self.generation_status.as_deref())
    }
}
