use crate::models::common::ListQuery;
use crate::services::database::Filter;

// Query filters accepted by `GET /api/resumes`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeFilters {
    pub job_id: Option<String>,
    pub status: Option<String>,
    pub parsing_status: Option<String>,
    pub search: Option<String>,
}

impl ResumeFilters {
    pub fn from_query(query: &ListQuery) -> Self {
        let value = |key: &str| query.get(key).map(str::to_string);
        Self {
            job_id: value("jobId"),
            status: value("status"),
            parsing_status: value("parsingStatus"),
            search: value("search"),
        }
    }

    /// Search matches the candidate's name or email, case-insensitively.
    pub fn to_filter(&self, tenant_id: &str) -> Filter {
        let filter = Filter::for_tenant(tenant_id)
            .equals_opt("jobId", self.job_id.as_deref())
            .equals_opt("status", self.status.as_deref())
            .equals_opt("parsingStatus", self.parsing_status.as_deref());

        match &self.search {
            Some(search) => filter.search(&["personalInfo.fullName", "personalInfo.email"], search),
            None => filter,
        }
    }
}
