use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::models::common::{
    ListQuery, PaginatedResponse, PaginationConfig, PaginationMeta, PaginationRequest, Projection,
    SortOrder, SortSelection, SortSpec, DEFAULT_SORT_FIELD,
};
use crate::services::database::{
    run_blocking, Collection, Document, DocumentStore, Filter, FindOptions,
};

/// Parses an integer the way a lenient query-string reader does.
///
/// Leading whitespace and a sign are accepted, then the leading run of ASCII
/// digits is read and anything after it is ignored (`"12abc"` is 12, `"3.9"`
/// is 3). Input without digits, and a parsed zero, both fall back to
/// `default`. Values beyond the `i64` range saturate.
pub fn parse_int_or_default(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(parse_leading_int)
        .filter(|value| *value != 0)
        .unwrap_or(default)
}

fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        seen_digit = true;
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(byte - b'0'));
    }

    seen_digit.then_some(if negative { -value } else { value })
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Derives the bounded page, limit and skip of a list request.
///
/// Never fails: `page` is at least 1 and `limit` lies in `[1, max_limit]`.
pub fn parse_pagination(query: &ListQuery, config: &PaginationConfig) -> PaginationRequest {
    let page = parse_int_or_default(query.get("page"), 1).max(1);
    let limit = parse_int_or_default(query.get("limit"), as_i64(config.default_limit))
        .max(1)
        .min(as_i64(config.max_limit));

    PaginationRequest::new(page.unsigned_abs(), limit.unsigned_abs())
}

/// Only the exact string `"asc"` sorts ascending.
pub fn normalize_sort_order(raw: Option<&str>) -> SortOrder {
    match raw {
        Some("asc") => SortOrder::Asc,
        _ => SortOrder::Desc,
    }
}

pub fn parse_sort_and_fields(query: &ListQuery) -> SortSelection {
    SortSelection {
        sort_field: query
            .get("sortBy")
            .unwrap_or(DEFAULT_SORT_FIELD)
            .to_string(),
        sort_order: normalize_sort_order(query.get("sortOrder")),
        fields: query.get("fields").map(str::to_string),
    }
}

/// Combined pagination and sorting step run ahead of every list endpoint.
pub fn parse_list_query(query: &ListQuery, config: &PaginationConfig) -> PaginationRequest {
    let selection = parse_sort_and_fields(query);

    PaginationRequest {
        sort_field: selection.sort_field,
        sort_order: selection.sort_order,
        fields: selection.fields,
        ..parse_pagination(query, config)
    }
}

pub fn build_sort_spec(sort_field: &str, sort_order: SortOrder) -> SortSpec {
    SortSpec {
        field: sort_field.to_string(),
        direction: sort_order.direction(),
    }
}

pub fn apply_field_projection(fields: Option<&str>) -> Projection {
    let names: Vec<String> = fields
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        Projection::All
    } else {
        Projection::Fields(names)
    }
}

/// Wraps one fetched page and the pre-pagination total into the list envelope.
///
/// The requested page is reported as is, even when it lies past the last page.
pub fn format_paginated_response<T>(
    records: Vec<T>,
    total: u64,
    request: &PaginationRequest,
) -> PaginatedResponse<T> {
    let page = request.page;
    let limit = request.limit;
    let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
    let has_next_page = page < total_pages;
    let has_prev_page = page > 1;

    PaginatedResponse {
        success: true,
        data: records,
        pagination: PaginationMeta {
            page,
            limit,
            total,
            total_pages,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then(|| page + 1),
            prev_page: has_prev_page.then(|| page - 1),
        },
    }
}

/// Runs the page fetch and the total count side by side, then shapes the envelope.
///
/// Store failures come back untouched; nothing is retried here.
pub async fn fetch_page(
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    filter: Filter,
    request: &PaginationRequest,
) -> Result<PaginatedResponse<Document>, StoreError> {
    let options = FindOptions {
        sort: Some(build_sort_spec(&request.sort_field, request.sort_order)),
        skip: request.skip,
        limit: request.limit,
        projection: apply_field_projection(request.fields.as_deref()),
    };

    let find_store = Arc::clone(&store);
    let find_filter = filter.clone();
    let records = run_blocking(move || find_store.find(collection, &find_filter, &options));
    let total = run_blocking(move || store.count(collection, &filter));

    let (records, total) = futures::try_join!(records, total)?;

    debug!(
        "Fetched {} of {} {} records (page={}, limit={})",
        records.len(),
        total,
        collection.name(),
        request.page,
        request.limit
    );

    Ok(format_paginated_response(records, total, request))
}
