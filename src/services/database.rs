use chrono::{SecondsFormat, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::common::{Projection, SortSpec};

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const TENANT_FIELD: &str = "tenantId";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Jobs,
    Resumes,
    Matches,
    InterviewKits,
    Notes,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Jobs,
        Collection::Resumes,
        Collection::Matches,
        Collection::InterviewKits,
        Collection::Notes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Jobs => "jobs",
            Collection::Resumes => "resumes",
            Collection::Matches => "matches",
            Collection::InterviewKits => "interview_kits",
            Collection::Notes => "notes",
        }
    }

    fn file_name(self) -> String {
        format!("{}.csv", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Value at a dotted path equals `value`.
    Equals { path: String, value: Value },
    /// Numeric value at a dotted path is `>= value`.
    AtLeast { path: String, value: f64 },
    /// Case-insensitive substring match on any of the paths.
    Search { paths: Vec<String>, needle: String },
}

impl Condition {
    fn matches(&self, document: &Document) -> bool {
        match self {
            Condition::Equals { path, value } => lookup(document, path) == Some(value),
            Condition::AtLeast { path, value } => lookup(document, path)
                .and_then(Value::as_f64)
                .map_or(false, |found| found >= *value),
            Condition::Search { paths, needle } => {
                let needle = needle.to_lowercase();
                paths.iter().any(|path| {
                    lookup(document, path)
                        .and_then(Value::as_str)
                        .map_or(false, |text| text.to_lowercase().contains(&needle))
                })
            }
        }
    }
}

/// Conjunction of conditions a document must satisfy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_id: &str) -> Self {
        Self::new().equals(TENANT_FIELD, tenant_id)
    }

    pub fn equals(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    // Adds an equality condition only when the query supplied a value
    pub fn equals_opt(self, path: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.equals(path, value),
            None => self,
        }
    }

    pub fn at_least(mut self, path: &str, value: f64) -> Self {
        self.conditions.push(Condition::AtLeast {
            path: path.to_string(),
            value,
        });
        self
    }

    pub fn search(mut self, paths: &[&str], needle: &str) -> Self {
        self.conditions.push(Condition::Search {
            paths: paths.iter().map(|path| path.to_string()).collect(),
            needle: needle.to_string(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(document))
    }
}

/// How a `find` orders, windows and trims its results.
///
/// A `limit` of zero means no limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub skip: u64,
    pub limit: u64,
    pub projection: Projection,
}

/// Resolves a dotted path such as `location.type`; JSON `null` counts as missing.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

// Missing < bool < number < string < array < object; a total order across types
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    type_rank(left)
        .cmp(&type_rank(right))
        .then_with(|| match (left, right) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => a
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&b.as_f64().unwrap_or(f64::NAN)),
            (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
            (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
            _ => Ordering::Equal,
        })
}

/// Stable single-key sort. Documents that compare equal keep their stored order.
pub fn sort_documents(documents: &mut [Document], spec: &SortSpec) {
    documents.sort_by(|a, b| {
        let ordering = compare_values(lookup(a, &spec.field), lookup(b, &spec.field));
        if spec.is_ascending() {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

pub fn project(document: Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => document,
        Projection::Fields(fields) => document
            .into_iter()
            .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|field| field == key))
            .collect(),
    }
}

pub fn new_object_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// In-place edit applied to a stored document while the store holds its lock.
pub type DocumentEdit = Box<dyn FnOnce(&mut Document) + Send>;

/// Storage operations the list pipeline and the handlers rely on.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentStore: Send + Sync {
    fn insert(&self, collection: Collection, document: Document) -> Result<Document, StoreError>;

    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    fn find_by_id(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Merges `changes` into the top level of the document and refreshes `updatedAt`.
    fn update(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Read-modify-write of one document as a single operation.
    ///
    /// `_id`, `tenantId` and `createdAt` survive whatever `edit` does, and
    /// `updatedAt` is refreshed. Returns `None` when the document is missing.
    fn modify(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        edit: DocumentEdit,
    ) -> Result<Option<Document>, StoreError>;

    fn delete(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Adds `amount` to a numeric field in place. Returns false when the document is missing.
    fn increment(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        field: &str,
        amount: i64,
    ) -> Result<bool, StoreError>;
}

/// Runs a blocking store call on the blocking thread pool.
pub async fn run_blocking<T, F>(operation: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
}

// Row layout of every collection file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRow {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "tenantId")]
    tenant_id: String,
    document: String,
}

impl StoredRow {
    fn from_document(document: &Document) -> Result<Self, StoreError> {
        let field = |name: &str| {
            document
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            id: field(ID_FIELD),
            tenant_id: field(TENANT_FIELD),
            document: serde_json::to_string(document)?,
        })
    }

    fn to_document(&self) -> Result<Document, StoreError> {
        Ok(serde_json::from_str(&self.document)?)
    }
}

/// CSV-backed document store: one file per collection under a data directory.
pub struct CsvDocumentStore {
    data_dir: PathBuf,
    file_mutex: Mutex<()>,
}

impl CsvDocumentStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::Io {
            path: data_dir.display().to_string(),
            source,
        })?;

        let store = Self {
            data_dir,
            file_mutex: Mutex::new(()),
        };

        for collection in Collection::ALL {
            let path = store.path(collection);
            if !path.exists() {
                info!("Creating new {} collection file at {}", collection.name(), path.display());
                let file = File::create(&path).map_err(|source| io_error(&path, source))?;
                let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
                writer.write_record([ID_FIELD, TENANT_FIELD, "document"])?;
                writer.flush().map_err(|source| io_error(&path, source))?;
            }
        }

        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.file_mutex.lock().map_err(|_| StoreError::Poisoned)
    }

    // Caller must hold the file lock
    fn read_rows(&self, collection: Collection) -> Result<Vec<StoredRow>, StoreError> {
        let path = self.path(collection);
        let file = File::open(&path).map_err(|source| io_error(&path, source))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut rows = Vec::new();
        for result in reader.deserialize::<StoredRow>() {
            rows.push(result?);
        }
        Ok(rows)
    }

    // Caller must hold the file lock
    fn write_rows(&self, collection: Collection, rows: &[StoredRow]) -> Result<(), StoreError> {
        let path = self.path(collection);
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([ID_FIELD, TENANT_FIELD, "document"])?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|source| io_error(&path, source))?;
        Ok(())
    }

    // Applies `edit` under the lock and rewrites the file; identity fields are restored afterwards
    fn rewrite_one<F>(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        edit: F,
    ) -> Result<Option<Document>, StoreError>
    where
        F: FnOnce(&mut Document),
    {
        let _lock = self.lock()?;
        let mut rows = self.read_rows(collection)?;

        let Some(row) = rows
            .iter_mut()
            .find(|row| row.id == id && row.tenant_id == tenant_id)
        else {
            warn!("No {} document {} to update", collection.name(), id);
            return Ok(None);
        };

        let original = row.to_document()?;
        let mut document = original.clone();
        edit(&mut document);

        for field in [ID_FIELD, TENANT_FIELD, CREATED_AT_FIELD] {
            match original.get(field) {
                Some(value) => {
                    document.insert(field.to_string(), value.clone());
                }
                None => {
                    document.remove(field);
                }
            }
        }
        document.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(now_timestamp()),
        );
        *row = StoredRow::from_document(&document)?;

        self.write_rows(collection, &rows)?;
        debug!("Updated {} document {}", collection.name(), id);
        Ok(Some(document))
    }

    fn matching_documents(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let _lock = self.lock()?;
        let mut documents = Vec::new();
        for row in self.read_rows(collection)? {
            let document = row.to_document()?;
            if filter.matches(&document) {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl DocumentStore for CsvDocumentStore {
    fn insert(&self, collection: Collection, mut document: Document) -> Result<Document, StoreError> {
        if !document.get(ID_FIELD).map_or(false, Value::is_string) {
            document.insert(ID_FIELD.to_string(), Value::String(new_object_id()));
        }
        let now = now_timestamp();
        document
            .entry(CREATED_AT_FIELD)
            .or_insert_with(|| Value::String(now.clone()));
        document
            .entry(UPDATED_AT_FIELD)
            .or_insert_with(|| Value::String(now));

        let row = StoredRow::from_document(&document)?;

        let _lock = self.lock()?;
        let path = self.path(collection);
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(&row)?;
        writer.flush().map_err(|source| io_error(&path, source))?;

        debug!("Stored {} document {}", collection.name(), row.id);
        Ok(document)
    }

    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut documents = self.matching_documents(collection, filter)?;

        if let Some(sort) = &options.sort {
            sort_documents(&mut documents, sort);
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = match options.limit {
            0 => usize::MAX,
            limit => usize::try_from(limit).unwrap_or(usize::MAX),
        };

        Ok(documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| project(document, &options.projection))
            .collect())
    }

    fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let documents = self.matching_documents(collection, filter)?;
        Ok(documents.len() as u64)
    }

    fn find_by_id(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let _lock = self.lock()?;
        self.read_rows(collection)?
            .iter()
            .find(|row| row.id == id && row.tenant_id == tenant_id)
            .map(StoredRow::to_document)
            .transpose()
    }

    fn update(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.rewrite_one(collection, tenant_id, id, |document| document.extend(changes))
    }

    fn modify(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        edit: DocumentEdit,
    ) -> Result<Option<Document>, StoreError> {
        self.rewrite_one(collection, tenant_id, id, edit)
    }

    fn delete(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let _lock = self.lock()?;
        let mut rows = self.read_rows(collection)?;

        let Some(position) = rows
            .iter()
            .position(|row| row.id == id && row.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        let removed = rows.remove(position).to_document()?;
        self.write_rows(collection, &rows)?;
        info!("Deleted {} document {}", collection.name(), id);
        Ok(Some(removed))
    }

    fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let _lock = self.lock()?;
        let rows = self.read_rows(collection)?;
        let original_len = rows.len();

        let mut kept = Vec::with_capacity(original_len);
        for row in rows {
            if !filter.matches(&row.to_document()?) {
                kept.push(row);
            }
        }

        let removed = (original_len - kept.len()) as u64;
        if removed > 0 {
            self.write_rows(collection, &kept)?;
            info!("Deleted {} {} documents", removed, collection.name());
        }
        Ok(removed)
    }

    fn increment(
        &self,
        collection: Collection,
        tenant_id: &str,
        id: &str,
        field: &str,
        amount: i64,
    ) -> Result<bool, StoreError> {
        let _lock = self.lock()?;
        let mut rows = self.read_rows(collection)?;

        let Some(row) = rows
            .iter_mut()
            .find(|row| row.id == id && row.tenant_id == tenant_id)
        else {
            return Ok(false);
        };

        let mut document = row.to_document()?;
        let current = document.get(field).and_then(Value::as_i64).unwrap_or(0);
        document.insert(field.to_string(), Value::from(current.saturating_add(amount)));
        *row = StoredRow::from_document(&document)?;

        self.write_rows(collection, &rows)?;
        Ok(true)
    }
}

// Opens the store under `data_dir`, creating missing collection files
pub fn create_database_service(
    data_dir: impl AsRef<Path>,
) -> Result<Arc<CsvDocumentStore>, StoreError> {
    CsvDocumentStore::open(data_dir).map(Arc::new)
}
