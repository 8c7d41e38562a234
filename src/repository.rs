use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::errors::CvJointError;
use crate::models::{
    CurriculumVitae, CurriculumVitaeRecord, CvOptimizationRecord, CvOptimizationSummary,
    CvTransformationPlan, JobPosting, JobPostingRecord,
};

pub const RECORD_FILE: &str = "record.json";
pub const TRANSFORMATION_PLAN_FILE: &str = "transformation-plan.json";
pub const OPTIMIZED_CV_FILE: &str = "cv.json";
pub const TRANSFORMATION_PLAN_MARKDOWN: &str = "transformation-plan.md";
pub const OPTIMIZED_CV_MARKDOWN: &str = "cv.md";

const COLLECTIONS_DIR: &str = "collections";
pub const CV_OPTIMIZATIONS_DIR: &str = "cv-optimizations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    JobPostings,
    Cvs,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::JobPostings, Collection::Cvs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::JobPostings => "job-postings",
            Collection::Cvs => "cvs",
        }
    }

    pub fn json_file(&self) -> &'static str {
        match self {
            Collection::JobPostings => "job-posting.json",
            Collection::Cvs => "cv.json",
        }
    }

    pub fn markdown_file(&self) -> &'static str {
        match self {
            Collection::JobPostings => "job-posting.md",
            Collection::Cvs => "cv.md",
        }
    }

    /// `None` means every collection.
    pub fn parse_optional(name: Option<&str>) -> Result<Vec<Collection>, CvJointError> {
        match name {
            Some(name) => Ok(vec![name.parse()?]),
            None => Ok(Collection::ALL.to_vec()),
        }
    }
}

impl FromStr for Collection {
    type Err = CvJointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job-postings" => Ok(Collection::JobPostings),
            "cvs" => Ok(Collection::Cvs),
            other => Err(CvJointError::UnknownCollection(other.to_string())),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

/// Stores domain records as JSON files under `data_dir`, with one flat
/// metadata index per collection in `data_dir/collections/`.
///
/// Every save rewrites the whole index file, so two processes saving at the
/// same time can lose an update.
pub struct FileSystemRepository {
    data_dir: PathBuf,
}

impl FileSystemRepository {
    pub fn new(data_dir: &str) -> Result<Self> {
        if data_dir.trim().is_empty() {
            return Err(anyhow!("FileSystemRepository data_dir is required"));
        }
        let data_dir = expand_home(data_dir);
        let collections_dir = data_dir.join(COLLECTIONS_DIR);
        fs::create_dir_all(&collections_dir).with_context(|| {
            format!("Failed to create collections directory: {}", collections_dir.display())
        })?;
        Ok(Self { data_dir })
    }

    fn collection_file(&self, collection: Collection) -> PathBuf {
        self.data_dir
            .join(COLLECTIONS_DIR)
            .join(format!("{}.json", collection.as_str()))
    }

    fn relative_path(collection: Collection, identifier: &str) -> String {
        format!("{}/{}/{}", collection.as_str(), identifier, collection.json_file())
    }

    pub fn absolute_path(&self, collection: Collection, identifier: &str) -> PathBuf {
        self.data_dir.join(Self::relative_path(collection, identifier))
    }

    pub fn record_dir(&self, collection: Collection, identifier: &str) -> PathBuf {
        self.data_dir.join(collection.as_str()).join(identifier)
    }

    pub fn cv_optimization_dir(&self, job_posting_identifier: &str, identifier: &str) -> PathBuf {
        self.record_dir(Collection::JobPostings, job_posting_identifier)
            .join(CV_OPTIMIZATIONS_DIR)
            .join(identifier)
    }

    // --- Index helpers ---

    fn load_collection<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        let path = self.collection_file(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    fn save_collection<T: Serialize>(&self, collection: Collection, entries: &[T]) -> Result<()> {
        write_json(&self.collection_file(collection), &entries)
    }

    /// Replaces the entry with the same identifier in place, or appends.
    fn upsert_entry<T, F>(entries: &mut Vec<T>, identifier: &str, entry: T, key: F)
    where
        F: Fn(&T) -> &str,
    {
        match entries.iter().position(|item| key(item) == identifier) {
            Some(index) => entries[index] = entry,
            None => entries.push(entry),
        }
    }

    fn remove_entry<T, F>(&self, collection: Collection, identifier: &str, key: F) -> Result<bool>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> &str,
    {
        let mut entries: Vec<T> = self.load_collection(collection)?;
        let original_len = entries.len();
        entries.retain(|item| key(item) != identifier);

        if entries.len() < original_len {
            self.save_collection(collection, &entries)?;
            info!(%collection, identifier, "removed collection entry");
            return Ok(true);
        }
        Ok(false)
    }

    // --- Job postings ---

    pub fn add_job_posting(
        &self,
        job_posting: &JobPosting,
        identifier: &str,
    ) -> Result<JobPostingRecord> {
        let filepath = Self::relative_path(Collection::JobPostings, identifier);
        write_json(&self.data_dir.join(&filepath), job_posting)?;

        let mut collection: Vec<JobPostingRecord> =
            self.load_collection(Collection::JobPostings)?;
        let existing = collection.iter().find(|item| item.identifier == identifier);

        let now = Local::now();
        let record = JobPostingRecord {
            identifier: identifier.to_string(),
            filepath,
            url: job_posting.url.clone(),
            company: job_posting.company.clone(),
            title: job_posting.title.clone(),
            experience_level: job_posting.experience_level.clone(),
            created_at: existing.map(|item| item.created_at).unwrap_or(now),
            updated_at: now,
        };

        Self::upsert_entry(&mut collection, identifier, record.clone(), |item| {
            item.identifier.as_str()
        });
        self.save_collection(Collection::JobPostings, &collection)?;

        debug!(identifier, "saved job posting");
        Ok(record)
    }

    pub fn get_job_posting_record(&self, identifier: &str) -> Result<Option<JobPostingRecord>> {
        let collection: Vec<JobPostingRecord> = self.load_collection(Collection::JobPostings)?;
        Ok(collection
            .into_iter()
            .find(|item| item.identifier == identifier))
    }

    pub fn get_job_posting(&self, identifier: &str) -> Result<Option<JobPosting>> {
        match self.get_job_posting_record(identifier)? {
            Some(record) => Ok(Some(read_json(&self.data_dir.join(&record.filepath))?)),
            None => Ok(None),
        }
    }

    pub fn list_job_postings(&self) -> Result<Vec<JobPostingRecord>> {
        self.load_collection(Collection::JobPostings)
    }

    /// Drops the index entry. The JSON and markdown files stay on disk.
    pub fn remove_job_posting(&self, identifier: &str) -> Result<bool> {
        self.remove_entry(Collection::JobPostings, identifier, |item: &JobPostingRecord| {
            item.identifier.as_str()
        })
    }

    // --- CVs ---

    pub fn add_cv(&self, cv: &CurriculumVitae, identifier: &str) -> Result<CurriculumVitaeRecord> {
        let filepath = Self::relative_path(Collection::Cvs, identifier);
        write_json(&self.data_dir.join(&filepath), cv)?;

        let mut collection: Vec<CurriculumVitaeRecord> = self.load_collection(Collection::Cvs)?;
        let existing = collection.iter().find(|item| item.identifier == identifier);

        let now = Local::now();
        let record = CurriculumVitaeRecord {
            identifier: identifier.to_string(),
            filepath,
            name: cv.name.clone(),
            profession: cv.profession.clone(),
            created_at: existing.map(|item| item.created_at).unwrap_or(now),
            updated_at: now,
        };

        Self::upsert_entry(&mut collection, identifier, record.clone(), |item| {
            item.identifier.as_str()
        });
        self.save_collection(Collection::Cvs, &collection)?;

        debug!(identifier, "saved CV");
        Ok(record)
    }

    pub fn get_cv_record(&self, identifier: &str) -> Result<Option<CurriculumVitaeRecord>> {
        let collection: Vec<CurriculumVitaeRecord> = self.load_collection(Collection::Cvs)?;
        Ok(collection
            .into_iter()
            .find(|item| item.identifier == identifier))
    }

    pub fn get_cv(&self, identifier: &str) -> Result<Option<CurriculumVitae>> {
        match self.get_cv_record(identifier)? {
            Some(record) => Ok(Some(read_json(&self.data_dir.join(&record.filepath))?)),
            None => Ok(None),
        }
    }

    pub fn list_cvs(&self) -> Result<Vec<CurriculumVitaeRecord>> {
        self.load_collection(Collection::Cvs)
    }

    /// Drops the index entry. The JSON and markdown files stay on disk.
    pub fn remove_cv(&self, identifier: &str) -> Result<bool> {
        self.remove_entry(Collection::Cvs, identifier, |item: &CurriculumVitaeRecord| {
            item.identifier.as_str()
        })
    }

    // --- CV optimizations ---

    /// Writes `record.json`, which marks the optimization as saved.
    /// The transformation plan and optimized CV must already be in place;
    /// that is not checked here.
    pub fn add_cv_optimization(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
        base_cv_identifier: &str,
    ) -> Result<CvOptimizationRecord> {
        let dir = self.cv_optimization_dir(job_posting_identifier, identifier);

        let record = CvOptimizationRecord {
            identifier: identifier.to_string(),
            job_posting_identifier: job_posting_identifier.to_string(),
            base_cv_identifier: base_cv_identifier.to_string(),
            created_at: Local::now(),
        };
        write_json(&dir.join(RECORD_FILE), &record)?;

        debug!(job_posting_identifier, identifier, "saved CV optimization record");
        Ok(record)
    }

    pub fn get_cv_optimization_record(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
    ) -> Result<Option<CvOptimizationRecord>> {
        read_json_if_exists(
            &self
                .cv_optimization_dir(job_posting_identifier, identifier)
                .join(RECORD_FILE),
        )
    }

    /// Lists saved optimizations of one job posting, or of all of them.
    /// Directories without `record.json` are skipped.
    pub fn list_cv_optimizations(
        &self,
        job_posting_identifier: Option<&str>,
    ) -> Result<Vec<CvOptimizationSummary>> {
        let job_posting_dirs = match job_posting_identifier {
            Some(identifier) => vec![self.record_dir(Collection::JobPostings, identifier)],
            None => sorted_subdirs(&self.data_dir.join(Collection::JobPostings.as_str()))?,
        };

        let mut results = Vec::new();
        for job_posting_dir in job_posting_dirs {
            for dir in sorted_subdirs(&job_posting_dir.join(CV_OPTIMIZATIONS_DIR))? {
                let record_path = dir.join(RECORD_FILE);
                if !record_path.exists() {
                    continue;
                }
                let record: CvOptimizationRecord = read_json(&record_path)?;
                let plan: Option<CvTransformationPlan> =
                    read_json_if_exists(&dir.join(TRANSFORMATION_PLAN_FILE))?;

                results.push(CvOptimizationSummary {
                    job_posting_identifier: record.job_posting_identifier,
                    identifier: record.identifier,
                    base_cv_identifier: record.base_cv_identifier,
                    created_at: record.created_at,
                    job_title: plan.as_ref().map(|p| p.job_title.clone()),
                    company: plan.map(|p| p.company),
                });
            }
        }
        Ok(results)
    }

    pub fn get_cv_transformation_plan(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
    ) -> Result<Option<CvTransformationPlan>> {
        read_json_if_exists(
            &self
                .cv_optimization_dir(job_posting_identifier, identifier)
                .join(TRANSFORMATION_PLAN_FILE),
        )
    }

    pub fn get_optimized_cv(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
    ) -> Result<Option<CurriculumVitae>> {
        read_json_if_exists(
            &self
                .cv_optimization_dir(job_posting_identifier, identifier)
                .join(OPTIMIZED_CV_FILE),
        )
    }

    pub fn purge_cv_optimization(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
    ) -> Result<bool> {
        let dir = self.cv_optimization_dir(job_posting_identifier, identifier);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to delete {}", dir.display()))?;
        info!(job_posting_identifier, identifier, "purged CV optimization");
        Ok(true)
    }
}

// --- File helpers ---

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Pretty-printed with two-space indentation, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn remove_if_exists(path: &Path) -> Result<usize> {
    if !path.is_file() {
        return Ok(0);
    }
    fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))?;
    debug!(path = %path.display(), "removed markdown file");
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileSystemRepository) {
        let dir = TempDir::new().unwrap();
        let repo = FileSystemRepository::new(dir.path().to_str().unwrap()).unwrap();
        (dir, repo)
    }

    fn write_plan(repo: &FileSystemRepository, jp: &str, id: &str) {
        write_json(
            &repo.cv_optimization_dir(jp, id).join(TRANSFORMATION_PLAN_FILE),
            &fixtures::transformation_plan(),
        )
        .unwrap();
    }

    #[test]
    fn test_creates_collections_directory() {
        let (dir, _repo) = setup();
        assert!(dir.path().join("collections").is_dir());
    }

    #[test]
    fn test_rejects_empty_data_dir() {
        assert!(FileSystemRepository::new("").is_err());
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/cvjoint-data");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("cvjoint-data"));
        assert_eq!(expand_home("/tmp/data"), PathBuf::from("/tmp/data"));
    }

    #[test]
    fn test_collection_parse() {
        assert_eq!("cvs".parse::<Collection>().unwrap(), Collection::Cvs);
        assert_eq!(
            "job-postings".parse::<Collection>().unwrap(),
            Collection::JobPostings
        );
        let err = "invalid".parse::<Collection>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown collection: invalid");
        assert_eq!(Collection::parse_optional(None).unwrap().len(), 2);
    }

    #[test]
    fn test_add_and_get_job_posting_round_trips() {
        let (_dir, repo) = setup();
        let job = fixtures::job_posting();
        repo.add_job_posting(&job, "test-job").unwrap();
        assert_eq!(repo.get_job_posting("test-job").unwrap(), Some(job));
    }

    #[test]
    fn test_job_posting_stored_in_correct_location() {
        let (dir, repo) = setup();
        let record = repo.add_job_posting(&fixtures::job_posting(), "acme-swe").unwrap();
        assert_eq!(record.filepath, "job-postings/acme-swe/job-posting.json");
        assert!(dir.path().join("job-postings/acme-swe/job-posting.json").exists());
    }

    #[test]
    fn test_json_uses_two_space_indent() {
        let (dir, repo) = setup();
        repo.add_job_posting(&fixtures::job_posting(), "acme-swe").unwrap();
        let content =
            fs::read_to_string(dir.path().join("job-postings/acme-swe/job-posting.json")).unwrap();
        assert!(content.starts_with("{\n  \"url\""));
    }

    #[test]
    fn test_list_job_postings() {
        let (_dir, repo) = setup();
        let job = fixtures::job_posting();
        repo.add_job_posting(&job, "job-1").unwrap();
        repo.add_job_posting(&job, "job-2").unwrap();

        let listings = repo.list_job_postings().unwrap();
        let identifiers: Vec<&str> = listings.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["job-1", "job-2"]);
    }

    #[test]
    fn test_list_job_postings_empty() {
        let (_dir, repo) = setup();
        assert!(repo.list_job_postings().unwrap().is_empty());
    }

    #[test]
    fn test_add_job_posting_updates_existing_in_place() {
        let (_dir, repo) = setup();
        let mut job = fixtures::job_posting();
        let first = repo.add_job_posting(&job, "job-1").unwrap();
        repo.add_job_posting(&job, "job-2").unwrap();

        job.title = "Senior Software Engineer".to_string();
        let second = repo.add_job_posting(&job, "job-1").unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let listings = repo.list_job_postings().unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].identifier, "job-1");
        assert_eq!(listings[0].title, "Senior Software Engineer");
        assert_eq!(
            repo.get_job_posting("job-1").unwrap().unwrap().title,
            "Senior Software Engineer"
        );
    }

    #[test]
    fn test_remove_job_posting_keeps_file() {
        let (dir, repo) = setup();
        repo.add_job_posting(&fixtures::job_posting(), "to-delete").unwrap();

        assert!(repo.remove_job_posting("to-delete").unwrap());
        assert!(!repo.remove_job_posting("to-delete").unwrap());
        assert!(repo.get_job_posting("to-delete").unwrap().is_none());
        assert!(dir.path().join("job-postings/to-delete/job-posting.json").exists());
    }

    #[test]
    fn test_remove_nonexistent_job_posting() {
        let (_dir, repo) = setup();
        assert!(!repo.remove_job_posting("nonexistent").unwrap());
    }

    #[test]
    fn test_get_job_posting_with_malformed_file_is_error() {
        let (dir, repo) = setup();
        repo.add_job_posting(&fixtures::job_posting(), "broken").unwrap();
        fs::write(dir.path().join("job-postings/broken/job-posting.json"), "{not json").unwrap();
        assert!(repo.get_job_posting("broken").is_err());
    }

    #[test]
    fn test_add_and_get_cv_round_trips() {
        let (dir, repo) = setup();
        let cv = fixtures::cv();
        let record = repo.add_cv(&cv, "jane-doe").unwrap();
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(repo.get_cv("jane-doe").unwrap(), Some(cv));
        assert!(dir.path().join("cvs/jane-doe/cv.json").exists());
    }

    #[test]
    fn test_full_cv_round_trips_nested_fields() {
        let (dir, repo) = setup();
        let cv = fixtures::full_cv();
        repo.add_cv(&cv, "jane-full").unwrap();

        let loaded = repo.get_cv("jane-full").unwrap().unwrap();
        assert_eq!(loaded, cv);
        assert_eq!(loaded.experience[0].responsibilities.as_ref().unwrap().len(), 2);
        assert_eq!(loaded.experience[1].responsibilities, None);

        let raw: serde_json::Value = read_json(&dir.path().join("cvs/jane-full/cv.json")).unwrap();
        assert_eq!(raw["experience"][1]["responsibilities"], serde_json::Value::Null);
        assert_eq!(raw["languages"][1]["level"], "B2");
    }

    #[test]
    fn test_list_and_remove_cvs() {
        let (_dir, repo) = setup();
        let cv = fixtures::cv();
        repo.add_cv(&cv, "cv-1").unwrap();
        repo.add_cv(&cv, "cv-2").unwrap();
        assert_eq!(repo.list_cvs().unwrap().len(), 2);

        assert!(repo.remove_cv("cv-1").unwrap());
        assert!(!repo.remove_cv("cv-1").unwrap());
        assert!(repo.get_cv("cv-1").unwrap().is_none());
        assert_eq!(repo.list_cvs().unwrap().len(), 1);
    }

    #[test]
    fn test_add_cv_optimization_writes_record() {
        let (dir, repo) = setup();
        let record = repo
            .add_cv_optimization("acme-swe", "opt-123", "jane-doe-cv")
            .unwrap();
        assert_eq!(record.identifier, "opt-123");
        assert_eq!(record.base_cv_identifier, "jane-doe-cv");
        assert!(dir
            .path()
            .join("job-postings/acme-swe/cv-optimizations/opt-123/record.json")
            .exists());

        let loaded = repo
            .get_cv_optimization_record("acme-swe", "opt-123")
            .unwrap()
            .unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_get_cv_optimization_record_not_found() {
        let (_dir, repo) = setup();
        assert!(repo
            .get_cv_optimization_record("acme-swe", "missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_get_cv_transformation_plan() {
        let (_dir, repo) = setup();
        assert!(repo
            .get_cv_transformation_plan("acme-swe", "opt-123")
            .unwrap()
            .is_none());

        write_plan(&repo, "acme-swe", "opt-123");
        let plan = repo
            .get_cv_transformation_plan("acme-swe", "opt-123")
            .unwrap()
            .unwrap();
        assert_eq!(plan.job_title, "Software Engineer");
        assert_eq!(plan.company, "Acme Corp");
    }

    #[test]
    fn test_get_optimized_cv() {
        let (_dir, repo) = setup();
        assert!(repo.get_optimized_cv("acme-swe", "opt-1").unwrap().is_none());
        write_json(
            &repo.cv_optimization_dir("acme-swe", "opt-1").join(OPTIMIZED_CV_FILE),
            &fixtures::cv(),
        )
        .unwrap();
        assert_eq!(
            repo.get_optimized_cv("acme-swe", "opt-1").unwrap(),
            Some(fixtures::cv())
        );
    }

    #[test]
    fn test_list_cv_optimizations_for_job_posting() {
        let (_dir, repo) = setup();
        repo.add_cv_optimization("acme-swe", "opt-1", "cv").unwrap();
        repo.add_cv_optimization("acme-swe", "opt-2", "cv").unwrap();
        repo.add_cv_optimization("other-job", "opt-3", "cv").unwrap();

        let optimizations = repo.list_cv_optimizations(Some("acme-swe")).unwrap();
        let identifiers: Vec<&str> = optimizations.iter().map(|o| o.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["opt-1", "opt-2"]);
    }

    #[test]
    fn test_list_cv_optimizations_enriches_from_plan() {
        let (_dir, repo) = setup();
        write_plan(&repo, "acme-swe", "opt-123");
        repo.add_cv_optimization("acme-swe", "opt-123", "jane-doe-cv").unwrap();

        let optimizations = repo.list_cv_optimizations(Some("acme-swe")).unwrap();
        assert_eq!(optimizations.len(), 1);
        let opt = &optimizations[0];
        assert_eq!(opt.job_posting_identifier, "acme-swe");
        assert_eq!(opt.base_cv_identifier, "jane-doe-cv");
        assert_eq!(opt.job_title.as_deref(), Some("Software Engineer"));
        assert_eq!(opt.company.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn test_list_cv_optimizations_ignores_orphans() {
        let (_dir, repo) = setup();
        write_plan(&repo, "acme-swe", "orphan");
        assert!(repo.list_cv_optimizations(Some("acme-swe")).unwrap().is_empty());
        assert!(repo.list_cv_optimizations(None).unwrap().is_empty());
    }

    #[test]
    fn test_list_cv_optimizations_unknown_job_posting_is_empty() {
        let (_dir, repo) = setup();
        assert!(repo.list_cv_optimizations(Some("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_list_all_optimizations() {
        let (_dir, repo) = setup();
        repo.add_cv_optimization("job-1", "opt-1", "cv").unwrap();
        repo.add_cv_optimization("job-2", "opt-1", "cv").unwrap();

        let optimizations = repo.list_cv_optimizations(None).unwrap();
        let job_ids: Vec<&str> = optimizations
            .iter()
            .map(|o| o.job_posting_identifier.as_str())
            .collect();
        assert_eq!(job_ids, vec!["job-1", "job-2"]);
    }

    #[test]
    fn test_purge_cv_optimization() {
        let (_dir, repo) = setup();
        write_plan(&repo, "acme-swe", "opt-123");
        repo.add_cv_optimization("acme-swe", "opt-123", "cv").unwrap();

        assert!(repo.purge_cv_optimization("acme-swe", "opt-123").unwrap());
        assert!(!repo.cv_optimization_dir("acme-swe", "opt-123").exists());
        assert!(!repo.purge_cv_optimization("acme-swe", "opt-123").unwrap());
    }
}
