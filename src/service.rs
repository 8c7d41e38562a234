use anyhow::{anyhow, Context, Result};
use chrono::Local;
use regex::Regex;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::analyzers::{CvAnalyzer, CvOptimizer, JobPostingAnalyzer};
use crate::errors::CvJointError;
use crate::exporter::{CvTarget, MarkdownExporter};
use crate::models::{company_is_specified, CurriculumVitae, JobPosting};
use crate::repository::{
    Collection, FileSystemRepository, OPTIMIZED_CV_FILE, TRANSFORMATION_PLAN_FILE,
};

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug pattern is valid"));
static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("separator pattern is valid"));

const OPTIMIZATION_ID_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Boundary between the user interfaces and the storage stack. Everything
/// that crosses it is plain JSON, never a domain type.
pub struct ApplicationService {
    repository: FileSystemRepository,
    exporter: MarkdownExporter,
    job_posting_analyzer: Option<Box<dyn JobPostingAnalyzer>>,
    cv_analyzer: Option<Box<dyn CvAnalyzer>>,
    cv_optimizer: Option<Box<dyn CvOptimizer>>,
}

impl ApplicationService {
    pub fn new(repository: FileSystemRepository, exporter: MarkdownExporter) -> Self {
        Self {
            repository,
            exporter,
            job_posting_analyzer: None,
            cv_analyzer: None,
            cv_optimizer: None,
        }
    }

    pub fn with_job_posting_analyzer(mut self, analyzer: Box<dyn JobPostingAnalyzer>) -> Self {
        self.job_posting_analyzer = Some(analyzer);
        self
    }

    pub fn with_cv_analyzer(mut self, analyzer: Box<dyn CvAnalyzer>) -> Self {
        self.cv_analyzer = Some(analyzer);
        self
    }

    pub fn with_cv_optimizer(mut self, optimizer: Box<dyn CvOptimizer>) -> Self {
        self.cv_optimizer = Some(optimizer);
        self
    }

    pub fn repository(&self) -> &FileSystemRepository {
        &self.repository
    }

    // --- Job postings ---

    /// Analyzes without saving. Returns the job posting and a suggested identifier.
    pub fn create_job_posting(&self, url: &str, content_file: Option<&Path>) -> Result<(Value, String)> {
        let analyzer = self
            .job_posting_analyzer
            .as_ref()
            .ok_or_else(|| anyhow!("No job posting analyzer configured"))?;
        let job_posting = analyzer.analyze(url, content_file)?;
        let identifier = generate_job_identifier(&job_posting.company, &job_posting.title);
        Ok((serde_json::to_value(&job_posting)?, identifier))
    }

    /// Persists a job posting and its markdown mirror. A taken identifier gets
    /// a `-2`, `-3`, ... suffix rather than being overwritten.
    pub fn save_job_posting(&self, job_posting_data: Value, identifier: &str) -> Result<Value> {
        let job_posting: JobPosting =
            serde_json::from_value(job_posting_data).context("Invalid job posting data")?;
        job_posting.validate()?;
        check_identifier(identifier)?;

        let identifier = next_free_identifier(identifier, |candidate| {
            Ok(self.repository.get_job_posting_record(candidate)?.is_some())
        })?;

        let record = self.repository.add_job_posting(&job_posting, &identifier)?;
        self.exporter.export_job_posting(&record, &job_posting)?;

        info!(identifier = %record.identifier, "saved job posting");
        Ok(serde_json::to_value(&record)?)
    }

    /// Regenerates the markdown mirror on the way out if it was deleted.
    pub fn get_job_posting(&self, identifier: &str) -> Result<Option<Value>> {
        let Some(record) = self.repository.get_job_posting_record(identifier)? else {
            return Ok(None);
        };
        let Some(job_posting) = self.repository.get_job_posting(identifier)? else {
            return Ok(None);
        };
        self.exporter.ensure_job_posting(&record, &job_posting)?;
        Ok(Some(serde_json::to_value(&job_posting)?))
    }

    pub fn get_job_postings(&self) -> Result<Vec<Value>> {
        to_values(&self.repository.list_job_postings()?)
    }

    pub fn remove_job_posting(&self, identifier: &str) -> Result<bool> {
        self.repository.remove_job_posting(identifier)
    }

    // --- CVs ---

    pub fn create_cv(&self, file_path: &Path) -> Result<(Value, String)> {
        let analyzer = self
            .cv_analyzer
            .as_ref()
            .ok_or_else(|| anyhow!("No CV analyzer configured"))?;
        let cv = analyzer.analyze(file_path)?;
        let identifier = generate_cv_identifier(&cv.name, &cv.profession);
        Ok((serde_json::to_value(&cv)?, identifier))
    }

    pub fn save_cv(&self, cv_data: Value, identifier: &str) -> Result<Value> {
        let cv: CurriculumVitae = serde_json::from_value(cv_data).context("Invalid CV data")?;
        cv.validate()?;
        check_identifier(identifier)?;

        let identifier = next_free_identifier(identifier, |candidate| {
            Ok(self.repository.get_cv_record(candidate)?.is_some())
        })?;

        let record = self.repository.add_cv(&cv, &identifier)?;
        self.exporter.export_cv(CvTarget::Collection(&record), &cv)?;

        info!(identifier = %record.identifier, "saved CV");
        Ok(serde_json::to_value(&record)?)
    }

    pub fn get_cv(&self, identifier: &str) -> Result<Option<Value>> {
        let Some(record) = self.repository.get_cv_record(identifier)? else {
            return Ok(None);
        };
        let Some(cv) = self.repository.get_cv(identifier)? else {
            return Ok(None);
        };
        self.exporter.ensure_cv(&record, &cv)?;
        Ok(Some(serde_json::to_value(&cv)?))
    }

    pub fn get_cvs(&self) -> Result<Vec<Value>> {
        to_values(&self.repository.list_cvs()?)
    }

    pub fn remove_cv(&self, identifier: &str) -> Result<bool> {
        self.repository.remove_cv(identifier)
    }

    /// Markdown mirror text of a stored record, regenerated first if missing.
    pub fn get_markdown(&self, collection: Collection, identifier: &str) -> Result<Option<String>> {
        let (found, path) = match collection {
            Collection::JobPostings => (
                self.get_job_posting(identifier)?.is_some(),
                self.exporter.writer().job_posting_path(identifier),
            ),
            Collection::Cvs => (
                self.get_cv(identifier)?.is_some(),
                self.exporter.writer().cv_path(identifier),
            ),
        };
        if !found {
            return Ok(None);
        }
        let markdown = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(markdown))
    }

    // --- CV optimizations ---

    /// Runs the optimizer into a fresh, date-named optimization directory.
    /// The result is not listed until `save_cv_optimization` writes its record.
    pub fn create_cv_optimization(&self, job_posting_identifier: &str, cv_identifier: &str) -> Result<Value> {
        let optimizer = self
            .cv_optimizer
            .as_ref()
            .ok_or_else(|| anyhow!("No CV optimizer configured"))?;

        if self.repository.get_job_posting_record(job_posting_identifier)?.is_none() {
            return Err(anyhow!("Job posting '{}' not found", job_posting_identifier));
        }
        if self.repository.get_cv_record(cv_identifier)?.is_none() {
            return Err(anyhow!("CV '{}' not found", cv_identifier));
        }

        let base = Local::now().format(OPTIMIZATION_ID_FORMAT).to_string();
        let identifier = next_free_identifier(&base, |candidate| {
            Ok(self
                .repository
                .cv_optimization_dir(job_posting_identifier, candidate)
                .exists())
        })?;

        let output_directory = self
            .repository
            .cv_optimization_dir(job_posting_identifier, &identifier);
        fs::create_dir_all(&output_directory).with_context(|| {
            format!("Failed to create directory {}", output_directory.display())
        })?;

        info!(job_posting_identifier, cv_identifier, identifier = %identifier, "running CV optimization");
        optimizer.optimize(
            &self.repository.absolute_path(Collection::Cvs, cv_identifier),
            &self
                .repository
                .absolute_path(Collection::JobPostings, job_posting_identifier),
            &output_directory,
        )?;

        let plan = self
            .repository
            .get_cv_transformation_plan(job_posting_identifier, &identifier)?
            .ok_or_else(|| incomplete(job_posting_identifier, &identifier, TRANSFORMATION_PLAN_FILE))?;
        let cv = self
            .repository
            .get_optimized_cv(job_posting_identifier, &identifier)?
            .ok_or_else(|| incomplete(job_posting_identifier, &identifier, OPTIMIZED_CV_FILE))?;

        Ok(json!({
            "identifier": identifier,
            "job_posting_identifier": job_posting_identifier,
            "base_cv_identifier": cv_identifier,
            "transformation_plan": plan,
            "cv": cv,
        }))
    }

    /// Marks an optimization as saved and exports its markdown. Both output
    /// files must already be in the optimization directory.
    pub fn save_cv_optimization(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
        base_cv_identifier: &str,
    ) -> Result<Value> {
        check_identifier(job_posting_identifier)?;
        check_identifier(identifier)?;
        let plan = self
            .repository
            .get_cv_transformation_plan(job_posting_identifier, identifier)?
            .ok_or_else(|| incomplete(job_posting_identifier, identifier, TRANSFORMATION_PLAN_FILE))?;
        let cv = self
            .repository
            .get_optimized_cv(job_posting_identifier, identifier)?
            .ok_or_else(|| incomplete(job_posting_identifier, identifier, OPTIMIZED_CV_FILE))?;

        let record =
            self.repository
                .add_cv_optimization(job_posting_identifier, identifier, base_cv_identifier)?;
        self.exporter.export_cv(CvTarget::Optimization(&record), &cv)?;
        self.exporter.export_cv_transformation_plan(&record, &plan)?;

        info!(job_posting_identifier, identifier, "saved CV optimization");
        Ok(serde_json::to_value(&record)?)
    }

    pub fn get_cv_optimizations(&self, job_posting_identifier: Option<&str>) -> Result<Vec<Value>> {
        to_values(&self.repository.list_cv_optimizations(job_posting_identifier)?)
    }

    /// The saved record with its plan and optimized CV. Unsaved runs are not found.
    pub fn get_cv_optimization(&self, job_posting_identifier: &str, identifier: &str) -> Result<Option<Value>> {
        check_identifier(job_posting_identifier)?;
        check_identifier(identifier)?;
        let Some(record) = self
            .repository
            .get_cv_optimization_record(job_posting_identifier, identifier)?
        else {
            return Ok(None);
        };
        let plan = self
            .repository
            .get_cv_transformation_plan(job_posting_identifier, identifier)?;
        let cv = self.repository.get_optimized_cv(job_posting_identifier, identifier)?;

        let mut value = serde_json::to_value(&record)?;
        if let Value::Object(map) = &mut value {
            map.insert("transformation_plan".to_string(), serde_json::to_value(plan)?);
            map.insert("cv".to_string(), serde_json::to_value(cv)?);
        }
        Ok(Some(value))
    }

    pub fn purge_cv_optimization(&self, job_posting_identifier: &str, identifier: &str) -> Result<bool> {
        check_identifier(job_posting_identifier)?;
        check_identifier(identifier)?;
        self.repository
            .purge_cv_optimization(job_posting_identifier, identifier)
    }

    // --- Markdown maintenance ---

    pub fn regenerate_markdown(&self, collection: Option<&str>) -> Result<usize> {
        self.exporter.export(&self.repository, collection)
    }

    pub fn clear_markdown(&self, collection: Option<&str>, identifier: Option<&str>) -> Result<usize> {
        let collection = collection.map(str::parse::<Collection>).transpose()?;
        if let Some(identifier) = identifier {
            check_identifier(identifier)?;
        }
        self.exporter.writer().clear(collection, identifier)
    }
}

// --- Identifiers ---

pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = NON_SLUG_CHARS.replace_all(&lowered, "");
    let dashed = SLUG_SEPARATORS.replace_all(&cleaned, "-");
    dashed.trim_matches('-').to_string()
}

pub fn generate_job_identifier(company: &str, title: &str) -> String {
    if company_is_specified(company) {
        format!("{}-{}", slugify(company), slugify(title))
    } else {
        slugify(title)
    }
}

pub fn generate_cv_identifier(name: &str, profession: &str) -> String {
    format!("{}-{}", slugify(name), slugify(profession))
}

/// Identifiers become directory names.
fn check_identifier(identifier: &str) -> Result<(), CvJointError> {
    if identifier.trim().is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier.contains(['/', '\\'])
    {
        return Err(CvJointError::Validation(format!(
            "'{}' is not a usable identifier",
            identifier
        )));
    }
    Ok(())
}

fn next_free_identifier<F>(identifier: &str, mut taken: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    if !taken(identifier)? {
        return Ok(identifier.to_string());
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{}-{}", identifier, counter);
        if !taken(&candidate)? {
            debug!(requested = identifier, assigned = %candidate, "identifier taken, using suffix");
            return Ok(candidate);
        }
        counter += 1;
    }
}

fn incomplete(job_posting_identifier: &str, identifier: &str, missing: &'static str) -> anyhow::Error {
    CvJointError::IncompleteOptimization {
        job_posting_identifier: job_posting_identifier.to_string(),
        identifier: identifier.to_string(),
        missing,
    }
    .into()
}

fn to_values<T: serde::Serialize>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(Into::into))
        .collect()
}
