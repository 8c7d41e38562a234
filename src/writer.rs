use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::repository::{
    expand_home, remove_if_exists, sorted_subdirs, Collection, CV_OPTIMIZATIONS_DIR,
    OPTIMIZED_CV_MARKDOWN, TRANSFORMATION_PLAN_MARKDOWN,
};

/// Writes markdown mirrors next to the JSON records they were derived from.
pub struct MarkdownWriter {
    root_dir: PathBuf,
}

impl MarkdownWriter {
    pub fn new(root_dir: &str) -> Result<Self> {
        if root_dir.trim().is_empty() {
            return Err(anyhow!("MarkdownWriter root_dir is required"));
        }
        Ok(Self {
            root_dir: expand_home(root_dir),
        })
    }

    pub fn job_posting_path(&self, identifier: &str) -> PathBuf {
        self.record_path(Collection::JobPostings, identifier)
    }

    pub fn cv_path(&self, identifier: &str) -> PathBuf {
        self.record_path(Collection::Cvs, identifier)
    }

    fn record_path(&self, collection: Collection, identifier: &str) -> PathBuf {
        self.root_dir
            .join(collection.as_str())
            .join(identifier)
            .join(collection.markdown_file())
    }

    fn optimization_dir(&self, job_posting_identifier: &str, identifier: &str) -> PathBuf {
        self.root_dir
            .join(Collection::JobPostings.as_str())
            .join(job_posting_identifier)
            .join(CV_OPTIMIZATIONS_DIR)
            .join(identifier)
    }

    pub fn optimized_cv_path(&self, job_posting_identifier: &str, identifier: &str) -> PathBuf {
        self.optimization_dir(job_posting_identifier, identifier)
            .join(OPTIMIZED_CV_MARKDOWN)
    }

    pub fn transformation_plan_path(&self, job_posting_identifier: &str, identifier: &str) -> PathBuf {
        self.optimization_dir(job_posting_identifier, identifier)
            .join(TRANSFORMATION_PLAN_MARKDOWN)
    }

    pub fn write_job_posting(&self, identifier: &str, markdown: &str) -> Result<()> {
        write(&self.job_posting_path(identifier), markdown)
    }

    pub fn write_cv(&self, identifier: &str, markdown: &str) -> Result<()> {
        write(&self.cv_path(identifier), markdown)
    }

    pub fn write_optimized_cv(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
        markdown: &str,
    ) -> Result<()> {
        write(&self.optimized_cv_path(job_posting_identifier, identifier), markdown)
    }

    pub fn write_cv_transformation_plan(
        &self,
        job_posting_identifier: &str,
        identifier: &str,
        markdown: &str,
    ) -> Result<()> {
        write(
            &self.transformation_plan_path(job_posting_identifier, identifier),
            markdown,
        )
    }

    /// Deletes markdown mirrors of one record, one collection, or everything
    /// under the root, including optimization mirrors of job postings. JSON
    /// files are never touched. Returns the number of files removed.
    pub fn clear(&self, collection: Option<Collection>, identifier: Option<&str>) -> Result<usize> {
        let collections = match collection {
            Some(collection) => vec![collection],
            None => Collection::ALL.to_vec(),
        };

        let mut removed = 0;
        for collection in collections {
            let collection_dir = self.root_dir.join(collection.as_str());
            let record_dirs = match identifier {
                Some(identifier) => vec![collection_dir.join(identifier)],
                None => sorted_subdirs(&collection_dir)?,
            };

            for dir in record_dirs {
                removed += remove_if_exists(&dir.join(collection.markdown_file()))?;

                if collection == Collection::JobPostings {
                    for opt_dir in sorted_subdirs(&dir.join(CV_OPTIMIZATIONS_DIR))? {
                        removed += remove_if_exists(&opt_dir.join(TRANSFORMATION_PLAN_MARKDOWN))?;
                        removed += remove_if_exists(&opt_dir.join(OPTIMIZED_CV_MARKDOWN))?;
                    }
                }
            }
        }

        info!(removed, root = %self.root_dir.display(), "cleared markdown files");
        Ok(removed)
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), "wrote markdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_requires_root_dir() {
        assert!(MarkdownWriter::new("").is_err());
    }

    #[test]
    fn test_writes_to_layout_paths() {
        let dir = TempDir::new().unwrap();
        let writer = MarkdownWriter::new(dir.path().to_str().unwrap()).unwrap();

        writer.write_job_posting("acme-swe", "# Job").unwrap();
        writer.write_cv("jane", "# Jane").unwrap();
        writer.write_optimized_cv("acme-swe", "opt-1", "# Jane v2").unwrap();
        writer
            .write_cv_transformation_plan("acme-swe", "opt-1", "# Plan")
            .unwrap();

        let root = dir.path();
        assert_eq!(
            fs::read_to_string(root.join("job-postings/acme-swe/job-posting.md")).unwrap(),
            "# Job"
        );
        assert!(root.join("cvs/jane/cv.md").exists());
        assert!(root
            .join("job-postings/acme-swe/cv-optimizations/opt-1/cv.md")
            .exists());
        assert!(root
            .join("job-postings/acme-swe/cv-optimizations/opt-1/transformation-plan.md")
            .exists());
    }

    #[test]
    fn test_clear_markdown_keeps_json() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let writer = MarkdownWriter::new(root.to_str().unwrap()).unwrap();
        writer.write_job_posting("job-1", "# Job").unwrap();
        writer.write_cv("cv-1", "# CV").unwrap();
        writer.write_cv_transformation_plan("job-1", "opt-1", "# Plan").unwrap();
        fs::write(root.join("cvs/cv-1/cv.json"), "{}").unwrap();

        assert_eq!(writer.clear(Some(Collection::Cvs), None).unwrap(), 1);
        assert!(writer.job_posting_path("job-1").exists());
        assert!(root.join("cvs/cv-1/cv.json").exists());

        assert_eq!(writer.clear(None, None).unwrap(), 2);
        assert!(!writer.transformation_plan_path("job-1", "opt-1").exists());
        assert_eq!(writer.clear(None, None).unwrap(), 0);
    }

    #[test]
    fn test_clear_markdown_single_identifier() {
        let dir = TempDir::new().unwrap();
        let writer = MarkdownWriter::new(dir.path().to_str().unwrap()).unwrap();
        writer.write_job_posting("job-1", "# Job").unwrap();
        writer.write_job_posting("job-2", "# Job").unwrap();

        let removed = writer.clear(Some(Collection::JobPostings), Some("job-1")).unwrap();
        assert_eq!(removed, 1);
        assert!(!writer.job_posting_path("job-1").exists());
        assert!(writer.job_posting_path("job-2").exists());
    }
}
