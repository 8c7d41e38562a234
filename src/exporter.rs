use anyhow::{anyhow, Result};
use tracing::info;

use crate::markdown::convert;
use crate::models::{
    CurriculumVitae, CurriculumVitaeRecord, CvOptimizationRecord, CvTransformationPlan,
    JobPosting, JobPostingRecord,
};
use crate::repository::{Collection, FileSystemRepository};
use crate::writer::MarkdownWriter;

/// Where an exported CV lands: its own collection directory, or inside the
/// optimization that produced it.
pub enum CvTarget<'a> {
    Collection(&'a CurriculumVitaeRecord),
    Optimization(&'a CvOptimizationRecord),
}

/// Converts records to markdown and hands the text to the writer.
pub struct MarkdownExporter {
    writer: MarkdownWriter,
}

impl MarkdownExporter {
    pub fn new(writer: MarkdownWriter) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &MarkdownWriter {
        &self.writer
    }

    pub fn export_job_posting(&self, record: &JobPostingRecord, job_posting: &JobPosting) -> Result<()> {
        self.writer
            .write_job_posting(&record.identifier, &convert(job_posting))
    }

    pub fn export_cv(&self, target: CvTarget<'_>, cv: &CurriculumVitae) -> Result<()> {
        let markdown = convert(cv);
        match target {
            CvTarget::Collection(record) => self.writer.write_cv(&record.identifier, &markdown),
            CvTarget::Optimization(record) => self.writer.write_optimized_cv(
                &record.job_posting_identifier,
                &record.identifier,
                &markdown,
            ),
        }
    }

    pub fn export_cv_transformation_plan(
        &self,
        record: &CvOptimizationRecord,
        plan: &CvTransformationPlan,
    ) -> Result<()> {
        self.writer.write_cv_transformation_plan(
            &record.job_posting_identifier,
            &record.identifier,
            &convert(plan),
        )
    }

    /// Writes the job posting mirror only if it is missing.
    /// Returns whether a file was written.
    pub fn ensure_job_posting(&self, record: &JobPostingRecord, job_posting: &JobPosting) -> Result<bool> {
        if self.writer.job_posting_path(&record.identifier).exists() {
            return Ok(false);
        }
        self.export_job_posting(record, job_posting)?;
        Ok(true)
    }

    /// Writes the CV mirror only if it is missing.
    pub fn ensure_cv(&self, record: &CurriculumVitaeRecord, cv: &CurriculumVitae) -> Result<bool> {
        if self.writer.cv_path(&record.identifier).exists() {
            return Ok(false);
        }
        self.export_cv(CvTarget::Collection(record), cv)?;
        Ok(true)
    }

    /// Regenerates every markdown mirror of the named collection, or of all
    /// collections, overwriting manual edits. Returns the number of files
    /// written.
    pub fn export(&self, repository: &FileSystemRepository, collection_name: Option<&str>) -> Result<usize> {
        let collections = Collection::parse_optional(collection_name)?;

        let mut count = 0;
        for collection in collections {
            match collection {
                Collection::JobPostings => {
                    for record in repository.list_job_postings()? {
                        let job_posting = repository
                            .get_job_posting(&record.identifier)?
                            .ok_or_else(|| anyhow!("Job posting '{}' vanished during export", record.identifier))?;
                        self.export_job_posting(&record, &job_posting)?;
                        count += 1;
                    }
                }
                Collection::Cvs => {
                    for record in repository.list_cvs()? {
                        let cv = repository
                            .get_cv(&record.identifier)?
                            .ok_or_else(|| anyhow!("CV '{}' vanished during export", record.identifier))?;
                        self.export_cv(CvTarget::Collection(&record), &cv)?;
                        count += 1;
                    }
                }
            }
        }

        info!(count, collection = collection_name.unwrap_or("all"), "regenerated markdown");
        Ok(count)
    }
}
