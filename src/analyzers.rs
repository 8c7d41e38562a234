use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::ai::{provider_for, AIProvider};
use crate::config::Settings;
use crate::models::{CurriculumVitae, CvTransformationPlan, JobPosting, COMPANY_NOT_SPECIFIED};
use crate::repository::{write_json, OPTIMIZED_CV_FILE, TRANSFORMATION_PLAN_FILE};
use crate::scrape::PageFetcher;

// --- Collaborator traits ---

pub trait JobPostingAnalyzer {
    /// Reads `content_file` instead of fetching `url` when given.
    fn analyze(&self, url: &str, content_file: Option<&Path>) -> Result<JobPosting>;
}

pub trait CvAnalyzer {
    fn analyze(&self, path: &Path) -> Result<CurriculumVitae>;
}

pub trait CvOptimizer {
    /// Must leave `transformation-plan.json` and `cv.json` in `output_directory`.
    fn optimize(&self, cv_path: &Path, job_posting_path: &Path, output_directory: &Path) -> Result<()>;
}

const ANALYSIS_MAX_TOKENS: u32 = 4096;
const REWRITE_MAX_TOKENS: u32 = 8192;

const JOB_POSTING_SHAPE: &str = r#"{
  "url": "string",
  "title": "string",
  "company": "string",
  "industry": "string",
  "description": "string",
  "experience_level": "string",
  "education": ["string"],
  "years_experience": "string or null",
  "hard_requirements": ["string"],
  "technical_skills": ["string"],
  "soft_skills": ["string"],
  "preferred_skills": ["string"],
  "responsibilities": ["string"],
  "keywords": ["string"],
  "tools_and_tech": ["string"]
}"#;

const CV_SHAPE: &str = r#"{
  "name": "string",
  "contact": {"city": "string", "state": "string", "email": "string", "phone": "string", "linkedin": "string", "github": "string"},
  "profession": "string",
  "core_expertise": ["string"],
  "summary_of_qualifications": ["string"],
  "education": [{"degree": "string", "coursework": "string", "institution": "string", "location": "string", "start_date": "string", "end_date": "string"}],
  "experience": [{"title": "string", "company": "string", "location": "string", "start_date": "string", "end_date": "string", "responsibilities": ["string"]}],
  "additional_experience": [{"title": "string", "company": "string", "location": "string", "start_date": "string", "end_date": "string"}],
  "areas_of_expertise": [{"name": "string", "skills": ["string"]}],
  "languages": [{"language": "string", "level": "string"}]
}"#;

const TRANSFORMATION_PLAN_SHAPE: &str = r#"{
  "job_title": "string",
  "company": "string",
  "matching_skills": ["string"],
  "missing_skills": ["string"],
  "transferable_skills": ["string"],
  "profession_update": "string or null",
  "core_expertise_updates": ["string"],
  "summary_updates": ["string"],
  "experience_updates": ["string"],
  "keyword_insertions": ["string"],
  "quantification_suggestions": ["string"],
  "evidence_sources": ["string"]
}"#;

// --- Job postings ---

pub struct LlmJobPostingAnalyzer {
    provider: Box<dyn AIProvider>,
    fetcher: PageFetcher,
}

impl LlmJobPostingAnalyzer {
    pub fn new(provider: Box<dyn AIProvider>, fetcher: PageFetcher) -> Self {
        Self { provider, fetcher }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let agent = settings.agent("job_posting_analysis", "job_analyst")?;
        Ok(Self::new(provider_for(agent)?, PageFetcher::new()?))
    }
}

impl JobPostingAnalyzer for LlmJobPostingAnalyzer {
    fn analyze(&self, url: &str, content_file: Option<&Path>) -> Result<JobPosting> {
        let page_text = match content_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read content file: {}", path.display()))?,
            None => self.fetcher.fetch_job_page(url)?,
        };

        let prompt = format!(
            "You are a job posting analyst. Extract the structured details of the job posting below.\n\n\
            Rules:\n\
            - Use \"{url}\" as the url.\n\
            - If the employer is not named, set company to \"{not_specified}\".\n\
            - Only use facts stated in the posting. Use empty lists for anything not mentioned.\n\
            - Return ONLY a JSON object with exactly this shape:\n{shape}\n\n\
            Job posting:\n{page_text}",
            url = url,
            not_specified = COMPANY_NOT_SPECIFIED,
            shape = JOB_POSTING_SHAPE,
            page_text = page_text,
        );

        info!(url, model = self.provider.model_name(), "analyzing job posting");
        let response = self.provider.complete(&prompt, ANALYSIS_MAX_TOKENS)?;
        let job_posting: JobPosting = parse_model_output(&response, "job posting")?;
        job_posting.validate()?;
        Ok(job_posting)
    }
}

// --- CVs ---

pub struct LlmCvAnalyzer {
    provider: Box<dyn AIProvider>,
}

impl LlmCvAnalyzer {
    pub fn new(provider: Box<dyn AIProvider>) -> Self {
        Self { provider }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let agent = settings.agent("cv_analysis", "cv_analyst")?;
        Ok(Self::new(provider_for(agent)?))
    }
}

/// A `.json`/`.yaml` file that already has the CV shape.
fn parse_structured_cv(path: &Path, content: &str) -> Option<CurriculumVitae> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let cv: CurriculumVitae = match extension.as_str() {
        "json" => serde_json::from_str(content).ok()?,
        "yaml" | "yml" => serde_yaml::from_str(content).ok()?,
        _ => return None,
    };
    cv.validate().ok()?;
    Some(cv)
}

impl CvAnalyzer for LlmCvAnalyzer {
    fn analyze(&self, path: &Path) -> Result<CurriculumVitae> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read CV file: {}", path.display()))?;

        if let Some(cv) = parse_structured_cv(path, &content) {
            debug!(path = %path.display(), "CV file already structured, skipping model call");
            return Ok(cv);
        }

        let prompt = format!(
            "You are a CV analyst. Extract the structured contents of the CV below.\n\n\
            Rules:\n\
            - Keep the candidate's own wording. Do not invent facts.\n\
            - Use empty strings or empty lists for anything the CV does not state.\n\
            - Return ONLY a JSON object with exactly this shape:\n{shape}\n\n\
            CV:\n{content}",
            shape = CV_SHAPE,
            content = content,
        );

        info!(path = %path.display(), model = self.provider.model_name(), "analyzing CV");
        let response = self.provider.complete(&prompt, ANALYSIS_MAX_TOKENS)?;
        let cv: CurriculumVitae = parse_model_output(&response, "CV")?;
        cv.validate()?;
        Ok(cv)
    }
}

// --- Optimization ---

pub struct LlmCvOptimizer {
    strategist: Box<dyn AIProvider>,
    rewriter: Box<dyn AIProvider>,
}

impl LlmCvOptimizer {
    pub fn new(strategist: Box<dyn AIProvider>, rewriter: Box<dyn AIProvider>) -> Self {
        Self { strategist, rewriter }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let strategist = settings.agent("cv_optimization", "cv_strategist")?;
        let rewriter = settings.agent("cv_optimization", "cv_rewriter")?;
        Ok(Self::new(provider_for(strategist)?, provider_for(rewriter)?))
    }

    fn plan(&self, cv_json: &str, job_posting_json: &str) -> Result<CvTransformationPlan> {
        let prompt = format!(
            "You are a CV strategist. Compare the CV with the job posting and plan how to align the CV.\n\n\
            Rules:\n\
            - Copy job_title and company from the job posting unchanged.\n\
            - Only recommend changes backed by facts in the CV. List those facts in evidence_sources.\n\
            - Return ONLY a JSON object with exactly this shape:\n{shape}\n\n\
            Job posting:\n{job_posting_json}\n\n\
            CV:\n{cv_json}",
            shape = TRANSFORMATION_PLAN_SHAPE,
        );
        let response = self.strategist.complete(&prompt, ANALYSIS_MAX_TOKENS)?;
        parse_model_output(&response, "transformation plan")
    }

    fn rewrite(&self, cv_json: &str, plan: &CvTransformationPlan) -> Result<CurriculumVitae> {
        let plan_json = serde_json::to_string_pretty(plan)?;
        let prompt = format!(
            "You are a CV writer. Rewrite the CV by applying the transformation plan.\n\n\
            Rules:\n\
            - Stay 100% truthful. Reword, reorder and emphasize; never add experience the CV does not have.\n\
            - Keep the same JSON shape as the input CV.\n\
            - Return ONLY the rewritten CV as a JSON object with exactly this shape:\n{shape}\n\n\
            Transformation plan:\n{plan_json}\n\n\
            CV:\n{cv_json}",
            shape = CV_SHAPE,
        );
        let response = self.rewriter.complete(&prompt, REWRITE_MAX_TOKENS)?;
        let cv: CurriculumVitae = parse_model_output(&response, "optimized CV")?;
        cv.validate()?;
        Ok(cv)
    }
}

impl CvOptimizer for LlmCvOptimizer {
    fn optimize(&self, cv_path: &Path, job_posting_path: &Path, output_directory: &Path) -> Result<()> {
        let cv_json = fs::read_to_string(cv_path)
            .with_context(|| format!("Failed to read {}", cv_path.display()))?;
        let job_posting_json = fs::read_to_string(job_posting_path)
            .with_context(|| format!("Failed to read {}", job_posting_path.display()))?;

        info!(output = %output_directory.display(), "planning CV optimization");
        let plan = self.plan(&cv_json, &job_posting_json)?;
        write_json(&output_directory.join(TRANSFORMATION_PLAN_FILE), &plan)?;

        info!(output = %output_directory.display(), "rewriting CV");
        let cv = self.rewrite(&cv_json, &plan)?;
        write_json(&output_directory.join(OPTIMIZED_CV_FILE), &cv)?;
        Ok(())
    }
}

// --- Model output parsing ---

/// Pulls the JSON object out of a model response: a ```json fenced block if
/// there is one, otherwise the outermost `{ ... }` span.
pub fn extract_json(response: &str) -> Result<Value> {
    let candidate = fenced_block(response).unwrap_or(response);

    let start = candidate.find('{');
    let end = candidate.rfind('}');
    let span = match (start, end) {
        (Some(start), Some(end)) if start < end => &candidate[start..=end],
        _ => return Err(anyhow!("No JSON object found in model response")),
    };

    serde_json::from_str(span).context("Model response is not valid JSON")
}

fn fenced_block(response: &str) -> Option<&str> {
    let open = response.find("```")?;
    let after_fence = &response[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn parse_model_output<T: DeserializeOwned>(response: &str, what: &str) -> Result<T> {
    let value = extract_json(response).with_context(|| format!("Failed to read {} from model", what))?;
    serde_json::from_value(value).with_context(|| format!("Model returned a malformed {}", what))
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned responses in order and records every prompt.
    pub struct ScriptedProvider {
        responses: RefCell<VecDeque<String>>,
        pub prompts: RefCell<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(responses: &[&str]) -> Self {
            Self {
                responses: RefCell::new(responses.iter().map(|r| r.to_string()).collect()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl AIProvider for ScriptedProvider {
        fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted response left"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
