use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::errors::CvJointError;

/// Sentinel the analyzers use when a posting does not name its employer.
pub const COMPANY_NOT_SPECIFIED: &str = "not specified";

pub fn company_is_specified(company: &str) -> bool {
    !company.trim().is_empty() && !company.trim().eq_ignore_ascii_case(COMPANY_NOT_SPECIFIED)
}

// --- Job postings ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub url: String,
    pub title: String,
    pub company: String,
    pub industry: String,
    pub description: String,
    pub experience_level: String, // entry, mid, senior, ...

    #[serde(default)]
    pub education: Vec<String>, // degrees, certifications
    #[serde(default)]
    pub years_experience: Option<String>, // "5+ years"
    #[serde(default)]
    pub hard_requirements: Vec<String>,

    #[serde(default)]
    pub technical_skills: Vec<String>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,

    #[serde(default)]
    pub responsibilities: Vec<String>,

    // ATS alignment
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tools_and_tech: Vec<String>,
}

impl JobPosting {
    pub fn validate(&self) -> Result<(), CvJointError> {
        if self.title.trim().is_empty() {
            return Err(CvJointError::Validation(
                "job posting title must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Curriculum vitae ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub city: String,
    pub state: String,
    pub email: String,
    pub phone: String,
    pub linkedin: String,
    pub github: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub coursework: String,
    pub institution: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub responsibilities: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalExperience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfExpertise {
    pub name: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub language: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumVitae {
    pub name: String,
    pub contact: Contact,
    pub profession: String,
    pub core_expertise: Vec<String>,
    pub summary_of_qualifications: Vec<String>,
    pub education: Vec<Education>,
    pub experience: Vec<Experience>,
    pub additional_experience: Vec<AdditionalExperience>,
    pub areas_of_expertise: Vec<AreaOfExpertise>,
    pub languages: Vec<Language>,
}

impl CurriculumVitae {
    pub fn validate(&self) -> Result<(), CvJointError> {
        if self.name.trim().is_empty() {
            return Err(CvJointError::Validation(
                "CV name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Optimizations ---

/// How a CV should change to line up with one job posting.
/// Written once per optimization run and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvTransformationPlan {
    // copied verbatim from the posting for traceability
    pub job_title: String,
    pub company: String,

    #[serde(default)]
    pub matching_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub transferable_skills: Vec<String>,

    #[serde(default)]
    pub profession_update: Option<String>,
    #[serde(default)]
    pub core_expertise_updates: Vec<String>,
    #[serde(default)]
    pub summary_updates: Vec<String>,
    #[serde(default)]
    pub experience_updates: Vec<String>,

    #[serde(default)]
    pub keyword_insertions: Vec<String>,
    #[serde(default)]
    pub quantification_suggestions: Vec<String>,

    #[serde(default)]
    pub evidence_sources: Vec<String>,
}

/// Contents of `record.json`. Its presence is what makes an optimization
/// directory count as saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvOptimizationRecord {
    pub identifier: String,
    pub job_posting_identifier: String,
    pub base_cv_identifier: String,
    pub created_at: DateTime<Local>,
}

/// Row returned by optimization listings: the record plus whatever the
/// transformation plan says about the target job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvOptimizationSummary {
    pub job_posting_identifier: String,
    pub identifier: String,
    pub base_cv_identifier: String,
    pub created_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

// --- Collection index entries ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPostingRecord {
    pub identifier: String,
    pub filepath: String, // relative to data_dir
    pub url: String,
    pub company: String,
    pub title: String,
    pub experience_level: String,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumVitaeRecord {
    pub identifier: String,
    pub filepath: String, // relative to data_dir
    pub name: String,
    pub profession: String,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn job_posting() -> JobPosting {
        JobPosting {
            url: "https://example.com/job/123".to_string(),
            title: "Software Engineer".to_string(),
            company: "Acme Corp".to_string(),
            industry: "Technology".to_string(),
            description: "Build great software".to_string(),
            experience_level: "Mid-level".to_string(),
            education: vec![],
            years_experience: None,
            hard_requirements: vec![],
            technical_skills: vec!["Python".to_string(), "Testing".to_string()],
            soft_skills: vec![],
            preferred_skills: vec![],
            responsibilities: vec!["Write code".to_string(), "Review PRs".to_string()],
            keywords: vec![],
            tools_and_tech: vec![],
        }
    }

    pub fn cv() -> CurriculumVitae {
        CurriculumVitae {
            name: "Jane Doe".to_string(),
            contact: Contact {
                city: "San Francisco".to_string(),
                state: "CA".to_string(),
                email: "jane@example.com".to_string(),
                phone: "555-1234".to_string(),
                linkedin: "linkedin.com/in/janedoe".to_string(),
                github: "github.com/janedoe".to_string(),
            },
            profession: "Software Engineer".to_string(),
            core_expertise: vec!["Python".to_string(), "Testing".to_string()],
            summary_of_qualifications: vec!["10 years experience".to_string()],
            education: vec![],
            experience: vec![],
            additional_experience: vec![],
            areas_of_expertise: vec![],
            languages: vec![],
        }
    }

    /// Every nested section populated, one role with responsibilities and one without.
    pub fn full_cv() -> CurriculumVitae {
        CurriculumVitae {
            education: vec![Education {
                degree: "BSc Computer Science".to_string(),
                coursework: "Algorithms, Operating Systems".to_string(),
                institution: "State University".to_string(),
                location: "Berkeley, CA".to_string(),
                start_date: "2008".to_string(),
                end_date: "2012".to_string(),
            }],
            experience: vec![
                Experience {
                    title: "Senior Engineer".to_string(),
                    company: "Initech".to_string(),
                    location: "Remote".to_string(),
                    start_date: "2018".to_string(),
                    end_date: "Present".to_string(),
                    responsibilities: Some(vec![
                        "Led the billing rewrite".to_string(),
                        "Mentored four engineers".to_string(),
                    ]),
                },
                Experience {
                    title: "Engineer".to_string(),
                    company: "Globex".to_string(),
                    location: "Oakland, CA".to_string(),
                    start_date: "2012".to_string(),
                    end_date: "2018".to_string(),
                    responsibilities: None,
                },
            ],
            additional_experience: vec![AdditionalExperience {
                title: "Volunteer Instructor".to_string(),
                company: "Code Club".to_string(),
                location: "San Francisco, CA".to_string(),
                start_date: "2015".to_string(),
                end_date: "2017".to_string(),
            }],
            areas_of_expertise: vec![AreaOfExpertise {
                name: "Backend".to_string(),
                skills: vec!["Python".to_string(), "PostgreSQL".to_string()],
            }],
            languages: vec![
                Language {
                    language: "English".to_string(),
                    level: "Native".to_string(),
                },
                Language {
                    language: "Spanish".to_string(),
                    level: "B2".to_string(),
                },
            ],
            ..cv()
        }
    }

    pub fn transformation_plan() -> CvTransformationPlan {
        CvTransformationPlan {
            job_title: "Software Engineer".to_string(),
            company: "Acme Corp".to_string(),
            matching_skills: vec!["Python".to_string()],
            missing_skills: vec!["Go".to_string()],
            transferable_skills: vec![],
            profession_update: None,
            core_expertise_updates: vec![],
            summary_updates: vec![],
            experience_updates: vec![],
            keyword_insertions: vec!["testing".to_string()],
            quantification_suggestions: vec![],
            evidence_sources: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_is_specified() {
        assert!(company_is_specified("Acme Corp"));
        assert!(!company_is_specified("Not specified"));
        assert!(!company_is_specified("NOT SPECIFIED"));
        assert!(!company_is_specified("  "));
    }

    #[test]
    fn test_job_posting_list_fields_default_to_empty() {
        let json = r#"{
            "url": "https://example.com",
            "title": "Developer",
            "company": "Acme",
            "industry": "Tech",
            "description": "A job",
            "experience_level": "Senior"
        }"#;
        let job: JobPosting = serde_json::from_str(json).unwrap();
        assert!(job.technical_skills.is_empty());
        assert!(job.years_experience.is_none());
    }

    #[test]
    fn test_job_posting_requires_title_field() {
        let json = r#"{"url": "", "company": "Acme", "industry": "", "description": "", "experience_level": ""}"#;
        assert!(serde_json::from_str::<JobPosting>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let mut job = fixtures::job_posting();
        job.title = " ".to_string();
        assert!(job.validate().is_err());
        assert!(fixtures::job_posting().validate().is_ok());
    }

    #[test]
    fn test_summary_omits_missing_plan_fields() {
        let summary = CvOptimizationSummary {
            job_posting_identifier: "acme-swe".to_string(),
            identifier: "opt-1".to_string(),
            base_cv_identifier: "jane".to_string(),
            created_at: Local::now(),
            job_title: None,
            company: None,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value.get("job_title").is_none());
        assert_eq!(value["identifier"], "opt-1");
    }
}
