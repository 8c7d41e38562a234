use thiserror::Error;

/// Errors a caller is expected to tell apart from plain I/O or parse
/// failures. Everything else travels as `anyhow::Error` with context.
#[derive(Error, Debug)]
pub enum CvJointError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("CV optimization '{identifier}' for job posting '{job_posting_identifier}' is incomplete: {missing} is missing")]
    IncompleteOptimization {
        job_posting_identifier: String,
        identifier: String,
        missing: &'static str,
    },

    #[error("Invalid data: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_collection_message() {
        let err = CvJointError::UnknownCollection("invalid".to_string());
        assert_eq!(err.to_string(), "Unknown collection: invalid");
    }

    #[test]
    fn test_incomplete_optimization_names_the_optimization() {
        let err = CvJointError::IncompleteOptimization {
            job_posting_identifier: "acme-swe".to_string(),
            identifier: "2024-11-06-101500".to_string(),
            missing: "cv.json",
        };
        let msg = err.to_string();
        assert!(msg.contains("acme-swe"));
        assert!(msg.contains("2024-11-06-101500"));
        assert!(msg.contains("cv.json"));
    }
}
