use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// A collaborator call rejected or returned a payload that could not be decoded.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Anomalies arrived but no metric-URN slice could be derived from them.
    #[error("unable to resolve a metric urn slice from the response")]
    MissingSlice,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid analysis range: start {start} must be before end {end}")]
    InvalidRange { start: i64, end: i64 },
}

impl ChartError {
    pub fn fetch(err: impl Display) -> Self {
        Self::Fetch(err.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<reqwest::Error> for ChartError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

pub type ChartResult<T> = Result<T, ChartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_helper_keeps_the_cause() {
        let err = ChartError::fetch("connection refused");
        assert!(matches!(&err, ChartError::Fetch(cause) if cause == "connection refused"));
        assert_eq!(err.to_string(), "fetch failed: connection refused");
    }

    #[test]
    fn messages_name_the_failure() {
        let err = ChartError::InvalidRange { start: 10, end: 2 };
        assert_eq!(
            err.to_string(),
            "invalid analysis range: start 10 must be before end 2"
        );
        assert!(ChartError::validation("missing data")
            .to_string()
            .contains("missing data"));
    }
}
