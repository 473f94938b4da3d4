#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No {what} found for {period}.")]
    NoData { what: String, period: String },

    #[error("Malformed period input: {0}")]
    MalformedPeriod(String),

    #[error("Class not found: {0}")]
    UnknownClass(String),

    #[error("Trainer not found: {0}")]
    UnknownTrainer(String),

    #[error("Unit not found: {0}")]
    UnknownUnit(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ReportError {
    pub fn no_data(what: impl Into<String>, period: impl Into<String>) -> Self {
        ReportError::NoData {
            what: what.into(),
            period: period.into(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, ReportError::NoData { .. })
    }
}
