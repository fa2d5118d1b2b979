pub type CalResult<T> = Result<T, CalibError>;

/// Fatal error classes of a calibration run.
///
/// Recoverable per-frame conditions (a rejected common-mode estimate, a
/// missing raw collection) never become a [`CalibError`]; they are reported as
/// skip outcomes by the loop controller and only counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibErrorCategory {
    /// Invalid configuration, or a pass plan that cannot fit the source's
    /// event budget. Raised before any frame is processed.
    ConfigurationError,
    /// Filesystem or serialization failure in a persistence adapter.
    IoSystemError,
    /// The frame source ended before the configured pass sequence completed.
    IncompleteCalibration,
    /// Broken internal contract (wrong detector index, malformed plane data,
    /// frames after the terminal state).
    InternalError,
}

impl CalibErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ConfigurationError => 2,
            Self::IoSystemError => 3,
            Self::IncompleteCalibration => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::IoSystemError => "IoSystemError",
            Self::IncompleteCalibration => "IncompleteCalibration",
            Self::InternalError => "InternalError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} [{placeholder}] {message}", .category.name())]
pub struct CalibError {
    category: CalibErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl CalibError {
    pub fn new(
        category: CalibErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalibErrorCategory::ConfigurationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalibErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn incomplete(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            CalibErrorCategory::IncompleteCalibration,
            placeholder,
            message,
        )
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalibErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> CalibErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::{CalibError, CalibErrorCategory};

    #[test]
    fn category_exit_mapping_is_stable() {
        let cases = [
            (CalibErrorCategory::ConfigurationError, 2),
            (CalibErrorCategory::IoSystemError, 3),
            (CalibErrorCategory::IncompleteCalibration, 4),
            (CalibErrorCategory::InternalError, 5),
        ];
        for (category, exit_code) in cases {
            assert_eq!(category.exit_code(), exit_code);
        }
    }

    #[test]
    fn error_renders_placeholder_and_message() {
        let error = CalibError::configuration("INPUT.EVENT_RANGE", "lastEvent must exceed firstEvent");

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.to_string(),
            "ConfigurationError [INPUT.EVENT_RANGE] lastEvent must exceed firstEvent"
        );
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [INPUT.EVENT_RANGE] lastEvent must exceed firstEvent"
        );
    }
}
