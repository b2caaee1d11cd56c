pub type RsmResult<T> = Result<T, RsmError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsmErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl RsmErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// The failure classes a pipeline stage can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsmErrorKind {
    InvalidConfig,
    MetadataParse,
    Normalization,
    InvalidGridSpec,
    ScanDataMissing,
    Io,
    InvalidTransition,
    Busy,
}

impl RsmErrorKind {
    pub const fn category(self) -> RsmErrorCategory {
        match self {
            Self::InvalidConfig | Self::MetadataParse | Self::InvalidGridSpec => {
                RsmErrorCategory::InputValidationError
            }
            Self::Normalization => RsmErrorCategory::ComputationError,
            Self::ScanDataMissing | Self::Io => RsmErrorCategory::IoSystemError,
            Self::InvalidTransition | Self::Busy => RsmErrorCategory::InternalError,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfig => "InvalidConfigError",
            Self::MetadataParse => "MetadataParseError",
            Self::Normalization => "NormalizationError",
            Self::InvalidGridSpec => "InvalidGridSpecError",
            Self::ScanDataMissing => "ScanDataMissingError",
            Self::Io => "IoError",
            Self::InvalidTransition => "InvalidTransitionError",
            Self::Busy => "BusyError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} [{}] {}", .kind.as_str(), .placeholder, .message)]
pub struct RsmError {
    kind: RsmErrorKind,
    placeholder: &'static str,
    message: String,
}

impl RsmError {
    pub fn new(kind: RsmErrorKind, placeholder: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            placeholder,
            message: message.into(),
        }
    }

    pub fn invalid_config(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::InvalidConfig, placeholder, message)
    }

    pub fn metadata_parse(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::MetadataParse, placeholder, message)
    }

    pub fn normalization(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::Normalization, placeholder, message)
    }

    pub fn invalid_grid_spec(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::InvalidGridSpec, placeholder, message)
    }

    pub fn scan_data_missing(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::ScanDataMissing, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::Io, placeholder, message)
    }

    pub fn invalid_transition(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::InvalidTransition, placeholder, message)
    }

    pub fn busy(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RsmErrorKind::Busy, placeholder, message)
    }

    pub const fn kind(&self) -> RsmErrorKind {
        self.kind
    }

    pub const fn category(&self) -> RsmErrorCategory {
        self.kind.category()
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.kind.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category().is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn warning_line(&self) -> String {
        format!("WARNING: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category()
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}
