use thiserror::Error;

/// A single problem found while validating a [`crate::Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Unified error type for atomic-fairness.
///
/// Every variant is fatal: they can only be raised while the experiment is
/// being configured or started. Once workers are running nothing can fail.
#[derive(Error, Debug, Clone)]
pub enum FairnessError {
    /// Invalid argument from the CLI or environment
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration failed validation
    #[error("Validation error: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    ValidationError(Vec<ValidationIssue>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Parse/serialization error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Could not pin a thread to its CPU
    #[error("Failed to set affinity for cpu {cpu}: {message}")]
    Affinity { cpu: usize, message: String },

    /// Could not create a worker thread
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    /// The process is not allowed to run on any CPU we can use
    #[error("No usable CPUs available")]
    NoCpus,

    /// A participant gave up before the startup barrier released
    #[error("Startup aborted: {0}")]
    StartupAborted(String),
}

impl FairnessError {
    /// Errors caused by user supplied configuration rather than the host.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FairnessError::InvalidArgument(_)
                | FairnessError::ValidationError(_)
                | FairnessError::Parse(_)
        )
    }
}

macro_rules! impl_from_error {
    ($err_type:ty, $arm:pat => $body:expr) => {
        impl From<$err_type> for FairnessError {
            fn from(err: $err_type) -> Self {
                match err {
                    $arm => $body,
                }
            }
        }
    };
}

impl_from_error!(std::io::Error, e => match e.kind() {
    std::io::ErrorKind::InvalidInput => FairnessError::InvalidArgument(e.to_string()),
    _ => FairnessError::Io(e.to_string()),
});

impl_from_error!(serde_json::Error, e => FairnessError::Parse(e.to_string()));
impl_from_error!(toml::de::Error, e => FairnessError::Parse(e.to_string()));

/// Result type alias for operations that can fail with FairnessError.
pub type FairnessResult<T> = Result<T, FairnessError>;
