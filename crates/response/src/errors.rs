use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ResponseError {
    MissingParameter(&'static str),
    InvalidParameter { name: &'static str, reason: String },
    FileNotFound(PathBuf),
    ProtectedProcess(u32),
    /// An external tool or OS call failed; `detail` carries its diagnostics.
    ExecutionFailure { tool: String, detail: String },
    /// The external tool is not installed.
    ToolNotFound(String),
    Io(std::io::Error),
}

impl ResponseError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn execution(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExecutionFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter(name) => write!(f, "missing required parameter '{}'", name),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter '{}': {}", name, reason)
            }
            Self::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::ProtectedProcess(pid) => write!(f, "process {} is protected", pid),
            Self::ExecutionFailure { tool, detail } => write!(f, "{} failed: {}", tool, detail),
            Self::ToolNotFound(tool) => write!(f, "{} not found", tool),
            Self::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ResponseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResponseError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub type ResponseResult<T> = std::result::Result<T, ResponseError>;
