use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DevReportError>;

/// Failures of the version-control and code-hosting adapters.
#[derive(Error, Debug)]
pub enum DevReportError {
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::open::Error>),
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
}

impl From<gix::open::Error> for DevReportError {
    fn from(err: gix::open::Error) -> Self {
        DevReportError::Git(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for DevReportError {
    fn from(err: gix::object::commit::Error) -> Self {
        DevReportError::Commit(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for DevReportError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        DevReportError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for DevReportError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        DevReportError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for DevReportError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        DevReportError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for DevReportError {
    fn from(err: gix::objs::decode::Error) -> Self {
        DevReportError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for DevReportError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        DevReportError::DiffTreeToTree(Box::new(err))
    }
}

/// Problems with the configuration file or the operator identity. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("Invalid duration '{value}': {source}")]
    Duration {
        value: String,
        source: humantime::DurationError,
    },
    #[error("Could not determine git user email. Set it with: git config --global user.email")]
    NoIdentity,
}

/// The scan root cannot be used. Always fatal.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why a repository's history could not be read.
#[derive(Error, Debug)]
#[error("{path}: {source}")]
pub struct GitQueryError {
    pub path: PathBuf,
    #[source]
    pub source: DevReportError,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Interrupted")]
    Cancelled,
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
