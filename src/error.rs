use std::path::PathBuf;

/// Error type for source tree exploration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured source root does not exist or is not a directory.
    #[error("source root not found: {}", .0.display())]
    SourceRootMissing(PathBuf),

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being read when the error happened.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A recursive directory walk failed.
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// An overlay glob is malformed.
    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying error.
        #[source]
        source: glob::PatternError,
    },

    /// A `category/name-version[-rN]` string could not be parsed.
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// Error parsing a metadata cache record.
    #[error("invalid cache entry: {0}")]
    InvalidCacheEntry(String),

    /// Invalid IUSE flag entry.
    #[error("invalid IUSE entry: {0}")]
    InvalidIUse(String),

    /// A board has no `base` profile in any overlay.
    #[error("no base profile found for board {0}")]
    MissingBaseProfile(String),

    /// Two private overlays declare a `base` profile for the same board.
    #[error("board {board} has conflicting private base profiles {first} and {second}")]
    ConflictingBaseProfile {
        /// Board name.
        board: String,
        /// Profile id registered first.
        first: String,
        /// Profile id seen afterwards.
        second: String,
    },

    /// A profile id is not part of the explored tree.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// Profile parents form a cycle.
    #[error("profile inheritance cycle through {0}")]
    ProfileCycle(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// Evaluating a `make.defaults` file failed.
    #[error("failed to evaluate {}: {reason}", .path.display())]
    ShellEval {
        /// The `make.defaults` being evaluated.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Error from the portage-atom dependency parser.
    #[error("dependency parse error: {0}")]
    DepError(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<glob::GlobError> for Error {
    fn from(e: glob::GlobError) -> Self {
        let path = e.path().to_path_buf();
        Error::io(path, e.into_error())
    }
}

/// Result type for portage-explorer operations.
pub type Result<T> = std::result::Result<T, Error>;
