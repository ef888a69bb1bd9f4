use std::path::PathBuf;

use thiserror::Error;

use crate::binary::Format;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("--{key} invalid value provided ({value}): {reason}")]
    InvalidOption {
        key: String,
        value: String,
        reason: String,
    },

    #[error("malformed profile: {0}")]
    ProfileFormat(String),

    #[error("the site {} cannot be found in the map", .0.as_deref().unwrap_or("(null)"))]
    UnknownSite(Option<String>),

    #[error("invalid operator {0}")]
    UnknownOperator(String),

    #[error("the site {site} has no metadata for argument {index}")]
    ArgumentMismatch { site: String, index: usize },

    #[error(
        "the site {site} is registered as {} but was reached with {}",
        .expected.name(),
        .found.name()
    )]
    FormatMismatch {
        site: String,
        expected: Format,
        found: Format,
    },

    #[error("this backend cannot work without the compiler profile")]
    MissingRegistry,

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_option(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Fails when a site registered for `expected` is reached by a value of
    /// format `found`.
    pub fn check_format(site: Option<&str>, expected: Format, found: Format) -> Result<()> {
        if expected == found {
            return Ok(());
        }
        Err(Self::FormatMismatch {
            site: site.unwrap_or("(null)").to_string(),
            expected,
            found,
        })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reports `err` and aborts the process.
///
/// Every inconsistency detected behind an instrumentation hook ends up here:
/// a wrong numerical answer is worse than no answer at all.
pub fn fatal(err: Error) -> ! {
    tracing::error!("{err}");
    eprintln!("vprec: fatal error: {err}");
    std::process::abort()
}

/// Unwraps a hook result or aborts through [`fatal`].
pub(crate) fn or_fatal<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fatal(err),
    }
}
