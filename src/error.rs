//! Error types for gator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatorError {
    /// Bad or missing command arguments.
    #[error("usage: {0}")]
    Usage(String),

    #[error("command does not exist: {0}")]
    UnknownCommand(String),

    /// A registered handler failed; wraps the cause with the command name.
    #[error("error running command '{name}': {source}")]
    Command {
        name: String,
        #[source]
        source: Box<GatorError>,
    },

    #[error("no user is logged in")]
    NotLoggedIn,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("feed not found: {0}")]
    FeedNotFound(String),

    #[error("feed already exists: {0}")]
    FeedExists(String),

    #[error("already following feed: {0}")]
    AlreadyFollowing(String),

    #[error("not following feed: {0}")]
    NotFollowing(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid publish date: {0}")]
    InvalidDate(String),

    /// Network or parse failure for a whole feed document.
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatorError {
    /// True when the store rejected a write because of a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            GatorError::Database(sqlx::Error::Database(e)) => e.is_unique_violation(),
            GatorError::Command { source, .. } => source.is_unique_violation(),
            _ => false,
        }
    }

    /// The innermost error, skipping dispatch wrappers.
    pub fn root(&self) -> &GatorError {
        match self {
            GatorError::Command { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_display() {
        let err = GatorError::UnknownCommand("frobnicate".to_string());
        assert_eq!(err.to_string(), "command does not exist: frobnicate");
    }

    #[test]
    fn test_command_wrapper_display() {
        let err = GatorError::Command {
            name: "login".to_string(),
            source: Box::new(GatorError::UserNotFound("bob".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "error running command 'login': user not found: bob"
        );
    }

    #[test]
    fn test_root_unwraps_nested_commands() {
        let err = GatorError::Command {
            name: "outer".to_string(),
            source: Box::new(GatorError::Command {
                name: "inner".to_string(),
                source: Box::new(GatorError::NotLoggedIn),
            }),
        };
        assert!(matches!(err.root(), GatorError::NotLoggedIn));
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!GatorError::FeedExists("x".to_string()).is_unique_violation());
        assert!(!GatorError::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }
}
