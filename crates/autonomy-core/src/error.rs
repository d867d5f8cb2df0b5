use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutonomyError {
    #[error("not initialized: run 'autonomy init'")]
    NotInitialized,

    #[error("GitHub token required: pass --token or set GITHUB_TOKEN")]
    MissingToken,

    #[error("invalid project key '{0}': expected owner/repo")]
    InvalidProjectKey(String),

    #[error("invalid issue state: {0}")]
    InvalidState(String),

    #[error("GitHub API error: {0}")]
    Github(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AutonomyError>;
