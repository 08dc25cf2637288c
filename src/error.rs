use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Unable to provision mongo container: {0:#}")]
    Provisioning(anyhow::Error),
    #[error("Unable to connect to mongo: {0:#}")]
    Connection(anyhow::Error),
    #[error("Unable to drop database {database}: {source:#}")]
    Cleanup {
        database: String,
        source: anyhow::Error,
    },
    #[error("Test body failed: {0:#}")]
    Body(anyhow::Error),
    #[error("Test body failed: {body:#}. Cleanup failed as well: {cleanup}")]
    BodyAndCleanup {
        body: anyhow::Error,
        cleanup: Box<Error>,
    },
}

impl Error {
    /// True when a database drop failed, alone or after a failed body.
    pub fn is_cleanup(&self) -> bool {
        return matches!(self, Error::Cleanup { .. } | Error::BodyAndCleanup { .. });
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
