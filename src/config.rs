use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_IMAGE: &str = "mongo:latest";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_USERNAME: &str = "user";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_READY_LOG: &str = "Waiting for connections";

pub const ENV_ROOT_USERNAME: &str = "MONGO_INITDB_ROOT_USERNAME";
pub const ENV_ROOT_PASSWORD: &str = "MONGO_INITDB_ROOT_PASSWORD";

const ENV_IMAGE_OVERRIDE: &str = "MONGO_TESTDB_IMAGE";
const ENV_USERNAME_OVERRIDE: &str = "MONGO_TESTDB_USERNAME";
const ENV_PASSWORD_OVERRIDE: &str = "MONGO_TESTDB_PASSWORD";

/// Request for a mongo container. Empty fields fall back to the defaults
/// when the config is resolved.
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    pub image: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub ready_log: String,

    /// Extra environment variables. Root credentials always win over these.
    pub env: BTreeMap<String, String>,
    pub container_name: Option<String>,
    pub startup_timeout: Option<Duration>,
}

impl ContainerConfig {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Defaults, with image and credentials taken from `MONGO_TESTDB_*`
    /// variables when they are set.
    pub fn from_env() -> Self {
        return Self::from_lookup(|key| std::env::var(key).ok());
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(image) = lookup(ENV_IMAGE_OVERRIDE) {
            config.image = image;
        }
        if let Some(username) = lookup(ENV_USERNAME_OVERRIDE) {
            config.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD_OVERRIDE) {
            config.password = password;
        }
        return config;
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        return self;
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        return self;
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        return self;
    }

    pub fn with_ready_log(mut self, ready_log: impl Into<String>) -> Self {
        self.ready_log = ready_log.into();
        return self;
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        return self;
    }

    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        return self;
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        return self;
    }

    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let image = ImageRef::parse(or_default(&self.image, DEFAULT_IMAGE))?;
        let port = match self.port {
            None => DEFAULT_PORT,
            Some(0) => return Err(Error::Configuration("port must not be 0".to_string())),
            Some(port) => port,
        };

        let username = or_default(&self.username, DEFAULT_USERNAME).to_string();
        let password = or_default(&self.password, DEFAULT_PASSWORD).to_string();

        let mut env = self.env.clone();
        env.insert(ENV_ROOT_USERNAME.to_string(), username.clone());
        env.insert(ENV_ROOT_PASSWORD.to_string(), password.clone());

        return Ok(ResolvedConfig {
            image,
            port,
            username,
            password,
            ready_log: or_default(&self.ready_log, DEFAULT_READY_LOG).to_string(),
            env,
            container_name: self.container_name.clone().filter(|name| !name.is_empty()),
            startup_timeout: self.startup_timeout,
        });
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        return default;
    }
    return value;
}

/// Configuration with every required field filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub image: ImageRef,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub ready_log: String,
    pub env: BTreeMap<String, String>,
    pub container_name: Option<String>,
    pub startup_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        // A colon before the last slash belongs to a registry host, not a tag
        let name_start = reference.rfind('/').map_or(0, |idx| idx + 1);
        let (repository, tag) = match reference[name_start..].rfind(':') {
            Some(idx) => {
                let (repository, tag) = reference.split_at(name_start + idx);
                (repository, &tag[1..])
            }
            None => (reference, "latest"),
        };
        if repository.is_empty() || repository.ends_with('/') {
            return Err(Error::Configuration(format!(
                "image reference '{reference}' has no repository"
            )));
        }
        if tag.is_empty() {
            return Err(Error::Configuration(format!(
                "image reference '{reference}' has an empty tag"
            )));
        }
        return Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        });
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{}:{}", self.repository, self.tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let resolved = ContainerConfig::default().resolve().unwrap();

        assert_eq!(resolved.image.to_string(), DEFAULT_IMAGE);
        assert_eq!(resolved.port, DEFAULT_PORT);
        assert_eq!(resolved.username, DEFAULT_USERNAME);
        assert_eq!(resolved.password, DEFAULT_PASSWORD);
        assert_eq!(resolved.ready_log, DEFAULT_READY_LOG);
        assert_eq!(resolved.env[ENV_ROOT_USERNAME], DEFAULT_USERNAME);
        assert_eq!(resolved.env[ENV_ROOT_PASSWORD], DEFAULT_PASSWORD);
        assert_eq!(resolved.container_name, None);
        assert_eq!(resolved.startup_timeout, None);
    }

    #[test]
    fn explicit_values_are_kept() {
        let resolved = ContainerConfig::new()
            .with_image("mongo:7.0")
            .with_port(27018)
            .with_credentials("admin", "secret")
            .with_ready_log("ready")
            .with_env_var("TZ", "UTC")
            .with_startup_timeout(Duration::from_secs(5))
            .resolve()
            .unwrap();

        assert_eq!(
            resolved.image,
            ImageRef {
                repository: "mongo".to_string(),
                tag: "7.0".to_string()
            }
        );
        assert_eq!(resolved.port, 27018);
        assert_eq!(resolved.username, "admin");
        assert_eq!(resolved.password, "secret");
        assert_eq!(resolved.ready_log, "ready");
        assert_eq!(resolved.env["TZ"], "UTC");
        assert_eq!(resolved.env[ENV_ROOT_USERNAME], "admin");
        assert_eq!(resolved.env[ENV_ROOT_PASSWORD], "secret");
        assert_eq!(resolved.startup_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn root_credentials_override_extra_env() {
        let resolved = ContainerConfig::new()
            .with_env_var(ENV_ROOT_USERNAME, "someone-else")
            .resolve()
            .unwrap();
        assert_eq!(resolved.env[ENV_ROOT_USERNAME], DEFAULT_USERNAME);
    }

    #[test]
    fn zero_port_is_rejected() {
        let result = ContainerConfig::new().with_port(0).resolve();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn env_overrides() {
        let config = ContainerConfig::from_lookup(|key| match key {
            ENV_IMAGE_OVERRIDE => Some("mongo:6".to_string()),
            ENV_PASSWORD_OVERRIDE => Some("hunter2".to_string()),
            _ => None,
        });
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.image.to_string(), "mongo:6");
        assert_eq!(resolved.username, DEFAULT_USERNAME);
        assert_eq!(resolved.password, "hunter2");
    }

    #[rstest]
    #[case("mongo", "mongo", "latest")]
    #[case("mongo:7.0", "mongo", "7.0")]
    #[case("  mongo:8  ", "mongo", "8")]
    #[case("bitnami/mongodb:7.0", "bitnami/mongodb", "7.0")]
    #[case("localhost:5000/mongo", "localhost:5000/mongo", "latest")]
    #[case("localhost:5000/mongo:6", "localhost:5000/mongo", "6")]
    fn image_ref_parsing(#[case] reference: &str, #[case] repository: &str, #[case] tag: &str) {
        let image = ImageRef::parse(reference).unwrap();
        assert_eq!(image.repository, repository);
        assert_eq!(image.tag, tag);
    }

    #[rstest]
    #[case(":latest")]
    #[case("mongo:")]
    #[case("registry/")]
    fn invalid_image_refs(#[case] reference: &str) {
        assert!(matches!(
            ImageRef::parse(reference),
            Err(Error::Configuration(_))
        ));
    }
}
