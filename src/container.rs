use anyhow::Context;
use mongodb::bson::doc;
use mongodb::sync::{Client, Database};
use parking_lot::Mutex;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ContainerRequest, GenericImage, ImageExt};
use tracing::{debug, info};

use crate::config::{ContainerConfig, DEFAULT_PORT, ResolvedConfig};
use crate::error::{Error, Result};
use crate::session::{self, DatabaseProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Ready,
    Stopped,
}

/// A running mongo server. The docker container is removed when the handle
/// is dropped.
pub struct MongoContainer {
    container: Container<GenericImage>,
    config: ResolvedConfig,
    state: Mutex<ContainerState>,
}

impl MongoContainer {
    /// Starts a container and blocks until the ready log line shows up.
    pub fn create(config: ContainerConfig) -> Result<Self> {
        let config = config.resolve()?;
        info!("Starting mongo container from {}", config.image);
        let container = build_request(&config)
            .start()
            .with_context(|| format!("Failed to start container from {}", config.image))
            .map_err(Error::Provisioning)?;
        info!("Mongo container {} is ready", container.id());

        return Ok(Self {
            container,
            config,
            state: Mutex::new(ContainerState::Ready),
        });
    }

    pub fn config(&self) -> &ResolvedConfig {
        return &self.config;
    }

    pub fn state(&self) -> ContainerState {
        return *self.state.lock();
    }

    pub fn id(&self) -> &str {
        return self.container.id();
    }

    pub fn connection_string(&self) -> Result<String> {
        return self.build_connection_string().map_err(Error::Connection);
    }

    /// Connects with the root credentials and pings the server once.
    pub fn new_client(&self) -> Result<Client> {
        return self.connect().map_err(Error::Connection);
    }

    /// Handle to a database on a fresh client. Nothing is created on the
    /// server until the first write.
    pub fn new_database(&self, name: &str) -> Result<Database> {
        let client = self.new_client()?;
        return Ok(client.database(name));
    }

    pub fn drop_database(&self, database: &Database) -> Result<()> {
        database
            .drop()
            .run()
            .map_err(|err| Error::Cleanup {
                database: database.name().to_string(),
                source: err.into(),
            })?;
        debug!("Dropped database {}", database.name());
        return Ok(());
    }

    pub fn database_names(&self) -> Result<Vec<String>> {
        let client = self.new_client()?;
        return client
            .list_database_names()
            .run()
            .context("Failed to list databases")
            .map_err(Error::Connection);
    }

    /// Stops the container. Calling it again is a no-op.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == ContainerState::Stopped {
            debug!("Mongo container {} is already stopped", self.id());
            return Ok(());
        }
        self.container
            .stop()
            .with_context(|| format!("Failed to stop container {}", self.id()))
            .map_err(Error::Provisioning)?;
        *state = ContainerState::Stopped;
        info!("Stopped mongo container {}", self.id());
        return Ok(());
    }

    pub fn run_scoped<R>(&self, name: &str, body: impl FnOnce(&Database) -> R) -> Result<R> {
        return session::run_scoped(self, name, body);
    }

    pub fn try_run_scoped<R>(
        &self,
        name: &str,
        body: impl FnOnce(&Database) -> anyhow::Result<R>,
    ) -> Result<R> {
        return session::try_run_scoped(self, name, body);
    }

    pub fn must_run_scoped<R>(&self, name: &str, body: impl FnOnce(&Database) -> R) -> R {
        return session::must_run_scoped(self, name, body);
    }

    fn build_connection_string(&self) -> anyhow::Result<String> {
        let host = self
            .container
            .get_host()
            .context("Failed to get container host")?;
        let port = self
            .container
            .get_host_port_ipv4(self.config.port)
            .context("Failed to get mapped mongo port")?;
        return Ok(format!(
            "mongodb://{}:{}@{host}:{port}",
            urlencoding::encode(&self.config.username),
            urlencoding::encode(&self.config.password),
        ));
    }

    fn connect(&self) -> anyhow::Result<Client> {
        if self.state() == ContainerState::Stopped {
            return Err(anyhow::anyhow!("Container {} is stopped", self.id()));
        }
        let uri = self.build_connection_string()?;
        let client = Client::with_uri_str(&uri).context("Failed to create mongo client")?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .run()
            .context("Mongo didn't answer ping")?;
        debug!("Connected to mongo container {}", self.id());
        return Ok(client);
    }
}

impl DatabaseProvider for MongoContainer {
    type Database = Database;

    fn new_database(&self, name: &str) -> Result<Database> {
        return MongoContainer::new_database(self, name);
    }

    fn drop_database(&self, database: &Database) -> Result<()> {
        return MongoContainer::drop_database(self, database);
    }
}

impl std::fmt::Debug for MongoContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("MongoContainer")
            .field("id", &self.id())
            .field("image", &self.config.image.to_string())
            .field("state", &self.state())
            .finish();
    }
}

fn build_request(config: &ResolvedConfig) -> ContainerRequest<GenericImage> {
    let image = GenericImage::new(&config.image.repository, &config.image.tag)
        .with_exposed_port(config.port.tcp())
        .with_wait_for(WaitFor::message_on_stdout(&config.ready_log));

    let mut request: ContainerRequest<GenericImage> = image.into();
    for (key, value) in &config.env {
        request = request.with_env_var(key, value);
    }
    let args = mongod_args(config);
    if !args.is_empty() {
        request = request.with_cmd(args);
    }
    if let Some(name) = &config.container_name {
        request = request.with_container_name(name);
    }
    if let Some(timeout) = config.startup_timeout {
        request = request.with_startup_timeout(timeout);
    }
    return request;
}

/// The image entrypoint hands arguments starting with `-` to mongod.
fn mongod_args(config: &ResolvedConfig) -> Vec<String> {
    if config.port == DEFAULT_PORT {
        return Vec::new();
    }
    return vec!["--port".to_string(), config.port.to_string()];
}
