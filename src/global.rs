//! One mongo container shared by a whole test binary.
//!
//! Opt-in: nothing here runs unless a test calls into it. Call [`teardown`]
//! once the suite is done, statics are never dropped so the container would
//! keep running otherwise.

use std::sync::Arc;

use mongodb::sync::Database;
use parking_lot::Mutex;
use tracing::info;

use crate::config::ContainerConfig;
use crate::container::MongoContainer;
use crate::error::Result;
use crate::session;

static GLOBAL: Mutex<Option<Arc<MongoContainer>>> = Mutex::new(None);

/// Starts a container and makes it the global one. A previously configured
/// container is stopped.
pub fn configure(config: ContainerConfig) -> Result<()> {
    let container = Arc::new(MongoContainer::create(config)?);
    let previous = GLOBAL.lock().replace(container);
    if let Some(previous) = previous {
        info!("Replacing global mongo container {}", previous.id());
        previous.stop()?;
    }
    return Ok(());
}

/// Returns the global container, starting one with the default config on
/// first use.
pub fn get() -> Result<Arc<MongoContainer>> {
    let mut slot = GLOBAL.lock();
    if let Some(container) = slot.as_ref() {
        return Ok(Arc::clone(container));
    }
    info!("No global mongo container configured, starting one with defaults");
    let container = Arc::new(MongoContainer::create(ContainerConfig::default())?);
    *slot = Some(Arc::clone(&container));
    return Ok(container);
}

pub fn teardown() -> Result<()> {
    let container = GLOBAL.lock().take();
    return match container {
        Some(container) => container.stop(),
        None => Ok(()),
    };
}

pub fn run_scoped<R>(name: &str, body: impl FnOnce(&Database) -> R) -> Result<R> {
    let container = get()?;
    return session::run_scoped(container.as_ref(), name, body);
}

pub fn try_run_scoped<R>(
    name: &str,
    body: impl FnOnce(&Database) -> anyhow::Result<R>,
) -> Result<R> {
    let container = get()?;
    return session::try_run_scoped(container.as_ref(), name, body);
}

pub fn must_run_scoped<R>(name: &str, body: impl FnOnce(&Database) -> R) -> R {
    let container = match get() {
        Ok(container) => container,
        Err(err) => panic!("{name}: {err}"),
    };
    return session::must_run_scoped(container.as_ref(), name, body);
}
