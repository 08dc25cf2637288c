use tracing::Level;

/// Installs a fmt subscriber that writes through the libtest capture. Only
/// the first call in a process has an effect.
pub fn init_tracing(level: Level) {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .try_init();
    if installed.is_err() {
        tracing::trace!("Tracing subscriber is already installed");
    }
}
