use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `KNOTSYNTH_LOG`, then `RUST_LOG`,
/// then `info`. A second call is a no-op.
///
/// Field names used across the crate: `episode`, `knot`, `frame`,
/// `output_index`, `pull`, `hold`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("KNOTSYNTH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
