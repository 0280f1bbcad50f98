use log::LevelFilter;

/// Initialize logging using env_logger.
/// By default, this reads the RUST_LOG environment variable for filtering,
/// falling back to `info`.
/// e.g., `RUST_LOG=dirproxy_core=debug dirproxy connect --profile corp`
pub fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();
    let _ = builder.try_init();
}
