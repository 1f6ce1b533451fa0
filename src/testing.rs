static LOGGER: std::sync::Once = std::sync::Once::new();

/// Initializes `env_logger` once per test binary.
pub fn init_logging() {
    LOGGER.call_once(|| {
        env_logger::builder().is_test(true).init();
    });
}
