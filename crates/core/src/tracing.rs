//! Subscriber setup for binaries and ad-hoc debugging.
//!
//! Library code only emits `tracing` events; nothing is printed until a
//! subscriber is installed, normally through [`crate::config::set_logger`].

#[cfg(feature = "trace")]
pub use tracer::init_tracer;

#[cfg(feature = "trace")]
mod tracer {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

    /// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
    /// `level` (or DEBUG in debug builds, INFO otherwise).
    ///
    /// `MINSTREL_LOG_FORMAT=json` switches to JSON lines and
    /// `MINSTREL_DISABLE_LOGS` silences everything.
    pub fn init_tracer(level: Option<LevelFilter>) -> anyhow::Result<()> {
        let default_filter = if cfg!(any(test, debug_assertions)) {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let default_filter = level.unwrap_or(default_filter);
        let filter_layer = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(default_filter.into())
            .from_env_lossy();

        let disabled_logs = std::env::var("MINSTREL_DISABLE_LOGS").is_ok();
        let use_json = std::env::var("MINSTREL_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let with_location = cfg!(any(test, debug_assertions));

        let fmt_layer = if use_json {
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .json()
                .with_file(with_location)
                .with_line_number(with_location)
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_file(with_location)
                .with_line_number(with_location)
                .with_writer(std::io::stderr)
                .boxed()
        };

        let registry = tracing_subscriber::registry().with(filter_layer);
        if disabled_logs {
            registry.try_init()?;
        } else {
            registry.with(fmt_layer).try_init()?;
        }
        Ok(())
    }
}
