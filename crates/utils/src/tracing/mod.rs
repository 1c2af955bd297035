use cfgstore_core::CFGSTORE_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use ::tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// The filter comes from `CFGSTORE_LOG`, then `RUST_LOG`, then `default_level`.
/// Output is a compact, non-ANSI formatter on stderr. Calling this twice is
/// an error reported by the subscriber registry.
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_env(CFGSTORE_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_level))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Span wrapping a batch
pub fn batch_span(type_tag: &str, size: usize, strict: bool) -> Span {
    span!(Level::INFO, "batch", type_tag = %type_tag, size = size, strict = strict)
}
