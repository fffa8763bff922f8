use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Tracing output style.
#[derive(Debug, Clone, Copy, strum_macros::EnumString, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FmtStyle {
    /// Compact style.
    Compact,
    /// Pretty style.
    Pretty,
    /// Json style.
    Json,
}

/// Initialise tracing with an `EnvFilter` defaulting to `info` when
/// `RUST_LOG` is not set.
pub fn init_tracing(style: FmtStyle) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);
    match style {
        FmtStyle::Compact => subscriber
            .with(tracing_subscriber::fmt::layer().compact().boxed())
            .init(),
        FmtStyle::Pretty => subscriber
            .with(tracing_subscriber::fmt::layer().pretty().boxed())
            .init(),
        FmtStyle::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json().boxed())
            .init(),
    }
}
