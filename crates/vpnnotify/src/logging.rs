use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt as _, registry::LookupSpan, util::SubscriberInitExt as _,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    /// One line per event, the shape the VPN server's log expects.
    Compact,
}

impl LogFormat {
    pub fn from_mode(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }

    pub fn layer<S>(self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        for<'a> S: Subscriber + LookupSpan<'a>,
    {
        // Written to stdout, which OpenVPN appends to its own log.
        let fmt = tracing_subscriber::fmt::layer().with_ansi(false);

        match self {
            Self::Json => Box::new(fmt.json().with_target(false).with_current_span(true)),
            Self::Pretty => Box::new(
                fmt.pretty()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            Self::Compact => Box::new(fmt.compact().with_target(false)),
        }
    }
}

pub fn init_tracing() {
    let log_mode = std::env::var("RUST_LOG_MODE").unwrap_or_default();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(LogFormat::from_mode(&log_mode).layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_modes() {
        assert_eq!(LogFormat::from_mode("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_mode(" Pretty "), LogFormat::Pretty);
        assert_eq!(LogFormat::from_mode(""), LogFormat::Compact);
        assert_eq!(LogFormat::from_mode("fancy"), LogFormat::Compact);
    }
}
