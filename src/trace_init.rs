#[cfg(feature = "trace")]
use std::path::Path;
#[cfg(feature = "trace")]
use std::sync::Once;

#[cfg(feature = "trace")]
static INIT: Once = Once::new();

#[cfg(feature = "trace")]
const DEFAULT_FILTER: &str = "q9_engine=info,q9_session=info,q9_core=info";

/// Install the global subscriber. With `log_dir` the output goes to a JSON
/// lines file in that directory; otherwise to stderr. `RUST_LOG` overrides
/// the default filter.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: Option<&Path>) {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

        match log_dir {
            Some(dir) => {
                let file_appender = tracing_appender::rolling::never(dir, "q9-trace.jsonl");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                std::mem::forget(guard); // lives for the whole process

                tracing_subscriber::fmt()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
                    .with_env_filter(filter)
                    .init();
            }
            None => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_env_filter(filter)
                    .init();
            }
        }
    });
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: Option<&std::path::Path>) {}
