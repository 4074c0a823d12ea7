//! Replaceable structured log sink.
//!
//! A [`LogSink`] owns an optional [`Dispatch`]. Lifecycle code logs through
//! [`LogSink::emit`], which runs the usual `tracing` macros with the
//! installed dispatch as the scoped default. With no dispatch installed the
//! closure is not run at all, so a disabled sink is silent even when the
//! process has a global subscriber.
//!
//! Clones share one slot: swapping the sink on any clone affects all of
//! them.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{Dispatch, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::MakeWriter;

/// Filter used by the development sink when `RUST_LOG` is unset.
const DEVELOPMENT_FILTER: &str = "debug";
/// Filter used by the production fallback sink.
const PRODUCTION_FILTER: &str = "info";

type DispatchFactory = Arc<dyn Fn() -> Dispatch + Send + Sync>;

#[derive(Clone)]
pub struct LogSink {
    slot: Arc<RwLock<Option<Dispatch>>>,
    /// Builds the dispatch installed by `Default` and `enable_default`.
    make_default: DispatchFactory,
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Default for LogSink {
    /// A sink with the default dispatch already installed.
    fn default() -> Self {
        Self::with_default_factory(Arc::new(default_dispatch))
    }
}

impl LogSink {
    /// A sink that drops every record.
    pub fn disabled() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            make_default: Arc::new(default_dispatch),
        }
    }

    /// Like [`LogSink::default`], but the default-format output goes to
    /// `writer` instead of stdout.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn with_default_writer<W>(writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Clone + Send + Sync + 'static,
    {
        Self::with_default_factory(Arc::new(move || {
            default_dispatch_with_writer(writer.clone())
        }))
    }

    fn with_default_factory(make_default: DispatchFactory) -> Self {
        let sink = Self {
            slot: Arc::new(RwLock::new(None)),
            make_default,
        };
        sink.replace(Some((sink.make_default)()));
        sink.emit(|| info!("Logger initialized"));
        sink
    }

    /// A sink writing to `dispatch`, without the installation record.
    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        let sink = Self::disabled();
        sink.replace(Some(dispatch));
        sink
    }

    /// Install a caller-provided subscriber.
    pub fn set_sink(&self, dispatch: Dispatch) {
        self.replace(Some(dispatch));
        self.emit(|| info!("Custom logger installed"));
    }

    /// Drop the current subscriber; later records are discarded.
    pub fn disable(&self) {
        self.replace(None);
    }

    /// Install the best-effort default subscriber.
    pub fn enable_default(&self) {
        self.replace(Some((self.make_default)()));
        self.emit(|| info!("Default logging re-enabled"));
    }

    pub fn is_enabled(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run `f` with the installed subscriber as the default dispatcher.
    ///
    /// `f` is not called when the sink is disabled.
    pub fn emit<F: FnOnce()>(&self, f: F) {
        let dispatch = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(dispatch) = dispatch {
            tracing::dispatcher::with_default(&dispatch, f);
        }
    }

    fn replace(&self, dispatch: Option<Dispatch>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = dispatch;
    }
}

/// Build the default subscriber, writing to stdout.
///
/// Prefers a human-readable development format at `debug` (or whatever
/// `RUST_LOG` says). If `RUST_LOG` holds a directive that does not parse,
/// falls back to JSON lines at `info`.
pub fn default_dispatch() -> Dispatch {
    default_dispatch_with_writer(std::io::stdout)
}

/// [`default_dispatch`] with its output sent to `writer`.
pub fn default_dispatch_with_writer<W>(writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Clone + Send + Sync + 'static,
{
    development_dispatch(writer.clone()).unwrap_or_else(|_| production_dispatch(writer))
}

fn development_dispatch<W>(writer: W) -> Result<Dispatch, ParseError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new(DEVELOPMENT_FILTER),
    };
    Ok(Dispatch::new(
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .with_writer(writer)
            .finish(),
    ))
}

fn production_dispatch<W>(writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    Dispatch::new(
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::new(PRODUCTION_FILTER))
            .with_writer(writer)
            .finish(),
    )
}
