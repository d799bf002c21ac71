use crate::engine::{Command, Engine, Submission};
use crate::table::QueryCallback;
use crate::transport;
use crate::wire::QueryBuilder;
use std::time::Duration;
use stubdns_domain::{QueryOutcome, QueryResult, RecordType, ResolveError, ResolverConfig};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Asynchronous DNS stub resolver client.
///
/// Owns a multi-threaded runtime and a single UDP socket shared by every
/// in-flight query. [`StubClient::query`] is non-blocking and may be called
/// from any thread, including from inside a completion callback; callbacks
/// run on the engine's serialization domain and must not block or
/// synchronously wait on another query's completion.
pub struct StubClient {
    config: ResolverConfig,
    runtime: Option<tokio::runtime::Runtime>,
    commands: Option<mpsc::UnboundedSender<Command>>,
    shutdown: CancellationToken,
}

impl StubClient {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            runtime: None,
            commands: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spins up the worker runtime, binds the socket and starts the engine
    /// task (which immediately begins receiving).
    pub fn start(&mut self) -> Result<(), ResolveError> {
        let workers = self.config.effective_workers();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("stubdns-worker")
            .enable_all()
            .build()
            .map_err(|e| ResolveError::IoError(e.to_string()))?;

        let server = self.config.server_addr();
        let socket = transport::bind_socket(server)?;
        let socket = {
            let _guard = runtime.enter();
            UdpSocket::from_std(socket).map_err(|e| ResolveError::IoError(e.to_string()))?
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let engine = Engine::new(
            socket,
            server,
            Duration::from_millis(self.config.timeout_ms),
            rx,
            shutdown.clone(),
        );
        runtime.spawn(engine.run());

        info!(
            server = %server,
            workers,
            timeout_ms = self.config.timeout_ms,
            "stub resolver started"
        );

        self.runtime = Some(runtime);
        self.commands = Some(tx);
        self.shutdown = shutdown;
        Ok(())
    }

    /// Submits a query and returns immediately. The callback receives
    /// exactly one terminal outcome: a parsed reply, a timeout, or an
    /// encode/send error.
    pub fn query(
        &self,
        name: &str,
        qtype: RecordType,
        callback: impl FnOnce(QueryOutcome) + Send + 'static,
    ) {
        let callback: QueryCallback = Box::new(callback);

        // Encoding is stateless and runs on the caller's thread; only the
        // registration + send step is handed to the engine.
        let request = match QueryBuilder::build_query(name, qtype) {
            Ok(request) => request,
            Err(e) => {
                warn!(name, error = %e, "failed to encode query");
                callback(QueryOutcome {
                    name: name.to_string(),
                    qtype,
                    result: QueryResult::Error(e),
                });
                return;
            }
        };

        let Some(commands) = &self.commands else {
            callback(QueryOutcome {
                name: name.to_string(),
                qtype,
                result: QueryResult::Error(ResolveError::NotStarted),
            });
            return;
        };

        let submission = Command::Submit(Submission {
            name: name.to_string(),
            qtype,
            request,
            callback,
        });

        if let Err(mpsc::error::SendError(Command::Submit(submission))) = commands.send(submission)
        {
            (submission.callback)(QueryOutcome {
                name: submission.name,
                qtype: submission.qtype,
                result: QueryResult::Error(ResolveError::NotStarted),
            });
        }
    }

    /// Orderly shutdown: stops the engine (closing the socket), then shuts
    /// the runtime down and joins its workers. Queries still in flight are
    /// abandoned; their callbacks never fire.
    pub fn stop(&mut self) {
        info!("stopping stub resolver");

        self.shutdown.cancel();
        self.commands = None;

        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_secs(5));
        }
    }
}

impl Drop for StubClient {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            self.stop();
        }
    }
}
