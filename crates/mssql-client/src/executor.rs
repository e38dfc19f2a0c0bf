//! Serialized command execution.
//!
//! Native handles are blocking and not reentrant, so each client owns one
//! dedicated OS thread that holds the [`Session`] (login record, connection
//! handle and decode scratch space). Every public operation is boxed as a
//! job, queued on an unbounded channel, and run to completion before the
//! next job is taken. Callers await a oneshot reply and never block their
//! runtime.
//!
//! ```text
//! caller A ─┐
//! caller B ─┼─► mpsc (FIFO) ─► executor thread ─► Session ─► native handle
//! caller C ─┘        ▲                 │
//!                    └── oneshot ◄─────┘
//! ```

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mssql_types::Decoder;
use tds_native::message::failure_detail;
use tds_native::{ConnectionHandle, LoginHandle, NativeError, NativeLibrary, ServerMessage};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::assembler::ResultAssembler;
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::state::ConnectionState;

/// Capacity of the informational message channel per client.
pub(crate) const MESSAGE_CHANNEL_CAPACITY: usize = 256;

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

type Job = Box<dyn FnOnce(&mut Session) + Send>;

/// Everything a connection's jobs may touch. Lives on the executor thread.
pub(crate) struct Session {
    // Declared before `login` so the connection closes first on drop.
    pub(crate) conn: Option<Box<dyn ConnectionHandle>>,
    pub(crate) login: Option<Box<dyn LoginHandle>>,
    pub(crate) library: Arc<dyn NativeLibrary>,
    pub(crate) decoder: Decoder,
    pub(crate) state: ConnectionState,
    messages: broadcast::Sender<ServerMessage>,
}

impl Session {
    fn new(library: Arc<dyn NativeLibrary>, messages: broadcast::Sender<ServerMessage>) -> Self {
        Self {
            conn: None,
            login: None,
            library,
            decoder: Decoder::default(),
            state: ConnectionState::Disconnected,
            messages,
        }
    }

    /// The open connection, or `NotConnected`.
    pub(crate) fn connection(&mut self) -> Result<&mut dyn ConnectionHandle> {
        self.parts().map(|(conn, _)| conn)
    }

    /// The open connection together with the decoder.
    pub(crate) fn parts(&mut self) -> Result<(&mut dyn ConnectionHandle, &mut Decoder)> {
        match (self.state, self.conn.as_deref_mut()) {
            (ConnectionState::Connected, Some(conn)) => {
                let conn: &mut dyn ConnectionHandle = conn;
                Ok((conn, &mut self.decoder))
            }
            _ => Err(Error::NotConnected),
        }
    }

    /// Clear anything left over from an earlier command.
    pub(crate) fn begin_command(&mut self) -> Result<(&mut dyn ConnectionHandle, &mut Decoder)> {
        let (conn, decoder) = self.parts()?;
        if let Err(e) = conn.cancel() {
            tracing::debug!(error = %e, "cancel before command failed");
        }
        Ok((conn, decoder))
    }

    /// Run a batch and assemble its results.
    pub(crate) fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(Error::Configuration("no command text".into()));
        }
        tracing::debug!(sql = sql, "executing batch");
        let outcome = {
            let (conn, decoder) = self.begin_command()?;
            conn.submit(sql)
                .and_then(|()| ResultAssembler::new(conn, decoder).read_all())
        };
        match outcome {
            Ok(result) => {
                self.flush_messages();
                Ok(result)
            }
            Err(e) => Err(self.execution_error(e)),
        }
    }

    /// Drain pending messages. Informational ones are broadcast; the
    /// detail of the most relevant error is returned.
    pub(crate) fn flush_messages(&mut self) -> Option<String> {
        let messages = match self.conn.as_deref_mut() {
            Some(conn) => conn.drain_messages(),
            None => return None,
        };
        self.publish(messages)
    }

    pub(crate) fn publish(&self, messages: Vec<ServerMessage>) -> Option<String> {
        let detail = messages
            .iter()
            .any(|m| !m.is_informational())
            .then(|| failure_detail(&messages))
            .flatten();
        for message in messages {
            if message.is_informational() {
                tracing::debug!(number = message.number, message = %message.message, "server message");
                // No subscribers is fine.
                let _ = self.messages.send(message);
            } else {
                tracing::warn!(
                    number = message.number,
                    severity = message.severity,
                    message = %message.message,
                    "server error"
                );
            }
        }
        detail
    }

    /// Turn a native failure during a command into an execution error,
    /// preferring the server's own text.
    pub(crate) fn execution_error(&mut self, err: NativeError) -> Error {
        match (self.flush_messages(), err) {
            (_, err @ NativeError::AllocationFailed(_)) => Error::execution(err),
            (Some(detail), _) => Error::Execution(detail),
            (None, err) => Error::execution(err),
        }
    }

    /// Release the connection, then the login record.
    pub(crate) fn release(&mut self) {
        self.conn = None;
        self.login = None;
        self.state = ConnectionState::Disconnected;
    }
}

/// Owner of the executor thread. Dropping it closes the queue; the thread
/// finishes queued jobs, releases the handles and exits.
pub(crate) struct Executor {
    id: u64,
    jobs: mpsc::UnboundedSender<Job>,
    messages: broadcast::Sender<ServerMessage>,
}

impl Executor {
    /// Start the executor thread.
    pub(crate) fn spawn(library: Arc<dyn NativeLibrary>) -> Result<Self> {
        let id = NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed);
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
        let (messages, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let session_messages = messages.clone();

        std::thread::Builder::new()
            .name(format!("mssql-conn-{id}"))
            .spawn(move || {
                let mut session = Session::new(library, session_messages);
                while let Some(job) = queue.blocking_recv() {
                    job(&mut session);
                }
                if session.state.is_connected() {
                    tracing::debug!(executor = id, "releasing connection on shutdown");
                }
                session.release();
            })
            .map_err(|e| Error::connect_resource(format!("cannot start connection thread: {e}")))?;

        tracing::trace!(executor = id, "executor started");
        Ok(Self {
            id,
            jobs,
            messages,
        })
    }

    /// Identifier used in thread names and logs.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Subscribe to informational server messages.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.messages.subscribe()
    }

    /// Queue `f` and wait for its outcome.
    ///
    /// Jobs run strictly in the order `run` was first polled. A panic inside
    /// `f` is caught and reported once as [`Error::Panicked`]; the executor
    /// keeps serving later jobs.
    pub(crate) async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T> + Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let result = catch_unwind(AssertUnwindSafe(|| f(session)))
                .unwrap_or_else(|panic| Err(Error::Panicked(panic_message(panic.as_ref()))));
            // The caller may have stopped waiting.
            let _ = reply.send(result);
        });

        self.jobs.send(job).map_err(|_| Error::ExecutorClosed)?;
        outcome.await.map_err(|_| Error::ExecutorClosed)?
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("closed", &self.jobs.is_closed())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
