//! Server and library messages captured by the native callbacks.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

/// Highest severity that is informational rather than an error.
pub const MAX_INFO_SEVERITY: i32 = 10;

/// db-lib's `SYBESMSG`: "check messages from the SQL Server". It only
/// points at server messages that were already delivered.
pub const SERVER_MESSAGE_NOTICE: i32 = 20018;

/// A message delivered through the native message or error handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    /// Message number (`msgno` / `dberr`).
    pub number: i32,
    /// Message text.
    pub message: String,
    /// Severity (0-25). Library-side errors use their db-lib severity.
    pub severity: i32,
    /// Message state.
    pub state: i32,
    /// Server name, when reported.
    pub server: Option<String>,
    /// Procedure name, when reported.
    pub procedure: Option<String>,
    /// Line within the batch or procedure.
    pub line: i32,
}

impl ServerMessage {
    /// Create a message with only number, text and severity set.
    pub fn new(number: i32, message: impl Into<String>, severity: i32) -> Self {
        Self {
            number,
            message: message.into(),
            severity,
            state: 0,
            server: None,
            procedure: None,
            line: 0,
        }
    }

    /// Informational prints and low-severity warnings.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        self.severity <= MAX_INFO_SEVERITY
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msg {}, Level {}", self.number, self.severity)?;
        if let Some(procedure) = &self.procedure {
            write!(f, ", Procedure {procedure}")?;
        }
        if self.line > 0 {
            write!(f, ", Line {}", self.line)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Pick the detail text for a failure from a batch of drained messages:
/// the most recent error-level message, otherwise the most recent message.
/// [`SERVER_MESSAGE_NOTICE`] is only used when nothing else was reported.
#[must_use]
pub fn failure_detail(messages: &[ServerMessage]) -> Option<String> {
    let specific = |m: &&ServerMessage| m.number != SERVER_MESSAGE_NOTICE;
    messages
        .iter()
        .rev()
        .filter(specific)
        .find(|m| !m.is_informational())
        .or_else(|| messages.iter().rev().find(specific))
        .or_else(|| messages.last())
        .map(ToString::to_string)
}

thread_local! {
    static OPENING: RefCell<Option<Vec<ServerMessage>>> = const { RefCell::new(None) };
}

/// Collects the messages raised on the current thread while a connection
/// is being opened.
///
/// db-lib reports login failures against a connection record it never
/// hands back, so they cannot be looked up by handle afterwards. The
/// message callbacks run on the thread that called the library, which
/// makes the thread the key.
#[derive(Debug)]
pub struct OpenCapture {
    // Tied to the thread that started it.
    _thread: PhantomData<*const ()>,
}

impl OpenCapture {
    /// Start collecting on this thread, discarding anything left over.
    #[must_use]
    pub fn begin() -> Self {
        OPENING.with(|slot| *slot.borrow_mut() = Some(Vec::new()));
        Self {
            _thread: PhantomData,
        }
    }

    /// Hand `message` to the capture active on this thread. Gives the
    /// message back when no capture is active.
    pub fn offer(message: ServerMessage) -> Option<ServerMessage> {
        OPENING.with(|slot| match slot.try_borrow_mut() {
            Ok(mut slot) => match slot.as_mut() {
                Some(messages) => {
                    messages.push(message);
                    None
                }
                None => Some(message),
            },
            Err(_) => Some(message),
        })
    }

    /// Stop collecting and return what was captured.
    #[must_use]
    pub fn finish(self) -> Vec<ServerMessage> {
        OPENING.with(|slot| slot.borrow_mut().take().unwrap_or_default())
    }
}

impl Drop for OpenCapture {
    fn drop(&mut self) {
        OPENING.with(|slot| {
            if let Ok(mut slot) = slot.try_borrow_mut() {
                slot.take();
            }
        });
    }
}
