//! Opening and closing the native connection.
//!
//! Runs inside an executor job, so nothing else touches the handles while a
//! login is in progress. A failed connect drops whatever was acquired
//! (connection first, then the login record) before returning.

use tds_native::{EncryptionMode, LoginHandle, LoginOption, NativeError, SessionOption};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::Session;
use crate::state::ConnectionState;

/// Login options in the order they are applied.
pub(crate) fn login_options(config: &Config) -> Vec<LoginOption> {
    let mut options = Vec::with_capacity(12);

    if let Some(user) = config.login_name() {
        options.push(LoginOption::User(user));
    }
    if let Some(password) = &config.password {
        options.push(LoginOption::Password(password.clone()));
    }
    options.push(LoginOption::AppName(config.application_name.clone()));
    if let Some(port) = config.port {
        options.push(LoginOption::Port(port));
    }
    // The library already requests encryption opportunistically.
    if config.encryption != EncryptionMode::Opportunistic {
        options.push(LoginOption::Encryption(config.encryption));
    }
    options.push(LoginOption::NtlmV2(config.ntlmv2));
    options.push(LoginOption::NetworkAuth(config.network_auth));
    options.push(LoginOption::ReadOnlyIntent(config.read_only));
    options.push(LoginOption::WideChars(config.wide_chars));
    options.push(LoginOption::LoginTimeout(config.timeouts.login_timeout));
    options.push(LoginOption::BulkCopy(true));

    options
}

impl Session {
    /// Log in and open the connection described by `config`.
    pub(crate) fn connect(&mut self, config: &Config) -> Result<()> {
        if self.state.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        config.validate()?;

        let decoder = config.decoder()?;
        self.state = ConnectionState::Connecting;
        let outcome = self.open(config);
        match outcome {
            Ok(()) => {
                self.decoder = decoder;
                self.state = ConnectionState::Connected;
                tracing::info!(
                    server = %config.native_server(),
                    database = ?config.database,
                    library = self.library.name(),
                    "connected"
                );
                Ok(())
            }
            Err(e) => {
                self.release();
                tracing::warn!(server = %config.native_server(), error = %e, "connect failed");
                Err(e)
            }
        }
    }

    fn open(&mut self, config: &Config) -> Result<()> {
        let server = config.native_server();

        self.library.init().map_err(|e| connectivity(&server, e))?;

        let mut login: Box<dyn LoginHandle> = self.library.new_login().map_err(|e| match e {
            NativeError::AllocationFailed(what) => Error::connect_resource(what),
            other => connectivity(&server, other),
        })?;
        for option in login_options(config) {
            login
                .apply(&option)
                .map_err(|e| Error::Configuration(format!("cannot set {option:?}: {e}")))?;
        }

        tracing::debug!(server = %server, "opening connection");
        let conn = login.open(&server);
        self.login = Some(login);
        let conn = conn.map_err(|e| connectivity(&server, e))?;
        self.conn = Some(conn);
        // Login chatter (language and packet size changes) goes out as
        // informational messages.
        self.flush_messages();

        let conn = self.conn.as_deref_mut().ok_or(Error::NotConnected)?;
        conn.set_option(SessionOption::TextSize(config.text_size))
            .map_err(Error::execution)?;
        if let Some(timeout) = config.timeouts.query_timeout {
            conn.set_option(SessionOption::QueryTimeout(timeout))
                .map_err(Error::execution)?;
        }

        if let Some(database) = &config.database {
            if let Err(e) = conn.use_database(database) {
                let detail = self.flush_messages().unwrap_or_else(|| native_detail(e));
                return Err(Error::DatabaseSelection {
                    database: database.clone(),
                    detail,
                });
            }
            self.flush_messages();
        }

        Ok(())
    }

    /// Close the connection. Closing a closed connection does nothing.
    pub(crate) fn disconnect(&mut self) {
        if self.conn.is_none() && self.login.is_none() {
            return;
        }
        self.flush_messages();
        self.release();
        tracing::info!(library = self.library.name(), "disconnected");
    }
}

fn native_detail(err: NativeError) -> String {
    match err {
        NativeError::CallFailed { detail, .. } | NativeError::LoginRejected { detail, .. } => detail,
        other => other.to_string(),
    }
}

fn connectivity(server: &str, err: NativeError) -> Error {
    Error::Connectivity {
        server: server.to_string(),
        detail: native_detail(err),
    }
}
