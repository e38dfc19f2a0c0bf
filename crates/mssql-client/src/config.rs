//! Client configuration.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use mssql_types::Decoder;

pub use tds_native::EncryptionMode;

use crate::error::Error;

/// Largest `text`/`ntext`/`image` value the server sends unless told
/// otherwise.
pub const MAX_TEXT_SIZE: u32 = i32::MAX as u32;

static DEFAULT_TEXT_SIZE: AtomicU32 = AtomicU32::new(MAX_TEXT_SIZE);

/// Set the text size new configurations start with.
///
/// Only configurations created afterwards pick the value up, so call this
/// before building the configuration for a connection.
pub fn set_default_text_size(bytes: u32) {
    DEFAULT_TEXT_SIZE.store(bytes, Ordering::Relaxed);
}

/// The text size new configurations start with.
#[must_use]
pub fn default_text_size() -> u32 {
    DEFAULT_TEXT_SIZE.load(Ordering::Relaxed)
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Time allowed for the login handshake (default: 30s).
    pub login_timeout: Duration,
    /// Per-command timeout; `None` waits indefinitely (default).
    pub query_timeout: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(30),
            query_timeout: None,
        }
    }
}

impl TimeoutConfig {
    /// Create a new timeout configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the login timeout.
    #[must_use]
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the per-command timeout.
    #[must_use]
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }
}

/// Configuration for connecting to SQL Server.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future releases without breaking semver. Use [`Config::default()`]
/// or [`Config::from_connection_string()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Server hostname or IP address.
    pub server: String,

    /// Port override. Without one the library resolves the port (1433,
    /// or the instance's port through the browser service).
    pub port: Option<u16>,

    /// Instance name (for named instances).
    pub instance: Option<String>,

    /// Login name.
    pub user: Option<String>,

    /// Password.
    pub password: Option<String>,

    /// Windows domain for integrated authentication.
    pub domain: Option<String>,

    /// Database to switch to after login.
    pub database: Option<String>,

    /// Application name (shown in SQL Server management tools).
    pub application_name: String,

    /// Transport encryption.
    pub encryption: EncryptionMode,

    /// Use NTLMv2 for integrated authentication.
    pub ntlmv2: bool,

    /// Use network (integrated) authentication.
    pub network_auth: bool,

    /// Declare read-only application intent.
    pub read_only: bool,

    /// Negotiate UTF-16 for wide character data.
    pub wide_chars: bool,

    /// Maximum bytes returned for `text`/`ntext`/`image` columns.
    pub text_size: u32,

    /// Single-byte code page used when narrow text is not UTF-8
    /// (an encoding label such as `windows-1252`).
    pub legacy_encoding: String,

    /// Timeouts.
    pub timeouts: TimeoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: None,
            instance: None,
            user: None,
            password: None,
            domain: None,
            database: None,
            application_name: "mssql-client".to_string(),
            encryption: EncryptionMode::default(),
            ntlmv2: false,
            network_auth: false,
            read_only: false,
            wide_chars: true,
            text_size: default_text_size(),
            legacy_encoding: "windows-1252".to_string(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "sspi" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(Error::Configuration(format!("invalid value for {key}: {value}"))),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, Error> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::Configuration(format!("invalid value for {key}: {value}")))
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into configuration.
    ///
    /// Supports ADO.NET-style connection strings:
    /// ```text
    /// Server=localhost;Database=mydb;User Id=sa;Password=secret;
    /// ```
    ///
    /// Unknown keys are ignored. `TrustServerCertificate=false` together
    /// with `Encrypt=true` asks for a verified certificate.
    pub fn from_connection_string(conn_str: &str) -> Result<Self, Error> {
        let mut config = Self::default();
        let mut trust_server_certificate = None;

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Configuration(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "server" | "data source" | "address" | "addr" | "host" => {
                    config = config.server(value)?;
                }
                "port" => {
                    config.port = Some(value.parse().map_err(|_| {
                        Error::Configuration(format!("invalid port: {value}"))
                    })?);
                }
                "database" | "initial catalog" => {
                    config.database = Some(value.to_string());
                }
                "user id" | "uid" | "user" => {
                    config.user = Some(value.to_string());
                }
                "password" | "pwd" => {
                    config.password = Some(value.to_string());
                }
                "domain" => {
                    config.domain = Some(value.to_string());
                }
                "application name" | "app" => {
                    config.application_name = value.to_string();
                }
                "encrypt" => {
                    config.encryption = match value.to_ascii_lowercase().as_str() {
                        "false" | "no" | "0" | "optional" | "off" => EncryptionMode::Off,
                        "true" | "yes" | "1" | "mandatory" => EncryptionMode::Required,
                        "strict" => EncryptionMode::Strict,
                        _ => {
                            return Err(Error::Configuration(format!(
                                "invalid value for encrypt: {value}"
                            )));
                        }
                    };
                }
                "trustservercertificate" | "trust server certificate" => {
                    trust_server_certificate = Some(parse_bool(&key, value)?);
                }
                "connect timeout" | "connection timeout" | "login timeout" => {
                    config.timeouts.login_timeout = parse_secs(&key, value)?;
                }
                "command timeout" => {
                    let timeout = parse_secs(&key, value)?;
                    config.timeouts.query_timeout = (!timeout.is_zero()).then_some(timeout);
                }
                "applicationintent" | "application intent" => {
                    config.read_only = value.eq_ignore_ascii_case("readonly");
                }
                "ntlmv2" => {
                    config.ntlmv2 = parse_bool(&key, value)?;
                }
                "integrated security" | "trusted_connection" => {
                    config.network_auth = parse_bool(&key, value)?;
                }
                "text size" | "textsize" => {
                    config.text_size = value.parse().map_err(|_| {
                        Error::Configuration(format!("invalid text size: {value}"))
                    })?;
                }
                "legacy encoding" => {
                    config.legacy_encoding = value.to_string();
                }
                _ => {
                    // Ignore unknown options for forward compatibility
                    tracing::debug!(
                        key = key,
                        "ignoring unknown connection string option"
                    );
                }
            }
        }

        if trust_server_certificate == Some(false) && config.encryption == EncryptionMode::Required
        {
            config.encryption = EncryptionMode::Strict;
        }

        Ok(config)
    }

    /// Set the server. Accepts `host`, `host,port`, `host:port` and
    /// `host\instance`.
    pub fn server(mut self, server: &str) -> Result<Self, Error> {
        let server = server.trim().trim_start_matches("tcp:");
        if let Some((host, port)) = server.split_once(',').or_else(|| server.split_once(':')) {
            self.server = host.to_string();
            self.port = Some(
                port.trim()
                    .parse()
                    .map_err(|_| Error::Configuration(format!("invalid port: {port}")))?,
            );
        } else if let Some((host, instance)) = server.split_once('\\') {
            self.server = host.to_string();
            self.instance = Some(instance.to_string());
        } else {
            self.server = server.to_string();
        }
        Ok(self)
    }

    /// Set the server host without parsing.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.server = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set SQL login credentials.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the Windows domain and enable network authentication.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self.network_auth = true;
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set the encryption mode.
    #[must_use]
    pub fn encryption(mut self, mode: EncryptionMode) -> Self {
        self.encryption = mode;
        self
    }

    /// Enable or disable NTLMv2.
    #[must_use]
    pub fn ntlmv2(mut self, enabled: bool) -> Self {
        self.ntlmv2 = enabled;
        self
    }

    /// Enable or disable network authentication.
    #[must_use]
    pub fn network_auth(mut self, enabled: bool) -> Self {
        self.network_auth = enabled;
        self
    }

    /// Declare read-only application intent.
    #[must_use]
    pub fn read_only(mut self, enabled: bool) -> Self {
        self.read_only = enabled;
        self
    }

    /// Enable or disable UTF-16 negotiation for wide character data.
    #[must_use]
    pub fn wide_chars(mut self, enabled: bool) -> Self {
        self.wide_chars = enabled;
        self
    }

    /// Set the text size for this connection.
    #[must_use]
    pub fn text_size(mut self, bytes: u32) -> Self {
        self.text_size = bytes;
        self
    }

    /// Set the legacy code page label.
    #[must_use]
    pub fn legacy_encoding(mut self, label: impl Into<String>) -> Self {
        self.legacy_encoding = label.into();
        self
    }

    /// Set the timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The server string handed to the library's open call.
    #[must_use]
    pub fn native_server(&self) -> String {
        match &self.instance {
            Some(instance) => format!("{}\\{instance}", self.server),
            None => self.server.clone(),
        }
    }

    /// The login name, qualified with the domain when one is set.
    #[must_use]
    pub fn login_name(&self) -> Option<String> {
        let user = self.user.as_deref()?;
        Some(match &self.domain {
            Some(domain) if !user.contains('\\') => format!("{domain}\\{user}"),
            _ => user.to_string(),
        })
    }

    /// A text decoder for this connection's legacy code page.
    pub fn decoder(&self) -> Result<Decoder, Error> {
        Decoder::for_label(&self.legacy_encoding).ok_or_else(|| {
            Error::Configuration(format!("unknown legacy encoding: {}", self.legacy_encoding))
        })
    }

    /// Check the configuration for values the library would reject.
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.trim().is_empty() {
            return Err(Error::Configuration("server is required".into()));
        }
        if self.port == Some(0) {
            return Err(Error::Configuration("port must be non-zero".into()));
        }
        if self.password.is_some() && self.user.is_none() && !self.network_auth {
            return Err(Error::Configuration("password given without a user".into()));
        }
        self.decoder().map(|_| ())
    }
}
