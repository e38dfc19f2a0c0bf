//! Login record and session options.

use std::fmt;
use std::time::Duration;

/// Transport encryption requested at login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EncryptionMode {
    /// Never encrypt.
    Off,
    /// Encrypt when the server supports it (library default).
    #[default]
    Opportunistic,
    /// Always encrypt, do not verify the server certificate.
    Required,
    /// Always encrypt and verify the server certificate.
    Strict,
}

impl EncryptionMode {
    /// Value passed to the library's encryption login field.
    #[must_use]
    pub const fn as_native(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Opportunistic => "request",
            Self::Required => "require",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_native())
    }
}

/// A single field applied to a login record before opening.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoginOption {
    /// Login name (`DOMAIN\user` for integrated authentication).
    User(String),
    /// Password.
    Password(String),
    /// Application name reported to the server.
    AppName(String),
    /// TCP port override.
    Port(u16),
    /// Encryption mode.
    Encryption(EncryptionMode),
    /// Use NTLMv2.
    NtlmV2(bool),
    /// Use network (integrated) authentication.
    NetworkAuth(bool),
    /// Declare read-only application intent.
    ReadOnlyIntent(bool),
    /// Negotiate UTF-16 for wide character data.
    WideChars(bool),
    /// Login timeout.
    LoginTimeout(Duration),
    /// Enable bulk-copy on the connection.
    BulkCopy(bool),
}

impl fmt::Debug for LoginOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(user) => f.debug_tuple("User").field(user).finish(),
            Self::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
            Self::AppName(app) => f.debug_tuple("AppName").field(app).finish(),
            Self::Port(port) => f.debug_tuple("Port").field(port).finish(),
            Self::Encryption(mode) => f.debug_tuple("Encryption").field(mode).finish(),
            Self::NtlmV2(v) => f.debug_tuple("NtlmV2").field(v).finish(),
            Self::NetworkAuth(v) => f.debug_tuple("NetworkAuth").field(v).finish(),
            Self::ReadOnlyIntent(v) => f.debug_tuple("ReadOnlyIntent").field(v).finish(),
            Self::WideChars(v) => f.debug_tuple("WideChars").field(v).finish(),
            Self::LoginTimeout(d) => f.debug_tuple("LoginTimeout").field(d).finish(),
            Self::BulkCopy(v) => f.debug_tuple("BulkCopy").field(v).finish(),
        }
    }
}

/// An option set on an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionOption {
    /// Maximum bytes returned for `text`/`ntext`/`image` columns.
    TextSize(u32),
    /// Per-command timeout.
    QueryTimeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_native_values() {
        assert_eq!(EncryptionMode::Off.as_native(), "off");
        assert_eq!(EncryptionMode::Opportunistic.as_native(), "request");
        assert_eq!(EncryptionMode::Required.as_native(), "require");
        assert_eq!(EncryptionMode::Strict.as_native(), "strict");
    }

    #[test]
    fn test_password_is_redacted() {
        let dbg = format!("{:?}", LoginOption::Password("hunter2".into()));
        assert!(!dbg.contains("hunter2"));
    }
}
