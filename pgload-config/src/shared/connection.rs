use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::sync::LazyLock;

use crate::shared::ValidationError;

const APP_NAME_LOADER: &str = "pgload";

/// Session settings applied to every connection opened by the loader.
pub static DEFAULT_SESSION_OPTIONS: LazyLock<PgSessionOptions> =
    LazyLock::new(|| PgSessionOptions {
        datestyle: "ISO".to_string(),
        client_encoding: "UTF8".to_string(),
        timezone: "UTC".to_string(),
        statement_timeout: 30_000,
        lock_timeout: 10_000,
        application_name: APP_NAME_LOADER.to_string(),
    });

/// Postgres `SET`-able session parameters sent as startup options.
#[derive(Debug, Clone)]
pub struct PgSessionOptions {
    pub datestyle: String,
    pub client_encoding: String,
    pub timezone: String,
    /// Milliseconds, `0` disables the timeout.
    pub statement_timeout: u32,
    /// Milliseconds, `0` disables the timeout.
    pub lock_timeout: u32,
    pub application_name: String,
}

impl PgSessionOptions {
    pub fn to_key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("datestyle".to_string(), self.datestyle.clone()),
            ("client_encoding".to_string(), self.client_encoding.clone()),
            ("timezone".to_string(), self.timezone.clone()),
            (
                "statement_timeout".to_string(),
                self.statement_timeout.to_string(),
            ),
            ("lock_timeout".to_string(), self.lock_timeout.to_string()),
            ("application_name".to_string(), self.application_name.clone()),
        ]
    }
}

/// Connection settings for the target Postgres database.
///
/// Intentionally not [`Serialize`] so the password cannot leak into serialized output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database name.
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

/// TLS settings for Postgres connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    /// Fails when TLS is enabled without any trusted root certificate.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Converts connection settings into client specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Options for the server without selecting a database.
    fn without_db(&self, options: Option<&PgSessionOptions>) -> Output;

    /// Options for the configured database.
    fn with_db(&self, options: Option<&PgSessionOptions>) -> Output;
}

impl IntoConnectOptions<PgConnectOptions> for PgConnectionConfig {
    fn without_db(&self, options: Option<&PgSessionOptions>) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };

        let mut connect_options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .ssl_mode(ssl_mode);

        if self.tls.enabled {
            connect_options = connect_options
                .ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        if let Some(options) = options {
            connect_options = connect_options.options(options.to_key_value_pairs());
        }

        connect_options
    }

    fn with_db(&self, options: Option<&PgSessionOptions>) -> PgConnectOptions {
        let connect_options: PgConnectOptions = self.without_db(options);
        connect_options.database(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_options_carry_application_name() {
        let pairs = DEFAULT_SESSION_OPTIONS.to_key_value_pairs();

        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&("application_name".to_string(), "pgload".to_string())));
        assert!(pairs.contains(&("timezone".to_string(), "UTC".to_string())));
    }

    #[test]
    fn tls_requires_certificates_when_enabled() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        assert_eq!(tls.validate(), Err(ValidationError::MissingTrustedRootCerts));
        assert_eq!(TlsConfig::disabled().validate(), Ok(()));
    }
}
