//! Outbound HTTP client settings, used by HTTP probes.
//!
//! # Design Decisions
//! - `ClientConfig` embeds `HttpClientConfig` by value (flattened in TOML)
//!   and adds transport-level options on top
//! - Settings map onto a `reqwest::Client`; anything reqwest cannot express
//!   (NTLM) is rejected at validation time

use std::path::PathBuf;
use std::time::Duration;

use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_RETRIES: u32 = 1000;

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("failed to read trust store {path:?}: {source}")]
    TrustStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid trust store certificate: {0}")]
    Certificate(#[source] reqwest::Error),

    #[error("invalid proxy: {0}")]
    Proxy(#[source] reqwest::Error),

    #[error("unsupported proxy auth scheme {0}")]
    UnsupportedAuthScheme(String),

    #[error("unsupported TLS protocol {0:?}")]
    UnsupportedTlsProtocol(String),

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Connection and request settings shared by every HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Total time budget for one request.
    #[serde(with = "crate::config::duration")]
    pub timeout: Duration,

    #[serde(with = "crate::config::duration")]
    pub connection_timeout: Duration,

    /// How long idle pooled connections are kept. `0` keeps reqwest's default.
    #[serde(with = "crate::config::duration")]
    pub keep_alive: Duration,

    pub cookies_enabled: bool,

    /// Idle connections kept per host.
    pub max_connections_per_route: usize,

    /// Extra attempts after a connection-level failure.
    pub retries: u32,

    pub user_agent: Option<String>,

    pub proxy: Option<ProxyConfig>,

    pub tls: Option<TlsConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            connection_timeout: Duration::from_millis(500),
            keep_alive: Duration::ZERO,
            cookies_enabled: false,
            max_connections_per_route: 1024,
            retries: 0,
            user_agent: None,
            proxy: None,
            tls: None,
        }
    }
}

/// `HttpClientConfig` plus response handling options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub http: HttpClientConfig,

    /// Accept and transparently decode gzip responses.
    pub gzip_enabled: bool,

    /// Redirects followed per request. `0` disables redirects.
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            gzip_enabled: true,
            max_redirects: 10,
        }
    }
}

impl ClientConfig {
    /// Build the `reqwest::Client` these settings describe.
    pub fn build_client(&self) -> Result<reqwest::Client, ClientBuildError> {
        let http = &self.http;
        let redirect = if self.max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(self.max_redirects)
        };

        let mut builder = reqwest::Client::builder()
            .timeout(http.timeout)
            .connect_timeout(http.connection_timeout)
            .pool_max_idle_per_host(http.max_connections_per_route)
            .cookie_store(http.cookies_enabled)
            .gzip(self.gzip_enabled)
            .redirect(redirect);

        if !http.keep_alive.is_zero() {
            builder = builder.pool_idle_timeout(http.keep_alive);
        }
        if let Some(user_agent) = &http.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        // Only the configured proxy is used, never one from the environment.
        builder = match &http.proxy {
            Some(proxy) => builder.proxy(proxy.build()?),
            None => builder.no_proxy(),
        };
        if let Some(tls) = &http.tls {
            builder = tls.apply(builder)?;
        }

        builder.build().map_err(ClientBuildError::Build)
    }
}

/// Forward proxy for outbound requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: String,

    /// `-1` means the scheme's default port.
    pub port: i32,

    /// `http` or `https`, case-insensitive.
    pub scheme: String,

    pub auth: Option<AuthConfig>,

    /// Hosts reached directly, bypassing the proxy.
    pub non_proxy_hosts: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: -1,
            scheme: "http".to_string(),
            auth: None,
            non_proxy_hosts: Vec::new(),
        }
    }
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        let scheme = self.scheme.to_ascii_lowercase();
        if self.port < 0 {
            format!("{scheme}://{}", self.host)
        } else {
            format!("{scheme}://{}:{}", self.host, self.port)
        }
    }

    fn build(&self) -> Result<reqwest::Proxy, ClientBuildError> {
        let mut proxy = reqwest::Proxy::all(self.url()).map_err(ClientBuildError::Proxy)?;
        if let Some(auth) = &self.auth {
            match auth.auth_scheme {
                AuthScheme::Basic => proxy = proxy.basic_auth(&auth.username, &auth.password),
                AuthScheme::Ntlm => {
                    return Err(ClientBuildError::UnsupportedAuthScheme("NTLM".to_string()))
                }
            }
        }
        if !self.non_proxy_hosts.is_empty() {
            proxy = proxy.no_proxy(reqwest::NoProxy::from_string(&self.non_proxy_hosts.join(",")));
        }
        Ok(proxy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum AuthScheme {
    #[default]
    #[serde(rename = "Basic", alias = "basic", alias = "BASIC")]
    Basic,
    #[serde(rename = "NTLM", alias = "ntlm", alias = "Ntlm")]
    Ntlm,
}

/// Proxy credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub auth_scheme: AuthScheme,
}

/// TLS settings for outbound connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Minimum protocol version: `TLSv1.2` or `TLSv1.3`.
    pub protocol: String,

    /// Extra PEM root certificates to trust.
    pub trust_store_path: Option<PathBuf>,

    pub trust_self_signed_certificates: bool,

    pub verify_hostname: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            protocol: "TLSv1.2".to_string(),
            trust_store_path: None,
            trust_self_signed_certificates: false,
            verify_hostname: true,
        }
    }
}

impl TlsConfig {
    pub fn min_version(&self) -> Result<reqwest::tls::Version, ClientBuildError> {
        match self.protocol.as_str() {
            "TLSv1.2" => Ok(reqwest::tls::Version::TLS_1_2),
            "TLSv1.3" => Ok(reqwest::tls::Version::TLS_1_3),
            other => Err(ClientBuildError::UnsupportedTlsProtocol(other.to_string())),
        }
    }

    fn apply(
        &self,
        mut builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, ClientBuildError> {
        builder = builder.min_tls_version(self.min_version()?);

        if let Some(path) = &self.trust_store_path {
            let pem = std::fs::read(path).map_err(|source| ClientBuildError::TrustStore {
                path: path.clone(),
                source,
            })?;
            let certificate =
                reqwest::Certificate::from_pem(&pem).map_err(ClientBuildError::Certificate)?;
            builder = builder.add_root_certificate(certificate);
        }
        if self.trust_self_signed_certificates {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if !self.verify_hostname {
            builder = builder.danger_accept_invalid_hostnames(true);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_http_settings_parse() {
        let config: ClientConfig = toml::from_str(
            r#"
            timeout = "2s"
            retries = 3
            gzip_enabled = false

            [proxy]
            host = "proxy.internal"
            port = 3128
            "#,
        )
        .unwrap();

        assert_eq!(config.http.timeout, Duration::from_secs(2));
        assert_eq!(config.http.connection_timeout, Duration::from_millis(500));
        assert_eq!(config.http.retries, 3);
        assert!(!config.gzip_enabled);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(
            config.http.proxy.as_ref().map(ProxyConfig::url).as_deref(),
            Some("http://proxy.internal:3128")
        );
    }

    #[test]
    fn default_client_builds() {
        assert!(ClientConfig::default().build_client().is_ok());
    }

    #[test]
    fn proxy_url_omits_default_port() {
        let proxy = ProxyConfig {
            host: "proxy".to_string(),
            scheme: "HTTPS".to_string(),
            ..ProxyConfig::default()
        };
        assert_eq!(proxy.url(), "https://proxy");
    }

    #[test]
    fn ntlm_proxy_auth_is_rejected() {
        let mut config = ClientConfig::default();
        config.http.proxy = Some(ProxyConfig {
            host: "proxy".to_string(),
            auth: Some(AuthConfig {
                username: "svc".to_string(),
                password: "secret".to_string(),
                auth_scheme: AuthScheme::Ntlm,
            }),
            ..ProxyConfig::default()
        });
        assert!(matches!(
            config.build_client(),
            Err(ClientBuildError::UnsupportedAuthScheme(_))
        ));
    }

    #[test]
    fn missing_trust_store_is_reported() {
        let mut config = ClientConfig::default();
        config.http.tls = Some(TlsConfig {
            trust_store_path: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..TlsConfig::default()
        });
        assert!(matches!(
            config.build_client(),
            Err(ClientBuildError::TrustStore { .. })
        ));
    }

    #[test]
    fn unknown_tls_protocol_is_rejected() {
        let tls = TlsConfig {
            protocol: "SSLv3".to_string(),
            ..TlsConfig::default()
        };
        assert!(tls.min_version().is_err());
    }
}
