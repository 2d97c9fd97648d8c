//! SOAP transport for DSML documents.
//!
//! A [`Transport`] delivers one serialized DSML batch request and hands back the raw response
//! body. [`HttpTransport`] is the production implementation: a single HTTP POST per call with
//! the SOAP 1.1 headers and optional HTTP Basic authentication. Nothing is retried here; a
//! failed exchange is reported to the caller straight away.

use crate::config::TransportConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, trace};
use url::Url;

/// `Content-Type` of every DSML request.
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Name of the SOAP action header.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Username and password sent with HTTP Basic authentication.
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// The user name (for directory servers usually a bind DN).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(self.username.clone(), self.password())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A fully serialized request ready to be sent.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Endpoint receiving the SOAP envelope
    pub url: Url,
    /// UTF-8 encoded SOAP envelope
    pub body: String,
    /// Value of the `SOAPAction` header
    pub soap_action: String,
    /// Optional HTTP Basic credentials
    pub credentials: Option<Credentials>,
}

/// Delivers DSML documents to a directory server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Timeout`] if the exchange fails.
    async fn send(&self, request: TransportRequest) -> Result<String>;
}

/// HTTP implementation of [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        config.check()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_idle_timeout(config.pool_idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(!config.tls_verify)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<String> {
        let TransportRequest {
            url,
            body,
            soap_action,
            credentials,
        } = request;

        debug!(%url, %soap_action, bytes = body.len(), "sending DSML request");

        let mut builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(SOAP_ACTION_HEADER, soap_action)
            .body(body);
        if let Some(credentials) = &credentials {
            builder = builder.basic_auth(credentials.username(), Some(credentials.password()));
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        trace!(%status, bytes = text.len(), "received DSML response");

        // SOAP 1.1 delivers faults with a 500 status; the body still has to be parsed.
        if status.is_success() || (status == StatusCode::INTERNAL_SERVER_ERROR && !text.is_empty())
        {
            Ok(text)
        } else {
            Err(map_status_to_error(status, &text))
        }
    }
}

fn map_status_to_error(status: StatusCode, text: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Transport(format!(
            "directory server rejected the credentials ({status}): {text}"
        )),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Error::Timeout(format!("directory server timed out ({status}): {text}"))
        }
        _ => Error::Transport(format!("directory server returned {status}: {text}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENVELOPE: &str = "<soap-env:Envelope/>";

    fn request(server: &MockServer, credentials: Option<Credentials>) -> TransportRequest {
        TransportRequest {
            url: Url::parse(&format!("{}/dsml", server.uri())).unwrap(),
            body: ENVELOPE.to_string(),
            soap_action: "#batchRequest".to_string(),
            credentials,
        }
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(&TransportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn posts_soap_envelope_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dsml"))
            .and(header("Content-Type", XML_CONTENT_TYPE))
            .and(header("SOAPAction", "#batchRequest"))
            .and(body_string(ENVELOPE))
            .respond_with(ResponseTemplate::new(200).set_body_string("<batchResponse/>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = transport().send(request(&server, None)).await.unwrap();
        assert_eq!(body, "<batchResponse/>");
    }

    #[tokio::test]
    async fn adds_basic_auth_when_credentials_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(basic_auth("cn=admin,o=acme", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Credentials::new("cn=admin,o=acme", "secret");
        let body = transport()
            .send(request(&server, Some(credentials)))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn soap_fault_body_is_returned_for_parsing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<soap:Fault/>"))
            .mount(&server)
            .await;

        let body = transport().send(request(&server, None)).await.unwrap();
        assert_eq!(body, "<soap:Fault/>");
    }

    #[tokio::test]
    async fn http_errors_map_to_transport_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .mount(&server)
            .await;

        let err = transport().send(request(&server, None)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(message) if message.contains("denied")));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let request = TransportRequest {
            url: Url::parse("http://127.0.0.1:9/dsml").unwrap(),
            body: ENVELOPE.to_string(),
            soap_action: "#batchRequest".to_string(),
            credentials: None,
        };

        let err = transport().send(request).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_) | Error::Timeout(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = HttpTransport::new(&TransportConfig::new().with_timeout_secs(0)).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials::new("cn=admin", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("cn=admin"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(credentials.clone().password(), "hunter2");
    }
}
