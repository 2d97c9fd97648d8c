//! The directory environment: connection settings held by a [`DirectoryClient`].
//!
//! Settings are string properties under well-known keys, so they can be loaded from any
//! key/value source. The credentials property is kept apart as a secret and is never
//! returned by [`DirectoryConfig::property`] or printed by `Debug`.
//!
//! [`DirectoryClient`]: crate::DirectoryClient

use std::collections::BTreeMap;
use std::fmt;

use dsml_core::{Credentials, Error, Result, TransportConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::search::DerefAliases;

/// Endpoint of the DSML service.
pub const URL: &str = "dsml.url";
/// User name for HTTP Basic authentication.
pub const PRINCIPAL: &str = "dsml.security.principal";
/// Password for HTTP Basic authentication.
pub const CREDENTIALS: &str = "dsml.security.credentials";
/// Default alias dereferencing policy for searches.
pub const DEREF_ALIASES: &str = "dsml.deref_aliases";
/// Value of the `SOAPAction` header.
pub const SOAP_ACTION: &str = "dsml.soap_action";

/// `SOAPAction` sent when none is configured.
pub const DEFAULT_SOAP_ACTION: &str = "#batchRequest";

/// Connection settings for a directory server.
#[derive(Deserialize)]
#[serde(try_from = "ConfigFile")]
pub struct DirectoryConfig {
    properties: BTreeMap<String, String>,
    password: Option<SecretString>,
    transport: TransportConfig,
}

/// On-disk layout accepted by `Deserialize`.
#[derive(Deserialize)]
struct ConfigFile {
    url: String,
    #[serde(default)]
    principal: Option<String>,
    #[serde(default)]
    credentials: Option<String>,
    #[serde(default)]
    deref_aliases: Option<String>,
    #[serde(default)]
    soap_action: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    transport: TransportConfig,
}

impl TryFrom<ConfigFile> for DirectoryConfig {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let mut config = Self::new(&file.url)?.with_transport(file.transport);
        for (key, value) in file.properties {
            config.add_property(key, value);
        }
        let settings = [
            (PRINCIPAL, file.principal),
            (CREDENTIALS, file.credentials),
            (DEREF_ALIASES, file.deref_aliases),
            (SOAP_ACTION, file.soap_action),
        ];
        for (key, value) in settings {
            if let Some(value) = value {
                config.add_property(key, value);
            }
        }
        config.check()?;
        Ok(config)
    }
}

impl DirectoryConfig {
    /// Creates an environment for the service at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid.
    pub fn new(url: &str) -> Result<Self> {
        Url::parse(url)?;
        let mut properties = BTreeMap::new();
        properties.insert(URL.to_string(), url.to_string());
        Ok(Self {
            properties,
            password: None,
            transport: TransportConfig::default(),
        })
    }

    /// Creates an environment from key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is missing or invalid.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut config = Self {
            properties: BTreeMap::new(),
            password: None,
            transport: TransportConfig::default(),
        };
        for (key, value) in properties {
            config.add_property(key, value);
        }
        config.url()?;
        Ok(config)
    }

    /// Sets the HTTP Basic credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        principal: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.add_property(PRINCIPAL, principal);
        self.add_property(CREDENTIALS, password);
        self
    }

    /// Sets the default alias dereferencing policy.
    #[must_use]
    pub fn with_deref_aliases(mut self, deref: DerefAliases) -> Self {
        self.add_property(DEREF_ALIASES, deref.dsml_name());
        self
    }

    /// Overrides the `SOAPAction` header.
    #[must_use]
    pub fn with_soap_action(mut self, action: impl Into<String>) -> Self {
        self.add_property(SOAP_ACTION, action);
        self
    }

    /// Replaces the HTTP transport settings.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Sets a property and returns its previous value. The previous password is never
    /// returned.
    pub fn add_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        let key = key.into();
        if key == CREDENTIALS {
            self.password = Some(SecretString::from(value.into()));
            return None;
        }
        self.properties.insert(key, value.into())
    }

    /// Removes a property and returns its value. The password is never returned.
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        if key == CREDENTIALS {
            self.password = None;
            return None;
        }
        self.properties.remove(key)
    }

    /// Value of a property. Always `None` for the password.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Property keys and values, password excluded.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Endpoint of the DSML service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is missing or invalid.
    pub fn url(&self) -> Result<Url> {
        let url = self
            .property(URL)
            .ok_or_else(|| Error::ConfigError(format!("missing {URL} property")))?;
        Ok(Url::parse(url)?)
    }

    /// Credentials for HTTP Basic authentication, if a principal is configured.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        let principal = self.property(PRINCIPAL)?;
        let password = self
            .password
            .as_ref()
            .map_or("", |password| password.expose_secret());
        Some(Credentials::new(principal, password))
    }

    /// Default alias dereferencing policy. Unknown values fall back to
    /// [`DerefAliases::Searching`].
    #[must_use]
    pub fn deref_aliases(&self) -> DerefAliases {
        self.property(DEREF_ALIASES)
            .map_or_else(DerefAliases::default, DerefAliases::from_setting)
    }

    /// Value of the `SOAPAction` header.
    #[must_use]
    pub fn soap_action(&self) -> &str {
        self.property(SOAP_ACTION).unwrap_or(DEFAULT_SOAP_ACTION)
    }

    /// HTTP transport settings.
    #[must_use]
    pub const fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Validates the URL and transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first problem found.
    pub fn check(&self) -> Result<()> {
        self.url()?;
        self.transport.check()
    }
}

impl Clone for DirectoryConfig {
    fn clone(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            password: self
                .password
                .as_ref()
                .map(|password| SecretString::from(password.expose_secret().to_owned())),
            transport: self.transport.clone(),
        }
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("properties", &self.properties)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("transport", &self.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_properties() {
        let config = DirectoryConfig::new("https://dsml.acme.com/dsml")
            .unwrap()
            .with_credentials("cn=admin,o=Acme", "secret")
            .with_deref_aliases(DerefAliases::Never)
            .with_soap_action("urn:dsml");

        assert_eq!(config.url().unwrap().as_str(), "https://dsml.acme.com/dsml");
        assert_eq!(config.deref_aliases(), DerefAliases::Never);
        assert_eq!(config.soap_action(), "urn:dsml");

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.username(), "cn=admin,o=Acme");
        assert_eq!(credentials.password(), "secret");
    }

    #[test]
    fn defaults() {
        let config = DirectoryConfig::new("http://localhost:8080/dsml").unwrap();
        assert_eq!(config.soap_action(), DEFAULT_SOAP_ACTION);
        assert_eq!(config.deref_aliases(), DerefAliases::Searching);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = DirectoryConfig::new("not a url").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = DirectoryConfig::from_properties([(PRINCIPAL, "cn=admin")]).unwrap_err();
        assert!(matches!(err, Error::ConfigError(message) if message.contains(URL)));
    }

    #[test]
    fn password_is_never_exposed_as_property() {
        let mut config = DirectoryConfig::from_properties([
            (URL, "http://localhost/dsml"),
            (PRINCIPAL, "cn=admin"),
            (CREDENTIALS, "hunter2"),
        ])
        .unwrap();

        assert_eq!(config.property(CREDENTIALS), None);
        assert!(config.properties().all(|(_, value)| value != "hunter2"));
        assert!(!format!("{config:?}").contains("hunter2"));
        assert_eq!(config.clone().credentials().unwrap().password(), "hunter2");

        assert_eq!(config.remove_property(CREDENTIALS), None);
        assert_eq!(config.credentials().unwrap().password(), "");
    }

    #[test]
    fn add_and_remove_properties() {
        let mut config = DirectoryConfig::new("http://localhost/dsml").unwrap();
        assert_eq!(config.add_property(DEREF_ALIASES, "always"), None);
        assert_eq!(config.deref_aliases(), DerefAliases::Always);
        assert_eq!(
            config.add_property(DEREF_ALIASES, "bogus"),
            Some("always".to_string())
        );
        assert_eq!(config.deref_aliases(), DerefAliases::Searching);
        assert_eq!(config.remove_property(DEREF_ALIASES), Some("bogus".to_string()));
        assert_eq!(config.remove_property(DEREF_ALIASES), None);
    }

    #[test]
    fn deserialize_from_json() {
        let config: DirectoryConfig = serde_json::from_str(
            r#"{
                "url": "https://dsml.acme.com/dsml",
                "principal": "cn=admin,o=Acme",
                "credentials": "secret",
                "deref_aliases": "finding",
                "properties": {"custom.key": "value"},
                "transport": {"timeout_secs": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(config.deref_aliases(), DerefAliases::Finding);
        assert_eq!(config.property("custom.key"), Some("value"));
        assert_eq!(config.transport().timeout_secs, 5);
        assert_eq!(config.credentials().unwrap().password(), "secret");
    }

    #[test]
    fn deserialize_rejects_bad_url() {
        let result: std::result::Result<DirectoryConfig, _> =
            serde_json::from_str(r#"{"url": "::nope::"}"#);
        assert!(result.is_err());
    }
}
