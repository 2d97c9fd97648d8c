//! The directory facade.
//!
//! Each operation is one request/response exchange: build the DSML document, hand it to the
//! [`Transport`], parse what comes back. Nothing is cached between calls and nothing is
//! retried.

use std::sync::Arc;

use dsml_core::{Error, HttpTransport, Result, Transport, TransportRequest};
use tracing::{debug, warn};

use crate::attributes::{Attributes, ModificationItem};
use crate::config::DirectoryConfig;
use crate::dn::Name;
use crate::filter::{self, FilterArg};
use crate::request;
use crate::response;
use crate::search::{SearchControls, SearchResult, SearchScope};

const ALL_ENTRIES: &str = "(objectClass=*)";

/// Client for a directory server reachable over DSMLv2/SOAP.
///
/// The client owns its environment. Changing it takes `&mut self`, so a client shared
/// between tasks has to be wrapped in a lock by the caller if it is ever reconfigured.
pub struct DirectoryClient {
    config: DirectoryConfig,
    transport: Arc<dyn Transport>,
}

impl DirectoryClient {
    /// Creates a client sending requests over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid.
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        config.check()?;
        let transport = HttpTransport::new(config.transport())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client using the given transport.
    #[must_use]
    pub fn with_transport(config: DirectoryConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// The current environment.
    #[must_use]
    pub const fn environment(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Sets an environment property, returning its previous value.
    pub fn add_to_environment(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.config.add_property(key, value)
    }

    /// Removes an environment property, returning its value.
    pub fn remove_from_environment(&mut self, key: &str) -> Option<String> {
        self.config.remove_property(key)
    }

    /// Searches below `base`.
    ///
    /// Results come back in server order. When `controls` leaves alias dereferencing unset,
    /// the environment default applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFilter`] or [`Error::Unsupported`] for filters that cannot
    /// be translated, and any transport, response or directory error.
    pub async fn search(
        &self,
        base: &Name,
        filter: &str,
        controls: &SearchControls,
    ) -> Result<Vec<SearchResult>> {
        let deref = controls.deref_aliases_or(self.config.deref_aliases());
        let controls = controls.clone().with_deref_aliases(deref);
        let body = request::search_request(base, filter, &controls)?;

        let xml = self.exchange("search", body).await?;
        response::parse_search_response(&xml, base)
    }

    /// Searches with `{n}` placeholders in `expression` replaced by escaped `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for binary arguments, plus everything [`search`]
    /// returns.
    ///
    /// [`search`]: Self::search
    pub async fn search_with_args(
        &self,
        base: &Name,
        expression: &str,
        args: &[FilterArg],
        controls: &SearchControls,
    ) -> Result<Vec<SearchResult>> {
        let filter = filter::format_filter(expression, args)?;
        self.search(base, &filter, controls).await
    }

    /// Searches the children of `name` carrying all of the `matching` attribute values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for binary values in `matching`, plus everything
    /// [`search`] returns.
    ///
    /// [`search`]: Self::search
    pub async fn search_by_attributes(
        &self,
        name: &Name,
        matching: &Attributes,
        return_attributes: Option<&[&str]>,
    ) -> Result<Vec<SearchResult>> {
        let filter = filter::matching_filter(matching)?;
        let mut controls = SearchControls::new().with_scope(SearchScope::OneLevel);
        if let Some(ids) = return_attributes {
            controls = controls.with_return_attributes(ids.iter().copied());
        }
        self.search(name, &filter, &controls).await
    }

    /// Names of the children of `name`, relative to `name`.
    ///
    /// # Errors
    ///
    /// Returns any transport, response or directory error.
    pub async fn list(&self, name: &Name) -> Result<Vec<Name>> {
        let controls = SearchControls::new()
            .with_scope(SearchScope::OneLevel)
            .with_return_attributes(Vec::<String>::new());
        let results = self.search(name, ALL_ENTRIES, &controls).await?;

        Ok(results
            .into_iter()
            .map(|result| {
                if result.absolute {
                    result.name.relative_to(name).unwrap_or(result.name)
                } else {
                    result.name
                }
            })
            .collect())
    }

    /// Reads the attributes of one entry. `ids` restricts the attributes returned.
    ///
    /// A name the server does not return (a virtual node) yields an empty set rather than an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns any transport, response or directory error.
    pub async fn get_attributes(&self, name: &Name, ids: Option<&[&str]>) -> Result<Attributes> {
        let mut controls = SearchControls::new().with_scope(SearchScope::Base);
        if let Some(ids) = ids {
            controls = controls.with_return_attributes(ids.iter().copied());
        }

        let results = self.search(name, ALL_ENTRIES, &controls).await?;
        Ok(results
            .into_iter()
            .next()
            .map(|result| result.attributes)
            .unwrap_or_default())
    }

    /// Applies `items` to an entry, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for the root name or an empty item list, and any
    /// transport, response or directory error.
    pub async fn modify_attributes(&self, name: &Name, items: &[ModificationItem]) -> Result<()> {
        require_entry(name)?;
        if items.is_empty() {
            return Err(Error::InvalidRequest(
                "at least one modification is required".to_string(),
            ));
        }

        let xml = self
            .exchange("modify", request::modify_request(name, items))
            .await?;
        response::parse_modify_response(&xml)
    }

    /// Creates an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for the root name, and any transport, response or
    /// directory error.
    pub async fn add_entry(&self, name: &Name, attributes: &Attributes) -> Result<()> {
        require_entry(name)?;
        let xml = self
            .exchange("add", request::add_request(name, attributes))
            .await?;
        response::parse_add_response(&xml)
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for the root name, and any transport, response or
    /// directory error.
    pub async fn delete_entry(&self, name: &Name) -> Result<()> {
        require_entry(name)?;
        let xml = self
            .exchange("delete", request::delete_request(name))
            .await?;
        response::parse_delete_response(&xml)
    }

    /// Renames (and, if the parent differs, moves) an entry. `new_name` is the full name of
    /// the entry after the rename.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if either name is the root or if `new_name` would
    /// move an entry that has a parent to the top of the tree, and any transport, response
    /// or directory error.
    pub async fn rename_entry(
        &self,
        name: &Name,
        new_name: &Name,
        delete_old_rdn: bool,
    ) -> Result<()> {
        require_entry(name)?;
        require_entry(new_name)?;
        let Some(new_rdn) = new_name.rdn() else {
            return Err(Error::InvalidRequest("new name has no components".to_string()));
        };

        let new_parent = new_name.parent().unwrap_or_else(Name::root);
        let old_parent = name.parent().unwrap_or_else(Name::root);
        if new_parent.is_root() && !old_parent.is_root() {
            return Err(Error::InvalidRequest(format!(
                "new name `{new_name}` has no parent; give the full name of the renamed entry"
            )));
        }
        let new_superior = (!new_parent.eq_ignore_case(&old_parent)).then_some(&new_parent);

        let xml = self
            .exchange(
                "rename",
                request::rename_request(name, new_rdn, delete_old_rdn, new_superior),
            )
            .await?;
        response::parse_rename_response(&xml)
    }

    /// Schema access is not available over DSML.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::Unsupported`].
    pub fn schema(&self, _name: &Name) -> Result<Attributes> {
        Err(Error::Unsupported("schema access is not supported".to_string()))
    }

    /// Extended operations are not available over DSML.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::Unsupported`].
    pub fn extended_operation(&self, oid: &str, _value: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Unsupported(format!(
            "extended operation {oid} is not supported"
        )))
    }

    async fn exchange(&self, operation: &str, body: String) -> Result<String> {
        let request = TransportRequest {
            url: self.config.url()?,
            body,
            soap_action: self.config.soap_action().to_string(),
            credentials: self.config.credentials(),
        };
        debug!("Sending DSML {operation} request to {}", request.url);

        self.transport.send(request).await.map_err(|err| {
            if err.should_log() {
                warn!("DSML {operation} request failed: {err}");
            }
            err
        })
    }
}

fn require_entry(name: &Name) -> Result<()> {
    if name.is_root() {
        return Err(Error::InvalidRequest(
            "operation requires a non-empty entry name".to_string(),
        ));
    }
    Ok(())
}
