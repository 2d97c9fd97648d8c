//! # dsml-directory
//!
//! Directory operations over DSMLv2 wrapped in SOAP 1.1.
//!
//! [`DirectoryClient`] exposes search, attribute reads, entry creation, deletion, renaming
//! and attribute modification. Each call builds a DSML batch request, sends it through a
//! [`dsml_core::Transport`] and parses the response back into names, attributes and
//! errors.
//!
//! ## Modules
//!
//! - [`dn`] - Directory names and relative names
//! - [`attributes`] - Attribute sets and modification items
//! - [`escape`] - XML entity escaping
//! - [`filter`] - RFC 2254 filter translation
//! - [`search`] - Search scope, alias policy and controls
//! - [`request`] - Request document builders
//! - [`response`] - Response parsing and error extraction
//! - [`config`] - The client environment
//! - [`client`] - The directory facade
//!
//! ## Example
//!
//! ```no_run
//! use dsml_directory::{DirectoryClient, DirectoryConfig, Name, SearchControls, SearchScope};
//!
//! # async fn example() -> dsml_directory::Result<()> {
//! let config = DirectoryConfig::new("https://dsml.example.com/dsml")?
//!     .with_credentials("cn=admin,o=Example", "secret");
//! let client = DirectoryClient::new(config)?;
//!
//! let base = Name::parse("ou=People,o=Example")?;
//! let controls = SearchControls::new().with_scope(SearchScope::Subtree);
//! for entry in client.search(&base, "(&(objectClass=person)(cn=J*))", &controls).await? {
//!     println!("{}", entry.name);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attributes;
pub mod client;
pub mod config;
pub mod dn;
pub mod escape;
pub mod filter;
pub mod request;
pub mod response;
mod scan;
pub mod search;

pub use attributes::{Attribute, AttributeValue, Attributes, ModificationItem, ModificationOp};
pub use client::DirectoryClient;
pub use config::DirectoryConfig;
pub use dn::{Name, NameError, Rdn};
pub use filter::FilterArg;
pub use search::{DerefAliases, SearchControls, SearchResult, SearchScope};

/// Result type used throughout the crate.
pub type Result<T> = dsml_core::Result<T>;

pub use dsml_core::Error;
