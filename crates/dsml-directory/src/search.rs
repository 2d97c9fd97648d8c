//! Search scope, alias dereferencing and search controls.

use std::fmt;
use std::str::FromStr;

use dsml_core::Error;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::attributes::Attributes;
use crate::dn::Name;

/// Breadth of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Direct children of the base entry.
    OneLevel,
    /// The base entry and everything below it.
    Subtree,
}

impl SearchScope {
    /// Value of the DSML `scope` attribute.
    #[must_use]
    pub const fn dsml_name(self) -> &'static str {
        match self {
            Self::Base => "baseObject",
            Self::OneLevel => "singleLevel",
            Self::Subtree => "wholeSubtree",
        }
    }
}

impl FromStr for SearchScope {
    type Err = Error;

    /// Accepts LDAP URL, DSML and numeric spellings, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" | "baseobject" | "0" => Ok(Self::Base),
            "one" | "onelevel" | "singlelevel" | "1" => Ok(Self::OneLevel),
            "sub" | "subtree" | "wholesubtree" | "2" => Ok(Self::Subtree),
            _ => Err(Error::InvalidRequest(format!("invalid search scope `{s}`"))),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dsml_name())
    }
}

/// When aliases are dereferenced during a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DerefAliases {
    /// Never dereference aliases.
    Never,
    /// Dereference while searching below the base, but not when locating it.
    #[default]
    Searching,
    /// Dereference when locating the base only.
    Finding,
    /// Always dereference aliases.
    Always,
}

impl DerefAliases {
    /// Value of the DSML `derefAliases` attribute.
    #[must_use]
    pub const fn dsml_name(self) -> &'static str {
        match self {
            Self::Never => "neverDerefAliases",
            Self::Searching => "derefInSearching",
            Self::Finding => "derefFindingBaseObj",
            Self::Always => "derefAlways",
        }
    }

    /// Reads a policy from a configuration value.
    ///
    /// Unlike [`SearchScope`], an unknown value is not an error: it falls back to
    /// [`DerefAliases::Searching`] and a warning is logged.
    #[must_use]
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "never" | "neverderefaliases" | "0" => Self::Never,
            "searching" | "derefinsearching" | "1" => Self::Searching,
            "finding" | "dereffindingbaseobj" | "2" => Self::Finding,
            "always" | "derefalways" | "3" => Self::Always,
            _ => {
                warn!("Unknown alias dereferencing policy `{value}`, using derefInSearching");
                Self::Searching
            }
        }
    }
}

impl fmt::Display for DerefAliases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dsml_name())
    }
}

/// Parameters of a search besides base and filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchControls {
    /// Search breadth.
    pub scope: SearchScope,
    /// Alias policy. `None` uses the client's configured default.
    pub deref_aliases: Option<DerefAliases>,
    /// Maximum number of entries, `0` for no limit.
    pub size_limit: u32,
    /// Maximum seconds the server may spend, `0` for no limit.
    pub time_limit: u32,
    /// Attributes to return. `None` returns all user attributes, an empty list returns none.
    pub return_attributes: Option<Vec<String>>,
    /// Return attribute names without values.
    pub types_only: bool,
}

impl Default for SearchControls {
    fn default() -> Self {
        Self {
            scope: SearchScope::OneLevel,
            deref_aliases: None,
            size_limit: 0,
            time_limit: 0,
            return_attributes: None,
            types_only: false,
        }
    }
}

impl SearchControls {
    /// Controls for a one-level search returning all attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the alias dereferencing policy.
    #[must_use]
    pub const fn with_deref_aliases(mut self, deref: DerefAliases) -> Self {
        self.deref_aliases = Some(deref);
        self
    }

    /// Set the size limit.
    #[must_use]
    pub const fn with_size_limit(mut self, limit: u32) -> Self {
        self.size_limit = limit;
        self
    }

    /// Set the time limit in seconds.
    #[must_use]
    pub const fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit = seconds;
        self
    }

    /// Restrict the returned attributes.
    #[must_use]
    pub fn with_return_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Return attribute names only.
    #[must_use]
    pub const fn with_types_only(mut self, types_only: bool) -> Self {
        self.types_only = types_only;
        self
    }

    /// The effective alias policy given a fallback.
    #[must_use]
    pub fn deref_aliases_or(&self, fallback: DerefAliases) -> DerefAliases {
        self.deref_aliases.unwrap_or(fallback)
    }
}

/// One entry returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Entry name as returned by the server.
    pub name: Name,
    /// Entry attributes in document order.
    pub attributes: Attributes,
    /// True when `name` already includes the search base.
    pub absolute: bool,
}
