//! Attribute sets and modification items.

use std::fmt;

/// A single attribute value: text, or raw bytes for binary syntaxes.
#[derive(Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// UTF-8 text value.
    Text(String),
    /// Binary value, sent and received base64 encoded.
    Binary(Vec<u8>),
}

impl AttributeValue {
    /// Returns the text value, or `None` for binary values.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the raw bytes of the value (UTF-8 bytes for text).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns true for binary values.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        Self::Binary(value.to_vec())
    }
}

/// A named attribute with its values in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    id: String,
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// An attribute without values.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// An attribute with the given values, in order.
    #[must_use]
    pub fn with_values<I, V>(id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self {
            id: id.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Attribute id as supplied.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Values in order.
    #[must_use]
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// First value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&AttributeValue> {
        self.values.first()
    }

    /// Text values in order; binary values are skipped.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.iter().filter_map(AttributeValue::as_text)
    }

    /// Appends a value.
    pub fn push(&mut self, value: impl Into<AttributeValue>) {
        self.values.push(value.into());
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the attribute carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attribute ids are case-insensitive.
    #[must_use]
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

/// An ordered set of attributes with case-insensitive, unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    attributes: Vec<Attribute>,
}

impl Attributes {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `attribute`, replacing (in place) any attribute with the same id. Returns the
    /// replaced attribute.
    pub fn put(&mut self, attribute: Attribute) -> Option<Attribute> {
        match self.position(attribute.id()) {
            Some(index) => Some(std::mem::replace(&mut self.attributes[index], attribute)),
            None => {
                self.attributes.push(attribute);
                None
            }
        }
    }

    /// Appends a value to the attribute `id`, creating the attribute if needed.
    pub fn add_value(&mut self, id: &str, value: impl Into<AttributeValue>) {
        self.get_or_insert(id).push(value);
    }

    /// Returns the attribute `id`, inserting an empty one if absent.
    pub fn get_or_insert(&mut self, id: &str) -> &mut Attribute {
        let index = match self.position(id) {
            Some(index) => index,
            None => {
                self.attributes.push(Attribute::new(id));
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[index]
    }

    /// Looks up an attribute by id (case-insensitive).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.matches_id(id))
    }

    /// Removes and returns the attribute `id`.
    pub fn remove(&mut self, id: &str) -> Option<Attribute> {
        self.position(id).map(|index| self.attributes.remove(index))
    }

    /// Attributes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    /// Attribute ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.iter().map(Attribute::id)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the set holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.matches_id(id))
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        let mut attributes = Self::new();
        for attribute in iter {
            attributes.put(attribute);
        }
        attributes
    }
}

impl IntoIterator for Attributes {
    type Item = Attribute;
    type IntoIter = std::vec::IntoIter<Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

/// Kind of change applied by a [`ModificationItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationOp {
    /// Add values to the attribute.
    Add,
    /// Replace all values of the attribute.
    Replace,
    /// Remove the listed values, or the whole attribute when no values are listed.
    Remove,
}

impl ModificationOp {
    /// Value of the DSML `operation` attribute.
    #[must_use]
    pub const fn dsml_name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "delete",
        }
    }
}

/// One change to an entry's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationItem {
    /// Kind of change.
    pub operation: ModificationOp,
    /// Target attribute and the values involved.
    pub attribute: Attribute,
}

impl ModificationItem {
    /// Creates a modification item.
    #[must_use]
    pub fn new(operation: ModificationOp, attribute: Attribute) -> Self {
        Self {
            operation,
            attribute,
        }
    }

    /// Add the attribute's values.
    #[must_use]
    pub fn add(attribute: Attribute) -> Self {
        Self::new(ModificationOp::Add, attribute)
    }

    /// Replace the attribute's values.
    #[must_use]
    pub fn replace(attribute: Attribute) -> Self {
        Self::new(ModificationOp::Replace, attribute)
    }

    /// Remove the attribute's values (or the whole attribute if it has none).
    #[must_use]
    pub fn remove(attribute: Attribute) -> Self {
        Self::new(ModificationOp::Remove, attribute)
    }
}
