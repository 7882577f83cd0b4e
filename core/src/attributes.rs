//! Element attributes with namespace prefixes normalized away.

use smallvec::SmallVec;

/// Attributes of one start-element event, keyed by local name.
///
/// `urwg:recordId` is stored as `recordId`. Namespace declarations
/// (`xmlns`, `xmlns:urwg`) are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pairs: SmallVec<[(String, String); 4]>,
}

impl Attributes {
    /// Normalize raw `(qualified name, value)` pairs.
    #[must_use]
    pub fn normalize<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let pairs = raw
            .into_iter()
            .map(|(name, value)| (local_attribute_name(name), value))
            .collect();
        Self { pairs }
    }

    /// Value of the attribute with this local name.
    ///
    /// If a document repeats a local name under two prefixes the last one wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// `true` when the element carried no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over `(name, value)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn local_attribute_name(name: String) -> String {
    if name.contains("xmlns") {
        return name;
    }
    match name.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => name,
    }
}

/// Local part of a possibly prefixed element name (`ds:KeyInfo` → `KeyInfo`).
#[must_use]
pub fn local_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}
