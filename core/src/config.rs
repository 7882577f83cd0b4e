//! Parser configuration.

use serde::{Deserialize, Serialize};

/// Record-root spellings accepted by default.
pub const DEFAULT_ROOT_TAGS: [&str; 2] = ["JobUsageRecord", "UsageRecord"];

/// Options for [`UsageRecordParser`](crate::parser::UsageRecordParser).
///
/// # Example
///
/// ```
/// use gridacct_core::config::ParserConfig;
///
/// let config = ParserConfig::default().with_root_tag("StorageUsageRecord");
/// assert!(config.accepts_root("UsageRecord"));
/// assert!(config.accepts_root("StorageUsageRecord"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Local tag names that open and close one record.
    pub root_tags: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            root_tags: DEFAULT_ROOT_TAGS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ParserConfig {
    /// Accept one more record-root spelling.
    #[must_use]
    pub fn with_root_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.root_tags.contains(&tag) {
            self.root_tags.push(tag);
        }
        self
    }

    /// Replace the accepted record-root spellings.
    #[must_use]
    pub fn with_root_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.root_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// `true` if `tag` opens a record.
    #[must_use]
    pub fn accepts_root(&self, tag: &str) -> bool {
        self.root_tags.iter().any(|root| root == tag)
    }
}
