//! Raw per-record buffers filled by the accumulator.
//!
//! Drafts hold untyped text exactly as it was read. Conversion to the typed
//! aggregate, and every validation, happens in the assembler.

use crate::vocabulary::{CommonField, KeyField, PropertyField, PropertyKind, PropertyTag, ResourceKind, UserField};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

/// Fields of one key-info block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDraft {
    /// `X509SubjectName`
    pub subject_name: Option<String>,
    /// `X509IssuerSerial`
    pub issuer_serial: Option<String>,
    /// `X509Ski`
    pub ski: Option<String>,
    /// `X509Certificate`
    pub certificate: Option<String>,
}

impl KeyDraft {
    /// Text slot for `field`, created on first use.
    pub fn slot(&mut self, field: KeyField) -> &mut String {
        let slot = match field {
            KeyField::SubjectName => &mut self.subject_name,
            KeyField::IssuerSerial => &mut self.issuer_serial,
            KeyField::Ski => &mut self.ski,
            KeyField::Certificate => &mut self.certificate,
        };
        slot.get_or_insert_with(String::new)
    }

    /// `true` when no field received any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subject_name.is_none()
            && self.issuer_serial.is_none()
            && self.ski.is_none()
            && self.certificate.is_none()
    }
}

/// Fields of one user-identity entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDraft {
    /// `LocalUserId`
    pub local_user_identity: Option<String>,
    /// `GlobalUserName`
    pub global_user_name: Option<String>,
    /// Key info nested inside the entry.
    pub key_info: Option<KeyDraft>,
}

impl UserDraft {
    /// Text slot for `field`, created on first use.
    pub fn slot(&mut self, field: UserField) -> &mut String {
        let slot = match field {
            UserField::LocalUserIdentity => &mut self.local_user_identity,
            UserField::GlobalUserName => &mut self.global_user_name,
        };
        slot.get_or_insert_with(String::new)
    }

    /// `true` when the entry captured nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local_user_identity.is_none() && self.global_user_name.is_none() && self.key_info.is_none()
    }
}

/// One differentiated or extension property: its attributes and its text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDraft {
    /// Which property this is.
    pub tag: PropertyTag,
    /// Attribute-backed fields captured on open.
    pub fields: SmallVec<[(PropertyField, String); 4]>,
    /// Element text.
    pub value: String,
}

impl PropertyDraft {
    /// Empty draft for `tag`.
    #[must_use]
    pub fn new(tag: PropertyTag) -> Self {
        Self {
            tag,
            fields: SmallVec::new(),
            value: String::new(),
        }
    }

    /// Attribute-backed field, if the element carried it.
    #[must_use]
    pub fn field(&self, field: PropertyField) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(key, _)| *key == field)
            .map(|(_, value)| value.as_str())
    }

    /// Builder used by tests and the accumulator.
    #[must_use]
    pub fn with_field(mut self, field: PropertyField, value: impl Into<String>) -> Self {
        self.fields.push((field, value.into()));
        self
    }

    /// Builder setting the element text.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// `true` when the element carried any text, whitespace included.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }
}

/// Everything buffered for one record between its open and close tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    /// Common-properties map.
    pub common: HashMap<CommonField, String>,
    /// Key info found inside the record-identity section.
    pub key_info: Option<KeyDraft>,
    /// Raw `ProcessId` texts in document order.
    pub process_ids: Vec<String>,
    /// User-identity entries in document order.
    pub user_identities: Vec<UserDraft>,
    /// Differentiated-property buckets, one per kind.
    pub properties: BTreeMap<PropertyKind, Vec<PropertyDraft>>,
    /// Extension-property buckets, one per kind.
    pub resources: BTreeMap<ResourceKind, Vec<PropertyDraft>>,
}

impl RecordDraft {
    /// Value of a common slot.
    #[must_use]
    pub fn common(&self, field: CommonField) -> Option<&str> {
        self.common.get(&field).map(String::as_str)
    }

    /// Owned value of a common slot.
    #[must_use]
    pub fn take_common(&mut self, field: CommonField) -> Option<String> {
        self.common.remove(&field)
    }

    /// Builder setting a common slot.
    #[must_use]
    pub fn with_common(mut self, field: CommonField, value: impl Into<String>) -> Self {
        self.common.insert(field, value.into());
        self
    }

    /// Append a property draft to the bucket for its tag.
    pub fn push_property(&mut self, draft: PropertyDraft) {
        match draft.tag {
            PropertyTag::Differentiated(kind) => self.properties.entry(kind).or_default().push(draft),
            PropertyTag::Resource(kind) => self.resources.entry(kind).or_default().push(draft),
        }
    }

    /// Number of property drafts across all buckets.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.values().map(Vec::len).sum::<usize>()
            + self.resources.values().map(Vec::len).sum::<usize>()
    }
}
