//! The event accumulator.
//!
//! A single-pass state machine over [`XmlEvent`]s. It buffers one record at
//! a time and hands the buffer off as soon as the record's closing tag is
//! seen, so memory use is bounded by the size of one record rather than the
//! document.
//!
//! # Text routing
//!
//! Every start event sets the active [`TextTarget`] (possibly to none) and
//! every end event clears it. Character data goes to the active target or is
//! dropped. Text therefore never reaches an ancestor's slot, no matter how
//! the document nests.

use crate::attributes::{Attributes, local_name};
use crate::config::ParserConfig;
use crate::draft::{KeyDraft, PropertyDraft, RecordDraft, UserDraft};
use crate::source::XmlEvent;
use crate::vocabulary::{
    CommonField, Element, KeyField, PropertyTag, RECORD_IDENTITY_ATTRIBUTES, UserField,
};

/// Where character data currently goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTarget {
    /// A slot of the common-properties map.
    Common(CommonField),
    /// The process id being read.
    ProcessId,
    /// The value of the open property scratch.
    Property,
    /// A field of the open user-identity scratch.
    User(UserField),
    /// A field of the open key-info scratch.
    Key(KeyField),
}

/// A record whose closing tag has been seen.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRecord {
    /// 1-based position of the record in the document.
    pub sequence: u32,
    /// Everything buffered for it.
    pub draft: RecordDraft,
}

impl CompletedRecord {
    /// The `recordId` the document asked for, as written.
    #[must_use]
    pub fn requested_identity(&self) -> Option<&str> {
        self.draft.common(CommonField::RecordIdentity)
    }
}

#[derive(Debug, Default)]
struct RecordState {
    draft: RecordDraft,
    in_record_identity: bool,
    in_user_identity: bool,
    user: Option<UserDraft>,
    key: Option<KeyDraft>,
    property: Option<PropertyDraft>,
    process_id: Option<String>,
    target: Option<TextTarget>,
}

/// Turns parse events into [`CompletedRecord`]s.
///
/// One accumulator serves one document.
#[derive(Debug)]
pub struct Accumulator {
    config: ParserConfig,
    sequence: u32,
    record: Option<RecordState>,
    nested_roots: usize,
}

impl Accumulator {
    /// New accumulator accepting the configured root tags.
    #[must_use]
    pub const fn new(config: ParserConfig) -> Self {
        Self {
            config,
            sequence: 0,
            record: None,
            nested_roots: 0,
        }
    }

    /// Number of records opened so far.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// `true` while a record is open.
    #[must_use]
    pub const fn in_record(&self) -> bool {
        self.record.is_some()
    }

    /// The active text target, if any.
    #[must_use]
    pub fn text_target(&self) -> Option<TextTarget> {
        self.record.as_ref().and_then(|record| record.target)
    }

    /// Feed one event. Returns the completed record when `event` closes one.
    pub fn handle(&mut self, event: XmlEvent) -> Option<CompletedRecord> {
        match event {
            XmlEvent::Start { name, attributes } => {
                self.start(&name, Attributes::normalize(attributes));
                None
            }
            XmlEvent::Text(text) => {
                self.text(&text);
                None
            }
            XmlEvent::End { name } => self.end(&name),
        }
    }

    fn classify(&self, name: &str) -> Element {
        Element::classify(local_name(name), &self.config.root_tags)
    }

    fn start(&mut self, name: &str, attributes: Attributes) {
        let element = self.classify(name);
        if matches!(element, Element::RecordRoot) {
            if self.record.is_some() {
                tracing::debug!(tag = name, "ignoring record root nested in an open record");
                self.nested_roots += 1;
                return;
            }
            self.sequence += 1;
            self.record = Some(RecordState::default());
            tracing::debug!(sequence = self.sequence, "record opened");
            return;
        }

        let Some(record) = self.record.as_mut() else {
            return;
        };
        record.target = None;
        match element {
            Element::RecordIdentity => {
                record.in_record_identity = true;
                for (attribute, field) in RECORD_IDENTITY_ATTRIBUTES {
                    if let Some(value) = attributes.get(attribute) {
                        record.draft.common.insert(*field, value.to_string());
                    }
                }
            }
            Element::UserIdentity => {
                record.in_user_identity = true;
                record.user = Some(UserDraft::default());
            }
            Element::KeyInfo => record.key = Some(KeyDraft::default()),
            Element::ProcessId => {
                record.process_id = Some(String::new());
                record.target = Some(TextTarget::ProcessId);
            }
            Element::Common(common) => {
                for (attribute, field) in common.attributes {
                    if let Some(value) = attributes.get(attribute) {
                        record.draft.common.insert(*field, value.to_string());
                    }
                }
                record.target = Some(TextTarget::Common(common.text));
            }
            Element::User(field) => record.target = Some(TextTarget::User(field)),
            Element::Key(field) => record.target = Some(TextTarget::Key(field)),
            Element::Property(tag) => {
                record.property = Some(property_scratch(tag, &attributes));
                record.target = Some(TextTarget::Property);
            }
            Element::RecordRoot | Element::Unrecognized => {}
        }
    }

    fn text(&mut self, text: &str) {
        let Some(record) = self.record.as_mut() else {
            return;
        };
        let slot = match record.target {
            Some(TextTarget::Common(field)) => Some(record.draft.common.entry(field).or_default()),
            Some(TextTarget::ProcessId) => record.process_id.as_mut(),
            Some(TextTarget::Property) => record.property.as_mut().map(|property| &mut property.value),
            Some(TextTarget::User(field)) => record.user.as_mut().map(|user| user.slot(field)),
            Some(TextTarget::Key(field)) => record.key.as_mut().map(|key| key.slot(field)),
            None => None,
        };
        if let Some(slot) = slot {
            slot.push_str(text);
        }
    }

    fn end(&mut self, name: &str) -> Option<CompletedRecord> {
        let element = self.classify(name);
        let record = self.record.as_mut()?;
        record.target = None;
        match element {
            Element::RecordRoot if self.nested_roots > 0 => self.nested_roots -= 1,
            Element::RecordRoot => {
                let state = self.record.take()?;
                tracing::debug!(
                    sequence = self.sequence,
                    properties = state.draft.property_count(),
                    "record closed"
                );
                return Some(CompletedRecord {
                    sequence: self.sequence,
                    draft: state.draft,
                });
            }
            Element::RecordIdentity => record.in_record_identity = false,
            Element::UserIdentity => {
                record.in_user_identity = false;
                if let Some(user) = record.user.take().filter(|user| !user.is_empty()) {
                    record.draft.user_identities.push(user);
                }
            }
            Element::KeyInfo => {
                if let Some(key) = record.key.take().filter(|key| !key.is_empty()) {
                    if record.in_record_identity {
                        record.draft.key_info = Some(key);
                    } else if record.in_user_identity {
                        if let Some(user) = record.user.as_mut() {
                            user.key_info = Some(key);
                        }
                    }
                }
            }
            Element::ProcessId => {
                if let Some(pid) = record.process_id.take().filter(|pid| !pid.is_empty()) {
                    record.draft.process_ids.push(pid);
                }
            }
            Element::Property(_) => {
                if let Some(property) = record.property.take().filter(PropertyDraft::has_value) {
                    record.draft.push_property(property);
                }
            }
            Element::Common(_) | Element::User(_) | Element::Key(_) | Element::Unrecognized => {}
        }
        None
    }
}

fn property_scratch(tag: PropertyTag, attributes: &Attributes) -> PropertyDraft {
    let mut draft = PropertyDraft::new(tag);
    for (attribute, field) in tag.attributes() {
        if let Some(value) = attributes.get(attribute) {
            draft.fields.push((*field, value.to_string()));
        }
    }
    draft
}
