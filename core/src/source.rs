//! Parse events read from raw XML.
//!
//! [`XmlEventSource`] turns a document into the flat, ordered
//! start/text/end stream the accumulator consumes. Self-closing elements
//! are expanded into a start and an end event, CDATA is delivered as text,
//! and comments, processing instructions and declarations are skipped.

use crate::error::SourceError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// One parse event with namespace-qualified names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// An element opened.
    Start {
        /// Qualified name, e.g. `urwg:Status`.
        name: String,
        /// Raw `(qualified name, unescaped value)` pairs.
        attributes: Vec<(String, String)>,
    },
    /// Character data inside the current element. May arrive in several pieces.
    Text(String),
    /// An element closed.
    End {
        /// Qualified name.
        name: String,
    },
}

impl XmlEvent {
    /// Start event without attributes.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self::Start {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Start event with attributes.
    #[must_use]
    pub fn start_with(name: impl Into<String>, attributes: &[(&str, &str)]) -> Self {
        Self::Start {
            name: name.into(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Text event.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// End event.
    #[must_use]
    pub fn end(name: impl Into<String>) -> Self {
        Self::End { name: name.into() }
    }
}

/// Pull-based event source over an in-memory document.
///
/// Reads lazily: each call to `next` tokenizes only as far as the next
/// event, so records are handed off as their closing tag is read.
pub struct XmlEventSource<'a> {
    reader: Reader<&'a [u8]>,
    pending_end: Option<String>,
    finished: bool,
}

impl<'a> XmlEventSource<'a> {
    /// Create a source over `input`.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            pending_end: None,
            finished: false,
        }
    }

    fn malformed(&self, message: impl ToString) -> SourceError {
        SourceError {
            position: self.reader.buffer_position(),
            message: message.to_string(),
        }
    }

    fn start_event(&self, start: &BytesStart<'_>) -> Result<XmlEvent, SourceError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.malformed(e))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| self.malformed(e))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(XmlEvent::Start { name, attributes })
    }

    fn read_next(&mut self) -> Result<Option<XmlEvent>, SourceError> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(XmlEvent::End { name }));
        }
        loop {
            let event = self.reader.read_event().map_err(|e| self.malformed(e))?;
            match event {
                Event::Start(start) => return self.start_event(&start).map(Some),
                Event::Empty(start) => {
                    let event = self.start_event(&start)?;
                    if let XmlEvent::Start { name, .. } = &event {
                        self.pending_end = Some(name.clone());
                    }
                    return Ok(Some(event));
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    return Ok(Some(XmlEvent::End { name }));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| self.malformed(e))?;
                    if !text.is_empty() {
                        return Ok(Some(XmlEvent::Text(text.into_owned())));
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::Eof => return Ok(None),
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
    }
}

impl Iterator for XmlEventSource<'_> {
    type Item = Result<XmlEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}
