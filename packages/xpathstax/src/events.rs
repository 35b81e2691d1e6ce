//! Event stream consumed by the dispatcher, and its quick-xml adapter.
//!
//! The dispatcher only needs three kinds of events. Anything that can
//! produce them implements [`EventSource`]; [`QuickXmlSource`] does so for
//! byte input, and any iterator of `Result<XmlEvent>` works as well.

use std::io::BufRead;

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::{ReaderOptions, EVENT_BUFFER_CAPACITY};
use crate::error::Result;
use crate::types::XmlAttributes;

/// One tokenizer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// An element opened.
    Start {
        name: String,
        attributes: XmlAttributes,
    },
    /// A fragment of character data. One text node may arrive as several
    /// fragments.
    Characters(String),
    /// An element closed.
    End { name: String },
}

/// Producer of [`XmlEvent`]s.
pub trait EventSource {
    /// Return the next event, or `None` once the input is exhausted.
    ///
    /// # Errors
    /// Returns the tokenizer's error when the input cannot be lexed.
    fn next_event(&mut self) -> Result<Option<XmlEvent>>;
}

impl<I> EventSource for I
where
    I: Iterator<Item = Result<XmlEvent>>,
{
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        self.next().transpose()
    }
}

/// [`EventSource`] backed by a quick-xml reader.
///
/// Self-closing elements are reported as a start followed by an end, CDATA
/// sections as characters. Comments, processing instructions and the
/// declaration are skipped. Element names are local names; attribute names
/// keep their prefix.
pub struct QuickXmlSource<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending_end: Option<String>,
}

impl<R: BufRead> QuickXmlSource<R> {
    /// Create a source reading from `input` with the given tokenizer options.
    pub fn new(input: R, options: &ReaderOptions) -> Self {
        let mut reader = Reader::from_reader(input);
        options.apply(reader.config_mut());
        Self {
            reader,
            buf: Vec::with_capacity(EVENT_BUFFER_CAPACITY),
            pending_end: None,
        }
    }

    /// Byte offset the tokenizer has consumed up to.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }
}

impl<R: BufRead> EventSource for QuickXmlSource<R> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(XmlEvent::End { name }));
        }

        loop {
            self.buf.clear();
            let decoder = self.reader.decoder();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        position = self.reader.buffer_position() as u64,
                        "XML tokenizer failed"
                    );
                    return Err(err.into());
                }
            };

            match event {
                Event::Start(start) => return start_event(decoder, &start).map(Some),
                Event::Empty(start) => {
                    let event = start_event(decoder, &start)?;
                    if let XmlEvent::Start { name, .. } = &event {
                        self.pending_end = Some(name.clone());
                    }
                    return Ok(Some(event));
                }
                Event::End(end) => {
                    let name = decoder
                        .decode(end.local_name().as_ref())
                        .map_err(quick_xml::Error::from)?
                        .into_owned();
                    return Ok(Some(XmlEvent::End { name }));
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    if !text.is_empty() {
                        return Ok(Some(XmlEvent::Characters(text.into_owned())));
                    }
                }
                Event::CData(cdata) => {
                    let text = cdata.decode().map_err(quick_xml::Error::from)?;
                    if !text.is_empty() {
                        return Ok(Some(XmlEvent::Characters(text.into_owned())));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

fn start_event(decoder: Decoder, start: &BytesStart<'_>) -> Result<XmlEvent> {
    let name = decoder
        .decode(start.local_name().as_ref())
        .map_err(quick_xml::Error::from)?
        .into_owned();

    let mut attributes = XmlAttributes::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(quick_xml::Error::from)?
            .into_owned();
        let value = attr.decode_and_unescape_value(decoder)?.into_owned();
        attributes.insert(key, value);
    }

    Ok(XmlEvent::Start { name, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect(xml: &str, options: &ReaderOptions) -> Result<Vec<XmlEvent>> {
        let mut source = QuickXmlSource::new(xml.as_bytes(), options);
        let mut events = Vec::new();
        while let Some(event) = source.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    fn start(name: &str, attrs: &[(&str, &str)]) -> XmlEvent {
        XmlEvent::Start {
            name: name.to_string(),
            attributes: attrs.iter().copied().collect(),
        }
    }

    fn end(name: &str) -> XmlEvent {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    fn chars(text: &str) -> XmlEvent {
        XmlEvent::Characters(text.to_string())
    }

    #[test]
    fn test_basic_events() {
        let events = collect(
            r#"<?xml version="1.0"?><!-- c --><root><a x="1">hi &amp; bye</a><b/></root>"#,
            &ReaderOptions::default(),
        )
        .unwrap();

        assert_eq!(
            events,
            vec![
                start("root", &[]),
                start("a", &[("x", "1")]),
                chars("hi & bye"),
                end("a"),
                start("b", &[]),
                end("b"),
                end("root"),
            ]
        );
    }

    #[test]
    fn test_local_names_and_qualified_attributes() {
        let events = collect(
            r#"<ns:root xmlns:ns="urn:x" xml:lang="nl"><![CDATA[<raw>]]></ns:root>"#,
            &ReaderOptions::default(),
        )
        .unwrap();

        assert_eq!(
            events,
            vec![
                start("root", &[("xmlns:ns", "urn:x"), ("xml:lang", "nl")]),
                chars("<raw>"),
                end("root"),
            ]
        );
    }

    #[test]
    fn test_trim_text_option() {
        let options = ReaderOptions {
            trim_text: true,
            ..ReaderOptions::default()
        };
        let events = collect("<root>\n  <a> x </a>\n</root>", &options).unwrap();
        assert_eq!(
            events,
            vec![start("root", &[]), start("a", &[]), chars("x"), end("a"), end("root")]
        );
    }

    #[test]
    fn test_mismatched_end_is_tokenizer_error() {
        let err = collect("<root><a></b></root>", &ReaderOptions::default()).unwrap_err();
        assert!(err.is_tokenizer_error());
    }

    #[test]
    fn test_iterator_source() {
        let mut source = vec![Ok(start("a", &[])), Ok(end("a"))].into_iter();
        assert_eq!(source.next_event().unwrap(), Some(start("a", &[])));
        assert_eq!(source.next_event().unwrap(), Some(end("a")));
        assert_eq!(source.next_event().unwrap(), None);
    }
}
