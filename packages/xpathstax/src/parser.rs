//! Streaming parser: drives the event stream through the element context
//! and the registered handlers.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use crate::config::ReaderOptions;
use crate::context::NodeContext;
use crate::error::{Result, XPathStaxError};
use crate::events::{EventSource, QuickXmlSource, XmlEvent};
use crate::registry::{HandlerRegistry, NodeConverter, NodeHandler, Registration};
use crate::xpath::XPathRequest;

/// Lifecycle of a single dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// No event seen yet.
    Idle,
    /// Events are being dispatched.
    Streaming,
    /// The stream ended with every element closed.
    Done,
    /// A tokenizer, structural or handler error aborted the run.
    Failed,
}

/// Counters reported by a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Elements opened.
    pub elements: u64,
    /// Pattern matches recorded at open time.
    pub matches: u64,
}

/// Drives one event stream through a fresh [`NodeContext`].
///
/// A dispatcher is single-use: once it reaches `Done` or `Failed` it must
/// be dropped.
pub struct Dispatcher<'r> {
    registrations: &'r [Registration],
    context: NodeContext,
    state: ParseState,
    stats: ParseStats,
}

impl<'r> Dispatcher<'r> {
    #[must_use]
    pub fn new(registrations: &'r [Registration]) -> Self {
        Self {
            registrations,
            context: NodeContext::new(),
            state: ParseState::Idle,
            stats: ParseStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ParseState {
        self.state
    }

    #[must_use]
    pub fn context(&self) -> &NodeContext {
        &self.context
    }

    /// Dispatch one event.
    ///
    /// # Errors
    /// Returns `StructuralInconsistency` when an end event does not close the
    /// innermost element, or `Handler` when a handler fails. Either error
    /// moves the dispatcher to `Failed`.
    pub fn dispatch(&mut self, event: XmlEvent) -> Result<()> {
        debug_assert!(
            matches!(self.state, ParseState::Idle | ParseState::Streaming),
            "dispatcher reused after {:?}",
            self.state
        );
        self.state = ParseState::Streaming;

        let outcome = match event {
            XmlEvent::Start { name, attributes } => {
                self.stats.elements += 1;
                self.context
                    .open(&name, attributes, self.registrations)
                    .map(|matched| self.stats.matches += matched as u64)
            }
            XmlEvent::Characters(text) => {
                self.context.append_text(&text);
                Ok(())
            }
            XmlEvent::End { name } => self.context.close(&name),
        };
        outcome.inspect_err(|_| self.state = ParseState::Failed)
    }

    /// Mark the end of the stream.
    ///
    /// # Errors
    /// Returns `UnexpectedEof` if elements are still open.
    pub fn finish(&mut self) -> Result<ParseStats> {
        if !self.context.is_balanced() {
            self.state = ParseState::Failed;
            return Err(XPathStaxError::UnexpectedEof {
                path: self.context.path().to_string(),
            });
        }
        self.state = ParseState::Done;
        Ok(self.stats)
    }

    /// Dispatch every event of `source`, then finish.
    ///
    /// # Errors
    /// Returns the first tokenizer, structural or handler error.
    pub fn run<S: EventSource>(&mut self, source: &mut S) -> Result<ParseStats> {
        loop {
            let event = match source.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => return self.finish(),
                Err(err) => {
                    self.state = ParseState::Failed;
                    return Err(err);
                }
            };
            self.dispatch(event)?;
        }
    }
}

/// Streaming XML parser that notifies handlers registered for path patterns.
///
/// The registry may be filled from several threads; each call to
/// [`parse`](XPathStaxParser::parse) works on the registrations present
/// when it starts and keeps all per-document state local to the call.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use xpathstax::{Converter, XPathStaxParser};
///
/// let items = Arc::new(Converter::new("/root/a[@x='2']".parse().unwrap(), |node, _| {
///     Ok(node.text.clone())
/// }));
///
/// let parser = XPathStaxParser::new();
/// parser.add_converter(Arc::clone(&items));
/// parser
///     .parse_str(r#"<root><a x="1">hi</a><a x="2">bye</a></root>"#)
///     .unwrap();
///
/// assert_eq!(items.take(), vec!["bye"]);
/// ```
#[derive(Debug, Default)]
pub struct XPathStaxParser {
    registry: HandlerRegistry,
    options: ReaderOptions,
}

impl XPathStaxParser {
    /// Create a parser with default tokenizer options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with the given tokenizer options.
    #[must_use]
    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            options,
        }
    }

    /// Register `handler` for `request`. An identical pattern registered
    /// earlier is replaced.
    pub fn add_handler(&self, request: XPathRequest, handler: Arc<dyn NodeHandler>) {
        self.registry.register(request, handler);
    }

    /// Register a converter under the pattern it declares.
    pub fn add_converter<C: NodeConverter + 'static>(&self, converter: Arc<C>) {
        self.registry.register_converter(converter);
    }

    /// Set a tokenizer property, see [`ReaderOptions::set_property`].
    ///
    /// # Errors
    /// Returns `InvalidProperty` for unknown keys or invalid values.
    pub fn set_xml_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.options.set_property(key, value)
    }

    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Parse a document from any reader.
    ///
    /// The reader is consumed and dropped before this returns, whether the
    /// parse succeeds or not. Handlers notified before a failure keep
    /// their notifications.
    ///
    /// # Errors
    /// Returns a tokenizer error for malformed or truncated input, a
    /// structural error if the event stream is inconsistent, or the first
    /// handler error.
    pub fn parse<R: Read>(&self, input: R) -> Result<()> {
        self.parse_buffered(BufReader::new(input))
    }

    /// Parse a document held in memory.
    ///
    /// # Errors
    /// See [`parse`](XPathStaxParser::parse).
    pub fn parse_str(&self, xml: &str) -> Result<()> {
        self.parse_buffered(xml.as_bytes())
    }

    /// Parse the document stored at `path`.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be opened, otherwise see
    /// [`parse`](XPathStaxParser::parse).
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Parsing file");
        self.parse(file)
    }

    /// Parse a document from a buffered reader.
    ///
    /// # Errors
    /// See [`parse`](XPathStaxParser::parse).
    pub fn parse_buffered<R: BufRead>(&self, input: R) -> Result<()> {
        let mut source = QuickXmlSource::new(input, &self.options);
        let result = self.parse_events(&mut source);
        tracing::debug!(bytes = source.position(), ok = result.is_ok(), "Input released");
        result.map(|_| ())
    }

    /// Run an arbitrary event source through the registered handlers.
    ///
    /// # Errors
    /// Returns the first error produced by the source or the handlers.
    pub fn parse_events<S: EventSource>(&self, source: &mut S) -> Result<ParseStats> {
        let registrations = self.registry.snapshot();
        tracing::debug!(handlers = registrations.len(), "Starting parse");

        let mut dispatcher = Dispatcher::new(&registrations);
        let stats = dispatcher.run(source)?;

        tracing::debug!(
            elements = stats.elements,
            matches = stats.matches,
            "Finished parse"
        );
        Ok(stats)
    }
}
