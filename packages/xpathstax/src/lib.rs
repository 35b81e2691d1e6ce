//! xpathstax - Streaming XPath-subset dispatch over large XML documents.
//!
//! The parser reads a document once, without building a tree, and notifies
//! handlers whose path patterns match the element being read. Each matched
//! element is delivered to its handlers exactly once, when it closes, with
//! its attributes and the text that appeared directly inside it.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use xpathstax::{FnHandler, XPathRequest, XPathStaxParser};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! let parser = XPathStaxParser::new();
//! parser.add_handler(
//!     XPathRequest::parse("/root/a").unwrap(),
//!     Arc::new(FnHandler::new(move |node, _| {
//!         let x = node.attribute("x").unwrap_or_default().to_string();
//!         sink.lock().unwrap().push((x, node.text.clone()));
//!         Ok(())
//!     })),
//! );
//! parser
//!     .parse_str(r#"<root><a x="1">hi</a><a x="2">bye</a></root>"#)
//!     .unwrap();
//!
//! assert_eq!(
//!     *seen.lock().unwrap(),
//!     vec![("1".to_string(), "hi".to_string()), ("2".to_string(), "bye".to_string())]
//! );
//! ```
//!
//! # Architecture
//!
//! - [`xpath`]: Path expression compilation and matching
//! - [`context`]: Per-parse element context stack
//! - [`registry`]: Handler traits, converters and the handler registry
//! - [`events`]: Event stream abstraction and the quick-xml adapter
//! - [`parser`]: Dispatcher and the public parser facade
//! - [`config`]: Constants and tokenizer options
//! - [`types`]: Attribute sets and flushed nodes
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod parser;
pub mod registry;
pub mod types;
pub mod xpath;

// Re-export commonly used items
pub use config::ReaderOptions;
pub use context::{CurrentPath, NodeContext};
pub use error::{BoxError, Result, XPathStaxError};
pub use events::{EventSource, QuickXmlSource, XmlEvent};
pub use parser::{Dispatcher, ParseState, ParseStats, XPathStaxParser};
pub use registry::{
    Converter, FnHandler, HandlerRegistry, HandlerResult, NodeConverter, NodeHandler,
};
pub use types::{XmlAttributes, XmlNode};
pub use xpath::XPathRequest;
