//! Handler traits and the closure-based handler.

use std::fmt;

use crate::context::NodeContext;
use crate::error::BoxError;
use crate::types::XmlNode;
use crate::xpath::XPathRequest;

/// Result of a handler callback.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Trait for handlers notified about matched elements.
///
/// For every occurrence of a matched element the handler first receives
/// [`element_start`](NodeHandler::element_start) when the element opens,
/// then [`process_node`](NodeHandler::process_node) with the accumulated
/// attributes and text when it closes. Occurrences nest strictly: a later
/// start never arrives before an earlier occurrence's end unless the later
/// element is a descendant of the earlier one.
///
/// Returning an error aborts the whole parse.
pub trait NodeHandler: Send + Sync {
    /// Called when a matched element opens.
    ///
    /// Default implementation does nothing.
    fn element_start(&self, _name: &str) -> HandlerResult {
        Ok(())
    }

    /// Called when a matched element closes.
    ///
    /// # Arguments
    /// * `node` - The closed element with its attributes and direct text
    /// * `context` - The open ancestors of the element
    fn process_node(&self, node: &XmlNode, context: &NodeContext) -> HandlerResult;

    /// Whether the direct children of matched elements should be collected
    /// into [`XmlNode::children`].
    ///
    /// Default implementation returns false, which keeps memory bounded by
    /// document depth.
    fn wants_children(&self) -> bool {
        false
    }
}

/// A handler that declares the pattern it wants to be registered under.
pub trait NodeConverter: NodeHandler {
    /// The pattern this converter handles.
    fn request(&self) -> XPathRequest;
}

type StartFn = dyn Fn(&str) -> HandlerResult + Send + Sync;
type EndFn = dyn Fn(&XmlNode, &NodeContext) -> HandlerResult + Send + Sync;

/// Handler built from closures.
///
/// # Examples
/// ```
/// use std::sync::{Arc, Mutex};
/// use xpathstax::{FnHandler, XPathStaxParser};
///
/// let texts = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&texts);
///
/// let parser = XPathStaxParser::new();
/// parser
///     .add_handler(
///         "/root/a".parse().unwrap(),
///         Arc::new(FnHandler::new(move |node, _| {
///             sink.lock().unwrap().push(node.text.clone());
///             Ok(())
///         })),
///     );
/// parser.parse_str("<root><a>hi</a><a>bye</a></root>").unwrap();
///
/// assert_eq!(*texts.lock().unwrap(), vec!["hi", "bye"]);
/// ```
pub struct FnHandler {
    start: Option<Box<StartFn>>,
    end: Box<EndFn>,
    children: bool,
}

impl FnHandler {
    /// Create a handler that runs `end` for every closed element.
    pub fn new<F>(end: F) -> Self
    where
        F: Fn(&XmlNode, &NodeContext) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            start: None,
            end: Box::new(end),
            children: false,
        }
    }

    /// Also run `start` for every opened element.
    #[must_use]
    pub fn on_start<F>(mut self, start: F) -> Self
    where
        F: Fn(&str) -> HandlerResult + Send + Sync + 'static,
    {
        self.start = Some(Box::new(start));
        self
    }

    /// Collect the direct children of matched elements.
    #[must_use]
    pub fn with_children(mut self) -> Self {
        self.children = true;
        self
    }
}

impl NodeHandler for FnHandler {
    fn element_start(&self, name: &str) -> HandlerResult {
        match &self.start {
            Some(start) => start(name),
            None => Ok(()),
        }
    }

    fn process_node(&self, node: &XmlNode, context: &NodeContext) -> HandlerResult {
        (self.end)(node, context)
    }

    fn wants_children(&self) -> bool {
        self.children
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("has_start", &self.start.is_some())
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        starts: AtomicUsize,
        ends: AtomicUsize,
    }

    impl NodeHandler for CountingHandler {
        fn element_start(&self, _name: &str) -> HandlerResult {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn process_node(&self, _node: &XmlNode, _context: &NodeContext) -> HandlerResult {
            self.ends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_handler_trait() {
        let handler = CountingHandler {
            starts: AtomicUsize::new(0),
            ends: AtomicUsize::new(0),
        };
        let context = NodeContext::new();

        handler.element_start("a").unwrap();
        handler.process_node(&XmlNode::default(), &context).unwrap();

        assert_eq!(handler.starts.load(Ordering::SeqCst), 1);
        assert_eq!(handler.ends.load(Ordering::SeqCst), 1);
        assert!(!handler.wants_children());
    }

    #[test]
    fn test_fn_handler_without_start() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = FnHandler::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        handler.element_start("ignored").unwrap();
        handler
            .process_node(&XmlNode::default(), &NodeContext::new())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fn_handler_start_error() {
        let handler = FnHandler::new(|_, _| Ok(()))
            .on_start(|name| Err(format!("refusing {name}").into()))
            .with_children();

        let err = handler.element_start("a").unwrap_err();
        assert_eq!(err.to_string(), "refusing a");
        assert!(handler.wants_children());
    }
}
