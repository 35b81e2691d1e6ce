//! Typed converter that turns matched elements into values.

use std::fmt;
use std::mem;
use std::sync::{Mutex, PoisonError};

use super::handler::{HandlerResult, NodeConverter, NodeHandler};
use crate::context::NodeContext;
use crate::error::BoxError;
use crate::types::XmlNode;
use crate::xpath::XPathRequest;

type ConvertFn<T> = dyn Fn(&XmlNode, &NodeContext) -> Result<T, BoxError> + Send + Sync;

/// Handler that converts every matched element into a `T` and keeps the
/// results in document order.
///
/// A converter knows its own pattern, so it can be registered with
/// [`XPathStaxParser::add_converter`](crate::XPathStaxParser::add_converter).
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use xpathstax::{Converter, XPathStaxParser};
///
/// let prices = Arc::new(Converter::new("/shop/item".parse().unwrap(), |node, _| {
///     Ok(node.text.trim().parse::<u32>()?)
/// }));
///
/// let parser = XPathStaxParser::new();
/// parser.add_converter(Arc::clone(&prices));
/// parser.parse_str("<shop><item>3</item><item>4</item></shop>").unwrap();
///
/// assert_eq!(prices.take(), vec![3, 4]);
/// ```
pub struct Converter<T> {
    request: XPathRequest,
    convert: Box<ConvertFn<T>>,
    results: Mutex<Vec<T>>,
    children: bool,
}

impl<T: Send> Converter<T> {
    /// Create a converter for `request`.
    pub fn new<F>(request: XPathRequest, convert: F) -> Self
    where
        F: Fn(&XmlNode, &NodeContext) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            request,
            convert: Box::new(convert),
            results: Mutex::new(Vec::new()),
            children: false,
        }
    }

    /// Collect the direct children of matched elements before converting,
    /// for values built from several child elements.
    #[must_use]
    pub fn with_children(mut self) -> Self {
        self.children = true;
        self
    }

    /// Take the converted values, leaving the converter empty.
    pub fn take(&self) -> Vec<T> {
        mem::take(&mut *self.results.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of values converted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> NodeHandler for Converter<T> {
    fn process_node(&self, node: &XmlNode, context: &NodeContext) -> HandlerResult {
        let value = (self.convert)(node, context)?;
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
        Ok(())
    }

    fn wants_children(&self) -> bool {
        self.children
    }
}

impl<T: Send> NodeConverter for Converter<T> {
    fn request(&self) -> XPathRequest {
        self.request.clone()
    }
}

impl<T> fmt::Debug for Converter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("request", &self.request.expression())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
