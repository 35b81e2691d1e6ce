//! Per-parse element context: the current path and one frame per open
//! element.
//!
//! A frame remembers the attributes its element opened with, the handlers
//! that matched at open time, and (while tracked) the character data and
//! flushed children seen so far. When the element closes, the frame is
//! popped and its state is flushed to the matched handlers exactly once.

use std::fmt;

use crate::config::PATH_SEPARATOR;
use crate::error::{BoxError, Result, XPathStaxError};
use crate::registry::Registration;
use crate::types::{XmlAttributes, XmlNode};

/// Stack of local names from the document root to the current element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentPath {
    segments: Vec<String>,
}

impl CurrentPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.segments.push(name.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Local name of the innermost element.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

/// Renders as `/a/b/c`; the empty path renders as `/`.
impl fmt::Display for CurrentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str(PATH_SEPARATOR);
        }
        for segment in &self.segments {
            f.write_str(PATH_SEPARATOR)?;
            f.write_str(segment)?;
        }
        Ok(())
    }
}

struct Frame {
    attributes: XmlAttributes,
    /// Only buffered when the element or its parent is tracked.
    text: Option<String>,
    matches: Vec<Registration>,
    /// `Some` when a matched handler asked for the element's children.
    children: Option<Vec<XmlNode>>,
}

impl Frame {
    fn is_tracked(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Element context stack, allocated fresh for every parse.
pub struct NodeContext {
    path: CurrentPath,
    frames: Vec<Frame>,
}

impl NodeContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: CurrentPath::new(),
            frames: Vec::new(),
        }
    }

    /// Path of the innermost open element.
    #[must_use]
    pub fn path(&self) -> &CurrentPath {
        &self.path
    }

    /// Number of open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Local name of the innermost open element.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.path.last()
    }

    /// Attributes of the open element at `depth` (0 is the document element).
    #[must_use]
    pub fn attributes_at(&self, depth: usize) -> Option<&XmlAttributes> {
        self.frames.get(depth).map(|f| &f.attributes)
    }

    /// Value of `attribute` on the innermost open ancestor named `element`.
    #[must_use]
    pub fn ancestor_attribute(&self, element: &str, attribute: &str) -> Option<&str> {
        self.path
            .segments()
            .iter()
            .zip(&self.frames)
            .rev()
            .find(|(name, _)| name.as_str() == element)
            .and_then(|(_, frame)| frame.attributes.get(attribute))
    }

    /// Open an element and notify the handlers whose patterns match.
    ///
    /// Handlers with a text constraint are recorded but not notified yet;
    /// their start notification is deferred until the text is confirmed.
    /// Returns the number of matched registrations.
    ///
    /// # Errors
    /// Returns `Handler` if a start notification fails.
    pub fn open(
        &mut self,
        name: &str,
        attributes: XmlAttributes,
        registrations: &[Registration],
    ) -> Result<usize> {
        self.path.push(name);

        let matches: Vec<Registration> = registrations
            .iter()
            .filter(|r| r.request.can_process(&self.path, &attributes, self))
            .cloned()
            .collect();

        for registration in &matches {
            tracing::trace!(path = %self.path, expression = %registration.request.expression(), "Pattern matched");
            if registration.request.text_constraint().is_none() {
                if let Err(source) = registration.handler.element_start(name) {
                    let err = self.handler_error(source);
                    // No frame was pushed for this element.
                    self.path.pop();
                    return Err(err);
                }
            }
        }

        let parent_captures = self
            .frames
            .last()
            .is_some_and(|parent| parent.children.is_some());
        let tracked = !matches.is_empty();
        let captures = matches.iter().any(|r| r.handler.wants_children());
        let count = matches.len();

        self.frames.push(Frame {
            attributes,
            text: (tracked || parent_captures).then(String::new),
            matches,
            children: captures.then(Vec::new),
        });
        Ok(count)
    }

    /// Append a character data fragment to the innermost element.
    ///
    /// Text under elements nobody tracks is dropped.
    pub fn append_text(&mut self, chunk: &str) {
        if let Some(text) = self.frames.last_mut().and_then(|f| f.text.as_mut()) {
            text.push_str(chunk);
        }
    }

    /// Close the innermost element, flushing it to its handlers.
    ///
    /// # Errors
    /// Returns `StructuralInconsistency` if `name` is not the innermost open
    /// element, or `Handler` if a handler fails.
    pub fn close(&mut self, name: &str) -> Result<()> {
        if self.path.last() != Some(name) {
            return Err(XPathStaxError::StructuralInconsistency {
                expected: self.path.last().map(str::to_string),
                found: name.to_string(),
            });
        }
        let Some(frame) = self.frames.pop() else {
            return Err(XPathStaxError::StructuralInconsistency {
                expected: None,
                found: name.to_string(),
            });
        };

        let parent_captures = self
            .frames
            .last()
            .is_some_and(|parent| parent.children.is_some());
        if !frame.is_tracked() && !parent_captures {
            self.path.pop();
            return Ok(());
        }

        let node = XmlNode {
            name: name.to_string(),
            path: self.path.to_string(),
            attributes: frame.attributes,
            text: frame.text.unwrap_or_default(),
            children: frame.children.unwrap_or_default(),
        };
        self.path.pop();

        let context: &NodeContext = self;
        for registration in &frame.matches {
            if !registration.request.accepts_text(&node.text) {
                continue;
            }
            let notify = || -> std::result::Result<(), BoxError> {
                if registration.request.text_constraint().is_some() {
                    registration.handler.element_start(name)?;
                }
                registration.handler.process_node(&node, context)
            };
            notify().map_err(|source| XPathStaxError::Handler {
                path: node.path.clone(),
                source,
            })?;
        }

        if let Some(children) = self.frames.last_mut().and_then(|f| f.children.as_mut()) {
            children.push(node);
        }
        Ok(())
    }

    /// Whether every opened element has been closed.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.frames.is_empty()
    }

    fn handler_error(&self, source: BoxError) -> XPathStaxError {
        XPathStaxError::Handler {
            path: self.path.to_string(),
            source,
        }
    }

    /// Open an element without consulting any registry.
    #[cfg(test)]
    pub(crate) fn push_untracked(&mut self, name: &str, attributes: XmlAttributes) {
        self.path.push(name);
        self.frames.push(Frame {
            attributes,
            text: None,
            matches: Vec::new(),
            children: None,
        });
    }
}

impl Default for NodeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("path", &self.path.to_string())
            .field(
                "tracked",
                &self.frames.iter().filter(|frame| frame.is_tracked()).count(),
            )
            .finish()
    }
}
