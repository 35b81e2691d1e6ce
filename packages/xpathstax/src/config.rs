//! Configuration constants and tokenizer pass-through options.

use quick_xml::reader::Config;

use crate::error::{Result, XPathStaxError};

/// Separator between path segments, and the expression for the document root.
pub const PATH_SEPARATOR: &str = "/";

/// Segment matching any single element name.
pub const WILDCARD: &str = "*";

/// Prefix of a segment that may be preceded by any number of ancestors.
pub const DESCENDANT: &str = "//";

/// Initial capacity of the buffer the tokenizer reads events into.
pub const EVENT_BUFFER_CAPACITY: usize = 1024;

/// Property keys understood by [`ReaderOptions::set_property`].
pub const PROPERTY_KEYS: [&str; 4] = [
    "trim_text",
    "check_end_names",
    "check_comments",
    "allow_unmatched_ends",
];

/// Options forwarded to the XML tokenizer.
///
/// The core does not interpret these; they only change how the tokenizer
/// lexes the input. Defaults follow quick-xml, except that text is never
/// trimmed so handlers see the exact character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Trim leading and trailing whitespace of text events.
    pub trim_text: bool,
    /// Let the tokenizer reject mismatched end tags.
    pub check_end_names: bool,
    /// Let the tokenizer reject `--` inside comments.
    pub check_comments: bool,
    /// Let the tokenizer emit end tags that close nothing.
    pub allow_unmatched_ends: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            trim_text: false,
            check_end_names: true,
            check_comments: false,
            allow_unmatched_ends: false,
        }
    }
}

impl ReaderOptions {
    /// Set an option by its property name.
    ///
    /// # Errors
    /// Returns `InvalidProperty` for unknown keys or values that are not
    /// `true`/`false`.
    ///
    /// # Examples
    /// ```
    /// use xpathstax::config::ReaderOptions;
    ///
    /// let mut options = ReaderOptions::default();
    /// options.set_property("trim_text", "true").unwrap();
    /// assert!(options.trim_text);
    /// assert!(options.set_property("validating", "true").is_err());
    /// ```
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || XPathStaxError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = parse_flag(value).ok_or_else(invalid)?;

        match key {
            "trim_text" => self.trim_text = flag,
            "check_end_names" => self.check_end_names = flag,
            "check_comments" => self.check_comments = flag,
            "allow_unmatched_ends" => self.allow_unmatched_ends = flag,
            _ => return Err(invalid()),
        }
        Ok(())
    }

    /// Write these options into a quick-xml reader configuration.
    pub fn apply(&self, config: &mut Config) {
        config.trim_text(self.trim_text);
        config.check_end_names = self.check_end_names;
        config.check_comments = self.check_comments;
        config.allow_unmatched_ends = self.allow_unmatched_ends;
        // Self-closing tags are expanded by the event adapter instead.
        config.expand_empty_elements = false;
    }
}

/// Split a `key=value` pair as given on the command line.
///
/// # Examples
/// ```
/// use xpathstax::config::parse_property;
///
/// assert_eq!(parse_property("trim_text=true").unwrap(), ("trim_text".to_string(), "true".to_string()));
/// assert!(parse_property("trim_text").is_err());
/// ```
pub fn parse_property(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(XPathStaxError::InvalidProperty {
            key: pair.to_string(),
            value: String::new(),
        }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
