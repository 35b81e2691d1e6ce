//! Compiled path expressions.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{PATH_SEPARATOR, WILDCARD};
use crate::error::{Result, XPathStaxError};

/// Element name accepted in a segment.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\w.\-]*$").expect("valid regex"));

/// Attribute predicate: `[@name='value']` or `[@name="value"]`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ATTRIBUTE_PREDICATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\[\s*@([\p{L}_][\w.\-:]*)\s*=\s*(?:'([^']*)'|"([^"]*)")\s*\]"#)
        .expect("valid regex")
});

/// Text predicate: `[text()='value']` or `[text()="value"]`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TEXT_PREDICATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\[\s*text\(\)\s*=\s*(?:'([^']*)'|"([^"]*)")\s*\]"#).expect("valid regex")
});

/// How a step relates to the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Direct child of the previous step.
    Child,
    /// Any descendant of the previous step (`//`).
    Descendant,
}

/// Which element names a step accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTest {
    Name(String),
    Wildcard,
}

/// One segment of a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    /// Attribute equality constraints, sorted by name.
    pub attributes: Vec<(String, String)>,
}

impl Step {
    /// Whether an element with `name` and `attributes` satisfies this step.
    ///
    /// `attributes` is `None` when the element's attributes are unknown,
    /// which fails any attribute constraint.
    #[must_use]
    pub fn accepts(&self, name: &str, attributes: Option<&crate::types::XmlAttributes>) -> bool {
        let name_ok = match &self.test {
            NodeTest::Name(expected) => expected == name,
            NodeTest::Wildcard => true,
        };
        if !name_ok {
            return false;
        }
        if self.attributes.is_empty() {
            return true;
        }
        attributes.is_some_and(|attrs| self.attributes.iter().all(|(n, v)| attrs.has(n, v)))
    }
}

/// An immutable, compiled path expression used as a registry key.
///
/// Two requests are equal when they compile to the same steps and text
/// constraint, regardless of quoting or predicate order in the source.
///
/// # Examples
/// ```
/// use xpathstax::XPathRequest;
///
/// let request = XPathRequest::parse("/root/item[@id='5']").unwrap();
/// assert_eq!(request.steps().len(), 2);
/// assert_eq!(request, "/root/item[@id=\"5\"]".parse().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct XPathRequest {
    expression: String,
    steps: Vec<Step>,
    text: Option<String>,
}

impl XPathRequest {
    /// Compile an expression.
    ///
    /// # Errors
    /// Returns `InvalidExpression` when the expression is not absolute,
    /// has empty or malformed segments, or places a text predicate anywhere
    /// but the last segment.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if !trimmed.starts_with(PATH_SEPARATOR) {
            return Err(XPathStaxError::expression(expression, "must start with '/'"));
        }
        if trimmed == PATH_SEPARATOR {
            return Ok(Self {
                expression: trimmed.to_string(),
                steps: Vec::new(),
                text: None,
            });
        }

        let parts = split_segments(expression, trimmed)?;
        let last = parts.len().saturating_sub(1);
        let mut steps = Vec::with_capacity(parts.len());
        let mut text = None;
        let mut descendant = false;

        // parts[0] is the empty string before the leading separator
        for (index, part) in parts.iter().enumerate().skip(1) {
            if part.is_empty() {
                if index == last {
                    return Err(XPathStaxError::expression(expression, "trailing '/'"));
                }
                if descendant {
                    return Err(XPathStaxError::expression(expression, "'///' is not allowed"));
                }
                descendant = true;
                continue;
            }

            let axis = if descendant { Axis::Descendant } else { Axis::Child };
            descendant = false;
            let (step, step_text) = parse_step(expression, part, axis)?;
            if step_text.is_some() {
                if index != last {
                    return Err(XPathStaxError::expression(
                        expression,
                        "text() is only allowed on the last segment",
                    ));
                }
                text = step_text;
            }
            steps.push(step);
        }

        Ok(Self {
            expression: trimmed.to_string(),
            steps,
            text,
        })
    }

    /// The expression as it was registered.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The required text of the matched element, if any.
    #[must_use]
    pub fn text_constraint(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Whether this is the bare root expression `/`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the accumulated text of a structurally matched element
    /// confirms the match. Surrounding whitespace is ignored on both the
    /// element text and the expected value.
    #[must_use]
    pub fn accepts_text(&self, text: &str) -> bool {
        self.text
            .as_deref()
            .is_none_or(|expected| text.trim() == expected.trim())
    }
}

impl PartialEq for XPathRequest {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps && self.text == other.text
    }
}

impl Eq for XPathRequest {}

impl Hash for XPathRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.steps.hash(state);
        self.text.hash(state);
    }
}

impl FromStr for XPathRequest {
    type Err = XPathStaxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for XPathRequest {
    type Error = XPathStaxError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

/// Renders the normalized form of the expression.
impl fmt::Display for XPathRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str(PATH_SEPARATOR);
        }
        for step in &self.steps {
            f.write_str(match step.axis {
                Axis::Child => PATH_SEPARATOR,
                Axis::Descendant => crate::config::DESCENDANT,
            })?;
            match &step.test {
                NodeTest::Name(name) => f.write_str(name)?,
                NodeTest::Wildcard => f.write_str(WILDCARD)?,
            }
            for (name, value) in &step.attributes {
                write!(f, "[@{name}={}]", quote(value))?;
            }
        }
        if let Some(text) = &self.text {
            write!(f, "[text()={}]", quote(text))?;
        }
        Ok(())
    }
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

/// Split on separators that are outside predicates.
fn split_segments<'e>(expression: &str, trimmed: &'e str) -> Result<Vec<&'e str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in trimmed.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| XPathStaxError::expression(expression, "unbalanced ']'"))?;
            }
            (None, '/') if depth == 0 => {
                parts.push(&trimmed[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 || quote.is_some() {
        return Err(XPathStaxError::expression(expression, "unterminated predicate"));
    }
    parts.push(&trimmed[start..]);
    Ok(parts)
}

fn parse_step(expression: &str, part: &str, axis: Axis) -> Result<(Step, Option<String>)> {
    let (name, mut predicates) = match part.find('[') {
        Some(pos) => (&part[..pos], &part[pos..]),
        None => (part, ""),
    };
    let name = name.trim();

    let test = if name == WILDCARD {
        NodeTest::Wildcard
    } else if NAME_PATTERN.is_match(name) {
        NodeTest::Name(name.to_string())
    } else {
        return Err(XPathStaxError::expression(
            expression,
            format!("invalid segment name '{name}'"),
        ));
    };

    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut text = None;
    predicates = predicates.trim_start();

    while !predicates.is_empty() {
        if let Some(caps) = ATTRIBUTE_PREDICATE.captures(predicates) {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            let attr_name = caps[1].to_string();
            attributes.retain(|(n, _)| *n != attr_name);
            attributes.push((attr_name, value.to_string()));
            predicates = predicates[caps[0].len()..].trim_start();
        } else if let Some(caps) = TEXT_PREDICATE.captures(predicates) {
            if text.is_some() {
                return Err(XPathStaxError::expression(expression, "duplicate text() predicate"));
            }
            let value = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            text = Some(value.to_string());
            predicates = predicates[caps[0].len()..].trim_start();
        } else {
            return Err(XPathStaxError::expression(
                expression,
                format!("unsupported predicate '{predicates}'"),
            ));
        }
    }

    attributes.sort();
    Ok((
        Step {
            axis,
            test,
            attributes,
        },
        text,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(n: &str) -> NodeTest {
        NodeTest::Name(n.to_string())
    }

    #[test]
    fn test_parse_literal_path() {
        let request = XPathRequest::parse("/a/b/c").unwrap();
        let names: Vec<_> = request.steps().iter().map(|s| s.test.clone()).collect();
        assert_eq!(names, vec![name("a"), name("b"), name("c")]);
        assert!(request.steps().iter().all(|s| s.axis == Axis::Child));
        assert!(request.text_constraint().is_none());
    }

    #[test]
    fn test_parse_root() {
        let request = XPathRequest::parse("/").unwrap();
        assert!(request.is_root());
        assert_eq!(request.to_string(), "/");
    }

    #[test]
    fn test_parse_wildcard_and_descendant() {
        let request = XPathRequest::parse("//item/*").unwrap();
        assert_eq!(request.steps()[0].axis, Axis::Descendant);
        assert_eq!(request.steps()[0].test, name("item"));
        assert_eq!(request.steps()[1].axis, Axis::Child);
        assert_eq!(request.steps()[1].test, NodeTest::Wildcard);
    }

    #[test]
    fn test_parse_predicates() {
        let request = XPathRequest::parse("/root/a[@x='1'][@lang=\"nl\"][text()='hi']").unwrap();
        let last = &request.steps()[1];
        assert_eq!(
            last.attributes,
            vec![
                ("lang".to_string(), "nl".to_string()),
                ("x".to_string(), "1".to_string())
            ]
        );
        assert_eq!(request.text_constraint(), Some("hi"));
    }

    #[test]
    fn test_separator_inside_value() {
        let request = XPathRequest::parse("/links/a[@href='http://x/y']").unwrap();
        assert_eq!(request.steps().len(), 2);
        assert_eq!(request.steps()[1].attributes[0].1, "http://x/y");
    }

    #[test]
    fn test_structural_identity() {
        let a = XPathRequest::parse("/r/a[@x='1'][@y='2']").unwrap();
        let b = XPathRequest::parse(" /r/a[@y=\"2\"][@x='1']").unwrap();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
        assert_ne!(
            XPathRequest::parse("/r/a").unwrap(),
            XPathRequest::parse("//r/a").unwrap()
        );
    }

    #[test]
    fn test_display_normalizes() {
        let request = XPathRequest::parse("/r//a[ @y = \"it's\" ][@x='1']/*[text()=\"v\"]").unwrap();
        assert_eq!(request.to_string(), "/r//a[@x='1'][@y=\"it's\"]/*[text()='v']");
    }

    #[test]
    fn test_invalid_expressions() {
        for bad in [
            "",
            "a/b",
            "/a/",
            "/a///b",
            "/a/[@x='1']",
            "/a[@x=1]",
            "/a[@x='1'",
            "/a]",
            "/a[position()=1]",
            "/a[text()='x']/b",
            "/a[text()='x'][text()='y']",
            "/1abc",
        ] {
            let err = XPathRequest::parse(bad).unwrap_err();
            assert!(
                matches!(err, XPathStaxError::InvalidExpression { .. }),
                "expected InvalidExpression for {bad:?}"
            );
        }
    }

    #[test]
    fn test_accepts_text() {
        let request = XPathRequest::parse("/r/a[text()='hi']").unwrap();
        assert!(request.accepts_text("  hi\n"));
        assert!(!request.accepts_text("high"));
        assert!(XPathRequest::parse("/r/a").unwrap().accepts_text("anything"));
    }

    #[test]
    fn test_accepts_text_ignores_whitespace_in_expected_value() {
        let request = XPathRequest::parse("/r/a[text()=' x ']").unwrap();
        assert_eq!(request.text_constraint(), Some(" x "));
        assert!(request.accepts_text(" x "));
        assert!(request.accepts_text("x\n"));
        assert!(!request.accepts_text("y"));
    }

    #[test]
    fn test_parse_non_ascii_names() {
        let request = XPathRequest::parse("/katalog/übersicht[@größe='2']").unwrap();
        assert_eq!(request.steps()[1].test, name("übersicht"));
        assert_eq!(
            request.steps()[1].attributes,
            vec![("größe".to_string(), "2".to_string())]
        );

        let request = XPathRequest::parse("/目录/项").unwrap();
        let names: Vec<_> = request.steps().iter().map(|s| s.test.clone()).collect();
        assert_eq!(names, vec![name("目录"), name("项")]);
    }
}
