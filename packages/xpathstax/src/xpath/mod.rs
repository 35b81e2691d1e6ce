//! Path expressions: compilation and matching.
//!
//! The supported grammar is a small XPath subset:
//!
//! - `/a/b/c` absolute child steps, `/` alone for the document root
//! - `*` for any single element
//! - `//name` for `name` at any depth below the previous step
//! - `name[@attr='value']` attribute equality, repeatable
//! - `name[text()='value']` text equality on the last step

mod matching;
mod request;

pub use request::{Axis, NodeTest, Step, XPathRequest};
