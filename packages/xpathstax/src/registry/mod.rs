//! Handler registry: which handlers are notified for which path patterns.
//!
//! Handlers are registered under a compiled [`XPathRequest`](crate::XPathRequest).
//! Every start element is tested against every registered pattern, and the
//! handlers of matching patterns follow the start/end lifecycle described on
//! [`NodeHandler`].

mod converter;
mod core;
mod handler;

pub use converter::Converter;
pub use core::{HandlerRegistry, Registration};
pub use handler::{FnHandler, HandlerResult, NodeConverter, NodeHandler};
