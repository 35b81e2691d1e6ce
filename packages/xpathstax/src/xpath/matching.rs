//! Matching compiled expressions against the reader's position.

use super::request::{Axis, Step, XPathRequest};
use crate::context::{CurrentPath, NodeContext};
use crate::types::XmlAttributes;

impl XPathRequest {
    /// Whether the element just opened at `path` structurally matches.
    ///
    /// `attributes` belongs to the element being opened (the last segment
    /// of `path`); attribute constraints on earlier steps are checked
    /// against the ancestor frames held by `context`. A text constraint is
    /// not evaluated here, see [`XPathRequest::accepts_text`].
    #[must_use]
    pub fn can_process(
        &self,
        path: &CurrentPath,
        attributes: &XmlAttributes,
        context: &NodeContext,
    ) -> bool {
        let segments = path.segments();
        if segments.is_empty() || self.steps().is_empty() {
            return false;
        }

        let last = segments.len() - 1;
        let attributes_at = |depth: usize| {
            if depth == last {
                Some(attributes)
            } else {
                context.attributes_at(depth)
            }
        };

        match_from(self.steps(), segments, 0, 0, &attributes_at)
    }
}

/// Backtracking match of `steps[si..]` against `segments[pi..]`.
///
/// Descendant steps try the shortest gap first.
fn match_from<'a>(
    steps: &[Step],
    segments: &[String],
    si: usize,
    pi: usize,
    attributes_at: &dyn Fn(usize) -> Option<&'a XmlAttributes>,
) -> bool {
    let Some(step) = steps.get(si) else {
        return pi == segments.len();
    };
    // Every remaining step consumes at least one segment.
    if segments.len() - pi < steps.len() - si {
        return false;
    }

    match step.axis {
        Axis::Child => {
            step.accepts(&segments[pi], attributes_at(pi))
                && match_from(steps, segments, si + 1, pi + 1, attributes_at)
        }
        Axis::Descendant => (pi..segments.len()).any(|k| {
            step.accepts(&segments[k], attributes_at(k))
                && match_from(steps, segments, si + 1, k + 1, attributes_at)
        }),
    }
}
