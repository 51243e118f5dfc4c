//! Ambient settings of encode and decode calls.

use std::cell::RefCell;
use std::fmt;

use log::warn;
use thiserror::Error;

use crate::registry::Registry;
use crate::standards::Standards;
use crate::types::{Pds, Strictness};

/// A non-fatal problem met while converting a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// Bytes left unread after a lenient decode.
    #[error("{name}: {size} extraneous bytes")]
    ExtraneousData { name: String, size: usize },

    /// The value was kept although its binary form is truncated or malformed.
    #[error("{name}: truncated or malformed, kept partially decoded")]
    Malformed { name: String },

    /// A value was left out of the output.
    #[error("{name} omitted: {reason}")]
    Omitted { name: String, reason: String },

    /// An XML element was skipped.
    #[error("<{element}> at line {line} skipped: {reason}")]
    SkippedElement {
        element: String,
        line: usize,
        reason: String,
    },
}

/// A decoded value and the problems met on the way.
#[derive(Debug)]
pub struct Decoded<T> {
    pub value: T,
    pub problems: Vec<Problem>,
}

impl<T> Decoded<T> {
    pub fn clean(value: T) -> Self {
        Decoded {
            value,
            problems: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Collects the problems reported through a [`CodecContext`].
#[derive(Debug, Default)]
pub struct ProblemLog {
    problems: RefCell<Vec<Problem>>,
}

impl ProblemLog {
    pub fn new() -> Self {
        ProblemLog::default()
    }

    pub fn push(&self, problem: Problem) {
        self.problems.borrow_mut().push(problem);
    }

    pub fn len(&self) -> usize {
        self.problems.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<Problem> {
        self.problems.take()
    }
}

/// Registry and settings used by the entry points of [`crate::codec`].
///
/// The context is `Copy`; each call receives its own settings, so a
/// strict and a lenient conversion can share the same registry.
#[derive(Clone, Copy)]
pub struct CodecContext<'r> {
    registry: &'r Registry,
    standards: Standards,
    strictness: Strictness,
    fix_pds: bool,
    default_pds: Option<Pds>,
    problems: Option<&'r ProblemLog>,
}

impl fmt::Debug for CodecContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecContext")
            .field("standards", &self.standards)
            .field("strictness", &self.strictness)
            .field("fix_pds", &self.fix_pds)
            .field("default_pds", &self.default_pds)
            .finish_non_exhaustive()
    }
}

impl CodecContext<'static> {
    /// A lenient context on the global registry with no standard.
    pub fn new() -> Self {
        CodecContext::with_registry(Registry::global())
    }
}

impl Default for CodecContext<'static> {
    fn default() -> Self {
        CodecContext::new()
    }
}

impl<'r> CodecContext<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        CodecContext {
            registry,
            standards: Standards::empty(),
            strictness: Strictness::default(),
            fix_pds: false,
            default_pds: None,
            problems: None,
        }
    }

    /// Replace the active standards. Implied standards are added.
    pub fn with_standards(mut self, standards: Standards) -> Self {
        self.standards = standards.with_implied();
        self
    }

    pub fn add_standards(mut self, standards: Standards) -> Self {
        self.standards = (self.standards | standards).with_implied();
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Insert missing private data specifiers when converting from XML.
    pub fn with_fix_pds(mut self, fix_pds: bool) -> Self {
        self.fix_pds = fix_pds;
        self
    }

    /// PDS assumed for private descriptors that have none in effect.
    pub fn with_default_pds(mut self, pds: Option<Pds>) -> Self {
        self.default_pds = pds.filter(|&p| p != 0);
        self
    }

    pub fn with_problem_log(mut self, log: &'r ProblemLog) -> Self {
        self.problems = Some(log);
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn standards(&self) -> Standards {
        self.standards
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn is_strict(&self) -> bool {
        self.strictness.is_strict()
    }

    pub fn fix_pds(&self) -> bool {
        self.fix_pds
    }

    pub fn default_pds(&self) -> Option<Pds> {
        self.default_pds
    }

    /// Log a problem and keep it in the attached log, if any.
    pub fn report(&self, problem: Problem) {
        warn!("{}", problem);
        if let Some(log) = self.problems {
            log.push(problem);
        }
    }

    pub fn report_all(&self, problems: impl IntoIterator<Item = Problem>) {
        for problem in problems {
            self.report(problem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let registry = Registry::default();
        let ctx = CodecContext::with_registry(&registry)
            .with_standards(Standards::JAPAN)
            .with_strictness(Strictness::Strict)
            .with_default_pds(Some(0));
        assert_eq!(ctx.standards(), Standards::JAPAN | Standards::ISDB);
        assert!(ctx.is_strict());
        assert_eq!(ctx.default_pds(), None);
        let lenient = ctx.with_strictness(Strictness::Lenient);
        assert!(!lenient.is_strict());
        assert!(ctx.is_strict());
    }

    #[test]
    fn test_problem_log() {
        let registry = Registry::default();
        let log = ProblemLog::new();
        let ctx = CodecContext::with_registry(&registry).with_problem_log(&log);
        ctx.report(Problem::Malformed { name: "x".into() });
        assert_eq!(log.len(), 1);
        assert_eq!(log.take().len(), 1);
        assert!(log.is_empty());
    }
}
