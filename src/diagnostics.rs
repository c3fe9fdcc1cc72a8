//! The diagnostic sink (C1).
//!
//! A single append-only list of typed errors/warnings, each optionally
//! carrying a [`Span`]. Compilation succeeds only if no `error`-severity
//! diagnostic was emitted (§4.1). A pass that emits an error prevents the
//! pipeline from advancing past the next pass boundary (§2, §7), but a
//! single pass keeps going past recoverable errors so the caller sees the
//! full list.

use crate::value::Span;
use std::fmt;

/// Severity of a diagnostic. Only `Error` prevents a successful compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single compiler diagnostic.
///
/// `code` is a stable short identifier per message family (SPEC_FULL.md §F2)
/// so tooling can filter without string-matching `message`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub code: &'static str,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
            code,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
            code,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.span {
            Some(span) => write!(f, "{level}[{}]: {} ({span})", self.code, self.message),
            None => write!(f, "{level}[{}]: {}", self.code, self.message),
        }
    }
}

/// Append-only diagnostic accumulator threaded through every pass.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    /// Optional cap (SPEC_FULL.md §F1): once reached, further diagnostics are
    /// still counted (so `has_errors` stays correct) but not stored, to keep
    /// huge malformed projects from producing unbounded diagnostic lists.
    max_diagnostics: Option<usize>,
    dropped_count: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max(max_diagnostics: Option<usize>) -> Self {
        Self {
            max_diagnostics,
            ..Self::default()
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if let Some(max) = self.max_diagnostics {
            if self.diagnostics.len() >= max {
                self.dropped_count += 1;
                return;
            }
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>, span: Option<Span>) {
        self.push(Diagnostic::error(code, message, span));
    }

    pub fn warning(&mut self, code: &'static str, message: impl Into<String>, span: Option<Span>) {
        self.push(Diagnostic::warning(code, message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.dropped_count > 0 || self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
