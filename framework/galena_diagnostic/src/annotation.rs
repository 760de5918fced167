use std::fmt;

use galena_ir::CodeElement;

use crate::AnnotationCode;

/// Severity of an annotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A problem found with a test declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    pub severity: Severity,
    pub code: AnnotationCode,
    /// Declaration the problem is attached to, if any.
    pub element: Option<CodeElement>,
    pub message: String,
    /// Full failure text (panic payload, nested error chain).
    pub detail: Option<String>,
}

impl Annotation {
    pub fn new(severity: Severity, code: AnnotationCode) -> Self {
        Annotation {
            severity,
            code,
            element: None,
            message: String::new(),
            detail: None,
        }
    }

    #[cold]
    pub fn error(code: AnnotationCode) -> Self {
        Self::new(Severity::Error, code)
    }

    pub fn warning(code: AnnotationCode) -> Self {
        Self::new(Severity::Warning, code)
    }

    pub fn info(code: AnnotationCode) -> Self {
        Self::new(Severity::Info, code)
    }

    #[must_use]
    pub fn at(mut self, element: CodeElement) -> Self {
        self.element = Some(element);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;
        if let Some(element) = self.element {
            write!(f, " (at {element:?})")?;
        }
        Ok(())
    }
}
