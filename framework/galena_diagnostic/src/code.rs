use std::fmt;

/// Codes for all annotations.
///
/// Format: G#### where the first digit indicates the phase:
/// - G0xxx: Pattern evaluation
/// - G1xxx: Data binding
/// - G9xxx: Internal errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnnotationCode {
    // Pattern evaluation (G0xxx)
    /// More than one primary pattern on a code element
    G0001,
    /// Pattern applied incorrectly (usage error)
    G0002,
    /// Pattern failed unexpectedly
    G0003,
    /// Decorator added after the scope was finalized
    G0004,
    /// Dependency target is not a test
    G0005,
    /// Test depends on itself, an ancestor or a descendant
    G0006,

    // Data binding (G1xxx)
    /// Named data source not found
    G1001,
    /// No anonymous data source for an implicit binding
    G1002,

    // Internal (G9xxx)
    /// Internal framework error
    G9001,
}

impl AnnotationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationCode::G0001 => "G0001",
            AnnotationCode::G0002 => "G0002",
            AnnotationCode::G0003 => "G0003",
            AnnotationCode::G0004 => "G0004",
            AnnotationCode::G0005 => "G0005",
            AnnotationCode::G0006 => "G0006",
            AnnotationCode::G1001 => "G1001",
            AnnotationCode::G1002 => "G1002",
            AnnotationCode::G9001 => "G9001",
        }
    }

    /// One-line explanation for documentation and `--explain`-style output.
    pub fn description(self) -> &'static str {
        match self {
            AnnotationCode::G0001 => "more than one primary pattern applies to a code element",
            AnnotationCode::G0002 => "a pattern was applied to an element it does not support",
            AnnotationCode::G0003 => "a pattern failed unexpectedly while evaluating",
            AnnotationCode::G0004 => "a decorator was added after its scope was finalized",
            AnnotationCode::G0005 => "the target of a dependency does not declare any test",
            AnnotationCode::G0006 => "a test depends on itself or on its own ancestry",
            AnnotationCode::G1001 => "a named data source could not be found",
            AnnotationCode::G1002 => "no anonymous data source is in scope for an implicit binding",
            AnnotationCode::G9001 => "internal framework error",
        }
    }
}

impl fmt::Display for AnnotationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
