//! Annotation queue for collecting and deduplicating annotations.
//!
//! The same malformed declaration can be reached through several scopes (an
//! inherited member seen from two fixtures, a populator replayed after a
//! filter change); the queue drops exact repeats so each problem is reported
//! once.

use rustc_hash::FxHashSet;

use crate::{Annotation, Severity};

/// Receiver of annotations.
///
/// Discovery and execution publish through this interface instead of
/// returning errors to their caller.
pub trait AnnotationSink {
    fn annotate(&mut self, annotation: Annotation);
}

/// Ordered, deduplicating annotation store.
#[derive(Clone, Debug, Default)]
pub struct AnnotationQueue {
    annotations: Vec<Annotation>,
    seen: FxHashSet<Annotation>,
    error_count: usize,
}

impl AnnotationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation. Returns `false` if an identical one was queued.
    pub fn push(&mut self, annotation: Annotation) -> bool {
        if !self.seen.insert(annotation.clone()) {
            return false;
        }
        if annotation.is_error() {
            self.error_count += 1;
        }
        self.annotations.push(annotation);
        true
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    /// Annotations of at least the given severity, in insertion order.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |annotation| annotation.severity >= severity)
    }

    /// Take all annotations, most severe first, insertion order within a
    /// severity.
    pub fn flush(&mut self) -> Vec<Annotation> {
        let mut annotations = std::mem::take(&mut self.annotations);
        annotations.sort_by(|a, b| b.severity.cmp(&a.severity));
        self.seen.clear();
        self.error_count = 0;
        annotations
    }
}

impl AnnotationSink for AnnotationQueue {
    fn annotate(&mut self, annotation: Annotation) {
        self.push(annotation);
    }
}
