//! Annotation system for discovery and validation problems.
//!
//! Discovery never throws at its caller. Malformed declarations and failing
//! patterns are published as annotations tied to the offending code element:
//! - Annotation codes for searchability (`G0001`, ...)
//! - A short message (what went wrong)
//! - Optional detail (the full failure text)
//!
//! ```text
//! let mut queue = AnnotationQueue::new();
//! queue.annotate(Annotation::error(AnnotationCode::G0001).at(element).with_message("..."));
//! assert!(queue.has_errors());
//! ```

mod annotation;
mod code;
pub mod queue;

pub use annotation::{Annotation, Severity};
pub use code::AnnotationCode;
pub use queue::{AnnotationQueue, AnnotationSink};
