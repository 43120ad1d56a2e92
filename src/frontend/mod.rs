//! Parser front ends.
//!
//! A front end turns raw source text into the normalized `FileFacts` the core
//! consumes. The engine is agnostic to which language produced the facts; one
//! front end ships with the crate (Python, tree-sitter backed). Everything
//! tree-sitter stays behind this module boundary.

mod python;

pub use python::PythonFrontEnd;

use crate::error::EngineError;
use crate::facts::FileFacts;

/// Contract a parser front end must implement.
///
/// `extract` fails only on empty or malformed input; all computation over
/// well-formed source is total.
pub trait FrontEnd: Send + Sync {
    /// Language identifier, e.g. `"python"`.
    fn language_id(&self) -> &'static str;

    /// Parse source text and reduce it to normalized facts.
    fn extract(&self, path: &str, source: &str) -> Result<FileFacts, EngineError>;
}
