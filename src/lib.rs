//! Acumen - adaptive pattern learning and predictive scoring for code.
//!
//! Acumen analyzes source files, remembers the structural patterns it sees,
//! and gets better at judging code the more it runs. Static detectors give
//! every finding a base confidence; a persistent learning layer tracks how
//! often each code shape co-occurs with problems and blends that history
//! back into the confidence of future findings.
//!
//! # Architecture
//!
//! The pipeline runs parse -> extract -> detect -> learn -> score:
//!
//! - `frontend`: tree-sitter parsing into language-neutral `FileFacts`
//! - `facts`: the normalized construct descriptors detectors consume
//! - `extract`: file-level `CodeMetrics` derived from facts
//! - `detect`: line and structural detectors producing `Finding`s
//! - `signature`: stable fingerprints of construct shapes
//! - `learn`: the pattern store, confidence calibration, suggestions
//! - `score`: the bounded 0-100 quality score
//! - `profile`: streaming per-developer statistics
//! - `store`: the persistence contract with memory and JSON backends
//! - `engine`: the public operations tying the pipeline together
//!
//! # Adding a New Language
//!
//! Implement the `FrontEnd` trait over the language's tree-sitter grammar
//! and hand it to `Engine::with_frontend`. Everything past the front end is
//! language-neutral.

pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod extract;
pub mod facts;
pub mod frontend;
pub mod learn;
pub mod profile;
pub mod score;
pub mod signature;
pub mod store;

pub use config::{EngineConfig, LearningParams, ScoreWeights, SuggestionRules};
pub use detect::{DetectorSpec, Finding, FindingKind, Severity};
pub use engine::{AnalysisResult, Engine, SourceFile};
pub use error::EngineError;
pub use extract::{CodeMetrics, ImportCounts};
pub use facts::{ConstructDescriptor, ConstructKind, FileFacts, Import, ImportOrigin, Span};
pub use frontend::{FrontEnd, PythonFrontEnd};
pub use learn::{PatternRecord, Suggestion, SuggestionKind};
pub use profile::DeveloperProfile;
pub use score::QualityScore;
pub use signature::{signature_of, PatternSignature};
pub use store::{Entity, JsonStore, MemoryStore, Store};
