//! Structural pattern signatures.
//!
//! A signature is a stable identity for a construct's shape, blind to names
//! and literals: two functions differing only in identifiers collide, two
//! functions differing in branch/loop/nesting shape do not. The feature
//! vector is explicit and versioned so future extensions cannot silently
//! alias signatures minted under an older schema; store keys carry the
//! version as a scan prefix.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::facts::ConstructDescriptor;

/// Signature schema version. Bump whenever the feature vector changes.
pub const SIGNATURE_VERSION: u8 = 1;

/// Caps keep the feature space compact without merging meaningfully
/// different shapes.
const BRANCH_CAP: usize = 15;
const LOOP_CAP: usize = 7;

/// Opaque stable identity for a construct shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSignature(pub u64);

impl PatternSignature {
    /// Store key: `v{version}/{hash:016x}`. The `v1/` prefix scopes prefix
    /// scans to one schema version.
    pub fn store_key(&self) -> String {
        format!("v{}/{:016x}", SIGNATURE_VERSION, self.0)
    }

    /// Prefix selecting all keys of the current schema version.
    pub fn version_prefix() -> String {
        format!("v{}/", SIGNATURE_VERSION)
    }
}

impl fmt::Display for PatternSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.store_key())
    }
}

/// Derive the signature for one construct descriptor.
///
/// Feature vector v1: construct kind, argument-count bucket, capped branch
/// count, capped loop count, nesting bucket, documentation presence,
/// exception-handling presence. Identifiers and literals never enter the
/// encoding.
pub fn signature_of(desc: &ConstructDescriptor) -> PatternSignature {
    let features = [
        SIGNATURE_VERSION,
        desc.kind.tag(),
        arg_bucket(desc.arg_count),
        desc.branch_count.min(BRANCH_CAP) as u8,
        desc.loop_count.min(LOOP_CAP) as u8,
        nesting_bucket(desc.nesting_depth),
        desc.has_doc as u8,
        desc.has_handler as u8,
    ];
    PatternSignature(xxh3_64(&features))
}

fn arg_bucket(count: usize) -> u8 {
    match count {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        _ => 3,
    }
}

fn nesting_bucket(depth: usize) -> u8 {
    match depth {
        0 => 0,
        1 => 1,
        2 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ConstructKind, Span};

    fn descriptor() -> ConstructDescriptor {
        ConstructDescriptor {
            kind: ConstructKind::Function,
            name: "original_name".to_string(),
            span: Span::new(1, 20),
            arg_count: 2,
            branch_count: 3,
            loop_count: 1,
            bool_op_count: 2,
            nesting_depth: 2,
            has_doc: true,
            has_handler: false,
            handler_has_filter: false,
            handler_count: 0,
        }
    }

    #[test]
    fn renaming_does_not_change_signature() {
        let a = descriptor();
        let mut b = descriptor();
        b.name = "totally_different".to_string();
        b.span = Span::new(100, 119);

        assert_eq!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn branch_shape_changes_signature() {
        let a = descriptor();
        let mut b = descriptor();
        b.branch_count = 4;

        assert_ne!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn loop_and_nesting_shape_change_signature() {
        let a = descriptor();

        let mut b = descriptor();
        b.loop_count = 2;
        assert_ne!(signature_of(&a), signature_of(&b));

        let mut c = descriptor();
        c.nesting_depth = 1;
        assert_ne!(signature_of(&a), signature_of(&c));
    }

    #[test]
    fn arg_counts_within_a_bucket_collide() {
        let mut a = descriptor();
        a.arg_count = 3;
        let mut b = descriptor();
        b.arg_count = 4;

        assert_eq!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn store_key_is_version_prefixed() {
        let sig = signature_of(&descriptor());
        assert!(sig.store_key().starts_with("v1/"));
        assert_eq!(sig.store_key().len(), "v1/".len() + 16);
        assert!(sig.store_key().starts_with(&PatternSignature::version_prefix()));
    }
}
