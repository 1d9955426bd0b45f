//! Output file stems.
//!
//! A stem is the capability name unless another capability in the same output
//! directory claims it: then `category__name`, and `kind__category__name` if the
//! category does not separate them either. Names that only sanitize to the same
//! text get a numeric suffix in set order (`review-pr`, `review-pr-2`).

use capforge_catalog::{CapabilityDocument, CapabilityKey};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) const STEM_SEPARATOR: &str = "__";

/// Replace anything that is not safe in a single path component.
pub(crate) fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '-' })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() { "unnamed".to_string() } else { cleaned.to_string() }
}

/// Assign a unique stem to every document. `reserved` stems are never handed out plainly.
pub(crate) fn assign_stems<'a>(
    documents: impl IntoIterator<Item = &'a CapabilityDocument>, reserved: &[&str],
) -> BTreeMap<CapabilityKey, String> {
    let documents: Vec<&CapabilityDocument> = documents.into_iter().collect();

    let mut claims: BTreeMap<String, usize> = reserved.iter().map(|r| (r.to_string(), 1)).collect();
    for doc in &documents {
        *claims.entry(sanitize(&doc.name)).or_default() += 1;
    }

    let mut qualified_claims: BTreeMap<String, usize> = BTreeMap::new();
    for doc in &documents {
        if claims[&sanitize(&doc.name)] > 1 {
            *qualified_claims.entry(qualified(doc)).or_default() += 1;
        }
    }

    let mut taken = BTreeSet::new();
    let mut stems = BTreeMap::new();
    for doc in documents {
        let plain = sanitize(&doc.name);
        let stem = if claims[&plain] == 1 {
            plain
        } else if qualified_claims[&qualified(doc)] == 1 {
            qualified(doc)
        } else {
            fully_qualified(doc)
        };

        let mut unique = stem.clone();
        let mut n = 2;
        while taken.contains(&unique) || reserved.contains(&unique.as_str()) {
            unique = format!("{stem}-{n}");
            n += 1;
        }
        if unique != stem {
            tracing::warn!(stem = %unique, name = %doc.name, "output stem collided after qualification, numbered");
        }
        taken.insert(unique.clone());
        stems.insert(doc.key(), unique);
    }
    stems
}

fn qualified(doc: &CapabilityDocument) -> String {
    format!("{}{STEM_SEPARATOR}{}", sanitize(&doc.category), sanitize(&doc.name))
}

fn fully_qualified(doc: &CapabilityDocument) -> String {
    format!("{}{STEM_SEPARATOR}{}", doc.kind.as_str(), qualified(doc))
}
