//! Read-only queries over a loaded collection.
use crate::record::{IdentityKey, Record};
use std::collections::BTreeSet;

/// Record whose identity key matches `name`.
pub fn find_by_name<'a>(records: &'a [Record], name: &str) -> Option<&'a Record> {
    let key = IdentityKey::from_name(name)?;
    records
        .iter()
        .find(|record| record.identity_key().as_ref() == Some(&key))
}

/// Records listing `category` exactly.
pub fn by_category<'a>(records: &'a [Record], category: &str) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| record.categories.iter().any(|c| c == category))
        .collect()
}

/// Records whose organization matches, ignoring case.
pub fn by_organization<'a>(records: &'a [Record], organization: &str) -> Vec<&'a Record> {
    let wanted = organization.trim().to_lowercase();
    records
        .iter()
        .filter(|record| record.organization.trim().to_lowercase() == wanted)
        .collect()
}

/// Every category across the collection, sorted and distinct.
pub fn all_categories(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| record.categories.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
