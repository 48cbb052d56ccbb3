use std::collections::BTreeSet;

use tessel_graph::ops::Labels;

/// `columns` minus the key labels; all of `columns` when no key is given.
pub fn exclude_columns(columns: &[String], keys: Option<&Labels>) -> BTreeSet<String> {
    let keys = keys.map_or(&[][..], Labels::as_slice);
    columns
        .iter()
        .filter(|c| !keys.contains(c))
        .cloned()
        .collect()
}
