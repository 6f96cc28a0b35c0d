//! Fixed values for bundles the price table does not track.

/// Bundle id → (display name, value). Compiled in; never fetched at runtime.
const BUNDLE_VALUES: &[(&str, &str, u64)] = &[
    ("192", "Korblox Deathspeaker", 17_000),
    ("201", "Headless Horseman", 31_000),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BundleValue {
    pub name: &'static str,
    pub value: u64,
}

/// Immutable view over the compiled bundle value list.
#[derive(Clone, Copy, Debug)]
pub struct BundleValueTable {
    entries: &'static [(&'static str, &'static str, u64)],
}

impl BundleValueTable {
    pub const fn builtin() -> Self {
        Self {
            entries: BUNDLE_VALUES,
        }
    }

    pub fn get(&self, bundle_id: &str) -> Option<BundleValue> {
        self.entries
            .iter()
            .find(|(id, _, _)| *id == bundle_id)
            .map(|&(_, name, value)| BundleValue { name, value })
    }
}
