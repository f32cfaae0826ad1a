//! Peripheral directory.
//!
//! Deduplicated registry of discovered accessories built from the raw
//! advertisement stream. Advertisements repeat many times per second, so
//! [`PeripheralDirectory::observe`] reports whether anything actually changed
//! and callers only re-render on `true`.
//!
//! # Invariants
//!
//! - Identifiers are unique.
//! - [`PeripheralDirectory::ranked`] is non-increasing in signal strength, ties
//!   kept in discovery order.

use std::collections::HashMap;

use crate::{
    peripheral::{Advertisement, PeripheralId, PeripheralRecord},
    protocol::{ACCESSORY_NAME_TAG, PLACEHOLDER_NAME},
};

/// RSSI-ranked registry of discovered accessories.
#[derive(Debug, Clone)]
pub struct PeripheralDirectory {
    /// Required substring of accessory names.
    name_tag: String,
    /// Name the platform substitutes for nameless peripherals.
    placeholder: String,
    /// Records in discovery order.
    records: Vec<PeripheralRecord>,
    /// Identifier to position in `records`.
    index: HashMap<PeripheralId, usize>,
    /// Records sorted by descending RSSI (stable over discovery order).
    ranked: Vec<PeripheralRecord>,
}

impl Default for PeripheralDirectory {
    fn default() -> Self {
        Self::new(ACCESSORY_NAME_TAG, PLACEHOLDER_NAME)
    }
}

impl PeripheralDirectory {
    /// Create an empty directory accepting names that contain `name_tag`.
    pub fn new(name_tag: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            name_tag: name_tag.into(),
            placeholder: placeholder.into(),
            records: Vec::new(),
            index: HashMap::new(),
            ranked: Vec::new(),
        }
    }

    /// Fold one advertisement into the directory.
    ///
    /// Returns `true` if a record was inserted or updated. Advertisements from
    /// non-accessories and nameless advertisements are dropped silently.
    pub fn observe(&mut self, advertisement: &Advertisement) -> bool {
        let name = advertisement.name.as_deref().unwrap_or(&self.placeholder);
        if !name.contains(self.name_tag.as_str()) {
            return false;
        }

        if let Some(&position) = self.index.get(&advertisement.id) {
            let record = &mut self.records[position];
            let rename = name != self.placeholder && record.display_name != name;
            let resignal = record.rssi != advertisement.rssi;
            if !rename && !resignal {
                return false;
            }
            if rename {
                record.display_name = name.to_owned();
            }
            if resignal {
                record.rssi = advertisement.rssi;
            }
        } else {
            tracing::debug!(id = %advertisement.id, display_name = name, rssi = advertisement.rssi, "discovered accessory");
            self.index.insert(advertisement.id.clone(), self.records.len());
            self.records.push(PeripheralRecord {
                id: advertisement.id.clone(),
                display_name: name.to_owned(),
                rssi: advertisement.rssi,
            });
        }

        self.rerank();
        true
    }

    /// Forget every record. Called when a new scan starts.
    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
        self.ranked.clear();
    }

    /// Records ordered strongest signal first.
    pub fn ranked(&self) -> &[PeripheralRecord] {
        &self.ranked
    }

    /// Look up a record by identifier.
    pub fn get(&self, id: &PeripheralId) -> Option<&PeripheralRecord> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    /// Number of distinct accessories seen since the last reset.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing has been discovered since the last reset.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn rerank(&mut self) {
        let mut ranked = self.records.clone();
        // `sort_by` is stable, so equal RSSI keeps discovery order.
        ranked.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        self.ranked = ranked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(id: &str, name: &str, rssi: i16) -> Advertisement {
        Advertisement::new(id, name, rssi)
    }

    #[test]
    fn repeated_advertisement_is_noop() {
        let mut dir = PeripheralDirectory::default();
        assert!(dir.observe(&ad("A", "BluLok-1", -60)));
        assert!(!dir.observe(&ad("A", "BluLok-1", -60)));
        assert!(dir.observe(&ad("A", "BluLok-1", -55)));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.ranked()[0].rssi, -55);
    }

    #[test]
    fn foreign_and_nameless_advertisements_are_dropped() {
        let mut dir = PeripheralDirectory::default();
        assert!(!dir.observe(&ad("X", "Headphones", -40)));
        assert!(!dir.observe(&Advertisement { id: "Y".into(), name: None, rssi: -40 }));
        assert!(dir.is_empty());
    }

    #[test]
    fn rename_only_to_real_names() {
        let mut dir = PeripheralDirectory::new("BluLok", "Unknown BluLok");
        assert!(dir.observe(&ad("A", "BluLok-1", -60)));

        // Placeholder name passes the filter here but never replaces a real name
        assert!(!dir.observe(&Advertisement { id: "A".into(), name: None, rssi: -60 }));
        assert_eq!(dir.get(&"A".into()).map(|r| r.display_name.as_str()), Some("BluLok-1"));

        assert!(dir.observe(&ad("A", "BluLok-Door", -60)));
        assert_eq!(dir.get(&"A".into()).map(|r| r.display_name.as_str()), Some("BluLok-Door"));
    }

    #[test]
    fn ranking_is_strongest_first_and_stable() {
        let mut dir = PeripheralDirectory::default();
        dir.observe(&ad("A", "BluLok-A", -70));
        dir.observe(&ad("B", "BluLok-B", -50));
        dir.observe(&ad("C", "BluLok-C", -70));

        let order: Vec<_> = dir.ranked().iter().map(|r| r.id.as_str().to_owned()).collect();
        assert_eq!(order, ["B", "A", "C"]);

        dir.observe(&ad("C", "BluLok-C", -40));
        let order: Vec<_> = dir.ranked().iter().map(|r| r.id.as_str().to_owned()).collect();
        assert_eq!(order, ["C", "B", "A"]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut dir = PeripheralDirectory::default();
        dir.observe(&ad("A", "BluLok-A", -70));
        dir.reset();
        assert!(dir.is_empty());
        assert!(dir.ranked().is_empty());
        assert!(dir.get(&"A".into()).is_none());
        // Same advertisement is new again after reset
        assert!(dir.observe(&ad("A", "BluLok-A", -70)));
    }
}
