//! The external meter catalog: named meter definitions produced by the
//! upstream database and resolved during reconciliation.

use std::collections::HashMap;

/// A drop band of a cataloged meter.
#[derive(Clone, Debug, Default)]
pub struct MeterBandRec {
    pub rate: u32,
    pub burst_size: u32,
}

#[derive(Clone, Debug)]
pub struct MeterRec {
    pub name: String,
    /// `"pktps"` for packet-rate meters; anything else means kilobits.
    pub unit: String,
    pub bands: Vec<MeterBandRec>,
}

#[derive(Clone, Debug, Default)]
pub struct MeterCatalog {
    by_name: HashMap<String, MeterRec>,
}

impl MeterCatalog {
    pub fn new() -> MeterCatalog {
        MeterCatalog::default()
    }

    pub fn insert(&mut self, rec: MeterRec) {
        self.by_name.insert(rec.name.clone(), rec);
    }

    pub fn get(&self, name: &str) -> Option<&MeterRec> {
        self.by_name.get(name)
    }
}
