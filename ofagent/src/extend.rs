/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
 */

//! Extension tables: the small per-switch tables (groups and meters) whose
//! entries flows reference by allocated id.
//!
//! An extension table keeps the set of entries the translation layer wants
//! (`desired`) next to the set believed present on the switch (`existing`).
//! The reconciliation engine installs the difference and then syncs.

use tracing::debug;
use uuid::Uuid;

use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct ExtendEntry {
    pub name: String,
    pub table_id: u32,
    sources: HashSet<Uuid>,
}

pub struct ExtendTable {
    desired: HashMap<String, ExtendEntry>,
    existing: HashMap<String, u32>,
    next_id: u32,
}

impl Default for ExtendTable {
    fn default() -> ExtendTable {
        ExtendTable::new()
    }
}

impl ExtendTable {
    pub fn new() -> ExtendTable {
        // Id 0 is reserved on the switch.
        ExtendTable { desired: HashMap::new(), existing: HashMap::new(), next_id: 1 }
    }

    /// Records that `sb_uuid` wants `name` present, allocating an id on
    /// first sight.  A name still installed from an earlier run keeps its
    /// id, so action blobs composed against it stay valid.  Returns the id.
    pub fn add_desired(&mut self, sb_uuid: Uuid, name: &str) -> u32 {
        if let Some(entry) = self.desired.get_mut(name) {
            entry.sources.insert(sb_uuid);
            return entry.table_id;
        }
        let table_id = match self.existing.get(name) {
            Some(&id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        debug!("desired extension entry {name} as id {table_id}");
        self.desired.insert(
            name.to_string(),
            ExtendEntry {
                name: name.to_string(),
                table_id,
                sources: HashSet::from([sb_uuid]),
            },
        );
        table_id
    }

    /// Drops every desired reference `sb_uuid` holds; entries left with no
    /// references are no longer desired.
    pub fn remove_desired(&mut self, sb_uuid: &Uuid) {
        self.desired.retain(|name, entry| {
            entry.sources.remove(sb_uuid);
            if entry.sources.is_empty() {
                debug!("dropping desired extension entry {name}");
                false
            } else {
                true
            }
        });
    }

    /// Desired entries not yet on the switch.
    pub fn uninstalled(&self) -> impl Iterator<Item = &ExtendEntry> {
        self.desired
            .values()
            .filter(|entry| !self.existing.contains_key(&entry.name))
    }

    /// Entries on the switch that are no longer desired.
    pub fn stale(&self) -> impl Iterator<Item = (&str, u32)> {
        self.existing
            .iter()
            .filter(|(name, _)| !self.desired.contains_key(*name))
            .map(|(name, &id)| (name.as_str(), id))
    }

    pub fn remove_existing(&mut self, name: &str) {
        self.existing.remove(name);
    }

    /// Declares the switch up to date: everything desired now exists.
    pub fn sync(&mut self) {
        self.existing = self
            .desired
            .values()
            .map(|entry| (entry.name.clone(), entry.table_id))
            .collect();
    }

    /// Forgets what the switch had, after the switch itself was cleared.
    pub fn clear_existing(&mut self) {
        self.existing.clear();
    }

    pub fn desired_len(&self) -> usize {
        self.desired.len()
    }

    pub fn existing_len(&self) -> usize {
        self.existing.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_desired_is_idempotent_by_name() {
        let mut t = ExtendTable::new();
        let (sb1, sb2) = (Uuid::new_v4(), Uuid::new_v4());
        let id = t.add_desired(sb1, "group-a");
        assert_eq!(t.add_desired(sb2, "group-a"), id);
        assert_eq!(t.desired_len(), 1);
        assert_ne!(t.add_desired(sb1, "group-b"), id);
    }

    #[test]
    fn removal_by_source_respects_other_references() {
        let mut t = ExtendTable::new();
        let (sb1, sb2) = (Uuid::new_v4(), Uuid::new_v4());
        t.add_desired(sb1, "shared");
        t.add_desired(sb2, "shared");
        t.add_desired(sb1, "only-sb1");

        t.remove_desired(&sb1);
        assert_eq!(t.desired_len(), 1);
        t.remove_desired(&sb2);
        assert_eq!(t.desired_len(), 0);
    }

    #[test]
    fn sync_and_stale() {
        let mut t = ExtendTable::new();
        let sb = Uuid::new_v4();
        t.add_desired(sb, "a");
        t.add_desired(sb, "b");
        assert_eq!(t.uninstalled().count(), 2);

        t.sync();
        assert_eq!(t.uninstalled().count(), 0);
        assert_eq!(t.stale().count(), 0);

        t.remove_desired(&sb);
        let stale: Vec<_> = t.stale().map(|(name, _)| name.to_string()).collect();
        assert_eq!(stale.len(), 2);
    }

    #[test]
    fn installed_names_keep_their_id() {
        let mut t = ExtendTable::new();
        let sb = Uuid::new_v4();
        let id = t.add_desired(sb, "a");
        t.sync();
        t.remove_desired(&sb);
        // Re-desired while still installed: same id.
        assert_eq!(t.add_desired(sb, "a"), id);
    }
}
