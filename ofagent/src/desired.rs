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

//! The desired flow table, computed incrementally by the logical-state
//! translation layer.
//!
//! Source records and desired flows relate M to N: several records can want
//! the same flow, and one record usually produces many flows.  The table
//! keeps both directions indexed so bulk removal by record never scans the
//! flow set.  A desired flow whose last source reference goes away ceases
//! to exist.

use crate::flow::{Flow, FlowKey};
use crate::installed::InstalledFlowTable;
use crate::rl::RateLimit;

use multimap::MultiMap;
use ofp::ofp_flow::{Match, Ofpacts};
use tracing::debug;
use uuid::Uuid;

use std::collections::{HashMap, HashSet};

/// Handle of a desired flow.  Handles are never reused within a table's
/// lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DesiredId(pub(crate) u32);

#[derive(Clone, Debug)]
pub struct DesiredFlow {
    flow: Flow,
    /// The records that want this flow present.  Never empty.
    sources: HashSet<Uuid>,
    /// Key of the installed flow this one is linked to, if any.
    installed: Option<FlowKey>,
}

impl DesiredFlow {
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn sources(&self) -> &HashSet<Uuid> {
        &self.sources
    }

    pub fn installed_key(&self) -> Option<&FlowKey> {
        self.installed.as_ref()
    }
}

pub struct DesiredFlowTable {
    flows: HashMap<DesiredId, DesiredFlow>,
    by_key: MultiMap<FlowKey, DesiredId>,
    by_source: HashMap<Uuid, HashSet<DesiredId>>,
    next_id: u32,
    dup_rl: RateLimit,
}

impl Default for DesiredFlowTable {
    fn default() -> DesiredFlowTable {
        DesiredFlowTable::new()
    }
}

impl DesiredFlowTable {
    pub fn new() -> DesiredFlowTable {
        DesiredFlowTable {
            flows: HashMap::new(),
            by_key: MultiMap::new(),
            by_source: HashMap::new(),
            next_id: 0,
            dup_rl: RateLimit::new(5, 5),
        }
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn get(&self, id: DesiredId) -> Option<&DesiredFlow> {
        self.flows.get(&id)
    }

    /// First desired flow with this exact key, disregarding sources.
    pub fn lookup_by_key(&self, key: &FlowKey) -> Option<DesiredId> {
        self.by_key.get_vec(key).and_then(|ids| ids.first().copied())
    }

    /// Desired flow with this exact key that is referenced by `sb_uuid`.
    pub fn lookup(&self, key: &FlowKey, sb_uuid: &Uuid) -> Option<DesiredId> {
        let ids = self.by_key.get_vec(key)?;
        ids.iter()
            .copied()
            .find(|id| self.flows[id].sources.contains(sb_uuid))
    }

    pub fn ids(&self) -> Vec<DesiredId> {
        self.flows.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DesiredId, &DesiredFlow)> {
        self.flows.iter().map(|(&id, flow)| (id, flow))
    }

    /// Adds a flow wanted by `sb_uuid`.  An identical flow already
    /// referenced by the same record is dropped (records recompute their
    /// flows wholesale, so this is routine); the same key wanted by a
    /// different record becomes a separate desired flow and the
    /// reconciliation engine picks which value gets installed.
    ///
    /// Nothing reaches the switch until the next `put`.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        table_id: u8,
        priority: u16,
        cookie: u64,
        match_: Match,
        ofpacts: Ofpacts,
        sb_uuid: Uuid,
        log_duplicate: bool,
    ) {
        let flow = Flow { table_id, priority, match_, ofpacts, cookie };
        let key = flow.key();
        if self.lookup(&key, &sb_uuid).is_some() {
            if log_duplicate && !self.dup_rl.should_drop() {
                debug!("dropping duplicate flow: {flow}");
            }
            return;
        }
        let id = self.insert(flow);
        self.link_source(id, sb_uuid);
        debug!("add flow: {}", self.flows[&id].flow);
    }

    /// Adds a flow, or appends its actions onto an existing flow with the
    /// same key.  Either way `sb_uuid` gains a reference to the surviving
    /// flow.  When several desired flows share the key, the append target
    /// is the first one the key index yields.
    pub fn add_or_append(
        &mut self,
        table_id: u8,
        priority: u16,
        cookie: u64,
        match_: Match,
        ofpacts: Ofpacts,
        sb_uuid: Uuid,
    ) {
        let flow = Flow { table_id, priority, match_, ofpacts, cookie };
        let key = flow.key();
        match self.lookup_by_key(&key) {
            Some(id) => {
                let existing = self
                    .flows
                    .get_mut(&id)
                    .expect("key index references a live flow");
                existing.flow.ofpacts.append(&flow.ofpacts);
                self.link_source(id, sb_uuid);
                debug!("append flow: {}", self.flows[&id].flow);
            }
            None => {
                let id = self.insert(flow);
                self.link_source(id, sb_uuid);
                debug!("add flow: {}", self.flows[&id].flow);
            }
        }
    }

    /// Drops every reference `sb_uuid` holds; flows left with no references
    /// are unlinked from the installed table and destroyed.
    pub fn remove_by_source(&mut self, installed: &mut InstalledFlowTable, sb_uuid: &Uuid) {
        let Some(ids) = self.by_source.remove(sb_uuid) else {
            return;
        };
        for id in ids {
            let now_empty = match self.flows.get_mut(&id) {
                Some(flow) => {
                    flow.sources.remove(sb_uuid);
                    flow.sources.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.destroy(id, installed, "remove flow");
            }
        }
    }

    /// Transitively removes every flow reachable from `seeds` through
    /// shared source records, and returns all records visited so the caller
    /// can clean their extension-table entries too.
    ///
    /// A flow some seed references is destroyed even when other records
    /// still reference it; those records join the worklist, taking the rest
    /// of their flows with them.
    pub fn flood_remove(
        &mut self,
        installed: &mut InstalledFlowTable,
        seeds: HashSet<Uuid>,
    ) -> HashSet<Uuid> {
        let mut seen = seeds.clone();
        let mut worklist: Vec<Uuid> = seeds.into_iter().collect();
        while let Some(sb_uuid) = worklist.pop() {
            let Some(ids) = self.by_source.remove(&sb_uuid) else {
                continue;
            };
            for id in ids {
                let Some(flow) = self.flows.get_mut(&id) else {
                    continue;
                };
                flow.sources.remove(&sb_uuid);
                let others: Vec<Uuid> = flow.sources.drain().collect();
                for other in others {
                    if seen.insert(other) {
                        worklist.push(other);
                    }
                    if let Some(other_ids) = self.by_source.get_mut(&other) {
                        other_ids.remove(&id);
                        if other_ids.is_empty() {
                            self.by_source.remove(&other);
                        }
                    }
                }
                self.destroy(id, installed, "flood remove");
            }
        }
        seen
    }

    /// Removes every flow, as if each source record were removed in turn.
    pub fn clear(&mut self, installed: &mut InstalledFlowTable) {
        let sources: Vec<Uuid> = self.by_source.keys().copied().collect();
        for sb_uuid in sources {
            self.remove_by_source(installed, &sb_uuid);
        }
    }

    pub(crate) fn set_installed(&mut self, id: DesiredId, key: Option<FlowKey>) {
        if let Some(flow) = self.flows.get_mut(&id) {
            flow.installed = key;
        }
    }

    fn insert(&mut self, flow: Flow) -> DesiredId {
        let id = DesiredId(self.next_id);
        self.next_id += 1;
        self.by_key.insert(flow.key(), id);
        self.flows.insert(id, DesiredFlow { flow, sources: HashSet::new(), installed: None });
        id
    }

    fn link_source(&mut self, id: DesiredId, sb_uuid: Uuid) {
        if let Some(flow) = self.flows.get_mut(&id) {
            flow.sources.insert(sb_uuid);
        }
        self.by_source.entry(sb_uuid).or_default().insert(id);
    }

    fn destroy(&mut self, id: DesiredId, installed: &mut InstalledFlowTable, what: &str) {
        let Some(flow) = self.flows.remove(&id) else {
            return;
        };
        debug!("{what}: {}", flow.flow);
        let key = flow.flow.key();
        if let Some(ids) = self.by_key.get_vec_mut(&key) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_key.remove(&key);
            }
        }
        if let Some(installed_key) = flow.installed {
            installed.unlink_ref(&installed_key, id);
        }
    }
}
