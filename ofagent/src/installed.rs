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

//! The flow table the agent believes is present on the switch.
//!
//! Installed flows are unique by key.  Each one tracks the desired flows
//! that cover its key; the "primary" is the single covering flow whose
//! value is actually installed.  New links go to the front of the covering
//! list, and the primary is recomputed from the front when it is unlinked.

use crate::desired::DesiredId;
use crate::flow::FlowKey;

use ofp::ofp_flow::Ofpacts;

use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct InstalledFlow {
    ofpacts: Ofpacts,
    cookie: u64,
    desired_refs: Vec<DesiredId>,
    primary: Option<DesiredId>,
}

impl InstalledFlow {
    pub fn ofpacts(&self) -> &Ofpacts {
        &self.ofpacts
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn desired_refs(&self) -> &[DesiredId] {
        &self.desired_refs
    }

    pub fn primary(&self) -> Option<DesiredId> {
        self.primary
    }
}

#[derive(Debug, Default)]
pub struct InstalledFlowTable {
    flows: HashMap<FlowKey, InstalledFlow>,
}

impl InstalledFlowTable {
    pub fn new() -> InstalledFlowTable {
        InstalledFlowTable::default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn lookup(&self, key: &FlowKey) -> Option<&InstalledFlow> {
        self.flows.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, &InstalledFlow)> {
        self.flows.iter()
    }

    pub(crate) fn keys(&self) -> Vec<FlowKey> {
        self.flows.keys().cloned().collect()
    }

    /// Mirrors a newly added switch entry.  The caller links covering
    /// desired flows afterwards.
    pub(crate) fn insert(&mut self, key: FlowKey, ofpacts: Ofpacts, cookie: u64) {
        self.flows.insert(
            key,
            InstalledFlow { ofpacts, cookie, desired_refs: Vec::new(), primary: None },
        );
    }

    /// Replaces the installed value after a modify was issued.
    pub(crate) fn update(&mut self, key: &FlowKey, ofpacts: Ofpacts, cookie: u64) {
        if let Some(flow) = self.flows.get_mut(key) {
            flow.ofpacts = ofpacts;
            flow.cookie = cookie;
        }
    }

    pub(crate) fn remove(&mut self, key: &FlowKey) {
        self.flows.remove(key);
    }

    /// Links `id` as a covering desired flow.  The first link becomes the
    /// primary; later links join the front of the covering list without
    /// displacing it.
    pub(crate) fn link_ref(&mut self, key: &FlowKey, id: DesiredId) {
        let Some(flow) = self.flows.get_mut(key) else {
            return;
        };
        if flow.desired_refs.contains(&id) {
            return;
        }
        if flow.desired_refs.is_empty() {
            flow.primary = Some(id);
        }
        flow.desired_refs.insert(0, id);
    }

    /// Drops one covering desired flow; a primary being unlinked passes the
    /// role to the front of the remaining list.
    pub(crate) fn unlink_ref(&mut self, key: &FlowKey, id: DesiredId) {
        let Some(flow) = self.flows.get_mut(key) else {
            return;
        };
        flow.desired_refs.retain(|&r| r != id);
        if flow.primary == Some(id) {
            flow.primary = flow.desired_refs.first().copied();
        }
    }

    /// Resets the covering list ahead of a relink pass, returning the
    /// former members so the caller can clear their back-pointers.
    pub(crate) fn unlink_all(&mut self, key: &FlowKey) -> Vec<DesiredId> {
        match self.flows.get_mut(key) {
            Some(flow) => {
                flow.primary = None;
                std::mem::take(&mut flow.desired_refs)
            }
            None => Vec::new(),
        }
    }

    /// Empties the table, returning every `(key, former covering flows)`
    /// pair so the caller can clear back-pointers.
    pub(crate) fn clear(&mut self) -> Vec<(FlowKey, Vec<DesiredId>)> {
        self.flows
            .drain()
            .map(|(key, flow)| (key, flow.desired_refs))
            .collect()
    }
}
