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

//! `ofagent` keeps the kernel-resident OpenFlow datapath of a single
//! hypervisor converged with a continuously recomputed desired state.
//!
//! External producers maintain a [`desired::DesiredFlowTable`] (and the
//! group/meter extension tables) incrementally; [`ofctrl::Ofctrl`] owns the
//! switch connection, mirrors what it believes is installed, and diffs the
//! two into minimal flow/group/meter modification batches, tracking which
//! upstream configuration generation the switch has fully materialized.

pub mod ct_zone;
pub mod desired;
pub mod extend;
pub mod flow;
pub mod inject;
pub mod installed;
pub mod meter_catalog;
pub mod ofctrl;
pub mod rl;

use std::collections::HashMap;

/// An interface row of the local switch database, narrowed to the columns
/// the agent reads.
#[derive(Clone, Debug, Default)]
pub struct InterfaceRec {
    pub external_ids: HashMap<String, String>,
    /// The assigned OpenFlow port, if any.  Modeled as a set of at most one
    /// element, the way the database exposes it.
    pub ofport: Vec<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct PortRec {
    pub interfaces: Vec<InterfaceRec>,
}

/// The integration bridge the agent manages.
#[derive(Clone, Debug, Default)]
pub struct BridgeRec {
    pub name: String,
    pub ports: Vec<PortRec>,
}
