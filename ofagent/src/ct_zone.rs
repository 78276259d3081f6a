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

//! Pending conntrack-zone flushes.
//!
//! The zone tracker itself lives outside the agent; the agent only advances
//! each pending entry's little state machine: a `Queued` flush is sent
//! during `put` and becomes `Sent` tagged with the batch's barrier xid;
//! when that barrier is acknowledged the entry becomes `DbQueued` for the
//! tracker to commit.  A reconnect demotes `Sent` entries back to `Queued`
//! so the flush is reissued.

use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CtZoneState {
    Queued,
    /// Flush sent; `of_xid` is 0 until the batch's trailing barrier is
    /// allocated, then carries the barrier's xid.
    Sent { of_xid: u32 },
    DbQueued,
}

#[derive(Clone, Debug)]
pub struct CtZonePending {
    pub zone: u16,
    pub state: CtZoneState,
}

/// Pending entries keyed by zone name, owned by the external tracker and
/// lent to the agent each iteration.
pub type CtZoneMap = HashMap<String, CtZonePending>;
