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
use crate::ofp_errors::OfpErr;
use crate::ofp_flow::FlowMod;
use crate::ofp_group::GroupMod;
use crate::ofp_meter::MeterMod;
use crate::ofp_packet::PacketOut;
use crate::ofp_tlv::{TlvTableMod, TlvTableReply};

/// Message classification, as produced by decoding a message header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OfpType {
    EchoRequest,
    EchoReply,
    Error,
    BarrierRequest,
    BarrierReply,
    TlvTableRequest,
    TlvTableReply,
    TlvTableMod,
    FlowMod,
    GroupMod,
    MeterMod,
    CtFlushZone,
    PacketOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfpBody {
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    Error(OfpErr),
    BarrierRequest,
    BarrierReply,
    TlvTableRequest,
    TlvTableReply(TlvTableReply),
    TlvTableMod(TlvTableMod),
    FlowMod(FlowMod),
    GroupMod(GroupMod),
    MeterMod(MeterMod),
    CtFlushZone { zone: u16 },
    PacketOut(PacketOut),
}

/// A decoded OpenFlow message: header fields the agent cares about plus the
/// typed body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfpMsg {
    pub version: u8,
    pub xid: u32,
    pub body: OfpBody,
}

impl OfpMsg {
    /// The `decode_type` dispatch: classifies a message without looking at
    /// its payload.
    pub fn ofptype(&self) -> OfpType {
        match self.body {
            OfpBody::EchoRequest(_) => OfpType::EchoRequest,
            OfpBody::EchoReply(_) => OfpType::EchoReply,
            OfpBody::Error(_) => OfpType::Error,
            OfpBody::BarrierRequest => OfpType::BarrierRequest,
            OfpBody::BarrierReply => OfpType::BarrierReply,
            OfpBody::TlvTableRequest => OfpType::TlvTableRequest,
            OfpBody::TlvTableReply(_) => OfpType::TlvTableReply,
            OfpBody::TlvTableMod(_) => OfpType::TlvTableMod,
            OfpBody::FlowMod(_) => OfpType::FlowMod,
            OfpBody::GroupMod(_) => OfpType::GroupMod,
            OfpBody::MeterMod(_) => OfpType::MeterMod,
            OfpBody::CtFlushZone { .. } => OfpType::CtFlushZone,
            OfpBody::PacketOut(_) => OfpType::PacketOut,
        }
    }
}

/// Allocates transaction ids for outgoing messages.  The starting point is
/// randomized so xids from different connections don't collide in logs; 0 is
/// skipped because the agent uses it as "no xid yet".
pub struct XidAllocator {
    next: u32,
}

impl XidAllocator {
    pub fn new() -> XidAllocator {
        XidAllocator { next: rand::random() }
    }

    pub fn next_xid(&mut self) -> u32 {
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.next = 1;
        }
        self.next
    }
}

impl Default for XidAllocator {
    fn default() -> XidAllocator {
        XidAllocator::new()
    }
}
