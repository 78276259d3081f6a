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
use crate::ofp_flow::Ofpacts;

pub const FLOW_N_REGS: usize = 16;

/// A fully specified single packet's worth of header fields, as produced by
/// an expression parser.  Registers carry logical metadata; the concrete
/// header fields are the subset packet composition needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Microflow {
    pub regs: [u32; FLOW_N_REGS],
    pub in_port: u16,
    pub eth_src: [u8; 6],
    pub eth_dst: [u8; 6],
    pub eth_type: u16,
}

impl Default for Microflow {
    fn default() -> Microflow {
        Microflow {
            regs: [0; FLOW_N_REGS],
            in_port: 0,
            eth_src: [0; 6],
            eth_dst: [0; 6],
            eth_type: 0,
        }
    }
}

impl Microflow {
    /// Composes a minimal packet matching this flow, zero padded to `len`
    /// bytes.
    pub fn compose(&self, len: usize) -> Vec<u8> {
        let mut packet = Vec::with_capacity(len);
        packet.extend_from_slice(&self.eth_dst);
        packet.extend_from_slice(&self.eth_src);
        packet.extend_from_slice(&self.eth_type.to_be_bytes());
        packet.resize(len.max(packet.len()), 0);
        packet
    }
}

/// A decoded packet-out message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub packet: Vec<u8>,
    pub in_port: u16,
    pub ofpacts: Ofpacts,
}
