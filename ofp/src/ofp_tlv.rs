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

//! Tunnel-metadata (TLV) option table messages.
//!
//! A switch maps `(class, type, length)` option triples onto a fixed set of
//! tunnel-metadata slots.  The mapping is shared by every controller on the
//! switch, so adding an entry can race with a peer.

/// The Geneve option triple the agent negotiates for itself.
pub const GENEVE_OPT_CLASS: u16 = 0x0102;
pub const GENEVE_OPT_TYPE: u8 = 0x80;
pub const GENEVE_OPT_LEN: u8 = 32;

/// Number of tunnel-metadata slots a switch provides.
pub const TUN_METADATA_SLOTS: u16 = 64;

/// Match-field id of tunnel-metadata slot 0; slot `i` is
/// `MFF_TUN_METADATA0 + i`.  Field id 0 means "no option allocated".
pub const MFF_TUN_METADATA0: u32 = 33;

pub fn mff_tun_metadata(index: u16) -> u32 {
    MFF_TUN_METADATA0 + u32::from(index)
}

/// One entry of a switch's TLV option table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TlvMap {
    pub option_class: u16,
    pub option_type: u8,
    pub option_len: u8,
    pub index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TlvTableReply {
    pub mappings: Vec<TlvMap>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TlvTableModCommand {
    Add,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlvTableMod {
    pub command: TlvTableModCommand,
    pub mappings: Vec<TlvMap>,
}
