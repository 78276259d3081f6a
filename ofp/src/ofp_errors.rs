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
use thiserror::Error;

/// An OpenFlow error code, as carried by an `OFPT_ERROR` message.  Only the
/// codes the agent actually inspects get their own variant; everything else
/// is `Other` with the wire `(type, code)` pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum OfpErr {
    #[error("OFPBRC_BAD_TYPE")]
    BadType,
    #[error("OFPBRC_BAD_LEN")]
    BadLen,
    #[error("OFPFMFC_TABLE_FULL")]
    TableFull,
    /// Another controller beat us to mapping the same tunnel option triple.
    #[error("NXTTMFC_ALREADY_MAPPED")]
    AlreadyMapped,
    /// Another controller raced us adding an identical TLV table entry.
    #[error("NXTTMFC_DUP_ENTRY")]
    DupEntry,
    /// The switch has no room left in its TLV option table.
    #[error("NXTTMFC_TABLE_FULL")]
    TlvTableFull,
    #[error("unknown ofperr ({0},{1})")]
    Other(u16, u16),
}
