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
use bitflags::bitflags;

/// An OpenFlow protocol version, with the wire value as discriminant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Version {
    Ofp10 = 0x01,
    Ofp11 = 0x02,
    Ofp12 = 0x03,
    Ofp13 = 0x04,
    Ofp14 = 0x05,
    Ofp15 = 0x06,
}

bitflags! {
    pub struct Versions: u32 {
        const OFP10 = 1 << 0x01;
        const OFP11 = 1 << 0x02;
        const OFP12 = 1 << 0x03;
        const OFP13 = 1 << 0x04;
        const OFP14 = 1 << 0x05;
        const OFP15 = 1 << 0x06;

        /* Bitmaps of OpenFlow versions that the connection layer supports,
         * and that it enables by default.  Versions with experimental or
         * incomplete support should be omitted from the latter bitmap. */
        const SUPPORTED = (Self::OFP10.bits |
                           Self::OFP11.bits |
                           Self::OFP12.bits |
                           Self::OFP13.bits |
                           Self::OFP14.bits |
                           Self::OFP15.bits);
        const DEFAULT = Self::SUPPORTED.bits;
    }
}

impl From<Version> for Versions {
    fn from(v: Version) -> Versions {
        Versions { bits: 1 << (v as u32) }
    }
}
