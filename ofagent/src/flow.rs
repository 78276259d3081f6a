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
use ofp::ofp_flow::{Match, Ofpacts};

use std::fmt;
use std::hash::{Hash, Hasher};

/// A flow entry: the `(table, priority, match)` key plus the action blob and
/// cookie that go with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow {
    pub table_id: u8,
    pub priority: u16,
    pub match_: Match,
    pub ofpacts: Ofpacts,
    pub cookie: u64,
}

impl Flow {
    pub fn key(&self) -> FlowKey {
        FlowKey {
            table_id: self.table_id,
            priority: self.priority,
            match_: self.match_.clone(),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "cookie={:#x}, table_id={}, priority={}, {}, actions={}",
            self.cookie, self.table_id, self.priority, self.match_, self.ofpacts
        )
    }
}

/// The part of a flow that identifies it in a table.  Two keys are equal iff
/// table id, priority, and match are all equal; hashing goes through the
/// canonical 32-bit key hash so every table indexes flows identically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowKey {
    pub table_id: u8,
    pub priority: u16,
    pub match_: Match,
}

impl FlowKey {
    pub fn hash32(&self) -> u32 {
        hash_2words(
            (u32::from(self.table_id) << 16) | u32::from(self.priority),
            self.match_.hash32(),
        )
    }
}

impl Hash for FlowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash32());
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "table_id={}, priority={}, {}", self.table_id, self.priority, self.match_)
    }
}

/// Combines two words into a well-mixed 32-bit hash.
pub fn hash_2words(a: u32, b: u32) -> u32 {
    fmix32(hash_add(hash_add(0, a), b))
}

fn hash_add(hash: u32, word: u32) -> u32 {
    let word = word.wrapping_mul(0xcc9e_2d51).rotate_left(15).wrapping_mul(0x1b87_3593);
    (hash ^ word).rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64)
}

fn fmix32(mut hash: u32) -> u32 {
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^ (hash >> 16)
}
