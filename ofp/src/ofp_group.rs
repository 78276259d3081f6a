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
use crate::ofp_flow::SpecParseError;

pub const OFPG_ALL: u32 = 0xffffffff;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupModCommand {
    Add,
    Delete,
}

/// A decoded group table modification message.  The group body (type and
/// buckets) stays in its canonical textual form; the agent never looks
/// inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMod {
    pub command: GroupModCommand,
    pub group_id: u32,
    pub props: String,
}

impl GroupMod {
    /// Parses a group specification of the form `group_id=N[,type=...,bucket=...]`.
    /// An `Add` must carry a group type; a `Delete` may name just the id.
    pub fn parse(s: &str, command: GroupModCommand) -> Result<GroupMod, SpecParseError> {
        let s = s.trim();
        let (id_part, props) = match s.split_once(',') {
            Some((id_part, props)) => (id_part, props.to_string()),
            None => (s, String::new()),
        };
        let group_id = id_part
            .strip_prefix("group_id=")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .ok_or_else(|| SpecParseError(format!("bad group_id in \"{s}\"")))?;
        if command == GroupModCommand::Add && !props.contains("type=") {
            return Err(SpecParseError(format!("group \"{s}\" has no type")));
        }
        Ok(GroupMod { command, group_id, props })
    }

    /// The group-mod that deletes every group.
    pub fn delete_all() -> GroupMod {
        GroupMod {
            command: GroupModCommand::Delete,
            group_id: OFPG_ALL,
            props: String::new(),
        }
    }
}
