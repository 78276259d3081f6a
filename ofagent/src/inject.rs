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

//! Packet injection support: the expression-parser seam and the mapping
//! from logical ingress ports to physical OpenFlow ports.

use crate::BridgeRec;

use anyhow::Result;
use ofp::ofp_flow::OFPP_MAX;
use ofp::ofp_packet::Microflow;

use std::collections::HashMap;

/// Register that carries the logical ingress port in a parsed microflow.
pub const LOG_INPORT_REG: usize = 14;

/// Parses a human-readable microflow expression into a [`Microflow`].
///
/// Expression parsing lives outside the agent; implementations resolve
/// logical port names through `lookup_port` and deposit the physical port
/// in register [`LOG_INPORT_REG`].
pub trait MicroflowParser {
    fn parse(
        &self,
        flow_s: &str,
        addr_sets: &HashMap<String, Vec<String>>,
        port_groups: &HashMap<String, Vec<String>>,
        lookup_port: &dyn Fn(&str) -> Option<u16>,
    ) -> Result<Microflow>;
}

/// Looks up the interface bound to logical port `port_name` on `br_int` and
/// returns its OpenFlow port number, if it has a usable one.
pub fn lookup_port(br_int: &BridgeRec, port_name: &str) -> Option<u16> {
    for port in &br_int.ports {
        for iface in &port.interfaces {
            if iface.external_ids.get("iface-id").map(String::as_str) != Some(port_name) {
                continue;
            }
            let Some(&ofport) = iface.ofport.first() else {
                continue;
            };
            if ofport < 1 || ofport > i64::from(OFPP_MAX) {
                continue;
            }
            return Some(ofport as u16);
        }
    }
    None
}
