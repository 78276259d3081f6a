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

//! The reliable, reconnecting OpenFlow connection seam.
//!
//! The agent drives a switch through the [`Rconn`] trait and never learns
//! what carries the bytes.  An implementation owns reconnection, version
//! negotiation, and the liveness probe; the agent observes reconnects only
//! through [`Rconn::connection_seqno`].

use crate::ofp_msgs::OfpMsg;
use crate::ofp_protocol::{Version, Versions};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

/// A reliable connection to an OpenFlow switch.
pub trait Rconn {
    /// (Re)targets the connection.  Connecting is asynchronous; poll
    /// [`Rconn::connected`] after [`Rconn::run`].
    fn connect(&mut self, target: &str);

    /// Performs periodic connection maintenance.
    fn run(&mut self);

    /// Registers a wake-up for connection maintenance with the poll loop.
    fn run_wait(&mut self) {}

    /// Returns a received message, if one is queued.
    fn recv(&mut self) -> Option<OfpMsg>;

    /// Registers a wake-up for message reception with the poll loop.
    fn recv_wait(&mut self) {}

    /// Queues `msg` for transmission.  Queued messages count toward
    /// [`Rconn::tx_in_flight`] until the connection actually writes them
    /// out.
    fn send(&mut self, msg: OfpMsg) -> io::Result<()>;

    fn connected(&self) -> bool;

    /// The negotiated OpenFlow version, once the handshake has completed.
    fn version(&self) -> Option<Version>;

    /// Increments every time the connection is (re)established.
    fn connection_seqno(&self) -> u32;

    /// Number of queued messages not yet written to the switch.
    fn tx_in_flight(&self) -> usize;

    fn target(&self) -> String;

    fn set_probe_interval(&mut self, probe_interval: i32);
}

struct RamShared {
    target: String,
    connected: bool,
    version: Option<Version>,
    seqno: u32,
    probe_interval: i32,
    allowed: Versions,
    to_switch: VecDeque<OfpMsg>,
    to_controller: VecDeque<OfpMsg>,
}

/// An in-memory [`Rconn`] joined to a [`SwitchHandle`] peer.
///
/// Nothing reconnects by itself: the peer decides when the "switch" is up,
/// which version it speaks, and when queued messages are considered written
/// out.  That makes the connection's life cycle fully scriptable, which is
/// what the agent's tests need.
pub struct RamRconn(Rc<RefCell<RamShared>>);

/// The switch-side endpoint of a [`RamRconn`].
pub struct SwitchHandle(Rc<RefCell<RamShared>>);

impl RamRconn {
    pub fn new(allowed: Versions) -> (RamRconn, SwitchHandle) {
        let shared = Rc::new(RefCell::new(RamShared {
            target: String::new(),
            connected: false,
            version: None,
            seqno: 0,
            probe_interval: 0,
            allowed,
            to_switch: VecDeque::new(),
            to_controller: VecDeque::new(),
        }));
        (RamRconn(shared.clone()), SwitchHandle(shared))
    }
}

impl Rconn for RamRconn {
    fn connect(&mut self, target: &str) {
        self.0.borrow_mut().target = target.to_string();
    }

    fn run(&mut self) {}

    fn recv(&mut self) -> Option<OfpMsg> {
        self.0.borrow_mut().to_controller.pop_front()
    }

    fn send(&mut self, msg: OfpMsg) -> io::Result<()> {
        let mut shared = self.0.borrow_mut();
        if !shared.connected {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        shared.to_switch.push_back(msg);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.0.borrow().connected
    }

    fn version(&self) -> Option<Version> {
        self.0.borrow().version
    }

    fn connection_seqno(&self) -> u32 {
        self.0.borrow().seqno
    }

    fn tx_in_flight(&self) -> usize {
        self.0.borrow().to_switch.len()
    }

    fn target(&self) -> String {
        self.0.borrow().target.clone()
    }

    fn set_probe_interval(&mut self, probe_interval: i32) {
        self.0.borrow_mut().probe_interval = probe_interval;
    }
}

impl SwitchHandle {
    /// Completes a (re)connection at `version`.  Pending traffic from the
    /// previous connection is gone.
    ///
    /// # Panics
    ///
    /// Panics if `version` is not in the connection's allowed version set.
    pub fn bring_up(&self, version: Version) {
        let mut shared = self.0.borrow_mut();
        assert!(shared.allowed.contains(version.into()), "version not negotiable");
        shared.connected = true;
        shared.version = Some(version);
        shared.seqno += 1;
        shared.to_switch.clear();
        shared.to_controller.clear();
    }

    pub fn take_down(&self) {
        let mut shared = self.0.borrow_mut();
        shared.connected = false;
        shared.version = None;
        shared.to_switch.clear();
        shared.to_controller.clear();
    }

    /// Drains every message the controller has queued, marking them written
    /// out.
    pub fn drain(&self) -> Vec<OfpMsg> {
        self.0.borrow_mut().to_switch.drain(..).collect()
    }

    /// Queues a message for the controller to receive.
    pub fn send(&self, msg: OfpMsg) {
        self.0.borrow_mut().to_controller.push_back(msg);
    }
}
