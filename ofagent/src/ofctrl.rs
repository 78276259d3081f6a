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

//! The controller context: connection state machine, reconciliation engine,
//! and configuration-generation tracking.
//!
//! A fresh connection negotiates a tunnel-metadata option, clears the
//! switch, and only then settles into `UpdateFlows`, where [`Ofctrl::put`]
//! diffs the desired tables against the installed mirrors and sends the
//! minimum set of modifications, trailed by a barrier.  Barrier replies
//! resolve which upstream configuration generation the switch has fully
//! materialized.

use crate::ct_zone::{CtZoneMap, CtZoneState};
use crate::desired::DesiredFlowTable;
use crate::extend::ExtendTable;
use crate::inject::{lookup_port, MicroflowParser, LOG_INPORT_REG};
use crate::installed::InstalledFlowTable;
use crate::meter_catalog::MeterCatalog;
use crate::rl::RateLimit;
use crate::BridgeRec;

use anyhow::{bail, Result};
use ofp::ofp_errors::OfpErr;
use ofp::ofp_flow::{FlowMod, FlowModCommand, Ofpacts};
use ofp::ofp_group::{GroupMod, GroupModCommand};
use ofp::ofp_meter::{
    Meter, MeterBand, MeterFlags, MeterMod, MeterModCommand, METER_STRING_PREFIX,
    METER_STRING_SPEC_OFFSET,
};
use ofp::ofp_msgs::{OfpBody, OfpMsg, OfpType, XidAllocator};
use ofp::ofp_packet::PacketOut;
use ofp::ofp_protocol::Version;
use ofp::ofp_tlv::{
    mff_tun_metadata, TlvMap, TlvTableMod, TlvTableModCommand, TlvTableReply, GENEVE_OPT_CLASS,
    GENEVE_OPT_LEN, GENEVE_OPT_TYPE, TUN_METADATA_SLOTS,
};
use ofp::rconn::Rconn;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use std::collections::{HashMap, HashSet, VecDeque};

/// Flow modifications go out as OpenFlow 1.3 OXM.
const OFP_VERSION: Version = Version::Ofp13;

/// Cap on state-machine iterations per driver tick, so one busy connection
/// cannot starve the rest of the event loop.
const MAX_TICK_ITERATIONS: usize = 50;

/// Length of a composed injected packet.
const INJECTED_PACKET_LEN: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Fresh connection; nothing sent yet.
    New,
    /// TLV table request sent, waiting for the reply.
    TlvTableRequested,
    /// TLV table mod and barrier sent, waiting for one or the other.
    TlvTableModSent,
    /// Option settled; the switch is about to be wiped.
    ClearFlows,
    /// Steady state; `put` may run.  Left only on disconnect.
    UpdateFlows,
}

/// An in-flight update to the switch's tables.  When the barrier with this
/// xid is acknowledged, the switch has caught up with upstream configuration
/// generation `nb_cfg`.
struct FlowUpdate {
    xid: u32,
    nb_cfg: i64,
}

pub struct Ofctrl<C: Rconn> {
    rconn: C,
    rundir: String,
    parser: Box<dyn MicroflowParser>,

    state: State,
    /// Last seen connection sequence number; a difference from the
    /// transport's current one means we reconnected.
    seqno: u32,
    xids: XidAllocator,
    /// Transaction ids of the negotiation messages in flight.
    xid: u32,
    xid2: u32,
    /// Field id of our tunnel-metadata option.  In `TlvTableModSent` this
    /// is the option we requested; from `ClearFlows` on it is the option we
    /// actually have.  0 disables the option.
    mff_geneve: u32,

    installed: InstalledFlowTable,
    groups: ExtendTable,
    meters: ExtendTable,

    flow_updates: VecDeque<FlowUpdate>,
    /// Upstream generation of the latest acknowledged update.
    cur_cfg: i64,

    /// Forces a full reinstall on the next `put` after the switch was
    /// cleared.
    need_reinstall: bool,
    skipped_last_time: bool,
    old_nb_cfg: i64,

    rl_error: RateLimit,
    rl_ignored: RateLimit,
    rl_spec: RateLimit,
}

impl<C: Rconn> Ofctrl<C> {
    pub fn new(
        mut rconn: C,
        rundir: &str,
        inactivity_probe_interval: i32,
        parser: Box<dyn MicroflowParser>,
    ) -> Ofctrl<C> {
        rconn.set_probe_interval(inactivity_probe_interval);
        Ofctrl {
            rconn,
            rundir: rundir.to_string(),
            parser,
            state: State::New,
            seqno: 0,
            xids: XidAllocator::new(),
            xid: 0,
            xid2: 0,
            mff_geneve: 0,
            installed: InstalledFlowTable::new(),
            groups: ExtendTable::new(),
            meters: ExtendTable::new(),
            flow_updates: VecDeque::new(),
            cur_cfg: 0,
            need_reinstall: false,
            skipped_last_time: false,
            old_nb_cfg: 0,
            rl_error: RateLimit::new(30, 300),
            rl_ignored: RateLimit::new(30, 300),
            rl_spec: RateLimit::new(5, 1),
        }
    }

    /// Runs the state machine against `br_int`'s management connection.
    /// Returns true when the tick bound expired with work still pending,
    /// in which case the caller should come back without waiting.
    pub fn run(
        &mut self,
        desired: &mut DesiredFlowTable,
        br_int: &BridgeRec,
        pending_ct_zones: &mut CtZoneMap,
    ) -> bool {
        let target = format!("unix:{}/{}.mgmt", self.rundir, br_int.name);
        if self.rconn.target() != target {
            info!("{target}: connecting to switch");
            self.rconn.connect(&target);
        }
        self.rconn.run();

        if !self.rconn.connected() {
            return false;
        }
        if self.seqno != self.rconn.connection_seqno() {
            self.seqno = self.rconn.connection_seqno();
            self.state = State::New;

            // Conntrack flushes that were in flight died with the old
            // connection; queue them again.
            for entry in pending_ct_zones.values_mut() {
                if let CtZoneState::Sent { .. } = entry.state {
                    entry.state = CtZoneState::Queued;
                }
            }
        }

        let mut progress = true;
        let mut i = 0;
        while progress && i < MAX_TICK_ITERATIONS {
            i += 1;

            // Allow the state machine to run.
            let old_state = self.state;
            match self.state {
                State::New => self.run_new(),
                State::ClearFlows => self.run_clear_flows(desired),
                State::TlvTableRequested | State::TlvTableModSent | State::UpdateFlows => {}
            }

            // Try to process a received message.
            let received = match self.rconn.recv() {
                Some(msg) => {
                    match self.state {
                        // `New` always transitions before the receive step.
                        State::New => unreachable!(),
                        State::TlvTableRequested => self.recv_tlv_table_requested(&msg),
                        State::TlvTableModSent => self.recv_tlv_table_mod_sent(&msg),
                        State::ClearFlows => self.recv_generic(&msg),
                        State::UpdateFlows => self.recv_update_flows(&msg, pending_ct_zones),
                    }
                    true
                }
                None => false,
            };

            progress = old_state != self.state || received;
        }
        progress
    }

    /// Registers poll wake-ups for the connection.
    pub fn wait(&mut self) {
        self.rconn.run_wait();
        self.rconn.recv_wait();
    }

    pub fn is_connected(&self) -> bool {
        self.rconn.connected()
    }

    pub fn set_probe_interval(&mut self, probe_interval: i32) {
        self.rconn.set_probe_interval(probe_interval);
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Latest upstream configuration generation whose barrier the switch
    /// has acknowledged.
    pub fn get_cur_cfg(&self) -> i64 {
        self.cur_cfg
    }

    /// Field id of the negotiated tunnel-metadata option, or 0 while the
    /// negotiation has not settled (callers must not emit flows that depend
    /// on it).
    pub fn get_mf_field_id(&self) -> u32 {
        if !self.rconn.connected() {
            return 0;
        }
        match self.state {
            State::ClearFlows | State::UpdateFlows => self.mff_geneve,
            _ => 0,
        }
    }

    pub fn groups_mut(&mut self) -> &mut ExtendTable {
        &mut self.groups
    }

    pub fn meters_mut(&mut self) -> &mut ExtendTable {
        &mut self.meters
    }

    pub fn installed(&self) -> &InstalledFlowTable {
        &self.installed
    }

    pub fn rconn(&self) -> &C {
        &self.rconn
    }

    pub fn rconn_mut(&mut self) -> &mut C {
        &mut self.rconn
    }

    /// Removes everything `sb_uuid` produced: desired flows plus group and
    /// meter references.
    pub fn remove_flows(&mut self, desired: &mut DesiredFlowTable, sb_uuid: &Uuid) {
        desired.remove_by_source(&mut self.installed, sb_uuid);
        self.groups.remove_desired(sb_uuid);
        self.meters.remove_desired(sb_uuid);
    }

    /// Transitively removes the flows of every record reachable from
    /// `seeds` through shared flows, then cleans up the records' group and
    /// meter references.
    pub fn flood_remove_flows(&mut self, desired: &mut DesiredFlowTable, seeds: HashSet<Uuid>) {
        let seen = desired.flood_remove(&mut self.installed, seeds);
        for sb_uuid in &seen {
            self.groups.remove_desired(sb_uuid);
            self.meters.remove_desired(sb_uuid);
        }
    }

    /// Empties the desired flow table, unlinking the installed mirror.
    pub fn clear_flows(&mut self, desired: &mut DesiredFlowTable) {
        desired.clear(&mut self.installed);
    }

    /// `New`: requests the switch's TLV option table.
    fn run_new(&mut self) {
        self.xid = self.queue_msg(OfpBody::TlvTableRequest);
        self.state = State::TlvTableRequested;
    }

    /// Handles the TLV table reply.  Adopts an existing usable mapping of
    /// our option triple, otherwise picks the lowest free slot and asks the
    /// switch to map it.  Returns false when the option cannot be had.
    fn process_tlv_table_reply(&mut self, reply: &TlvTableReply) -> bool {
        let mut md_free = u64::MAX;
        for map in &reply.mappings {
            if map.option_class == GENEVE_OPT_CLASS
                && map.option_type == GENEVE_OPT_TYPE
                && map.option_len == GENEVE_OPT_LEN
            {
                if map.index >= TUN_METADATA_SLOTS {
                    error!(
                        "desired Geneve tunnel option {:#06x},{},{} already in use with \
                         unsupported index {}",
                        map.option_class, map.option_type, map.option_len, map.index
                    );
                    return false;
                }
                self.mff_geneve = mff_tun_metadata(map.index);
                self.state = State::ClearFlows;
                return true;
            }

            if map.index < TUN_METADATA_SLOTS {
                md_free &= !(1u64 << map.index);
            }
        }

        debug!("Geneve option not found");
        if md_free == 0 {
            error!("no Geneve options free for our use");
            return false;
        }

        let index = md_free.trailing_zeros() as u16;
        self.mff_geneve = mff_tun_metadata(index);
        self.xid = self.queue_msg(OfpBody::TlvTableMod(TlvTableMod {
            command: TlvTableModCommand::Add,
            mappings: vec![TlvMap {
                option_class: GENEVE_OPT_CLASS,
                option_type: GENEVE_OPT_TYPE,
                option_len: GENEVE_OPT_LEN,
                index,
            }],
        }));
        self.xid2 = self.queue_msg(OfpBody::BarrierRequest);
        self.state = State::TlvTableModSent;
        true
    }

    /// `TlvTableRequested`: a reply carrying our triple (or a free slot to
    /// map it at) moves the negotiation forward; everything else disables
    /// the option and proceeds to `ClearFlows`.
    fn recv_tlv_table_requested(&mut self, msg: &OfpMsg) {
        if msg.xid != self.xid {
            return self.recv_generic(msg);
        }
        match &msg.body {
            OfpBody::TlvTableReply(reply) => {
                if self.process_tlv_table_reply(reply) {
                    return;
                }
            }
            OfpBody::Error(error) => {
                error!("switch refused to allocate Geneve option ({error})");
            }
            _ => {
                error!("unexpected reply to TLV table request ({:?})", msg.ofptype());
            }
        }

        // Error path: run without the option.
        self.mff_geneve = 0;
        self.state = State::ClearFlows;
    }

    /// `TlvTableModSent`: the barrier reply confirms our mapping.  An
    /// `AlreadyMapped`/`DupEntry` error means we raced another controller
    /// mapping the same triple, which resolves by renegotiating from
    /// scratch; other errors disable the option.
    fn recv_tlv_table_mod_sent(&mut self, msg: &OfpMsg) {
        if msg.xid != self.xid && msg.xid != self.xid2 {
            return self.recv_generic(msg);
        }
        if msg.xid == self.xid2 && msg.ofptype() == OfpType::BarrierReply {
            self.state = State::ClearFlows;
            return;
        }
        if msg.xid == self.xid {
            if let OfpBody::Error(error) = &msg.body {
                if matches!(*error, OfpErr::AlreadyMapped | OfpErr::DupEntry) {
                    info!(
                        "raced with another controller adding Geneve option ({error}); \
                         trying again"
                    );
                    self.state = State::New;
                } else {
                    error!("error adding Geneve option ({error})");
                    self.mff_geneve = 0;
                    self.state = State::ClearFlows;
                }
                return;
            }
        }

        error!("unexpected reply to Geneve option allocation request ({:?})", msg.ofptype());
        self.mff_geneve = 0;
        self.state = State::ClearFlows;
    }

    /// `ClearFlows`: deletes every flow, group, and meter on the switch,
    /// resets the local mirrors to match, and drops all in-flight updates.
    fn run_clear_flows(&mut self, desired: &mut DesiredFlowTable) {
        debug!("clearing all flows");
        self.need_reinstall = true;

        self.queue_msg(OfpBody::FlowMod(FlowMod::delete_all()));
        self.queue_msg(OfpBody::GroupMod(GroupMod::delete_all()));
        self.queue_msg(OfpBody::MeterMod(MeterMod::delete_all()));

        for (_, refs) in self.installed.clear() {
            for id in refs {
                desired.set_installed(id, None);
            }
        }
        self.groups.clear_existing();
        self.meters.clear_existing();

        // Every in-flight update was for the old contents of the switch.
        self.flow_updates.clear();

        self.state = State::UpdateFlows;
    }

    /// `UpdateFlows`: barrier replies resolve in-flight updates and promote
    /// the conntrack flushes their batch carried.
    fn recv_update_flows(&mut self, msg: &OfpMsg, pending_ct_zones: &mut CtZoneMap) {
        if msg.ofptype() == OfpType::BarrierReply && !self.flow_updates.is_empty() {
            let resolved = matches!(self.flow_updates.front(), Some(front) if front.xid == msg.xid);
            if resolved {
                if let Some(front) = self.flow_updates.pop_front() {
                    if front.nb_cfg >= self.cur_cfg {
                        self.cur_cfg = front.nb_cfg;
                    }
                }
            }

            for entry in pending_ct_zones.values_mut() {
                if entry.state == (CtZoneState::Sent { of_xid: msg.xid }) {
                    entry.state = CtZoneState::DbQueued;
                }
            }
        } else {
            self.recv_generic(msg);
        }
    }

    /// Fallback handling for messages no state claims.
    fn recv_generic(&mut self, msg: &OfpMsg) {
        match &msg.body {
            OfpBody::EchoRequest(payload) => {
                let reply = OfpMsg {
                    version: msg.version,
                    xid: msg.xid,
                    body: OfpBody::EchoReply(payload.clone()),
                };
                if let Err(error) = self.rconn.send(reply) {
                    debug!("failed to send echo reply ({error})");
                }
            }
            OfpBody::Error(error) => {
                if !self.rl_error.should_drop() {
                    info!("OpenFlow error: {error} (xid {})", msg.xid);
                }
            }
            _ => {
                if !self.rl_ignored.should_drop() {
                    debug!("OpenFlow packet ignored: {:?} (xid {})", msg.ofptype(), msg.xid);
                }
            }
        }
    }

    fn queue_msg(&mut self, body: OfpBody) -> u32 {
        let xid = self.xids.next_xid();
        let msg = OfpMsg { version: OFP_VERSION as u8, xid, body };
        if let Err(error) = self.rconn.send(msg) {
            debug!("failed to queue OpenFlow message ({error})");
        }
        xid
    }

    /// The flow table can be updated when the connection has settled into
    /// `UpdateFlows` and is not backlogged with a previous batch.  (The
    /// backlog criterion looks conservative, but the management socket
    /// provides some buffering.)
    pub fn can_put(&self) -> bool {
        self.state == State::UpdateFlows
            && self.rconn.tx_in_flight() == 0
            && self.rconn.version().is_some()
    }

    /// Brings the switch's flow, group, and meter tables up to date with
    /// the desired state, batching the necessary modifications behind a
    /// single barrier, and ties that barrier to upstream generation
    /// `nb_cfg`.
    ///
    /// Also sends a flush for every conntrack zone still queued in
    /// `pending_ct_zones` and tags it with the batch.
    ///
    /// Call after [`Ofctrl::run`] within the main loop.
    pub fn put(
        &mut self,
        desired: &mut DesiredFlowTable,
        pending_ct_zones: &mut CtZoneMap,
        meter_catalog: &MeterCatalog,
        nb_cfg: i64,
        flow_changed: bool,
    ) {
        let mut need_put = false;
        if flow_changed || self.skipped_last_time || self.need_reinstall {
            need_put = true;
        } else if nb_cfg != self.old_nb_cfg {
            if self.cur_cfg == self.old_nb_cfg {
                // We were up to date already, so the new generation is
                // reached without touching the switch.
                self.cur_cfg = nb_cfg;
            } else {
                need_put = true;
            }
        }
        self.old_nb_cfg = nb_cfg;

        if !need_put {
            debug!("put not needed");
            return;
        }
        if !self.can_put() {
            debug!("put cannot be performed");
            self.skipped_last_time = true;
            return;
        }

        self.skipped_last_time = false;
        self.need_reinstall = false;

        // Messages to send to the switch to bring it up to date.
        let mut msgs: Vec<OfpBody> = Vec::new();

        // Conntrack zones waiting to be flushed.
        for entry in pending_ct_zones.values_mut() {
            if entry.state == CtZoneState::Queued {
                msgs.push(OfpBody::CtFlushZone { zone: entry.zone });
                entry.state = CtZoneState::Sent { of_xid: 0 };
            }
        }

        // Desired groups the switch doesn't have yet.
        let new_groups: Vec<(String, u32)> = self
            .groups
            .uninstalled()
            .map(|entry| (entry.name.clone(), entry.table_id))
            .collect();
        for (name, table_id) in new_groups {
            let group_string = format!("group_id={table_id},{name}");
            match GroupMod::parse(&group_string, GroupModCommand::Add) {
                Ok(gm) => msgs.push(OfpBody::GroupMod(gm)),
                Err(error) => {
                    if !self.rl_spec.should_drop() {
                        error!("new group {error} {group_string}");
                    }
                }
            }
        }

        // Desired meters the switch doesn't have yet.  Inline
        // specifications encode themselves; the rest resolve against the
        // catalog.
        let new_meters: Vec<(String, u32)> = self
            .meters
            .uninstalled()
            .map(|entry| (entry.name.clone(), entry.table_id))
            .collect();
        for (name, table_id) in new_meters {
            if name.starts_with(METER_STRING_PREFIX) {
                self.add_meter_string(&name, table_id, &mut msgs);
            } else {
                self.add_meter(&name, table_id, meter_catalog, &mut msgs);
            }
        }

        // Installed flows that are no longer desired get deleted; installed
        // flows whose covering desired flow carries different contents get
        // modified.  Links are recomputed as we go.
        for key in self.installed.keys() {
            for id in self.installed.unlink_all(&key) {
                desired.set_installed(id, None);
            }
            match desired.lookup_by_key(&key) {
                None => {
                    debug!("removing installed flow: {key}");
                    msgs.push(OfpBody::FlowMod(FlowMod {
                        table_id: key.table_id,
                        priority: key.priority,
                        match_: key.match_.clone(),
                        ofpacts: Ofpacts::new(),
                        cookie: 0,
                        modify_cookie: false,
                        command: FlowModCommand::Delete { strict: true },
                    }));
                    self.installed.remove(&key);
                }
                Some(id) => {
                    let (d_ofpacts, d_cookie) = match desired.get(id) {
                        Some(d) => (d.flow().ofpacts.clone(), d.flow().cookie),
                        None => continue,
                    };
                    let (acts_differ, cookie_differs) = match self.installed.lookup(&key) {
                        Some(i) => {
                            (!i.ofpacts().equivalent(&d_ofpacts), i.cookie() != d_cookie)
                        }
                        None => continue,
                    };
                    if acts_differ || cookie_differs {
                        debug!("updating installed flow: {key}");
                        // Strict modify cannot replace a cookie, so a
                        // cookie change goes out as an add.
                        let (command, modify_cookie) = if cookie_differs {
                            (FlowModCommand::Add, true)
                        } else {
                            (FlowModCommand::Modify { strict: true }, false)
                        };
                        msgs.push(OfpBody::FlowMod(FlowMod {
                            table_id: key.table_id,
                            priority: key.priority,
                            match_: key.match_.clone(),
                            ofpacts: d_ofpacts.clone(),
                            cookie: d_cookie,
                            modify_cookie,
                            command,
                        }));
                        self.installed.update(&key, d_ofpacts, d_cookie);
                    }
                    self.installed.link_ref(&key, id);
                    desired.set_installed(id, Some(key.clone()));
                }
            }
        }

        // Desired flows with no installed counterpart get added.
        for id in desired.ids() {
            let (key, ofpacts, cookie) = match desired.get(id) {
                Some(d) => (d.flow().key(), d.flow().ofpacts.clone(), d.flow().cookie),
                None => continue,
            };
            if self.installed.lookup(&key).is_none() {
                debug!("adding installed flow: {key}");
                msgs.push(OfpBody::FlowMod(FlowMod {
                    table_id: key.table_id,
                    priority: key.priority,
                    match_: key.match_.clone(),
                    ofpacts: ofpacts.clone(),
                    cookie,
                    modify_cookie: false,
                    command: FlowModCommand::Add,
                }));
                self.installed.insert(key.clone(), ofpacts, cookie);
            }
            self.installed.link_ref(&key, id);
            desired.set_installed(id, Some(key));
        }

        // Groups installed by previous runs that nothing wants anymore.
        let stale_groups: Vec<(String, u32)> = self
            .groups
            .stale()
            .map(|(name, table_id)| (name.to_string(), table_id))
            .collect();
        for (name, table_id) in stale_groups {
            let group_string = format!("group_id={table_id}");
            match GroupMod::parse(&group_string, GroupModCommand::Delete) {
                Ok(gm) => msgs.push(OfpBody::GroupMod(gm)),
                Err(error) => {
                    if !self.rl_spec.should_drop() {
                        error!("error deleting group {table_id}: {error}");
                    }
                }
            }
            self.groups.remove_existing(&name);
        }
        self.groups.sync();

        // Same for meters.
        let stale_meters: Vec<(String, u32)> = self
            .meters
            .stale()
            .map(|(name, table_id)| (name.to_string(), table_id))
            .collect();
        for (name, table_id) in stale_meters {
            msgs.push(OfpBody::MeterMod(MeterMod::delete(table_id)));
            self.meters.remove_existing(&name);
        }
        self.meters.sync();

        if msgs.is_empty() {
            if let Some(back) = self.flow_updates.back_mut() {
                // Catching up with the most recent update also catches up
                // with nb_cfg.
                back.nb_cfg = nb_cfg;
            } else {
                // We were completely up to date before and still are.
                self.cur_cfg = nb_cfg;
            }
            return;
        }

        for body in msgs {
            self.queue_msg(body);
        }
        let barrier_xid = self.queue_msg(OfpBody::BarrierRequest);

        // Tag the conntrack flushes sent above with the batch's barrier.
        for entry in pending_ct_zones.values_mut() {
            if entry.state == (CtZoneState::Sent { of_xid: 0 }) {
                entry.state = CtZoneState::Sent { of_xid: barrier_xid };
            }
        }

        // Track the update.  Entries are examined newest first: a trailing
        // entry for a later generation means upstream regressed; one for
        // the same generation means the physical state needed more work to
        // reach it, so its barrier target advances instead of a new entry
        // being added.
        let mut retagged = false;
        while let Some(back) = self.flow_updates.back_mut() {
            if nb_cfg < back.nb_cfg {
                warn!("nb_cfg regressed from {} to {}", back.nb_cfg, nb_cfg);
                self.flow_updates.pop_back();
            } else if nb_cfg == back.nb_cfg {
                debug!("advanced xid target for nb_cfg={nb_cfg}");
                back.xid = barrier_xid;
                retagged = true;
                break;
            } else {
                break;
            }
        }
        if !retagged {
            self.flow_updates.push_back(FlowUpdate { xid: barrier_xid, nb_cfg });
        }
    }

    fn add_meter_string(&mut self, name: &str, table_id: u32, msgs: &mut Vec<OfpBody>) {
        let Some(spec) = name.get(METER_STRING_SPEC_OFFSET..) else {
            if !self.rl_spec.should_drop() {
                error!("truncated inline meter name \"{name}\"");
            }
            return;
        };
        let meter_string = format!("meter={table_id},{spec}");
        match MeterMod::parse(&meter_string, MeterModCommand::Add) {
            Ok(mm) => msgs.push(OfpBody::MeterMod(mm)),
            Err(error) => {
                if !self.rl_spec.should_drop() {
                    error!("new meter {error} {meter_string}");
                }
            }
        }
    }

    fn add_meter(
        &mut self,
        name: &str,
        table_id: u32,
        meter_catalog: &MeterCatalog,
        msgs: &mut Vec<OfpBody>,
    ) {
        let Some(rec) = meter_catalog.get(name) else {
            if !self.rl_spec.should_drop() {
                error!("could not find meter named \"{name}\"");
            }
            return;
        };

        let mut flags = MeterFlags::STATS;
        flags |= if rec.unit == "pktps" { MeterFlags::PKTPS } else { MeterFlags::KBPS };
        let mut bands = Vec::with_capacity(rec.bands.len());
        for band in &rec.bands {
            if band.burst_size != 0 {
                flags |= MeterFlags::BURST;
            }
            bands.push(MeterBand { rate: band.rate, burst_size: band.burst_size });
        }

        msgs.push(OfpBody::MeterMod(MeterMod {
            command: MeterModCommand::Add,
            meter: Meter { meter_id: table_id, flags, bands },
        }));
    }

    /// Composes a packet described by `flow_s` (a microflow expression
    /// whose ingress logical port must be bound on `br_int`) and injects it
    /// into the bridge via a resubmit to table 0 on its ingress port.
    pub fn inject_pkt(
        &mut self,
        br_int: &BridgeRec,
        flow_s: &str,
        addr_sets: &HashMap<String, Vec<String>>,
        port_groups: &HashMap<String, Vec<String>>,
    ) -> Result<()> {
        if self.rconn.version().is_none() {
            bail!("OpenFlow channel not ready");
        }

        let mut uflow =
            self.parser.parse(flow_s, addr_sets, port_groups, &|name| lookup_port(br_int, name))?;

        // The parser stored the physical OpenFlow port in the logical
        // ingress-port register; move it where packet-out needs it.
        let in_port = uflow.regs[LOG_INPORT_REG] as u16;
        uflow.regs[LOG_INPORT_REG] = 0;
        if in_port == 0 {
            bail!("ingress port not found on hypervisor");
        }
        uflow.in_port = in_port;

        let packet = uflow.compose(INJECTED_PACKET_LEN);
        self.queue_msg(OfpBody::PacketOut(PacketOut {
            packet,
            in_port,
            ofpacts: Ofpacts::resubmit_in_port(0),
        }));
        Ok(())
    }
}
