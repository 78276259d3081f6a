use anyhow::Result;
use ofagent::ct_zone::{CtZoneMap, CtZonePending, CtZoneState};
use ofagent::desired::DesiredFlowTable;
use ofagent::flow::FlowKey;
use ofagent::inject::{lookup_port, MicroflowParser, LOG_INPORT_REG};
use ofagent::meter_catalog::{MeterBandRec, MeterCatalog, MeterRec};
use ofagent::ofctrl::{Ofctrl, State};
use ofagent::{BridgeRec, InterfaceRec, PortRec};
use ofp::ofp_errors::OfpErr;
use ofp::ofp_flow::{FlowMod, FlowModCommand, Match, Ofpacts, OFPTT_ALL};
use ofp::ofp_group::{GroupModCommand, OFPG_ALL};
use ofp::ofp_meter::{MeterFlags, MeterModCommand, METER_STRING_PREFIX, OFPM_ALL};
use ofp::ofp_msgs::{OfpBody, OfpMsg, OfpType};
use ofp::ofp_packet::Microflow;
use ofp::ofp_protocol::{Version, Versions};
use ofp::ofp_tlv::{
    mff_tun_metadata, TlvMap, TlvTableReply, GENEVE_OPT_CLASS, GENEVE_OPT_LEN, GENEVE_OPT_TYPE,
};
use ofp::rconn::{RamRconn, SwitchHandle};
use std::collections::{HashMap, HashSet};
use tracing_test::traced_test;
use uuid::Uuid;

/// Expression "parser" for injection tests: the expression is just a
/// logical port name, which gets resolved into the ingress-port register.
struct PortNameParser;

impl MicroflowParser for PortNameParser {
    fn parse(
        &self,
        flow_s: &str,
        _addr_sets: &HashMap<String, Vec<String>>,
        _port_groups: &HashMap<String, Vec<String>>,
        lookup_port: &dyn Fn(&str) -> Option<u16>,
    ) -> Result<Microflow> {
        let mut uflow = Microflow { eth_type: 0x0800, ..Default::default() };
        uflow.regs[LOG_INPORT_REG] = u32::from(lookup_port(flow_s).unwrap_or(0));
        Ok(uflow)
    }
}

struct Harness {
    ctrl: Ofctrl<RamRconn>,
    switch: SwitchHandle,
    desired: DesiredFlowTable,
    br_int: BridgeRec,
    ct_zones: CtZoneMap,
    meter_catalog: MeterCatalog,
}

impl Harness {
    fn new() -> Harness {
        let (rconn, switch) = RamRconn::new(Versions::DEFAULT);
        let ctrl = Ofctrl::new(rconn, "/var/run/openvswitch", 5, Box::new(PortNameParser));
        Harness {
            ctrl,
            switch,
            desired: DesiredFlowTable::new(),
            br_int: bridge(),
            ct_zones: CtZoneMap::new(),
            meter_catalog: MeterCatalog::new(),
        }
    }

    fn run(&mut self) -> bool {
        self.ctrl.run(&mut self.desired, &self.br_int, &mut self.ct_zones)
    }

    fn put(&mut self, nb_cfg: i64, flow_changed: bool) {
        self.ctrl.put(
            &mut self.desired,
            &mut self.ct_zones,
            &self.meter_catalog,
            nb_cfg,
            flow_changed,
        );
    }

    fn drain(&mut self) -> Vec<OfpMsg> {
        self.switch.drain()
    }

    /// Replies to an outstanding message.
    fn reply(&mut self, xid: u32, body: OfpBody) {
        self.switch.send(OfpMsg { version: Version::Ofp13 as u8, xid, body });
    }

    /// Brings the connection up and answers the TLV table request with a
    /// reply that already maps our option triple at `index`.  Returns the
    /// delete-all batch sent while clearing the switch.
    fn settle(&mut self, index: u16) -> Vec<OfpMsg> {
        self.switch.bring_up(Version::Ofp13);
        self.run();
        assert_eq!(self.ctrl.state(), State::TlvTableRequested);

        let sent = self.drain();
        let request = sent
            .iter()
            .find(|msg| msg.ofptype() == OfpType::TlvTableRequest)
            .expect("TLV table request");
        self.reply(
            request.xid,
            OfpBody::TlvTableReply(TlvTableReply { mappings: vec![geneve_map(index)] }),
        );
        self.run();
        assert_eq!(self.ctrl.state(), State::UpdateFlows);
        self.drain()
    }

    /// Runs a put and hands back what it sent, split into (messages,
    /// barrier xid).  Fails the test if no barrier trails the batch.
    fn put_batch(&mut self, nb_cfg: i64, flow_changed: bool) -> (Vec<OfpMsg>, u32) {
        self.put(nb_cfg, flow_changed);
        let mut sent = self.drain();
        let barrier = sent.pop().expect("nonempty batch");
        assert_eq!(barrier.ofptype(), OfpType::BarrierRequest);
        (sent, barrier.xid)
    }
}

fn bridge() -> BridgeRec {
    BridgeRec {
        name: "br-int".into(),
        ports: vec![PortRec {
            interfaces: vec![InterfaceRec {
                external_ids: HashMap::from([("iface-id".to_string(), "lp1".to_string())]),
                ofport: vec![5],
            }],
        }],
    }
}

fn geneve_map(index: u16) -> TlvMap {
    TlvMap {
        option_class: GENEVE_OPT_CLASS,
        option_type: GENEVE_OPT_TYPE,
        option_len: GENEVE_OPT_LEN,
        index,
    }
}

fn m(s: &str) -> Match {
    Match::parse(s).unwrap()
}

fn key(table_id: u8, priority: u16, match_s: &str) -> FlowKey {
    FlowKey { table_id, priority, match_: m(match_s) }
}

fn flow_mods(msgs: &[OfpMsg]) -> Vec<&FlowMod> {
    msgs.iter()
        .filter_map(|msg| match &msg.body {
            OfpBody::FlowMod(fm) => Some(fm),
            _ => None,
        })
        .collect()
}

fn no_args() -> HashMap<String, Vec<String>> {
    HashMap::new()
}

#[test]
#[traced_test]
fn reconnect_full_reinstall() -> Result<()> {
    let mut h = Harness::new();
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("output:2"), Uuid::new_v4(), true);
    h.desired.add(0, 100, 2, m("in_port=2"), Ofpacts::parse("output:1"), Uuid::new_v4(), true);

    // (Re)connecting walks New -> TlvTableRequested -> ClearFlows ->
    // UpdateFlows and wipes the switch.
    let cleared = h.settle(0);
    assert_eq!(
        cleared.iter().map(OfpMsg::ofptype).collect::<Vec<_>>(),
        vec![OfpType::FlowMod, OfpType::GroupMod, OfpType::MeterMod]
    );
    match &cleared[0].body {
        OfpBody::FlowMod(fm) => {
            assert_eq!(fm.table_id, OFPTT_ALL);
            assert_eq!(fm.command, FlowModCommand::Delete { strict: false });
            assert!(fm.match_.is_catchall());
        }
        other => panic!("unexpected body {other:?}"),
    }
    match &cleared[1].body {
        OfpBody::GroupMod(gm) => assert_eq!(gm.group_id, OFPG_ALL),
        other => panic!("unexpected body {other:?}"),
    }
    match &cleared[2].body {
        OfpBody::MeterMod(mm) => assert_eq!(mm.meter.meter_id, OFPM_ALL),
        other => panic!("unexpected body {other:?}"),
    }
    assert_eq!(h.ctrl.get_mf_field_id(), mff_tun_metadata(0));

    // The first put after a clear reinstalls everything, even though no
    // flow changed from the agent's point of view.
    let (msgs, _) = h.put_batch(1, false);
    let adds = flow_mods(&msgs);
    assert_eq!(adds.len(), 2);
    assert!(adds.iter().all(|fm| fm.command == FlowModCommand::Add));
    let matches: HashSet<String> = adds.iter().map(|fm| fm.match_.to_string()).collect();
    assert_eq!(matches, HashSet::from(["in_port=1".to_string(), "in_port=2".to_string()]));
    assert_eq!(h.ctrl.installed().len(), 2);
    Ok(())
}

#[test]
#[traced_test]
fn tlv_negotiation_allocates_a_free_slot() -> Result<()> {
    let mut h = Harness::new();
    h.switch.bring_up(Version::Ofp13);
    h.run();
    let request_xid = h.drain().pop().unwrap().xid;

    // Slots 0 and 1 are taken by somebody else's options.
    let taken = |index| TlvMap { option_class: 0xffff, option_type: 1, option_len: 4, index };
    h.reply(
        request_xid,
        OfpBody::TlvTableReply(TlvTableReply { mappings: vec![taken(0), taken(1)] }),
    );
    h.run();
    assert_eq!(h.ctrl.state(), State::TlvTableModSent);

    let sent = h.drain();
    let (tlv_mod, barrier) = (&sent[0], &sent[1]);
    match &tlv_mod.body {
        OfpBody::TlvTableMod(ttm) => assert_eq!(ttm.mappings, vec![geneve_map(2)]),
        other => panic!("unexpected body {other:?}"),
    }
    assert_eq!(barrier.ofptype(), OfpType::BarrierRequest);

    // Not settled yet: the option is not usable until the mod commits.
    assert_eq!(h.ctrl.get_mf_field_id(), 0);

    h.reply(barrier.xid, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ctrl.state(), State::UpdateFlows);
    assert_eq!(h.ctrl.get_mf_field_id(), mff_tun_metadata(2));
    Ok(())
}

#[test]
#[traced_test]
fn tlv_negotiation_retries_on_mapping_race() -> Result<()> {
    let mut h = Harness::new();
    h.switch.bring_up(Version::Ofp13);
    h.run();
    let request_xid = h.drain().pop().unwrap().xid;

    h.reply(request_xid, OfpBody::TlvTableReply(TlvTableReply::default()));
    h.run();
    let sent = h.drain();
    let mod_xid = sent[0].xid;

    // A peer controller mapped the triple first; the agent renegotiates.
    h.reply(mod_xid, OfpBody::Error(OfpErr::AlreadyMapped));
    h.run();
    // The retry is already in flight again.
    assert_eq!(h.ctrl.state(), State::TlvTableRequested);
    assert_eq!(h.drain().last().map(OfpMsg::ofptype), Some(OfpType::TlvTableRequest));
    Ok(())
}

#[test]
#[traced_test]
fn tlv_mapping_at_unusable_index_disables_the_option() -> Result<()> {
    let mut h = Harness::new();
    h.switch.bring_up(Version::Ofp13);
    h.run();
    let request_xid = h.drain().pop().unwrap().xid;

    // Our triple is mapped, but beyond the slots we can address.
    h.reply(
        request_xid,
        OfpBody::TlvTableReply(TlvTableReply { mappings: vec![geneve_map(64)] }),
    );
    h.run();
    assert_eq!(h.ctrl.state(), State::UpdateFlows);
    assert_eq!(h.ctrl.get_mf_field_id(), 0);
    Ok(())
}

#[test]
#[traced_test]
fn tlv_negotiation_hard_failure_disables_the_option() -> Result<()> {
    let mut h = Harness::new();
    h.switch.bring_up(Version::Ofp13);
    h.run();
    let request_xid = h.drain().pop().unwrap().xid;

    h.reply(request_xid, OfpBody::Error(OfpErr::BadType));
    h.run();
    assert_eq!(h.ctrl.state(), State::UpdateFlows);
    assert_eq!(h.ctrl.get_mf_field_id(), 0);
    Ok(())
}

#[test]
#[traced_test]
fn duplicate_add_is_dropped_and_logged() -> Result<()> {
    let mut h = Harness::new();
    let sb = Uuid::new_v4();
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), sb, true);
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), sb, true);
    assert_eq!(h.desired.len(), 1);
    assert!(logs_contain("dropping duplicate flow"));

    h.settle(0);
    let (msgs, _) = h.put_batch(1, true);
    assert_eq!(flow_mods(&msgs).len(), 1);
    Ok(())
}

#[test]
#[traced_test]
fn shared_key_keeps_installed_flow_alive() -> Result<()> {
    let mut h = Harness::new();
    let (sb1, sb2) = (Uuid::new_v4(), Uuid::new_v4());
    h.desired.add(0, 100, 7, m("in_port=1"), Ofpacts::parse("output:2"), sb1, true);
    h.desired.add(0, 100, 7, m("in_port=1"), Ofpacts::parse("output:2"), sb2, true);
    assert_eq!(h.desired.len(), 2);

    h.settle(0);
    let (msgs, _) = h.put_batch(1, true);
    assert_eq!(flow_mods(&msgs).len(), 1);
    assert_eq!(h.ctrl.installed().len(), 1);

    // Unlinking sb1 leaves the installed flow covered by sb2's desired
    // flow, so the next put has nothing to send.
    h.ctrl.remove_flows(&mut h.desired, &sb1);
    assert_eq!(h.desired.len(), 1);
    h.put(2, true);
    assert!(h.drain().is_empty());

    let installed = h.ctrl.installed().lookup(&key(0, 100, "in_port=1")).unwrap();
    let primary = installed.primary().expect("installed flow has a primary");
    assert!(h.desired.get(primary).unwrap().sources().contains(&sb2));
    Ok(())
}

#[test]
#[traced_test]
fn flood_remove_cascades_and_cleans_extension_tables() -> Result<()> {
    let mut h = Harness::new();
    let (sb_a, sb_b, sb_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    // F1 is shared by a and b, F2 belongs to b alone, F3 to c.
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), sb_a, true);
    h.desired.add_or_append(0, 100, 1, m("in_port=1"), Ofpacts::new(), sb_b);
    h.desired.add(0, 100, 2, m("in_port=2"), Ofpacts::parse("drop"), sb_b, true);
    h.desired.add(0, 100, 3, m("in_port=3"), Ofpacts::parse("drop"), sb_c, true);
    h.ctrl.groups_mut().add_desired(sb_b, "type=all,bucket=output:2");

    h.ctrl.flood_remove_flows(&mut h.desired, HashSet::from([sb_a]));

    // Everything reachable from a (through the shared F1) is gone,
    // including b's group reference; c's flow survives.
    assert_eq!(h.desired.len(), 1);
    assert!(h.desired.lookup(&key(0, 100, "in_port=3"), &sb_c).is_some());
    assert_eq!(h.ctrl.groups_mut().desired_len(), 0);
    Ok(())
}

#[test]
#[traced_test]
fn action_change_is_a_single_strict_modify() -> Result<()> {
    let mut h = Harness::new();
    let sb = Uuid::new_v4();
    h.desired.add(0, 100, 7, m("in_port=1"), Ofpacts::parse("output:2"), sb, true);
    h.settle(0);
    h.put_batch(1, true);

    // Same key and cookie, different actions.
    h.ctrl.remove_flows(&mut h.desired, &sb);
    h.desired.add(0, 100, 7, m("in_port=1"), Ofpacts::parse("output:3"), sb, true);

    let (msgs, _) = h.put_batch(2, true);
    let mods = flow_mods(&msgs);
    assert_eq!(mods.len(), 1);
    assert_eq!(mods[0].command, FlowModCommand::Modify { strict: true });
    assert!(!mods[0].modify_cookie);
    assert!(mods[0].ofpacts.equivalent(&Ofpacts::parse("output:3")));

    let installed = h.ctrl.installed().lookup(&key(0, 100, "in_port=1")).unwrap();
    assert!(installed.ofpacts().equivalent(&Ofpacts::parse("output:3")));
    Ok(())
}

#[test]
#[traced_test]
fn cookie_change_goes_out_as_an_add() -> Result<()> {
    let mut h = Harness::new();
    let sb = Uuid::new_v4();
    h.desired.add(0, 100, 7, m("in_port=1"), Ofpacts::parse("output:2"), sb, true);
    h.settle(0);
    h.put_batch(1, true);

    // Same key and actions, different cookie.
    h.ctrl.remove_flows(&mut h.desired, &sb);
    h.desired.add(0, 100, 8, m("in_port=1"), Ofpacts::parse("output:2"), sb, true);

    let (msgs, _) = h.put_batch(2, true);
    let mods = flow_mods(&msgs);
    assert_eq!(mods.len(), 1);
    assert_eq!(mods[0].command, FlowModCommand::Add);
    assert!(mods[0].modify_cookie);
    assert_eq!(mods[0].cookie, 8);

    let installed = h.ctrl.installed().lookup(&key(0, 100, "in_port=1")).unwrap();
    assert_eq!(installed.cookie(), 8);
    Ok(())
}

#[test]
#[traced_test]
fn stale_installed_flows_are_strictly_deleted() -> Result<()> {
    let mut h = Harness::new();
    let sb = Uuid::new_v4();
    h.desired.add(0, 100, 7, m("in_port=1"), Ofpacts::parse("output:2"), sb, true);
    h.settle(0);
    h.put_batch(1, true);

    h.ctrl.remove_flows(&mut h.desired, &sb);
    let (msgs, _) = h.put_batch(2, true);
    let mods = flow_mods(&msgs);
    assert_eq!(mods.len(), 1);
    assert_eq!(mods[0].command, FlowModCommand::Delete { strict: true });
    assert_eq!(h.ctrl.installed().len(), 0);
    Ok(())
}

#[test]
#[traced_test]
fn nb_cfg_tracking_across_barriers() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);

    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    let (_, b1) = h.put_batch(5, true);

    // More physical work for the same generation: the outstanding update's
    // barrier target advances instead of a second entry piling up.
    h.desired.add(0, 100, 2, m("in_port=2"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    let (_, b2) = h.put_batch(5, true);
    assert_ne!(b1, b2);

    h.reply(b1, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ctrl.get_cur_cfg(), 0);

    h.reply(b2, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ctrl.get_cur_cfg(), 5);

    // Nothing outstanding and nothing to send: a new generation is
    // acknowledged locally without touching the switch.
    h.put(6, false);
    assert!(h.drain().is_empty());
    assert_eq!(h.ctrl.get_cur_cfg(), 6);
    Ok(())
}

#[test]
#[traced_test]
fn nb_cfg_rides_the_outstanding_barrier_when_nothing_changed() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    let (_, b1) = h.put_batch(5, true);

    // The diff finds nothing to do for generation 6, so its resolution is
    // tied to the barrier already in flight.
    h.put(6, false);
    assert!(h.drain().is_empty());
    assert_eq!(h.ctrl.get_cur_cfg(), 0);

    h.reply(b1, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ctrl.get_cur_cfg(), 6);
    Ok(())
}

#[test]
#[traced_test]
fn nb_cfg_regression_drops_queued_updates() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    let (_, b1) = h.put_batch(5, true);

    h.desired.add(0, 100, 2, m("in_port=2"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    let (_, b2) = h.put_batch(4, true);
    assert!(logs_contain("nb_cfg regressed from 5 to 4"));

    // The regressed entry is gone; only the new barrier resolves.
    h.reply(b1, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ctrl.get_cur_cfg(), 0);
    h.reply(b2, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ctrl.get_cur_cfg(), 4);
    Ok(())
}

#[test]
#[traced_test]
fn conntrack_flushes_follow_the_batch() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.ct_zones.insert(
        "lp1".to_string(),
        CtZonePending { zone: 13, state: CtZoneState::Queued },
    );
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), Uuid::new_v4(), true);

    let (msgs, barrier_xid) = h.put_batch(1, true);
    // The flush leads the batch and is tagged with its barrier.
    assert_eq!(msgs[0].body, OfpBody::CtFlushZone { zone: 13 });
    assert_eq!(
        h.ct_zones["lp1"].state,
        CtZoneState::Sent { of_xid: barrier_xid }
    );

    h.reply(barrier_xid, OfpBody::BarrierReply);
    h.run();
    assert_eq!(h.ct_zones["lp1"].state, CtZoneState::DbQueued);
    Ok(())
}

#[test]
#[traced_test]
fn reconnect_requeues_sent_conntrack_flushes() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.ct_zones.insert(
        "lp1".to_string(),
        CtZonePending { zone: 13, state: CtZoneState::Queued },
    );
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    h.put_batch(1, true);
    assert!(matches!(h.ct_zones["lp1"].state, CtZoneState::Sent { .. }));

    // The barrier never came back; the reconnect requeues the flush.
    h.switch.bring_up(Version::Ofp13);
    h.run();
    assert_eq!(h.ct_zones["lp1"].state, CtZoneState::Queued);
    Ok(())
}

#[test]
#[traced_test]
fn groups_and_meters_reconcile() -> Result<()> {
    let mut h = Harness::new();
    let sb = Uuid::new_v4();
    h.settle(0);

    let group_id = h.ctrl.groups_mut().add_desired(sb, "type=all,bucket=output:2");
    h.meter_catalog.insert(MeterRec {
        name: "acl-rate".into(),
        unit: "pktps".into(),
        bands: vec![MeterBandRec { rate: 500, burst_size: 100 }],
    });
    let meter_id = h.ctrl.meters_mut().add_desired(sb, "acl-rate");
    let inline = format!("{METER_STRING_PREFIX}{:42}kbps,band=type=drop,rate=300", "");
    let inline_id = h.ctrl.meters_mut().add_desired(sb, &inline);

    let (msgs, _) = h.put_batch(1, true);
    let group_adds: Vec<_> = msgs
        .iter()
        .filter_map(|msg| match &msg.body {
            OfpBody::GroupMod(gm) if gm.command == GroupModCommand::Add => Some(gm),
            _ => None,
        })
        .collect();
    assert_eq!(group_adds.len(), 1);
    assert_eq!(group_adds[0].group_id, group_id);
    assert_eq!(group_adds[0].props, "type=all,bucket=output:2");

    let meter_adds: Vec<_> = msgs
        .iter()
        .filter_map(|msg| match &msg.body {
            OfpBody::MeterMod(mm) if mm.command == MeterModCommand::Add => Some(&mm.meter),
            _ => None,
        })
        .collect();
    assert_eq!(meter_adds.len(), 2);
    let catalog_meter = meter_adds.iter().find(|m| m.meter_id == meter_id).unwrap();
    assert!(catalog_meter
        .flags
        .contains(MeterFlags::PKTPS | MeterFlags::STATS | MeterFlags::BURST));
    assert_eq!(catalog_meter.bands[0].rate, 500);
    let inline_meter = meter_adds.iter().find(|m| m.meter_id == inline_id).unwrap();
    assert!(inline_meter.flags.contains(MeterFlags::KBPS));
    assert_eq!(inline_meter.bands[0].rate, 300);

    // Dropping the source makes everything stale; the next put deletes it
    // from the switch.
    h.ctrl.remove_flows(&mut h.desired, &sb);
    let (msgs, _) = h.put_batch(2, true);
    let deletes = msgs
        .iter()
        .filter(|msg| {
            matches!(&msg.body,
                OfpBody::GroupMod(gm) if gm.command == GroupModCommand::Delete)
                || matches!(&msg.body,
                    OfpBody::MeterMod(mm) if mm.command == MeterModCommand::Delete)
        })
        .count();
    assert_eq!(deletes, 3);
    Ok(())
}

#[test]
#[traced_test]
fn bad_meter_spec_is_skipped_not_fatal() -> Result<()> {
    let mut h = Harness::new();
    let sb = Uuid::new_v4();
    h.settle(0);
    // Catalog miss: nothing to encode, but the rest of the batch goes out.
    h.ctrl.meters_mut().add_desired(sb, "no-such-meter");
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), sb, true);

    let (msgs, _) = h.put_batch(1, true);
    assert!(msgs.iter().all(|msg| msg.ofptype() != OfpType::MeterMod));
    assert_eq!(flow_mods(&msgs).len(), 1);
    assert!(logs_contain("could not find meter named"));
    Ok(())
}

#[test]
#[traced_test]
fn echo_requests_are_answered_in_any_state() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.reply(77, OfpBody::EchoRequest(b"ping".to_vec()));
    h.run();
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].xid, 77);
    assert_eq!(sent[0].body, OfpBody::EchoReply(b"ping".to_vec()));
    Ok(())
}

#[test]
#[traced_test]
fn put_waits_for_the_transport_to_drain() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    h.put(1, true);
    assert!(!h.ctrl.can_put());

    // A second put while the first batch is still buffered is deferred.
    h.desired.add(0, 100, 2, m("in_port=2"), Ofpacts::parse("drop"), Uuid::new_v4(), true);
    h.put(1, true);
    let first = h.drain();
    assert_eq!(
        first.iter().filter(|msg| msg.ofptype() == OfpType::BarrierRequest).count(),
        1
    );
    assert_eq!(flow_mods(&first).len(), 1);

    // Once the transport drains, the deferred work goes out even though
    // nothing changed since.
    h.put(1, false);
    let second = h.drain();
    assert_eq!(flow_mods(&second).len(), 1);
    assert_eq!(second.last().map(OfpMsg::ofptype), Some(OfpType::BarrierRequest));
    Ok(())
}

#[test]
#[traced_test]
fn inject_pkt_sends_a_packet_out() -> Result<()> {
    let mut h = Harness::new();
    h.settle(0);
    h.ctrl.inject_pkt(&bridge(), "lp1", &no_args(), &no_args())?;

    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    match &sent[0].body {
        OfpBody::PacketOut(po) => {
            assert_eq!(po.in_port, 5);
            assert_eq!(po.packet.len(), 64);
            assert!(po.ofpacts.equivalent(&Ofpacts::resubmit_in_port(0)));
        }
        other => panic!("unexpected body {other:?}"),
    }
    Ok(())
}

#[test]
#[traced_test]
fn inject_pkt_reports_unknown_ports_and_dead_channels() -> Result<()> {
    let mut h = Harness::new();
    let error = h
        .ctrl
        .inject_pkt(&bridge(), "lp1", &no_args(), &no_args())
        .unwrap_err();
    assert!(error.to_string().contains("channel not ready"));

    h.settle(0);
    let error = h
        .ctrl
        .inject_pkt(&bridge(), "no-such-port", &no_args(), &no_args())
        .unwrap_err();
    assert!(error.to_string().contains("ingress port not found"));
    assert!(h.drain().is_empty());
    Ok(())
}

#[test]
#[traced_test]
fn lookup_port_matches_the_bridge_record() {
    assert_eq!(lookup_port(&bridge(), "lp1"), Some(5));
    assert_eq!(lookup_port(&bridge(), "lp9"), None);
}

#[test]
#[traced_test]
fn convergence_after_acknowledged_put() -> Result<()> {
    let mut h = Harness::new();
    let (sb1, sb2) = (Uuid::new_v4(), Uuid::new_v4());
    h.desired.add(0, 100, 1, m("in_port=1"), Ofpacts::parse("output:2"), sb1, true);
    h.desired.add(1, 50, 2, m("ip"), Ofpacts::parse("drop"), sb2, true);
    h.settle(0);

    let (_, barrier) = h.put_batch(1, true);
    h.reply(barrier, OfpBody::BarrierReply);
    h.run();

    // Every desired flow has an installed twin carrying its primary's
    // value, and nothing installed lacks a covering desired flow.
    assert_eq!(h.ctrl.installed().len(), h.desired.len());
    for (id, d) in h.desired.iter() {
        let installed_key = d.installed_key().expect("desired flow is linked");
        let installed = h.ctrl.installed().lookup(installed_key).expect("linked key exists");
        assert!(installed.desired_refs().contains(&id));
        let primary = installed.primary().unwrap();
        assert!(installed.ofpacts().equivalent(&h.desired.get(primary).unwrap().flow().ofpacts));
    }
    Ok(())
}
