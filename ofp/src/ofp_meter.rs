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

use bitflags::bitflags;

pub const OFPM_ALL: u32 = 0xffffffff;

/// Meter entries whose name starts with this prefix describe the meter
/// inline: the specification text begins at byte
/// [`METER_STRING_SPEC_OFFSET`] of the name.  Everything else is a name to
/// resolve against the external meter catalog.
pub const METER_STRING_PREFIX: &str = "__string: ";
pub const METER_STRING_SPEC_OFFSET: usize = 52;

bitflags! {
    pub struct MeterFlags: u16 {
        const KBPS  = 1 << 0;
        const PKTPS = 1 << 1;
        const BURST = 1 << 2;
        const STATS = 1 << 3;
    }
}

/// A single drop band.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct MeterBand {
    pub rate: u32,
    pub burst_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Meter {
    pub meter_id: u32,
    pub flags: MeterFlags,
    pub bands: Vec<MeterBand>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeterModCommand {
    Add,
    Delete,
}

/// A decoded meter table modification message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterMod {
    pub command: MeterModCommand,
    pub meter: Meter,
}

impl MeterMod {
    /// Parses a meter specification of the form
    /// `meter=N,<kbps|pktps>[,burst][,stats],band=type=drop,rate=N[,burst_size=N]…`.
    pub fn parse(s: &str, command: MeterModCommand) -> Result<MeterMod, SpecParseError> {
        let mut meter_id = None;
        let mut flags = MeterFlags::empty();
        let mut bands: Vec<MeterBand> = Vec::new();

        for term in s.split(',') {
            let term = term.trim();
            match term {
                "" => continue,
                "kbps" => flags |= MeterFlags::KBPS,
                "pktps" => flags |= MeterFlags::PKTPS,
                "burst" => flags |= MeterFlags::BURST,
                "stats" => flags |= MeterFlags::STATS,
                "band=type=drop" => bands.push(MeterBand::default()),
                _ => {
                    if let Some(v) = term.strip_prefix("meter=") {
                        meter_id = v.parse::<u32>().ok();
                        if meter_id.is_none() {
                            return Err(SpecParseError(format!("bad meter id in \"{s}\"")));
                        }
                    } else if let Some(v) = term.strip_prefix("rate=") {
                        let band = bands
                            .last_mut()
                            .ok_or_else(|| SpecParseError(format!("rate outside band in \"{s}\"")))?;
                        band.rate = v
                            .parse()
                            .map_err(|_| SpecParseError(format!("bad rate in \"{s}\"")))?;
                    } else if let Some(v) = term.strip_prefix("burst_size=") {
                        let band = bands.last_mut().ok_or_else(|| {
                            SpecParseError(format!("burst_size outside band in \"{s}\""))
                        })?;
                        band.burst_size = v
                            .parse()
                            .map_err(|_| SpecParseError(format!("bad burst_size in \"{s}\"")))?;
                    } else {
                        return Err(SpecParseError(format!("unknown meter term \"{term}\"")));
                    }
                }
            }
        }

        let meter_id =
            meter_id.ok_or_else(|| SpecParseError(format!("meter spec \"{s}\" has no id")))?;
        if command == MeterModCommand::Add {
            if !(flags.contains(MeterFlags::KBPS) ^ flags.contains(MeterFlags::PKTPS)) {
                return Err(SpecParseError(format!("meter \"{s}\" needs exactly one unit")));
            }
            if bands.is_empty() {
                return Err(SpecParseError(format!("meter \"{s}\" has no bands")));
            }
        }
        Ok(MeterMod { command, meter: Meter { meter_id, flags, bands } })
    }

    pub fn delete(meter_id: u32) -> MeterMod {
        MeterMod {
            command: MeterModCommand::Delete,
            meter: Meter { meter_id, flags: MeterFlags::empty(), bands: Vec::new() },
        }
    }

    /// The meter-mod that deletes every meter.
    pub fn delete_all() -> MeterMod {
        MeterMod::delete(OFPM_ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_add() {
        let mm = MeterMod::parse(
            "meter=3,pktps,burst,band=type=drop,rate=500,burst_size=100",
            MeterModCommand::Add,
        )
        .unwrap();
        assert_eq!(mm.meter.meter_id, 3);
        assert!(mm.meter.flags.contains(MeterFlags::PKTPS | MeterFlags::BURST));
        assert_eq!(mm.meter.bands, vec![MeterBand { rate: 500, burst_size: 100 }]);
    }

    #[test]
    fn unit_is_required_and_exclusive() {
        assert!(MeterMod::parse("meter=1,band=type=drop,rate=5", MeterModCommand::Add).is_err());
        assert!(MeterMod::parse(
            "meter=1,kbps,pktps,band=type=drop,rate=5",
            MeterModCommand::Add
        )
        .is_err());
    }

    #[test]
    fn rate_needs_a_band() {
        assert!(MeterMod::parse("meter=1,kbps,rate=5", MeterModCommand::Add).is_err());
    }
}
