use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Error raised when a match, group or meter specification string does not
/// parse.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SpecParseError(pub String);

/// An OpenFlow wildcarded match in its canonical decoded form.
///
/// A match is a set of `field[=value]` terms.  Construction normalizes the
/// textual form (terms sorted and deduplicated), so equality and hashing are
/// well defined regardless of how the caller ordered the terms.  Callers
/// treat the contents as opaque.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Match {
    fields: BTreeMap<String, String>,
}

impl Match {
    /// The match that matches every packet.
    pub fn catchall() -> Match {
        Match::default()
    }

    pub fn is_catchall(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses `s` as a comma-separated list of `field[=value]` terms.
    pub fn parse(s: &str) -> Result<Match, SpecParseError> {
        let mut fields = BTreeMap::new();
        for term in s.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            match term.split_once('=') {
                Some((name, value)) => {
                    if name.is_empty() {
                        return Err(SpecParseError(format!("bad match term \"{term}\"")));
                    }
                    fields.insert(name.into(), value.into());
                }
                None => {
                    fields.insert(term.into(), String::new());
                }
            }
        }
        Ok(Match { fields })
    }

    /// A stable 32-bit hash of the canonical form.
    pub fn hash32(&self) -> u32 {
        let mut hasher = DefaultHasher::new();
        self.fields.hash(&mut hasher);
        hasher.finish() as u32
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "*");
        }
        let mut sep = "";
        for (name, value) in &self.fields {
            if value.is_empty() {
                write!(f, "{sep}{name}")?;
            } else {
                write!(f, "{sep}{name}={value}")?;
            }
            sep = ",";
        }
        Ok(())
    }
}

/// An opaque action blob in the codec's normalized encoding.
///
/// Concatenation preserves order; two blobs are interchangeable on the
/// switch iff [`Ofpacts::equivalent`] holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Ofpacts(Vec<u8>);

impl Ofpacts {
    pub fn new() -> Ofpacts {
        Ofpacts::default()
    }

    /// Builds an action blob from its textual form.  Normalization is
    /// whitespace trimming only; the codec's encoding is already canonical.
    pub fn parse(s: &str) -> Ofpacts {
        Ofpacts(s.trim().as_bytes().to_vec())
    }

    /// The single action `resubmit(IN_PORT, table)` used by packet
    /// injection.
    pub fn resubmit_in_port(table: u8) -> Ofpacts {
        Ofpacts(format!("resubmit(IN_PORT,{table})").into_bytes())
    }

    /// The codec's semantic equality: byte equality over the normalized
    /// encoding.
    pub fn equivalent(&self, other: &Ofpacts) -> bool {
        self.0 == other.0
    }

    /// Appends `other` after the existing actions, preserving order.
    pub fn append(&mut self, other: &Ofpacts) {
        if other.0.is_empty() {
            return;
        }
        if !self.0.is_empty() {
            self.0.push(b',');
        }
        self.0.extend_from_slice(&other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Ofpacts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

pub const OFPTT_ALL: u8 = 0xff;
pub const OFPP_MAX: u16 = 0xff00;
pub const OFPP_IN_PORT: u16 = 0xfff8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCommand {
    Add,
    Modify { strict: bool },
    Delete { strict: bool },
}

/// A decoded flow table modification message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub table_id: u8,
    pub priority: u16,
    pub match_: Match,
    pub ofpacts: Ofpacts,
    pub cookie: u64,
    /// Whether the cookie of an existing entry is replaced.  Strict modify
    /// cannot change a cookie, so callers that need to must use `Add`.
    pub modify_cookie: bool,
    pub command: FlowModCommand,
}

impl FlowMod {
    /// The flow-mod that deletes every flow in every table.
    pub fn delete_all() -> FlowMod {
        FlowMod {
            table_id: OFPTT_ALL,
            priority: 0,
            match_: Match::catchall(),
            ofpacts: Ofpacts::new(),
            cookie: 0,
            modify_cookie: false,
            command: FlowModCommand::Delete { strict: false },
        }
    }
}
