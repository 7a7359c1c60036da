use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use enumflags2::{BitFlags, bitflags};
use log::trace;
use thiserror::Error;

/// IMAP system flags.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
// Stored as bits with every message. Only ever append new variants.
pub enum Flag {
    Draft,
    Flagged,
    Answered,
    Seen,
    Deleted,
    Recent,
}

impl Flag {
    pub fn name(self) -> &'static str {
        match self {
            Flag::Draft => r"\Draft",
            Flag::Flagged => r"\Flagged",
            Flag::Answered => r"\Answered",
            Flag::Seen => r"\Seen",
            Flag::Deleted => r"\Deleted",
            Flag::Recent => r"\Recent",
        }
    }

    /// Space separated flag names, `None` if there are no flags.
    pub fn join(flags: BitFlags<Self>) -> Option<String> {
        (!flags.is_empty()).then(|| {
            flags
                .iter()
                .map(Flag::name)
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown flag {0}")]
pub struct UnknownFlagError(String);

impl FromStr for Flag {
    type Err = UnknownFlagError;

    /// Flag names are case-insensitive.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BitFlags::<Flag>::all()
            .iter()
            .find(|flag| flag.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                trace!("no system flag named {value}");
                UnknownFlagError(value.to_string())
            })
    }
}
