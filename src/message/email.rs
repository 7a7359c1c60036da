use derive_builder::Builder;
use enumflags2::BitFlags;
use jiff::Timestamp;

use crate::repository::{Flag, Uid};

/// A message as the mail protocol layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct Email {
    #[builder(default)]
    uid: Option<Uid>,
    #[builder(default)]
    sequence_number: u32,
    #[builder(default)]
    flags: BitFlags<Flag>,
    #[builder(default = "Timestamp::now()")]
    date: Timestamp,
    #[builder(default)]
    from: String,
    #[builder(default)]
    to: String,
    #[builder(default)]
    subject: String,
    #[builder(default)]
    body: String,
}

impl Email {
    pub fn uid(&self) -> Option<Uid> {
        self.uid
    }

    /// Only valid until the mailbox is modified.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn flags(&self) -> BitFlags<Flag> {
        self.flags
    }

    pub fn set_flags(&mut self, flags: BitFlags<Flag>) {
        self.flags = flags;
    }

    pub fn insert_flags(&mut self, flags: impl Into<BitFlags<Flag>>) {
        self.flags.insert(flags);
    }

    pub fn date(&self) -> Timestamp {
        self.date
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
