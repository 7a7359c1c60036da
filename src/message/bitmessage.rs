use std::str;

use enumflags2::BitFlags;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    message::{Email, EmailBuilder, EmailBuilderError},
    repository::{Flag, Uid},
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not (de)serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("payload is not valid {0:?} content")]
    InvalidPayload(Encoding),
    #[error("message has no {0} address")]
    MissingAddress(&'static str),
    #[error("message carries no content")]
    NoContent,
    #[error(transparent)]
    Incomplete(#[from] EmailBuilderError),
}

/// Payload encodings defined by the messaging network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Ignore,
    Trivial,
    Simple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    encoding: Encoding,
    content: Vec<u8>,
}

const SUBJECT_PREFIX: &str = "Subject:";
const BODY_SEPARATOR: &str = "\nBody:";

impl Payload {
    pub fn simple(subject: &str, body: &str) -> Self {
        Self {
            encoding: Encoding::Simple,
            content: format!("{SUBJECT_PREFIX}{subject}{BODY_SEPARATOR}{body}").into_bytes(),
        }
    }

    pub fn trivial(body: &str) -> Self {
        Self {
            encoding: Encoding::Trivial,
            content: body.as_bytes().to_vec(),
        }
    }

    pub fn raw(encoding: Encoding, content: Vec<u8>) -> Self {
        Self { encoding, content }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Payload carrying `subject` and `body`. Keeps `self` untouched when it
    /// already holds that text and keeps the encoding where it can express it.
    #[must_use]
    pub fn with_text(&self, subject: &str, body: &str) -> Self {
        match self.subject_and_body() {
            Ok(text) if text == (subject, body) => self.clone(),
            _ if self.encoding == Encoding::Trivial && subject.is_empty() => Self::trivial(body),
            _ => Self::simple(subject, body),
        }
    }

    fn subject_and_body(&self) -> Result<(&str, &str), CodecError> {
        let text =
            str::from_utf8(&self.content).map_err(|_| CodecError::InvalidPayload(self.encoding));
        match self.encoding {
            Encoding::Ignore => Err(CodecError::NoContent),
            Encoding::Trivial => Ok(("", text?)),
            Encoding::Simple => text?
                .strip_prefix(SUBJECT_PREFIX)
                .and_then(|rest| rest.split_once(BODY_SEPARATOR))
                .ok_or(CodecError::InvalidPayload(self.encoding)),
        }
    }
}

/// Delivery bookkeeping of a message on the messaging network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageState {
    /// Index of the outstanding proof-of-work job, if one was queued.
    pub pow_index: Option<u64>,
    pub ack_expected: bool,
    pub ack_received: bool,
    pub pubkey_request_outstanding: bool,
    pub send_tries: u32,
    pub last_send: Option<Timestamp>,
    /// Whether the message came in from the network rather than from a mail client.
    pub received: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImapData {
    // the uid is the store key and the sequence number is positional, neither is persisted
    #[serde(skip)]
    pub uid: Option<Uid>,
    #[serde(skip)]
    pub sequence_number: u32,
    pub flags: BitFlags<Flag>,
    pub time_received: Timestamp,
}

impl ImapData {
    pub fn new(flags: BitFlags<Flag>) -> Self {
        Self {
            uid: None,
            sequence_number: 0,
            flags,
            time_received: Timestamp::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmessage {
    pub from: String,
    pub to: String,
    pub payload: Payload,
    pub ack: Option<Vec<u8>>,
    pub state: MessageState,
    pub imap: ImapData,
}

impl Bitmessage {
    pub fn new(from: impl Into<String>, to: impl Into<String>, payload: Payload) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            payload,
            ack: None,
            state: MessageState::default(),
            imap: ImapData::new(BitFlags::empty()),
        }
    }

    #[must_use]
    pub fn with_ack(mut self, ack: Vec<u8>) -> Self {
        self.ack = Some(ack);
        self
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Builds a message from mail submitted by a client. Drafts may lack
    /// sender and recipient.
    pub fn from_email(email: &Email, draft: bool) -> Result<Self, CodecError> {
        if !draft {
            if email.from().is_empty() {
                return Err(CodecError::MissingAddress("from"));
            }
            if email.to().is_empty() {
                return Err(CodecError::MissingAddress("to"));
            }
        }

        Ok(Self {
            from: email.from().to_string(),
            to: email.to().to_string(),
            payload: Payload::simple(email.subject(), email.body()),
            ack: None,
            state: MessageState::default(),
            imap: ImapData {
                uid: email.uid(),
                sequence_number: email.sequence_number(),
                flags: email.flags(),
                time_received: email.date(),
            },
        })
    }

    pub fn to_email(&self) -> Result<Email, CodecError> {
        let (subject, body) = self.payload.subject_and_body()?;

        Ok(EmailBuilder::default()
            .uid(self.imap.uid)
            .sequence_number(self.imap.sequence_number)
            .flags(self.imap.flags)
            .date(self.imap.time_received)
            .from(self.from.as_str())
            .to(self.to.as_str())
            .subject(subject)
            .body(body)
            .build()?)
    }
}
