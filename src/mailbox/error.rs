use thiserror::Error;

use crate::{message::CodecError, repository::Uid, store::StoreError};

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("message is already stored as {0}")]
    AlreadyAssigned(Uid),
    #[error("no message with uid {uid} in this mailbox")]
    NoSuchMessage { uid: Uid },
    #[error("message {uid} is not at sequence number {sequence_number}")]
    UidMismatch { uid: Uid, sequence_number: u32 },
    #[error("time received of message {uid} cannot change")]
    ReceivedTimeChanged { uid: Uid },
    #[error("slot of message {uid} is held by an entry outside this mailbox")]
    SlotOccupied { uid: Uid },
    #[error("store handed out invalid id {0}")]
    InvalidId(u64),
    #[error("sequence number {0} does not exist")]
    InvalidSequenceNumber(u64),
}
