use log::error;

use crate::{
    mailbox::{Mailbox, MailboxError},
    message::{Bitmessage, Email},
    repository::{SequenceSet, Uid},
    store::Folder,
};

/// Mailbox operations needed by an IMAP server.
pub trait ImapMailbox {
    fn name(&self) -> &str;

    fn next_uid(&self) -> u64;

    fn last_uid(&self) -> u64;

    fn recent(&self) -> u32;

    fn messages(&self) -> u32;

    fn unseen(&self) -> u32;

    fn message_by_sequence_number(&self, sequence_number: u32) -> Result<Option<Email>, MailboxError>;

    fn message_by_uid(&self, uid: Uid) -> Result<Option<Email>, MailboxError>;

    fn message_set_by_uid(&self, set: &SequenceSet) -> Result<Vec<Email>, MailboxError>;

    fn message_set_by_sequence_number(&self, set: &SequenceSet)
    -> Result<Vec<Email>, MailboxError>;

    fn save(&self, email: &Email) -> Result<Uid, MailboxError>;

    fn delete_flagged_messages(&self) -> Result<Vec<Email>, MailboxError>;

    fn new_message(&self) -> Email;
}

// mail that cannot be converted is left out of set results
fn to_emails(messages: Vec<Bitmessage>) -> Vec<Email> {
    messages
        .into_iter()
        .filter_map(|message| {
            message
                .to_email()
                .inspect_err(|e| {
                    error!(
                        "could not convert message {:?} to mail: {e}",
                        message.imap.uid
                    );
                })
                .ok()
        })
        .collect()
}

impl<F: Folder> ImapMailbox for Mailbox<F> {
    fn name(&self) -> &str {
        Mailbox::name(self)
    }

    fn next_uid(&self) -> u64 {
        Mailbox::next_uid(self)
    }

    fn last_uid(&self) -> u64 {
        Mailbox::last_uid(self)
    }

    fn recent(&self) -> u32 {
        Mailbox::recent(self)
    }

    fn messages(&self) -> u32 {
        Mailbox::messages(self)
    }

    fn unseen(&self) -> u32 {
        Mailbox::unseen(self)
    }

    fn message_by_sequence_number(&self, sequence_number: u32) -> Result<Option<Email>, MailboxError> {
        self.bitmessage_by_sequence_number(sequence_number)?
            .map(|message| message.to_email())
            .transpose()
            .map_err(MailboxError::from)
    }

    fn message_by_uid(&self, uid: Uid) -> Result<Option<Email>, MailboxError> {
        self.bitmessage_by_uid(uid)?
            .map(|message| message.to_email())
            .transpose()
            .map_err(MailboxError::from)
    }

    fn message_set_by_uid(&self, set: &SequenceSet) -> Result<Vec<Email>, MailboxError> {
        Ok(to_emails(self.bitmessage_set_by_uid(set)?))
    }

    fn message_set_by_sequence_number(
        &self,
        set: &SequenceSet,
    ) -> Result<Vec<Email>, MailboxError> {
        Ok(to_emails(self.bitmessage_set_by_sequence_number(set)?))
    }

    fn save(&self, email: &Email) -> Result<Uid, MailboxError> {
        self.save_email(email)
    }

    fn delete_flagged_messages(&self) -> Result<Vec<Email>, MailboxError> {
        self.delete_flagged()
    }

    fn new_message(&self) -> Email {
        Mailbox::new_message(self)
    }
}
