mod ack;
mod error;
mod imap;
mod mailbox;
mod mutation;
mod query;

pub use error::MailboxError;
pub use imap::ImapMailbox;
pub use mailbox::Filter;
pub use mailbox::Mailbox;
