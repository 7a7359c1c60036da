use std::{
    fmt::{self, Debug, Formatter},
    ops::ControlFlow,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, error, warn};

use crate::{
    mailbox::MailboxError,
    message::{Bitmessage, Email, EmailBuilder},
    repository::{Flag, MessageSequence, Uid},
    store::{Folder, StoreError},
};

/// Store suffix of entries holding an encoded [`Bitmessage`]. Entries with any
/// other suffix are invisible to mailboxes.
pub(super) const BITMESSAGE_SUFFIX: u64 = 2;

/// Membership test of a virtual mailbox sharing storage with other views.
pub type Filter = Box<dyn Fn(&Bitmessage) -> bool + Send + Sync>;

#[derive(Debug, Default)]
pub(super) struct Cache {
    pub(super) uids: MessageSequence,
    pub(super) recent: u32,
    pub(super) unseen: u32,
    pub(super) next_uid: u64,
}

/// IMAP view of one folder of the message store.
///
/// The store is the source of truth. The mailbox keeps an ordered index of
/// the uids it considers visible together with recent and unseen counts, all
/// behind a single lock. Methods taking a `&Cache` or `&mut Cache` expect
/// their caller to hold that lock.
pub struct Mailbox<F> {
    folder: F,
    filter: Option<Filter>,
    drafts: bool,
    cache: RwLock<Cache>,
}

impl<F: Folder> Debug for Mailbox<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let cache = self.read();
        f.debug_struct("Mailbox")
            .field("name", &self.name())
            .field("drafts", &self.drafts)
            .field("filtered", &self.filter.is_some())
            .field("messages", &cache.uids.count())
            .field("recent", &cache.recent)
            .field("unseen", &cache.unseen)
            .field("next_uid", &cache.next_uid)
            .finish()
    }
}

impl<F: Folder> Mailbox<F> {
    pub fn new(folder: F) -> Result<Self, MailboxError> {
        Self::build(folder, None, false)
    }

    /// Mailbox accepting incomplete mail from clients.
    pub fn drafts(folder: F) -> Result<Self, MailboxError> {
        Self::build(folder, None, true)
    }

    /// Mailbox showing only those messages of `folder` that pass `filter`.
    pub fn with_filter(
        folder: F,
        filter: impl Fn(&Bitmessage) -> bool + Send + Sync + 'static,
    ) -> Result<Self, MailboxError> {
        Self::build(folder, Some(Box::new(filter)), false)
    }

    fn build(folder: F, filter: Option<Filter>, drafts: bool) -> Result<Self, MailboxError> {
        let mailbox = Self {
            folder,
            filter,
            drafts,
            cache: RwLock::new(Cache::default()),
        };
        mailbox.refresh()?;
        Ok(mailbox)
    }

    pub fn name(&self) -> &str {
        self.folder.name()
    }

    pub fn is_drafts(&self) -> bool {
        self.drafts
    }

    /// The uid that will likely be assigned to the next stored message.
    pub fn next_uid(&self) -> u64 {
        self.read().next_uid
    }

    /// Uid of the last message, or [`Mailbox::next_uid`] if the mailbox is empty.
    pub fn last_uid(&self) -> u64 {
        let cache = self.read();
        cache.uids.last().map_or(cache.next_uid, |uid| uid.get())
    }

    pub fn recent(&self) -> u32 {
        self.read().recent
    }

    pub fn unseen(&self) -> u32 {
        self.read().unseen
    }

    /// Number of messages in the mailbox.
    pub fn messages(&self) -> u32 {
        self.read().uids.count()
    }

    pub fn uids(&self) -> MessageSequence {
        self.read().uids.clone()
    }

    /// Empty mail to be filled in by a client and handed to `save_email`.
    pub fn new_message(&self) -> Email {
        EmailBuilder::default()
            .flags(Flag::Recent)
            .build()
            .expect("all email fields have defaults")
    }

    /// Rescans the store, rebuilding the index and both counts.
    pub fn refresh(&self) -> Result<(), MailboxError> {
        let mut cache = self.write();
        self.refresh_cache(&mut cache)
    }

    pub(super) fn refresh_cache(&self, cache: &mut Cache) -> Result<(), MailboxError> {
        let next_uid = self.folder.next_id()?;
        let mut uids = Vec::new();
        let mut recent = 0;
        let mut unseen = 0;

        self.folder
            .for_each_message(0..=u64::MAX, BITMESSAGE_SUFFIX, &mut |id, _, content| {
                let Some(message) = self.decode(id, content) else {
                    return ControlFlow::Continue(());
                };
                if !self.contains(&message) {
                    return ControlFlow::Continue(());
                }
                let Ok(uid) = Uid::try_from(id) else {
                    warn!("ignoring message with id 0 in {}", self.name());
                    return ControlFlow::Continue(());
                };

                if message.imap.flags.contains(Flag::Recent) {
                    recent += 1;
                }
                if !message.imap.flags.contains(Flag::Seen) {
                    unseen += 1;
                }
                uids.push(uid);
                ControlFlow::Continue(())
            })?;

        *cache = Cache {
            uids: MessageSequence::from_unsorted(uids),
            recent,
            unseen,
            next_uid,
        };
        debug!(
            "refreshed {}: {} messages, {recent} recent, {unseen} unseen",
            self.name(),
            cache.uids.count()
        );
        Ok(())
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache
            .read()
            .expect("mailbox cache lock should be acquirable")
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache
            .write()
            .expect("mailbox cache lock should be acquirable")
    }

    pub(super) fn folder(&self) -> &F {
        &self.folder
    }

    pub(super) fn contains(&self, message: &Bitmessage) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(message))
    }

    /// Decodes an entry met during a scan. Undecodable entries are logged and skipped.
    pub(super) fn decode(&self, id: u64, content: &[u8]) -> Option<Bitmessage> {
        Bitmessage::decode(content)
            .inspect_err(|e| error!("could not decode message {id} in {}: {e}", self.name()))
            .ok()
    }

    /// Loads the indexed message with `uid`, with uid and sequence number set.
    pub(super) fn fetch(&self, cache: &Cache, uid: Uid) -> Result<Option<Bitmessage>, MailboxError> {
        let Some(sequence_number) = cache.uids.find(uid) else {
            return Ok(None);
        };

        let (suffix, content) = match self.folder.get_message(uid.get()) {
            Ok(entry) => entry,
            Err(StoreError::NotFound(_)) => {
                warn!("message {uid} vanished from {}", self.name());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if suffix != BITMESSAGE_SUFFIX {
            error!(
                "message {uid} in {} has suffix {suffix}, expected {BITMESSAGE_SUFFIX}",
                self.name()
            );
            return Ok(None);
        }

        let mut message = Bitmessage::decode(&content)?;
        message.imap.uid = Some(uid);
        message.imap.sequence_number = sequence_number;
        Ok(Some(message))
    }
}
