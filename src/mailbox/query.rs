use std::ops::ControlFlow;

use log::trace;

use crate::{
    mailbox::{
        Mailbox, MailboxError,
        mailbox::{BITMESSAGE_SUFFIX, Cache},
    },
    message::Bitmessage,
    repository::{SequenceSet, SetValue, Uid},
    store::Folder,
};

impl<F: Folder> Mailbox<F> {
    pub fn bitmessage_by_uid(&self, uid: Uid) -> Result<Option<Bitmessage>, MailboxError> {
        let cache = self.read();
        self.fetch(&cache, uid)
    }

    pub fn bitmessage_by_sequence_number(
        &self,
        sequence_number: u32,
    ) -> Result<Option<Bitmessage>, MailboxError> {
        let cache = self.read();
        self.by_sequence_number(&cache, sequence_number)
    }

    /// Messages with uids between `start` and `end`, both inclusive.
    pub fn bitmessages_by_uid_range(
        &self,
        start: Uid,
        end: Uid,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        let cache = self.read();
        self.uid_range(&cache, start, end)
    }

    pub fn bitmessages_since_uid(&self, start: Uid) -> Result<Vec<Bitmessage>, MailboxError> {
        let cache = self.read();
        self.since_uid(&cache, start)
    }

    /// Messages between two sequence numbers, both inclusive. Empty unless
    /// `1 <= start <= end <= messages`.
    pub fn bitmessages_by_sequence_range(
        &self,
        start: u32,
        end: u32,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        let cache = self.read();
        self.sequence_range(&cache, start, end)
    }

    pub fn bitmessages_since_sequence_number(
        &self,
        start: u32,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        let cache = self.read();
        self.since_sequence_number(&cache, start)
    }

    /// Resolves a set of uid ranges. Results keep the order of the set and
    /// are neither sorted nor deduplicated. Uids without a message are left out.
    pub fn bitmessage_set_by_uid(&self, set: &SequenceSet) -> Result<Vec<Bitmessage>, MailboxError> {
        let cache = self.read();
        let mut messages = Vec::new();
        if cache.uids.is_empty() {
            return Ok(messages);
        }

        for range in set.ranges() {
            let SetValue::Number(start) = range.start() else {
                messages.extend(self.last_message(&cache)?);
                continue;
            };
            let start = Uid::from(start);

            match range.end() {
                None => messages.extend(self.fetch(&cache, start)?),
                Some(SetValue::Last) => messages.extend(self.since_uid(&cache, start)?),
                Some(SetValue::Number(end)) => {
                    messages.extend(self.uid_range(&cache, start, Uid::from(end))?);
                }
            }
        }
        Ok(messages)
    }

    /// Resolves a set of sequence number ranges like [`Mailbox::bitmessage_set_by_uid`].
    ///
    /// Fails if a range starts outside of the mailbox.
    pub fn bitmessage_set_by_sequence_number(
        &self,
        set: &SequenceSet,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        let cache = self.read();
        let mut messages = Vec::new();
        if cache.uids.is_empty() {
            return Ok(messages);
        }

        for range in set.ranges() {
            let SetValue::Number(start) = range.start() else {
                messages.extend(self.last_message(&cache)?);
                continue;
            };
            let start = u32::try_from(start.get())
                .ok()
                .filter(|start| *start <= cache.uids.count())
                .ok_or(MailboxError::InvalidSequenceNumber(start.get()))?;

            match range.end() {
                None => messages.extend(self.by_sequence_number(&cache, start)?),
                Some(SetValue::Last) => {
                    messages.extend(self.since_sequence_number(&cache, start)?);
                }
                Some(SetValue::Number(end)) => {
                    let end = u32::try_from(end.get()).unwrap_or(u32::MAX);
                    messages.extend(self.sequence_range(&cache, start, end)?);
                }
            }
        }
        Ok(messages)
    }

    fn by_sequence_number(
        &self,
        cache: &Cache,
        sequence_number: u32,
    ) -> Result<Option<Bitmessage>, MailboxError> {
        match cache.uids.get_by_sequence_number(sequence_number) {
            Some(uid) => self.fetch(cache, uid),
            None => Ok(None),
        }
    }

    fn last_message(&self, cache: &Cache) -> Result<Option<Bitmessage>, MailboxError> {
        match cache.uids.last() {
            Some(uid) => self.fetch(cache, *uid),
            None => Ok(None),
        }
    }

    fn uid_range(&self, cache: &Cache, start: Uid, end: Uid) -> Result<Vec<Bitmessage>, MailboxError> {
        let start_sequence = cache.uids.sequence_number(start);
        let end_sequence = cache.uids.sequence_number(end);
        if start_sequence > end_sequence {
            return Ok(Vec::new());
        }
        self.scan(start, end, start_sequence)
    }

    fn since_uid(&self, cache: &Cache, start: Uid) -> Result<Vec<Bitmessage>, MailboxError> {
        self.since(cache, start, cache.uids.sequence_number(start))
    }

    fn sequence_range(
        &self,
        cache: &Cache,
        start: u32,
        end: u32,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        if start < 1 || start > end || end > cache.uids.count() {
            return Ok(Vec::new());
        }
        match (
            cache.uids.get_by_sequence_number(start),
            cache.uids.get_by_sequence_number(end),
        ) {
            (Some(start_uid), Some(end_uid)) => self.scan(start_uid, end_uid, start),
            _ => Ok(Vec::new()),
        }
    }

    fn since_sequence_number(
        &self,
        cache: &Cache,
        start: u32,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        match cache.uids.get_by_sequence_number(start) {
            Some(start_uid) => self.since(cache, start_uid, start),
            None => Ok(Vec::new()),
        }
    }

    fn since(
        &self,
        cache: &Cache,
        start: Uid,
        start_sequence: u32,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        match cache.uids.last() {
            Some(last) => self.scan(start, *last, start_sequence),
            None => Ok(Vec::new()),
        }
    }

    /// Loads the stored messages between two uids, numbering them from
    /// `start_sequence` on. The numbers are not checked against the index.
    pub(super) fn scan(
        &self,
        start: Uid,
        end: Uid,
        start_sequence: u32,
    ) -> Result<Vec<Bitmessage>, MailboxError> {
        let mut messages = Vec::new();
        if start > end {
            return Ok(messages);
        }

        let mut sequence_number = start_sequence;
        self.folder()
            .for_each_message(start.get()..=end.get(), BITMESSAGE_SUFFIX, &mut |id, _, content| {
                let Some(mut message) = self.decode(id, content) else {
                    return ControlFlow::Continue(());
                };
                if !self.contains(&message) {
                    return ControlFlow::Continue(());
                }
                message.imap.uid = Uid::try_from(id).ok();
                message.imap.sequence_number = sequence_number;
                sequence_number += 1;
                messages.push(message);
                ControlFlow::Continue(())
            })?;

        trace!("loaded {} messages between {start} and {end}", messages.len());
        Ok(messages)
    }
}
