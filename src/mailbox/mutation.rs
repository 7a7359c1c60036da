use enumflags2::BitFlags;
use log::{debug, error, info, trace, warn};

use crate::{
    mailbox::{
        Mailbox, MailboxError,
        mailbox::{BITMESSAGE_SUFFIX, Cache},
    },
    message::{Bitmessage, Email, ImapData},
    repository::{Flag, SequenceSetBuilder, Uid},
    store::{Folder, StoreError},
};

impl<F: Folder> Mailbox<F> {
    /// Stores a message that has not been stored before.
    pub fn add(&self, mut message: Bitmessage, flags: BitFlags<Flag>) -> Result<Uid, MailboxError> {
        if let Some(uid) = message.imap.uid {
            return Err(MailboxError::AlreadyAssigned(uid));
        }

        let mut cache = self.write();
        message.imap = ImapData {
            sequence_number: cache.uids.count() + 1,
            ..ImapData::new(flags)
        };
        trace!("adding message to {}", self.name());
        self.save_locked(&mut cache, &message)
    }

    /// Stores `message`, replacing the previous version if it carries a uid.
    pub fn save(&self, message: &Bitmessage) -> Result<Uid, MailboxError> {
        let mut cache = self.write();
        self.save_locked(&mut cache, message)
    }

    /// Stores mail coming from a client. A replaced message keeps its
    /// delivery state and acknowledgment, and its payload encoding unless
    /// the new text needs another one.
    pub fn save_email(&self, email: &Email) -> Result<Uid, MailboxError> {
        let mut message = Bitmessage::from_email(email, self.is_drafts())
            .inspect_err(|e| error!("could not convert mail for {}: {e}", self.name()))?;

        let mut cache = self.write();
        if let Some(uid) = message.imap.uid {
            let previous = self
                .fetch(&cache, uid)?
                .ok_or(MailboxError::NoSuchMessage { uid })?;
            let sequence_number = email.sequence_number();
            if sequence_number != 0 && sequence_number != previous.imap.sequence_number {
                return Err(MailboxError::UidMismatch {
                    uid,
                    sequence_number,
                });
            }
            message.payload = previous.payload.with_text(email.subject(), email.body());
            message.state = previous.state;
            message.ack = previous.ack;
        }
        self.save_locked(&mut cache, &message)
    }

    /// Removes the message with `uid`. Returns whether there was one.
    pub fn delete(&self, uid: Uid) -> Result<bool, MailboxError> {
        let mut cache = self.write();
        Ok(self.delete_locked(&mut cache, uid)?.is_some())
    }

    /// Removes every message flagged `\Deleted` and returns them.
    pub fn delete_flagged(&self) -> Result<Vec<Email>, MailboxError> {
        let flagged: Vec<Bitmessage> = {
            let cache = self.read();
            match (cache.uids.first(), cache.uids.last()) {
                (Some(first), Some(last)) => self
                    .scan(*first, *last, 1)?
                    .into_iter()
                    .filter(|message| message.imap.flags.contains(Flag::Deleted))
                    .collect(),
                _ => Vec::new(),
            }
        };

        let mut expunged = SequenceSetBuilder::default();
        let mut emails = Vec::with_capacity(flagged.len());
        for message in flagged {
            let Some(uid) = message.imap.uid else {
                continue;
            };
            let mut cache = self.write();
            let Some(deleted) = self.delete_locked(&mut cache, uid)? else {
                continue;
            };
            drop(cache);

            expunged.add(uid);
            match deleted.to_email() {
                Ok(email) => emails.push(email),
                Err(e) => error!("could not convert expunged message {uid}: {e}"),
            }
        }

        if let Ok(set) = expunged.build() {
            info!("expunged {set} from {}", self.name());
        }
        Ok(emails)
    }

    pub(super) fn save_locked(
        &self,
        cache: &mut Cache,
        message: &Bitmessage,
    ) -> Result<Uid, MailboxError> {
        let content = message.encode()?;

        let uid = match message.imap.uid {
            Some(uid) => {
                self.replace(cache, uid, message, &content)?;
                uid
            }
            None => {
                let id = self
                    .folder()
                    .insert_new_message(&content, BITMESSAGE_SUFFIX)?;
                Uid::try_from(id).map_err(|_| MailboxError::InvalidId(id))?
            }
        };
        debug!("saved message {uid} in {}", self.name());

        self.refresh_cache(cache)?;
        Ok(uid)
    }

    fn replace(
        &self,
        cache: &Cache,
        uid: Uid,
        message: &Bitmessage,
        content: &[u8],
    ) -> Result<(), MailboxError> {
        let previous = self
            .fetch(cache, uid)?
            .ok_or(MailboxError::NoSuchMessage { uid })?;
        if previous.imap.time_received != message.imap.time_received {
            return Err(MailboxError::ReceivedTimeChanged { uid });
        }

        self.folder().delete_message(uid.get())?;
        match self.folder().get_message(uid.get()) {
            Ok(_) => return Err(MailboxError::SlotOccupied { uid }),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.folder()
            .insert_message(uid.get(), content, BITMESSAGE_SUFFIX)?;
        Ok(())
    }

    pub(super) fn delete_locked(
        &self,
        cache: &mut Cache,
        uid: Uid,
    ) -> Result<Option<Bitmessage>, MailboxError> {
        let Some(message) = self.fetch(cache, uid)? else {
            if cache.uids.remove(uid) {
                warn!("dropped stale uid {uid} from the index of {}", self.name());
            }
            return Ok(None);
        };

        self.folder().delete_message(uid.get())?;
        if message.imap.flags.contains(Flag::Recent) {
            cache.recent = cache.recent.saturating_sub(1);
        }
        if !message.imap.flags.contains(Flag::Seen) {
            cache.unseen = cache.unseen.saturating_sub(1);
        }
        cache.uids.remove(uid);
        debug!("deleted message {uid} from {}", self.name());

        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        ops::{ControlFlow, RangeInclusive},
        sync::Arc,
        thread,
    };

    use assertables::*;
    use jiff::ToSpan;
    use rstest::*;

    use super::*;
    use crate::{
        mailbox::fixtures::{bitmessage, folder},
        message::{EmailBuilder, Payload},
        repository::SequenceSet,
        store::MemoryFolder,
    };

    type TestMailbox = Mailbox<Arc<MemoryFolder>>;

    #[fixture]
    fn mailbox(folder: Arc<MemoryFolder>) -> TestMailbox {
        assert_ok!(Mailbox::new(folder))
    }

    #[rstest]
    fn test_add_assigns_uid_and_position(mailbox: TestMailbox) {
        let first = assert_ok!(mailbox.add(bitmessage("one"), Flag::Recent.into()));
        let second = assert_ok!(mailbox.add(bitmessage("two"), Flag::Seen.into()));

        assert!(first < second);
        assert_eq!(2, mailbox.messages());
        assert_eq!(1, mailbox.recent());
        assert_eq!(1, mailbox.unseen());
        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(second)));
        assert_eq!(2, stored.imap.sequence_number);
        assert_eq!(BitFlags::from(Flag::Seen), stored.imap.flags);
    }

    #[rstest]
    fn test_add_refuses_stored_message(mailbox: TestMailbox) {
        let uid = assert_ok!(mailbox.add(bitmessage("one"), BitFlags::empty()));
        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));

        assert_matches!(
            mailbox.add(stored, BitFlags::empty()),
            Err(MailboxError::AlreadyAssigned(_))
        );
        assert_eq!(1, mailbox.messages());
    }

    #[rstest]
    fn test_save_then_load_round_trips(mailbox: TestMailbox) {
        let message = bitmessage("round trip").with_ack(vec![4, 2]);
        let mut message = Bitmessage {
            imap: ImapData::new(Flag::Flagged | Flag::Seen),
            ..message
        };
        message.state.ack_expected = true;

        let uid = assert_ok!(mailbox.save(&message));
        let loaded = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));

        assert_eq!(message.payload, loaded.payload);
        assert_eq!(message.ack, loaded.ack);
        assert_eq!(message.imap.flags, loaded.imap.flags);
        assert_eq!(message.state, loaded.state);
    }

    #[rstest]
    fn test_replace_keeps_uid(mailbox: TestMailbox) {
        let uid = assert_ok!(mailbox.add(bitmessage("one"), Flag::Recent.into()));
        let mut stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));
        stored.imap.flags = Flag::Seen.into();

        assert_eq!(uid, assert_ok!(mailbox.save(&stored)));

        assert_eq!(1, mailbox.messages());
        assert_eq!(0, mailbox.recent());
        assert_eq!(0, mailbox.unseen());
        let reloaded = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));
        assert_eq!(BitFlags::from(Flag::Seen), reloaded.imap.flags);
    }

    #[rstest]
    fn test_replace_refuses_changed_time_received(folder: Arc<MemoryFolder>) {
        let mailbox = assert_ok!(Mailbox::new(Arc::clone(&folder)));
        let uid = assert_ok!(mailbox.add(bitmessage("one"), BitFlags::empty()));
        let before = assert_ok!(folder.get_message(uid.get()));

        let mut stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));
        stored.imap.time_received = stored.imap.time_received - 1.hour();
        stored.imap.flags = Flag::Seen.into();

        assert_matches!(
            mailbox.save(&stored),
            Err(MailboxError::ReceivedTimeChanged { .. })
        );
        assert_eq!(before, assert_ok!(folder.get_message(uid.get())));
        assert_eq!(1, mailbox.unseen());
    }

    #[rstest]
    fn test_replace_refuses_unknown_uid(mailbox: TestMailbox) {
        let mut message = bitmessage("stray");
        message.imap.uid = Some(Uid::MAX);

        assert_matches!(
            mailbox.save(&message),
            Err(MailboxError::NoSuchMessage { .. })
        );
    }

    /// Folder whose deletes silently do nothing.
    struct StickyFolder(MemoryFolder);

    impl Folder for StickyFolder {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn next_id(&self) -> Result<u64, StoreError> {
            self.0.next_id()
        }

        fn for_each_message(
            &self,
            ids: RangeInclusive<u64>,
            suffix: u64,
            visit: &mut dyn FnMut(u64, u64, &[u8]) -> ControlFlow<()>,
        ) -> Result<(), StoreError> {
            self.0.for_each_message(ids, suffix, visit)
        }

        fn get_message(&self, id: u64) -> Result<(u64, Vec<u8>), StoreError> {
            self.0.get_message(id)
        }

        fn insert_new_message(&self, content: &[u8], suffix: u64) -> Result<u64, StoreError> {
            self.0.insert_new_message(content, suffix)
        }

        fn insert_message(&self, id: u64, content: &[u8], suffix: u64) -> Result<(), StoreError> {
            self.0.insert_message(id, content, suffix)
        }

        fn delete_message(&self, _id: u64) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[rstest]
    fn test_replace_detects_occupied_slot() {
        let mailbox = assert_ok!(Mailbox::new(StickyFolder(MemoryFolder::new("Sticky"))));
        let uid = assert_ok!(mailbox.add(bitmessage("one"), BitFlags::empty()));
        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));

        assert_matches!(
            mailbox.save(&stored),
            Err(MailboxError::SlotOccupied { .. })
        );
    }

    #[rstest]
    fn test_delete_middle_of_three(mailbox: TestMailbox) {
        let uids: Vec<Uid> = ["one", "two", "three"]
            .into_iter()
            .map(|subject| assert_ok!(mailbox.add(bitmessage(subject), BitFlags::empty())))
            .collect();
        assert_eq!(3, mailbox.unseen());

        assert!(assert_ok!(mailbox.delete(uids[1])));

        assert_eq!(2, mailbox.unseen());
        assert_eq!(vec![uids[0], uids[2]], mailbox.uids().to_vec());
        let last = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uids[2])));
        assert_eq!(2, last.imap.sequence_number);
        let first = assert_some!(assert_ok!(mailbox.bitmessage_by_sequence_number(1)));
        assert_eq!(Some(uids[0]), first.imap.uid);
    }

    #[rstest]
    fn test_delete_missing_uid_is_noop(mailbox: TestMailbox) {
        let uid = assert_ok!(mailbox.add(bitmessage("one"), Flag::Recent.into()));

        assert!(!assert_ok!(mailbox.delete(Uid::MAX)));

        assert_eq!(vec![uid], mailbox.uids().to_vec());
        assert_eq!(1, mailbox.recent());
        assert_eq!(1, mailbox.unseen());
    }

    #[rstest]
    fn test_delete_drops_uid_whose_entry_vanished(folder: Arc<MemoryFolder>) {
        let mailbox = assert_ok!(Mailbox::new(Arc::clone(&folder)));
        let kept = assert_ok!(mailbox.add(bitmessage("kept"), BitFlags::empty()));
        let gone = assert_ok!(mailbox.add(bitmessage("gone"), BitFlags::empty()));
        assert_ok!(folder.delete_message(gone.get()));

        assert!(!assert_ok!(mailbox.delete(gone)));

        assert_eq!(vec![kept], mailbox.uids().to_vec());
        assert_eq!(1, mailbox.messages());
    }

    #[rstest]
    fn test_delete_flagged_returns_expunged_mail(mailbox: TestMailbox) {
        let keep = assert_ok!(mailbox.add(bitmessage("keep"), BitFlags::empty()));
        assert_ok!(mailbox.add(bitmessage("drop"), Flag::Deleted.into()));
        assert_ok!(mailbox.add(bitmessage("drop too"), Flag::Deleted | Flag::Seen));

        let expunged = assert_ok!(mailbox.delete_flagged());

        let subjects: Vec<&str> = expunged.iter().map(Email::subject).collect();
        assert_eq!(vec!["drop", "drop too"], subjects);
        assert_eq!(vec![keep], mailbox.uids().to_vec());
        assert_eq!(1, mailbox.unseen());
        assert_is_empty!(assert_ok!(mailbox.delete_flagged()));
    }

    #[rstest]
    fn test_save_email_keeps_delivery_state(mailbox: TestMailbox) {
        let mut message = bitmessage("sent").with_ack(vec![9, 9]);
        message.state.ack_expected = true;
        message.state.send_tries = 3;
        let uid = assert_ok!(mailbox.add(message, BitFlags::empty()));

        let mut email = assert_ok!(assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid))).to_email());
        email.insert_flags(Flag::Seen);
        assert_eq!(uid, assert_ok!(mailbox.save_email(&email)));

        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));
        assert_eq!(Some(vec![9, 9]), stored.ack);
        assert_eq!(3, stored.state.send_tries);
        assert!(stored.imap.flags.contains(Flag::Seen));
        assert_eq!(0, mailbox.unseen());
    }

    #[rstest]
    fn test_save_email_keeps_trivial_payload(mailbox: TestMailbox) {
        let message = Bitmessage::new(
            "BM-2cTux3PGRqHTEH6wyUP2sWeT4LrsGgy63z",
            "BM-2cWzSnwjJ7yRP3nLEWUV5LisTZyREWSzUK",
            Payload::trivial("only a body"),
        );
        let uid = assert_ok!(mailbox.add(message, BitFlags::empty()));

        let mut email = assert_ok!(assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid))).to_email());
        email.insert_flags(Flag::Seen);
        assert_ok!(mailbox.save_email(&email));

        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));
        assert_eq!(Payload::trivial("only a body"), stored.payload);
        assert!(stored.imap.flags.contains(Flag::Seen));
    }

    #[rstest]
    fn test_save_email_checks_sequence_number(mailbox: TestMailbox) {
        assert_ok!(mailbox.add(bitmessage("one"), BitFlags::empty()));
        let uid = assert_ok!(mailbox.add(bitmessage("two"), BitFlags::empty()));
        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid)));
        let email = assert_ok!(
            EmailBuilder::default()
                .uid(uid)
                .sequence_number(1u32)
                .date(stored.imap.time_received)
                .from("BM-2cTux3PGRqHTEH6wyUP2sWeT4LrsGgy63z")
                .to("BM-2cWzSnwjJ7yRP3nLEWUV5LisTZyREWSzUK")
                .build()
        );

        assert_matches!(
            mailbox.save_email(&email),
            Err(MailboxError::UidMismatch { sequence_number: 1, .. })
        );
    }

    #[rstest]
    fn test_drafts_accept_incomplete_mail(folder: Arc<MemoryFolder>) {
        let drafts = assert_ok!(Mailbox::drafts(Arc::clone(&folder)));
        let inbox = assert_ok!(Mailbox::new(folder));
        let mut email = drafts.new_message();
        email.insert_flags(Flag::Draft);

        assert_matches!(
            inbox.save_email(&email),
            Err(MailboxError::Codec(_))
        );
        let uid = assert_ok!(drafts.save_email(&email));
        let stored = assert_some!(assert_ok!(drafts.bitmessage_by_uid(uid)));
        assert_eq!(Payload::simple("", ""), stored.payload);
    }

    #[rstest]
    fn test_concurrent_adds_and_reads(mailbox: TestMailbox) {
        thread::scope(|scope| {
            for worker in 0..4 {
                let mailbox = &mailbox;
                scope.spawn(move || {
                    for n in 0..10 {
                        let subject = format!("{worker}-{n}");
                        assert_ok!(mailbox.add(bitmessage(&subject), Flag::Recent.into()));
                        let set = assert_ok!("1:*".parse::<SequenceSet>());
                        assert_ok!(mailbox.bitmessage_set_by_sequence_number(&set));
                    }
                });
            }
        });

        assert_eq!(40, mailbox.messages());
        assert_eq!(40, mailbox.recent());
        let uids = mailbox.uids();
        assert!(uids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
