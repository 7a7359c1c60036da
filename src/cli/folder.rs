use std::{
    fs::read_to_string,
    io::{self, stdin},
    path::Path,
};

use anyhow::{Context as _, Result, bail};
use bmagent::{
    config::Config,
    mailbox::{ImapMailbox as _, Mailbox},
    message::{Bitmessage, Email, Payload},
    repository::{Flag, SequenceSet, Uid},
    store::{SqliteFolder, SqliteStore},
};
use enumflags2::BitFlags;
use log::info;

use crate::cli::token::AckToken;

fn open(store: &SqliteStore, config: &Config, name: &str) -> Result<Mailbox<SqliteFolder>> {
    let folder = store.folder(name)?;
    let mailbox = if name == config.drafts() {
        Mailbox::drafts(folder)?
    } else {
        Mailbox::new(folder)?
    };
    Ok(mailbox)
}

fn print_email(email: &Email) {
    println!(
        "{:>6} {:>4} {} {:<28} {} -> {} {}",
        email.uid().map_or(0, Uid::get),
        email.sequence_number(),
        email.date().strftime("%F %T"),
        Flag::join(email.flags()).unwrap_or_default(),
        email.from(),
        email.to(),
        email.subject()
    );
}

pub fn list_folders(store: &SqliteStore, config: &Config) -> Result<()> {
    for name in store.folder_names()? {
        let mailbox = open(store, config, &name)?;
        println!(
            "{name}: {} messages, {} recent, {} unseen",
            mailbox.messages(),
            mailbox.recent(),
            mailbox.unseen()
        );
    }
    Ok(())
}

pub fn list(
    store: &SqliteStore,
    config: &Config,
    folder: &str,
    set: &SequenceSet,
    uid: bool,
) -> Result<()> {
    let mailbox = open(store, config, folder)?;
    let emails = if uid {
        mailbox.message_set_by_uid(set)?
    } else {
        mailbox.message_set_by_sequence_number(set)?
    };
    for email in &emails {
        print_email(email);
    }
    Ok(())
}

fn read_body(body: &Path) -> Result<String> {
    if body == Path::new("-") {
        io::read_to_string(stdin()).context("could not read body from stdin")
    } else {
        read_to_string(body).with_context(|| format!("could not read body from {}", body.display()))
    }
}

pub fn add(
    store: &SqliteStore,
    config: &Config,
    folder: &str,
    from: String,
    to: String,
    subject: &str,
    body: &Path,
) -> Result<()> {
    let mailbox = open(store, config, folder)?;
    let message = Bitmessage::new(from, to, Payload::simple(subject, &read_body(body)?));
    let uid = mailbox.add(message, Flag::Recent.into())?;
    info!("added message {uid} to {folder}");
    println!("{uid}");
    Ok(())
}

pub fn set_flags(
    store: &SqliteStore,
    config: &Config,
    folder: &str,
    uid: u64,
    flags: &[Flag],
) -> Result<()> {
    let mailbox = open(store, config, folder)?;
    let Ok(uid) = Uid::try_from(uid) else {
        bail!("0 is not a valid uid");
    };
    let Some(mut email) = mailbox.message_by_uid(uid)? else {
        bail!("no message {uid} in {folder}");
    };

    email.set_flags(flags.iter().copied().collect::<BitFlags<Flag>>());
    mailbox.save_email(&email)?;
    print_email(&email);
    Ok(())
}

pub fn expunge(store: &SqliteStore, config: &Config, folder: &str) -> Result<()> {
    let mailbox = open(store, config, folder)?;
    for email in mailbox.delete_flagged_messages()? {
        print_email(&email);
    }
    Ok(())
}

pub fn ack(store: &SqliteStore, config: &Config, folder: &str, token: &AckToken) -> Result<()> {
    let mailbox = open(store, config, folder)?;
    let Some(message) = mailbox.receive_ack(token.bytes())? else {
        bail!("no message in {folder} expects this acknowledgment");
    };
    print_email(&message.to_email()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assertables::*;
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    use super::*;

    struct TestSetup {
        dir: TempDir,
        config: Config,
        store: SqliteStore,
    }

    impl TestSetup {
        fn mailbox(&self, folder: &str) -> Mailbox<SqliteFolder> {
            assert_ok!(open(&self.store, &self.config, folder))
        }

        fn body(&self, text: &str) -> std::path::PathBuf {
            let file = self.dir.path().join("body.txt");
            assert_ok!(fs::write(&file, text));
            file
        }

        fn add(&self, folder: &str, subject: &str) {
            assert_ok!(add(
                &self.store,
                &self.config,
                folder,
                "BM-2cTux3PGRqHTEH6wyUP2sWeT4LrsGgy63z".to_string(),
                "BM-2cWzSnwjJ7yRP3nLEWUV5LisTZyREWSzUK".to_string(),
                subject,
                &self.body("hello"),
            ));
        }
    }

    #[fixture]
    fn setup() -> TestSetup {
        let dir = assert_ok!(tempdir());
        let file = dir.path().join("config.toml");
        let statedir = dir.path().join("state");
        assert_ok!(fs::write(
            &file,
            format!("statedir = {:?}\n", statedir.display().to_string())
        ));
        let config = assert_ok!(Config::load(Some(file)));
        let store = assert_ok!(SqliteStore::open(config.statedir()));
        TestSetup { dir, config, store }
    }

    fn uid(value: u64) -> Uid {
        assert_ok!(Uid::try_from(value))
    }

    #[rstest]
    fn test_add_stores_recent_unseen_mail(setup: TestSetup) {
        setup.add("Inbox", "one");
        setup.add("Inbox", "two");

        let mailbox = setup.mailbox("Inbox");
        assert_eq!(2, mailbox.messages());
        assert_eq!(2, mailbox.recent());
        assert_eq!(2, mailbox.unseen());
        assert_eq!(vec![uid(1), uid(2)], mailbox.uids().to_vec());
        assert_ok!(list_folders(&setup.store, &setup.config));
    }

    #[rstest]
    fn test_flag_replaces_message_in_place(setup: TestSetup) {
        setup.add("Inbox", "one");
        setup.add("Inbox", "two");

        assert_ok!(set_flags(
            &setup.store,
            &setup.config,
            "Inbox",
            1,
            &[Flag::Seen, Flag::Deleted]
        ));

        let mailbox = setup.mailbox("Inbox");
        assert_eq!(vec![uid(1), uid(2)], mailbox.uids().to_vec());
        assert_eq!(1, mailbox.unseen());
        assert_eq!(1, mailbox.recent());
        let stored = assert_some!(assert_ok!(mailbox.bitmessage_by_uid(uid(1))));
        assert_eq!(Flag::Seen | Flag::Deleted, stored.imap.flags);
        assert_eq!(Payload::simple("one", "hello"), stored.payload);
        assert_eq!(3, mailbox.next_uid());
    }

    #[rstest]
    fn test_flag_rejects_unknown_uid(setup: TestSetup) {
        setup.add("Inbox", "one");

        assert_err!(set_flags(&setup.store, &setup.config, "Inbox", 0, &[Flag::Seen]));
        assert_err!(set_flags(&setup.store, &setup.config, "Inbox", 9, &[Flag::Seen]));
    }

    #[rstest]
    fn test_expunge_removes_deleted_mail(setup: TestSetup) {
        setup.add("Inbox", "one");
        setup.add("Inbox", "two");
        setup.add("Inbox", "three");
        assert_ok!(set_flags(&setup.store, &setup.config, "Inbox", 2, &[Flag::Deleted]));

        assert_ok!(expunge(&setup.store, &setup.config, "Inbox"));

        let mailbox = setup.mailbox("Inbox");
        assert_eq!(vec![uid(1), uid(3)], mailbox.uids().to_vec());
        assert_eq!(2, mailbox.unseen());
        let last = assert_some!(assert_ok!(mailbox.bitmessage_by_sequence_number(2)));
        assert_eq!(Some(uid(3)), last.imap.uid);
    }

    #[rstest]
    fn test_ack_marks_sent_message(setup: TestSetup) {
        let sent = setup.mailbox("Sent");
        for (subject, token) in [("one", vec![0x0a]), ("two", vec![0x0b, 0x0c])] {
            let mut message = Bitmessage::new(
                "BM-2cTux3PGRqHTEH6wyUP2sWeT4LrsGgy63z",
                "BM-2cWzSnwjJ7yRP3nLEWUV5LisTZyREWSzUK",
                Payload::trivial(subject),
            )
            .with_ack(token);
            message.state.ack_expected = true;
            assert_ok!(sent.add(message, BitFlags::empty()));
        }

        let token = assert_ok!("0b0c".parse::<AckToken>());
        assert_ok!(ack(&setup.store, &setup.config, "Sent", &token));
        let unknown = assert_ok!("ff".parse::<AckToken>());
        assert_err!(ack(&setup.store, &setup.config, "Sent", &unknown));

        let sent = setup.mailbox("Sent");
        let first = assert_some!(assert_ok!(sent.bitmessage_by_uid(uid(1))));
        let second = assert_some!(assert_ok!(sent.bitmessage_by_uid(uid(2))));
        assert!(!first.state.ack_received);
        assert!(second.state.ack_received);
        assert_eq!(Payload::trivial("two"), second.payload);
        assert_eq!(vec![uid(1), uid(2)], sent.uids().to_vec());
    }

    #[rstest]
    #[case("1:*", false)]
    #[case("2,*", true)]
    fn test_list_resolves_sets(setup: TestSetup, #[case] set: &str, #[case] by_uid: bool) {
        setup.add("Inbox", "one");
        setup.add("Inbox", "two");
        let set = assert_ok!(set.parse::<SequenceSet>());

        assert_ok!(list(&setup.store, &setup.config, "Inbox", &set, by_uid));
    }

    #[rstest]
    fn test_list_rejects_positions_past_the_end(setup: TestSetup) {
        setup.add("Inbox", "one");
        let set = assert_ok!("3:*".parse::<SequenceSet>());

        assert_err!(list(&setup.store, &setup.config, "Inbox", &set, false));
    }

    #[rstest]
    fn test_drafts_folder_accepts_incomplete_mail(setup: TestSetup) {
        let drafts = setup.mailbox("Drafts");
        assert!(drafts.is_drafts());
        assert!(!setup.mailbox("Inbox").is_drafts());

        let email = drafts.new_message();
        let uid = assert_ok!(drafts.save_email(&email));
        assert_eq!(1, setup.mailbox("Drafts").messages());
        assert_eq!(uid.get(), drafts.last_uid());
    }
}
