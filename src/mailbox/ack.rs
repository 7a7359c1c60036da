use std::ops::ControlFlow;

use log::{debug, trace};

use crate::{
    mailbox::{Mailbox, MailboxError, mailbox::BITMESSAGE_SUFFIX},
    message::Bitmessage,
    repository::Uid,
    store::Folder,
};

impl<F: Folder> Mailbox<F> {
    /// Looks for the message whose acknowledgment equals `token` and marks
    /// it as acknowledged. Only the first match is considered.
    pub fn receive_ack(&self, token: &[u8]) -> Result<Option<Bitmessage>, MailboxError> {
        let mut cache = self.write();

        let mut matched = None;
        self.folder()
            .for_each_message(0..=u64::MAX, BITMESSAGE_SUFFIX, &mut |id, _, content| {
                let Some(mut message) = self.decode(id, content) else {
                    return ControlFlow::Continue(());
                };
                if !self.contains(&message) || message.ack.as_deref() != Some(token) {
                    return ControlFlow::Continue(());
                }
                let Ok(uid) = Uid::try_from(id) else {
                    return ControlFlow::Continue(());
                };

                message.imap.uid = Some(uid);
                matched = Some(message);
                ControlFlow::Break(())
            })?;

        let Some(mut message) = matched else {
            trace!("no message in {} carries the received ack", self.name());
            return Ok(None);
        };
        message.state.ack_received = true;
        let uid = self.save_locked(&mut cache, &message)?;
        message.imap.sequence_number = cache.uids.find(uid).unwrap_or_default();
        debug!("message {uid} in {} got acknowledged", self.name());

        Ok(Some(message))
    }
}
