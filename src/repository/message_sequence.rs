use std::ops::Deref;

use crate::repository::Uid;

/// Ascending list of the uids visible in a mailbox.
///
/// The position of a uid in this list is its IMAP sequence number minus one.
/// Sequence numbers are therefore only valid until the next mutation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageSequence(Vec<Uid>);

impl MessageSequence {
    /// Builds the sequence from uids in any order.
    pub fn from_unsorted(mut uids: Vec<Uid>) -> Self {
        uids.sort_unstable();
        uids.dedup();
        Self(uids)
    }

    /// Returns the lowest sequence number whose uid is higher than or equal
    /// to `uid`, which is `len + 1` if every uid is lower.
    ///
    /// Uses interpolation search since uids are handed out close to
    /// monotonically and tend to be evenly spread.
    pub fn sequence_number(&self, uid: Uid) -> u32 {
        let uids = &self.0;
        let target = uid.get();

        let Some((first, last)) = uids.first().zip(uids.last()) else {
            return 1;
        };
        if target < first.get() {
            return 1;
        }
        if target > last.get() {
            return position(uids.len() + 1);
        }
        if uids.len() == 1 {
            return 1;
        }

        let mut min_index = 0usize;
        let mut max_index = uids.len() - 1;
        let mut min_uid = first.get();
        let mut max_uid = last.get();

        loop {
            // min_uid <= target <= max_uid holds here
            if min_uid == target {
                return position(min_index + 1);
            }
            let check_index = min_index
                + interpolate(target - min_uid, max_uid - min_uid, max_index - min_index);
            let check_uid = uids[check_index].get();

            if check_uid == target {
                return position(check_index + 1);
            }

            if check_uid > target {
                max_uid = check_uid;
                max_index = check_index;
            } else {
                min_index = check_index + 1;
                min_uid = uids[min_index].get();
                if min_uid > target {
                    return position(min_index + 1);
                }
            }
        }
    }

    /// Whether `uid` is part of the sequence. Returns its sequence number if so.
    pub fn find(&self, uid: Uid) -> Option<u32> {
        let seqno = self.sequence_number(uid);
        self.get_by_sequence_number(seqno)
            .filter(|found| *found == uid)
            .map(|_| seqno)
    }

    pub fn get_by_sequence_number(&self, seqno: u32) -> Option<Uid> {
        let index = usize::try_from(seqno).ok()?.checked_sub(1)?;
        self.0.get(index).copied()
    }

    pub fn count(&self) -> u32 {
        position(self.0.len())
    }

    /// Removes `uid` in place, keeping the order of the others.
    pub fn remove(&mut self, uid: Uid) -> bool {
        if let Some(seqno) = self.find(uid) {
            self.0.remove(seqno as usize - 1);
            true
        } else {
            false
        }
    }
}

impl Deref for MessageSequence {
    type Target = [Uid];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// floor(offset / span * width) without leaving integer arithmetic
fn interpolate(offset: u64, span: u64, width: usize) -> usize {
    let scaled = u128::from(offset) * width as u128 / u128::from(span);
    usize::try_from(scaled).expect("interpolated index should be within the searched range")
}

fn position(index: usize) -> u32 {
    u32::try_from(index).expect("mailbox should hold fewer than u32::MAX messages")
}
