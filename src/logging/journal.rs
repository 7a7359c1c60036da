use std::{env, io, os::fd::AsFd as _};

use rustix::fs::{Stat, fstat};

/// Whether stderr is the stream systemd handed us for the journal.
///
/// systemd exports `$JOURNAL_STREAM` as `<device>:<inode>` of that stream,
/// see `systemd.exec(5)`.
pub fn stderr_is_journal() -> bool {
    let Some(journal_stream) = env::var_os("JOURNAL_STREAM") else {
        return false;
    };
    let Ok(stderr) = fstat(io::stderr().as_fd()) else {
        return false;
    };

    journal_stream
        .to_str()
        .and_then(parse_stream_id)
        .is_some_and(|id| id == stream_id(&stderr))
}

fn stream_id(stat: &Stat) -> (u64, u64) {
    (stat.st_dev, stat.st_ino)
}

fn parse_stream_id(value: &str) -> Option<(u64, u64)> {
    let (device, inode) = value.split_once(':')?;
    Some((device.parse().ok()?, inode.parse().ok()?))
}
