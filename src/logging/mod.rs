mod journal;

use std::io::Write as _;

use anstyle::{AnsiColor, Effects, Style};
use env_logger::{Env, fmt::Formatter};
use jiff::Timestamp;
use journal::stderr_is_journal;
use log::{Level, Record};

/// Installs the global logger. `folder` prefixes every line when given.
///
/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init(folder: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    let folder = folder.map(|folder| format!("{folder} ")).unwrap_or_default();

    if stderr_is_journal() {
        builder.format(move |buf, record| {
            writeln!(
                buf,
                "<{}>{folder}{}: {}",
                journal_priority(record.level()),
                record.target(),
                record.args()
            )
        });
    } else {
        builder.format(move |buf, record| write_styled(buf, record, &folder));
    }
    builder.init();
}

// syslog priorities as understood by journald
fn journal_priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Error => AnsiColor::Red.on_default().effects(Effects::BOLD),
        Level::Warn => AnsiColor::Yellow.on_default(),
        Level::Info => AnsiColor::Green.on_default(),
        Level::Debug => AnsiColor::Blue.on_default(),
        Level::Trace => AnsiColor::Cyan.on_default(),
    }
}

fn write_styled(buf: &mut Formatter, record: &Record<'_>, folder: &str) -> std::io::Result<()> {
    let subtle = AnsiColor::BrightBlack.on_default();
    let level = level_style(record.level());

    write!(
        buf,
        "{subtle}[{subtle:#}{:.3} {level}{}{level:#} {folder}{}",
        Timestamp::now(),
        record.level(),
        record.target()
    )?;
    if let Some(line) = record.line() {
        write!(buf, ":{line}")?;
    }
    writeln!(buf, "{subtle}]{subtle:#} {}", record.args())
}
