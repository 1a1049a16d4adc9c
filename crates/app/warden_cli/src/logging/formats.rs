use std::io::Write;

use flexi_logger::{DeferredNow, style};
use log::{Level, Record};

/// `warn: message`, level tag colored; info lines carry no tag.
pub fn cli_format(
    w: &mut dyn Write,
    _now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let level = record.level();
    match level {
        Level::Info => write!(w, "{}", record.args()),
        _ => write!(
            w,
            "{}: {}",
            style(level).paint(level.as_str().to_lowercase()),
            record.args()
        ),
    }
}
