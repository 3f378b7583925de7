use time::format_description;
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::FmtSubscriber;

/// Install a stderr subscriber for referee progress.
///
/// Does nothing if a global subscriber is already set, so tests and
/// embedding applications can install their own.
pub fn init_logger(max_level: Level) {
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .expect("valid time format"),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(std::io::stderr)
        .finish();

    let _ = set_global_default(subscriber);
}
