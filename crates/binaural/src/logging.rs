//! Logging which is safe to call from the render thread.
//!
//! The [log] crate's macros call into whatever logger the application installed, and that logger is free to allocate,
//! lock, or write to a file.  None of that is acceptable inside an audio callback.  The `rt_*` macros defined here
//! behave like their [log] counterparts everywhere except on threads marked with
//! [crate::render_thread::mark_render_thread].  There, the message is formatted into a fixed-capacity inline string
//! and pushed onto a preallocated queue.  A background thread drains the queue and forwards each record to [log].
//!
//! Messages longer than [RECORD_CAPACITY] bytes are truncated and flagged as such.  If the queue is full the message
//! is dropped and counted; the count is reported with the next message that makes it through.
//!
//! Timestamps seen by the installed logger are those of the background thread, not of the render thread.  Records
//! which sat in the queue for longer than [LATENCY_WARNING] say so.
use std::fmt::Arguments;
use std::thread::{park, JoinHandle};
use std::time::{Duration, Instant};

use arrayvec::ArrayString;
use thingbuf::{recycling::Recycle, ThingBuf};

/// Maximum formatted length of one record, in bytes.
const RECORD_CAPACITY: usize = 256;

/// Records which may be waiting at once.
const QUEUE_CAPACITY: usize = 4096;

const LATENCY_WARNING: Duration = Duration::from_millis(250);

type InlineText = ArrayString<RECORD_CAPACITY>;

#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
enum RecordText {
    Static(&'static str),
    Inline(InlineText),
}

struct RtRecord {
    /// Messages this thread failed to enqueue before this one.
    dropped_before: u64,
    level: log::Level,
    target: &'static str,
    text: RecordText,
    truncated: bool,
    queued_at: Instant,
}

/// Appends to an [InlineText] until it is full, then silently discards the rest while remembering that it did so.
struct TruncatingWriter<'a> {
    text: &'a mut InlineText,
    truncated: &'a mut bool,
}

impl std::fmt::Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if *self.truncated {
            return Ok(());
        }

        if s.len() <= self.text.remaining_capacity() {
            self.text.push_str(s);
            return Ok(());
        }

        *self.truncated = true;
        // Char by char, so that the cut lands on a character boundary.
        for c in s.chars() {
            if self.text.try_push(c).is_err() {
                break;
            }
        }

        Ok(())
    }
}

fn format_record(level: log::Level, args: Arguments<'_>, target: &'static str) -> RtRecord {
    use std::fmt::Write;

    let mut truncated = false;
    let text = match args.as_str() {
        Some(s) => RecordText::Static(s),
        None => {
            let mut text = InlineText::new();
            let mut writer = TruncatingWriter {
                text: &mut text,
                truncated: &mut truncated,
            };
            // TruncatingWriter never returns an error, and Display impls which do are already broken.
            let _ = write!(writer, "{}", args);
            RecordText::Inline(text)
        }
    };

    RtRecord {
        dropped_before: 0,
        level,
        target,
        text,
        truncated,
        queued_at: Instant::now(),
    }
}

struct RtRecordRecycler;

impl Recycle<RtRecord> for RtRecordRecycler {
    fn new_element(&self) -> RtRecord {
        RtRecord {
            dropped_before: 0,
            level: log::Level::Trace,
            target: module_path!(),
            text: RecordText::Static(""),
            truncated: false,
            queued_at: Instant::now(),
        }
    }

    fn recycle(&self, _element: &mut RtRecord) {
        // Every field is overwritten by the next push.
    }
}

struct LogCtx {
    drain_thread: JoinHandle<()>,
    queue: ThingBuf<RtRecord, RtRecordRecycler>,
}

lazy_static::lazy_static! {
    static ref LOG_CTX: LogCtx = LogCtx {
        drain_thread: std::thread::Builder::new()
            .name("binaural-log".into())
            .spawn(drain_forever)
            .unwrap_or_else(|e| panic!("Unable to start the logging thread: {e}")),
        queue: ThingBuf::with_recycle(QUEUE_CAPACITY, RtRecordRecycler),
    };
}

/// Entrypoint for the `rt_log!` macro on render threads.
pub(crate) fn enqueue(level: log::Level, args: Arguments<'_>, target: &'static str) {
    use std::cell::Cell;

    thread_local! {
        static DROPPED: Cell<u64> = const { Cell::new(0) };
    }

    if level > log::max_level() {
        return;
    }

    let mut record = format_record(level, args, target);
    record.dropped_before = DROPPED.get();

    match LOG_CTX.queue.push(record) {
        Ok(()) => {
            DROPPED.set(0);
            LOG_CTX.drain_thread.thread().unpark();
        }
        Err(_) => DROPPED.set(DROPPED.get() + 1),
    }
}

fn forward(record: RtRecord) {
    let text = match &record.text {
        RecordText::Static(s) => s,
        RecordText::Inline(s) => s.as_str(),
    };

    if record.dropped_before != 0 {
        log::warn!(
            "The render thread log queue overflowed; {} messages were lost",
            record.dropped_before
        );
    }

    let waited = record.queued_at.elapsed();
    let delayed = if waited > LATENCY_WARNING {
        Some(waited.as_secs_f64())
    } else {
        None
    };
    let truncated = if record.truncated { ", truncated" } else { "" };

    match delayed {
        Some(secs) => {
            log::log!(target: record.target, record.level, "{text} (render thread, delayed {secs:.3}s{truncated})")
        }
        None => log::log!(target: record.target, record.level, "{text} (render thread{truncated})"),
    }
}

fn drain_forever() {
    loop {
        while let Some(record) = LOG_CTX.queue.pop() {
            forward(record);
        }
        // An unpark which lands between the drain and this park leaves the token set, so nothing is missed.
        park();
    }
}

/// Force the logging thread to start.
pub(crate) fn ensure_log_ctx() {
    std::hint::black_box(LOG_CTX.queue.capacity());
}

/// Like [log::log], but never blocks or allocates when called from a render thread.
#[allow(clippy::crate_in_macro_def)]
macro_rules! rt_log {
    ($level: expr, $fmt: expr $(, $args: expr)* $(,)?) => {
        let level = $level;
        if crate::render_thread::is_render_thread() {
            if level <= log::max_level() {
                crate::logging::enqueue(level, format_args!($fmt, $($args),*), module_path!());
            }
        } else {
            log::log!(level, $fmt, $($args),*);
        }
    }
}

macro_rules! rt_error {
    ($($args: tt)+) => {
        rt_log!(log::Level::Error, $($args)+);
    }
}

macro_rules! rt_warn {
    ($($args: tt)+) => {
        rt_log!(log::Level::Warn, $($args)+);
    }
}

macro_rules! rt_debug {
    ($($args: tt)+) => {
        rt_log!(log::Level::Debug, $($args)+);
    }
}
