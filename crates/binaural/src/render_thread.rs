thread_local! {
    static IS_RENDER_THREAD: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

pub(crate) fn is_render_thread() -> bool {
    IS_RENDER_THREAD.with(|x| x.get())
}

/// Mark the calling thread as a render thread.
///
/// Audio backends should call this once from inside their callback, before handing audio to a
/// [crate::BinauralRenderer].  Logging from a marked thread never allocates or performs I/O: messages are queued and
/// forwarded to the [log] crate by a background thread.
///
/// Also starts the background logging thread if it is not running yet, so call it early rather than from the first
/// callback if possible.
pub fn mark_render_thread() {
    crate::logging::ensure_log_ctx();
    IS_RENDER_THREAD.with(|x| x.replace(true));
}

#[cfg(test)]
pub(crate) fn unmark_render_thread() {
    IS_RENDER_THREAD.with(|x| x.replace(false));
}
