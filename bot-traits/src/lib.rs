use std::fmt::Debug;

// Usable at the end of any fallible chain, notably every eyre Result the
// event dispatcher would otherwise have to bubble up.
pub trait TraceErr<T, E> {
    fn trace_err(self) -> Result<T, E>;
    fn trace_err_ok(self) -> Option<T>;
    /// For failures that are expected in normal operation (races against
    /// Discord state, vanished channels) and shouldn't page anyone.
    fn trace_warn_ok(self) -> Option<T>;
}

impl<T, E> TraceErr<T, E> for Result<T, E>
where
    E: Debug,
{
    fn trace_err(self) -> Result<T, E> {
        self.map_err(|e| {
            tracing::error!("{:?}", e);
            e
        })
    }

    fn trace_err_ok(self) -> Option<T> {
        self.trace_err().ok()
    }

    fn trace_warn_ok(self) -> Option<T> {
        self.map_err(|e| {
            tracing::warn!("{:?}", e);
            e
        })
        .ok()
    }
}
