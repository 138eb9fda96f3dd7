//! Read model trait for query-side views.

/// A queryable view derived from the event log.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently in the view. Best effort: a view that is
    /// being written to reports zero.
    fn count(&self) -> usize;
}
