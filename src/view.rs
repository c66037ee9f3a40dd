use crate::event::Event;

/// Derived, queryable state maintained from the full event log.
///
/// Each refresh hands every view the complete ordered batch. Views decide
/// for themselves whether to fold it incrementally or rebuild from
/// scratch, and must ignore event kinds they do not understand. Applying
/// never fails: anything a view cannot interpret is logged and skipped.
pub trait MaterializedView: Send + Sync {
    /// Short name used in log lines.
    fn view_name(&self) -> &str;

    fn apply_events(&self, events: &[Event]);
}
