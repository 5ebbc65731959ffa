// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Scoped statement holder.
//
// One logical query owns a chain of resources: a connection, a primary
// statement, an optional primary result set, and any auxiliary
// statements/result sets opened along the way. The holder releases the
// whole chain in a fixed order on close, keeps going past per-resource
// failures, and warns once when the query was open longer than the
// configured limit. Resources are exclusively owned by the query that
// opened them and are never shared across threads.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

/// Queries open longer than this warn on close.
pub const DEFAULT_SLOW_QUERY_LIMIT: Duration = Duration::from_millis(15_000);

/// Failure closing a single resource.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ResourceError(pub String);

/// Anything the holder can track and release.
pub trait ScopedResource {
    /// Resource category for diagnostics ("connection", "statement", ...).
    fn kind(&self) -> &'static str;

    fn close(&mut self) -> Result<(), ResourceError>;
}

/// One resource that failed to close, recorded while cleanup continued.
#[derive(Debug, PartialEq, Eq)]
pub struct CloseFailure {
    pub kind: &'static str,
    pub message: String,
}

/// Aggregate of every per-resource close failure. Cleanup is best-effort:
/// by the time this surfaces, every resource has had its close attempted.
#[derive(Debug, Error)]
#[error("{} resource(s) failed to close: {}", failures.len(), summarize(failures))]
pub struct CleanupError {
    pub failures: Vec<CloseFailure>,
}

fn summarize(failures: &[CloseFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.kind, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tracks the resource chain of one executing statement.
///
/// Close order: auxiliary result sets, auxiliary statements, primary
/// result set, primary statement, connection. `close` is idempotent; a
/// holder dropped while still open closes itself with a warning.
pub struct StatementHolder<C, S, R>
where
    C: ScopedResource,
    S: ScopedResource,
    R: ScopedResource,
{
    connection: Option<C>,
    statement: Option<S>,
    result_set: Option<R>,
    aux_statements: Vec<S>,
    aux_result_sets: Vec<R>,
    sql: String,
    opened_at: Instant,
    slow_query_limit: Duration,
    closed: bool,
}

impl<C, S, R> StatementHolder<C, S, R>
where
    C: ScopedResource,
    S: ScopedResource,
    R: ScopedResource,
{
    pub fn new(connection: C, statement: S, sql: impl Into<String>) -> Self {
        Self {
            connection: Some(connection),
            statement: Some(statement),
            result_set: None,
            aux_statements: Vec::new(),
            aux_result_sets: Vec::new(),
            sql: sql.into(),
            opened_at: Instant::now(),
            slow_query_limit: DEFAULT_SLOW_QUERY_LIMIT,
            closed: false,
        }
    }

    pub fn slow_query_limit(mut self, limit: Duration) -> Self {
        self.slow_query_limit = limit;
        self
    }

    /// Attach the primary result set once the statement has produced one.
    pub fn set_result_set(&mut self, result_set: R) {
        self.result_set = Some(result_set);
    }

    /// Track an auxiliary statement opened during this query.
    pub fn add_aux_statement(&mut self, statement: S) {
        self.aux_statements.push(statement);
    }

    /// Track an auxiliary result set opened during this query.
    pub fn add_aux_result_set(&mut self, result_set: R) {
        self.aux_result_sets.push(result_set);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Time this holder has been open so far.
    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release every tracked resource. A second call is a no-op. Each
    /// resource gets its close attempted even when an earlier one failed;
    /// failures are aggregated into one error at the end.
    pub fn close(&mut self) -> Result<(), CleanupError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let elapsed = self.opened_at.elapsed();
        if elapsed > self.slow_query_limit {
            warn!(
                sql = %self.sql,
                elapsed_ms = elapsed.as_millis() as u64,
                limit_ms = self.slow_query_limit.as_millis() as u64,
                "slow query detected"
            );
        }

        let mut failures = Vec::new();
        for mut rs in self.aux_result_sets.drain(..) {
            record(rs.close(), rs.kind(), &mut failures);
        }
        for mut stmt in self.aux_statements.drain(..) {
            record(stmt.close(), stmt.kind(), &mut failures);
        }
        if let Some(mut rs) = self.result_set.take() {
            record(rs.close(), rs.kind(), &mut failures);
        }
        if let Some(mut stmt) = self.statement.take() {
            record(stmt.close(), stmt.kind(), &mut failures);
        }
        if let Some(mut conn) = self.connection.take() {
            record(conn.close(), conn.kind(), &mut failures);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError { failures })
        }
    }
}

fn record(
    result: Result<(), ResourceError>,
    kind: &'static str,
    failures: &mut Vec<CloseFailure>,
) {
    if let Err(err) = result {
        warn!(kind, error = %err, "resource failed to close");
        failures.push(CloseFailure {
            kind,
            message: err.0,
        });
    }
}

impl<C, S, R> Drop for StatementHolder<C, S, R>
where
    C: ScopedResource,
    S: ScopedResource,
    R: ScopedResource,
{
    fn drop(&mut self) {
        if !self.closed {
            warn!(sql = %self.sql, "statement holder dropped while open, closing");
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records its close into a shared log; optionally fails.
    struct MockResource {
        kind: &'static str,
        label: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MockResource {
        fn ok(kind: &'static str, label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                kind,
                label,
                fail: false,
                log: log.clone(),
            }
        }

        fn failing(
            kind: &'static str,
            label: &'static str,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Self {
            Self {
                kind,
                label,
                fail: true,
                log: log.clone(),
            }
        }
    }

    impl ScopedResource for MockResource {
        fn kind(&self) -> &'static str {
            self.kind
        }

        fn close(&mut self) -> Result<(), ResourceError> {
            self.log.lock().unwrap().push(self.label.to_string());
            if self.fail {
                Err(ResourceError(format!("{} refused to close", self.label)))
            } else {
                Ok(())
            }
        }
    }

    type Holder = StatementHolder<MockResource, MockResource, MockResource>;

    fn holder(log: &Arc<Mutex<Vec<String>>>) -> Holder {
        StatementHolder::new(
            MockResource::ok("connection", "conn", log),
            MockResource::ok("statement", "stmt", log),
            "SELECT * FROM entries",
        )
    }

    #[test]
    fn close_order_is_aux_then_primary_then_connection() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut h = holder(&log);
        h.set_result_set(MockResource::ok("result set", "rs", &log));
        h.add_aux_statement(MockResource::ok("statement", "aux-stmt", &log));
        h.add_aux_result_set(MockResource::ok("result set", "aux-rs", &log));

        h.close().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["aux-rs", "aux-stmt", "rs", "stmt", "conn"]
        );
    }

    #[test]
    fn failure_does_not_stop_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut h = holder(&log);
        h.set_result_set(MockResource::failing("result set", "rs", &log));

        let err = h.close().unwrap_err();

        // The statement and connection still closed after the result set
        // failed, and the one failure is reported.
        assert_eq!(*log.lock().unwrap(), vec!["rs", "stmt", "conn"]);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].kind, "result set");
        assert!(err.to_string().contains("rs refused to close"));
    }

    #[test]
    fn every_failure_is_aggregated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut h = StatementHolder::new(
            MockResource::failing("connection", "conn", &log),
            MockResource::failing("statement", "stmt", &log),
            "DELETE FROM entries WHERE space = ?",
        );
        h.add_aux_result_set(MockResource::failing("result set", "aux-rs", &log));

        let err = h.close().unwrap_err();
        assert_eq!(err.failures.len(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["aux-rs", "stmt", "conn"]);
    }

    #[test]
    fn close_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut h = holder(&log);
        h.set_result_set(MockResource::failing("result set", "rs", &log));

        assert!(h.close().is_err());
        let closes_after_first = log.lock().unwrap().len();

        // Second close succeeds and touches nothing.
        assert!(h.close().is_ok());
        assert!(h.is_closed());
        assert_eq!(log.lock().unwrap().len(), closes_after_first);
    }

    #[test]
    fn drop_closes_an_open_holder() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut h = holder(&log);
            h.set_result_set(MockResource::ok("result set", "rs", &log));
        }
        assert_eq!(*log.lock().unwrap(), vec!["rs", "stmt", "conn"]);
    }

    /// Counts "slow query detected" warnings reaching the log sink.
    struct SlowQueryCounter {
        count: Arc<AtomicUsize>,
    }

    impl tracing::Subscriber for SlowQueryCounter {
        fn enabled(&self, metadata: &tracing::Metadata<'_>) -> bool {
            metadata.level() == &tracing::Level::WARN
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            struct Message(String);
            impl tracing::field::Visit for Message {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    if field.name() == "message" {
                        self.0 = format!("{value:?}");
                    }
                }
            }

            let mut message = Message(String::new());
            event.record(&mut message);
            if message.0.contains("slow query detected") {
                self.count.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn slow_query_warns_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = SlowQueryCounter {
            count: count.clone(),
        };

        let log = Arc::new(Mutex::new(Vec::new()));
        tracing::subscriber::with_default(subscriber, || {
            let mut h = holder(&log).slow_query_limit(Duration::ZERO);
            std::thread::sleep(Duration::from_millis(1));
            h.close().unwrap();
            // The second close is a no-op and never re-warns.
            h.close().unwrap();
            assert_eq!(count.load(Ordering::SeqCst), 1);

            // A query under the limit warns not at all.
            let mut fast = holder(&log);
            fast.close().unwrap();
            assert_eq!(count.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn slow_query_threshold_does_not_affect_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut h = holder(&log).slow_query_limit(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(1));

        assert!(h.elapsed() > Duration::ZERO);
        h.close().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["stmt", "conn"]);
    }
}
