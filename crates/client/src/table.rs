use rustc_hash::FxHashMap;
use std::time::Duration;
use stubdns_domain::{QueryOutcome, RecordType};
use tokio_util::time::delay_queue::{DelayQueue, Key};

/// Completion handler for one query. `FnOnce` because the terminal outcome
/// is delivered exactly once.
pub type QueryCallback = Box<dyn FnOnce(QueryOutcome) + Send + 'static>;

pub(crate) struct PendingQuery {
    pub name: String,
    pub qtype: RecordType,
    pub callback: QueryCallback,
    timer: Key,
}

/// The set of in-flight queries, keyed by transaction ID, together with
/// their one-shot timeout timers.
///
/// Owned exclusively by the engine task; every mutation happens there, so
/// removing an entry is the single terminal transition for a query and the
/// callback it yields can only be invoked once.
pub(crate) struct QueryTable {
    timeout: Duration,
    entries: FxHashMap<u16, PendingQuery>,
    timers: DelayQueue<u16>,
}

impl QueryTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: FxHashMap::default(),
            timers: DelayQueue::new(),
        }
    }

    /// Draws an unpredictable transaction ID (redrawing on collision with a
    /// live entry), arms the timeout timer and installs the query.
    pub fn register(&mut self, name: String, qtype: RecordType, callback: QueryCallback) -> u16 {
        let mut id = rand::random::<u16>();
        while self.entries.contains_key(&id) {
            id = rand::random::<u16>();
        }

        let timer = self.timers.insert(id, self.timeout);
        self.entries.insert(
            id,
            PendingQuery {
                name,
                qtype,
                callback,
                timer,
            },
        );
        id
    }

    /// Lookup-and-remove. Cancels the query's timer; a cancelled timer
    /// never fires.
    pub fn claim(&mut self, id: u16) -> Option<PendingQuery> {
        let query = self.entries.remove(&id)?;
        self.timers.try_remove(&query.timer);
        Some(query)
    }

    /// Removes an entry whose timer has already fired and been consumed
    /// from the timer queue.
    pub fn expire(&mut self, id: u16) -> Option<PendingQuery> {
        self.entries.remove(&id)
    }

    /// Waits for the next fired timeout and yields its transaction ID.
    /// Resolves to `None` when no timer is armed.
    pub async fn next_timeout(&mut self) -> Option<u16> {
        let timers = &mut self.timers;
        std::future::poll_fn(|cx| timers.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
