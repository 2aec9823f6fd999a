//! HistoryFeed - live petition listings over StateManager events

use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::PetitionRecord;
use crate::session::{Identity, SessionManager};
use crate::state::{StateEvent, StateManager};

const FEED_BUFFER: usize = 16;

/// How often a feed checks the store for writes made by other processes
pub const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Newest first; ties broken by id, also descending
pub fn sort_newest_first(records: &mut [PetitionRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// Aborts the wrapped task when dropped
struct FeedTask(JoinHandle<()>);

impl Drop for FeedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Stream of full listings; cancelled by `cancel()` or drop
pub struct HistorySubscription {
    rx: mpsc::Receiver<Vec<PetitionRecord>>,
    _task: FeedTask,
}

impl HistorySubscription {
    /// Next full listing; `None` once the feed has stopped
    pub async fn next(&mut self) -> Option<Vec<PetitionRecord>> {
        self.rx.recv().await
    }

    pub fn cancel(self) {
        debug!("HistorySubscription::cancel: called");
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<PetitionRecord>> {
        futures::stream::unfold(self, |mut sub| async move { sub.next().await.map(|records| (records, sub)) })
    }
}

#[derive(Clone)]
pub struct HistoryFeed {
    state: StateManager,
    app_id: String,
    poll_interval: Duration,
}

impl HistoryFeed {
    pub fn new(state: StateManager, app_id: impl Into<String>) -> Self {
        Self {
            state,
            app_id: app_id.into(),
            poll_interval: EXTERNAL_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Current listing for `identity`, newest first
    pub async fn snapshot(&self, identity: &Identity) -> eyre::Result<Vec<PetitionRecord>> {
        debug!(uid = %identity.uid, "snapshot: called");
        let mut records = self.state.list_petitions(&self.app_id, &identity.uid).await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Follow one identity's petitions
    pub fn subscribe(&self, identity: &Identity) -> HistorySubscription {
        debug!(uid = %identity.uid, "subscribe: called");
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let task = tokio::spawn(feed_loop(self.clone(), identity.clone(), tx));
        HistorySubscription {
            rx,
            _task: FeedTask(task),
        }
    }

    /// Follow whoever is signed in to `session`
    ///
    /// Re-subscribes on every identity change and emits an empty listing
    /// while signed out. Each identity gets its own inner subscription, so
    /// listings still queued for a previous identity are dropped with it.
    pub fn follow(&self, session: &SessionManager) -> HistorySubscription {
        debug!("follow: called");
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let mut identities = session.watch();
        let feed = self.clone();

        let task = tokio::spawn(async move {
            loop {
                let current = identities.borrow_and_update().clone();
                let mut inner = match current {
                    Some(identity) => Some(feed.subscribe(&identity)),
                    None => {
                        if tx.send(Vec::new()).await.is_err() {
                            return;
                        }
                        None
                    }
                };

                let still_watching = loop {
                    tokio::select! {
                        biased;
                        changed = identities.changed() => break changed.is_ok(),
                        listing = next_listing(&mut inner) => match listing {
                            // A listing that raced an identity change belongs to the old identity
                            Some(_) if identities.has_changed().unwrap_or(true) => {}
                            Some(records) => {
                                if tx.send(records).await.is_err() {
                                    return;
                                }
                            }
                            None => inner = None,
                        },
                    }
                };
                if !still_watching {
                    break;
                }
            }
        });

        HistorySubscription {
            rx,
            _task: FeedTask(task),
        }
    }
}

/// Next listing of `sub`; never resolves without a subscription
async fn next_listing(sub: &mut Option<HistorySubscription>) -> Option<Vec<PetitionRecord>> {
    match sub {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

async fn feed_loop(feed: HistoryFeed, identity: Identity, tx: mpsc::Sender<Vec<PetitionRecord>>) {
    debug!(uid = %identity.uid, "feed_loop: started");
    // Subscribe before the first listing so no create slips between them
    let mut events = feed.state.subscribe_events();
    let mut data_version = feed.state.data_version().await.ok();
    let mut poll = tokio::time::interval(feed.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    poll.tick().await;

    let mut last = Vec::new();
    if !emit(&feed, &identity, &tx, &mut last, true).await {
        return;
    }

    loop {
        let keep_going = tokio::select! {
            event = events.recv() => match event {
                Ok(StateEvent::PetitionCreated { app_id, owner_id, .. })
                    if app_id == feed.app_id && owner_id == identity.uid =>
                {
                    emit(&feed, &identity, &tx, &mut last, true).await
                }
                Ok(_) => true,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "History feed lagged, resyncing");
                    emit(&feed, &identity, &tx, &mut last, true).await
                }
                Err(RecvError::Closed) => false,
            },
            _ = poll.tick() => {
                // Writes from other processes only show up as a new data version
                match feed.state.data_version().await {
                    Ok(version) if Some(version) != data_version => {
                        data_version = Some(version);
                        emit(&feed, &identity, &tx, &mut last, false).await
                    }
                    Ok(_) => true,
                    Err(e) => {
                        debug!(error = %e, "feed_loop: data version unavailable");
                        !tx.is_closed()
                    }
                }
            }
        };
        if !keep_going {
            break;
        }
    }
    debug!(uid = %identity.uid, "feed_loop: stopped");
}

/// Send the current listing; false once the subscriber is gone
///
/// Unless `force` is set, a listing equal to the last one sent is skipped.
async fn emit(
    feed: &HistoryFeed,
    identity: &Identity,
    tx: &mpsc::Sender<Vec<PetitionRecord>>,
    last: &mut Vec<PetitionRecord>,
    force: bool,
) -> bool {
    match feed.snapshot(identity).await {
        Ok(records) => {
            if !force && records == *last {
                return true;
            }
            *last = records.clone();
            tx.send(records).await.is_ok()
        }
        Err(e) => {
            warn!(uid = %identity.uid, error = %e, "Failed to list petitions");
            !tx.is_closed()
        }
    }
}
