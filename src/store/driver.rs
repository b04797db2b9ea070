//! The sync store: event subscription and fold driver.
//!
//! The store owns the sync lifecycle. On start it loads the cached state, asks the
//! initializer for the seed state, then scans each watched contract's event log from its
//! initialization block (or the cached position) to the chain head, folding every event
//! through the reducer strictly one at a time. After each step the resulting state is
//! persisted to the cache and published on a watch channel. Once the scan reaches the
//! head the store emits the caught-up marker and keeps polling for new blocks.
//!
//! Reduction is serialized by construction: each fold is fully awaited before the next
//! event's fold begins, so the reducer needs no locking. A failed reduction propagates
//! out of the store; per-event retry is not this layer's concern.

use crate::chain::{ChainEvent, ChainReader, ContractHandle};
use crate::store::cache::StateCacheRepository;
use crate::store::events::{sync_marker, SYNC_CAUGHT_UP_EVENT, SYNC_STARTED_EVENT};
use crate::store::init::StateInitializer;
use crate::store::progress::SyncProgress;
use crate::store::reducer::EventReducer;
use crate::store::state::AppState;
use crate::store::SyncError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A watched contract and the block its event log scan starts at.
pub struct External {
    pub contract: ContractHandle,
    pub initialization_block: u64,
}

/// Drives the reducer over the union of events from the watched contracts.
pub struct SyncStore {
    reader: Arc<dyn ChainReader>,
    reducer: EventReducer,
    initializer: StateInitializer,
    externals: Vec<External>,
    cache: Arc<dyn StateCacheRepository>,
    poll_interval: Duration,
    publisher: watch::Sender<AppState>,
    progress: SyncProgress,
}

impl SyncStore {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        reducer: EventReducer,
        initializer: StateInitializer,
        externals: Vec<External>,
        cache: Arc<dyn StateCacheRepository>,
        poll_interval: Duration,
    ) -> Self {
        let (publisher, _) = watch::channel(AppState::default());
        Self {
            reader,
            reducer,
            initializer,
            externals,
            cache,
            poll_interval,
            publisher,
            progress: SyncProgress::new(),
        }
    }

    /// Subscribe to state snapshots. A new snapshot is published after every fold.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.publisher.subscribe()
    }

    /// Seed the state and fold the historical event log up to the current head.
    ///
    /// Returns the caught-up state and the next block the poll loop should scan from.
    pub async fn catch_up(&mut self) -> Result<(AppState, u64), SyncError> {
        let (cached_state, cached_block) = match self.cache.load().await? {
            Some((state, block)) => {
                info!("Resuming from cached state at block {}", block);
                (Some(state), Some(block))
            }
            None => {
                info!("No cached state, scanning from the initialization blocks");
                (None, None)
            }
        };

        let state = self.initializer.initial_state(cached_state).await?;
        let head = self.reader.block_number().await?;

        let state = self
            .step(state, &sync_marker(SYNC_STARTED_EVENT, head), None)
            .await?;

        let events = self
            .collect_events(cached_block.map(|block| block + 1), head)
            .await?;
        info!("Folding {} events up to block {}", events.len(), head);
        let state = self.fold_events(state, &events).await?;

        let state = self
            .step(state, &sync_marker(SYNC_CAUGHT_UP_EVENT, head), Some(head))
            .await?;
        self.progress.log_progress(true);
        info!("Caught up with the chain head: {}", self.progress.summary());

        Ok((state, head + 1))
    }

    /// Run the store: catch up, then poll the head and fold new events forever.
    pub async fn run(mut self) -> Result<(), SyncError> {
        let (mut state, mut next_block) = self.catch_up().await?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // the first tick completes immediately

        loop {
            ticker.tick().await;

            let head = self.reader.block_number().await?;
            if head < next_block {
                continue;
            }

            let events = self.collect_events(Some(next_block), head).await?;
            if events.is_empty() {
                next_block = head + 1;
                continue;
            }

            debug!(
                "Folding {} new events in blocks {}..={}",
                events.len(),
                next_block,
                head
            );
            state = self.fold_events(state, &events).await?;
            self.cache.save(&state, head).await?;
            next_block = head + 1;
        }
    }

    /// Fetch the watched contracts' events over a block range, ordered by block number.
    ///
    /// `from_override` replaces each external's initialization block as the scan start
    /// (used when resuming from a cached position), but never reaches below it. The sort
    /// is stable, so same-block events keep the externals' declaration order.
    async fn collect_events(
        &self,
        from_override: Option<u64>,
        to: u64,
    ) -> Result<Vec<ChainEvent>, SyncError> {
        let mut events = Vec::new();
        for external in &self.externals {
            let from = from_override
                .unwrap_or(external.initialization_block)
                .max(external.initialization_block);
            if from > to {
                continue;
            }
            events.extend(
                self.reader
                    .fetch_events(external.contract.address(), from, to)
                    .await?,
            );
        }
        events.sort_by_key(|event| event.block_number);
        Ok(events)
    }

    /// Fold a batch of events, persisting the cache position only up to blocks that have
    /// been folded completely, so a crash mid-block replays the whole block on restart.
    async fn fold_events(
        &mut self,
        mut state: AppState,
        events: &[ChainEvent],
    ) -> Result<AppState, SyncError> {
        for (index, event) in events.iter().enumerate() {
            let block_complete = events
                .get(index + 1)
                .map(|next| next.block_number > event.block_number)
                .unwrap_or(false);
            let sync_block = if block_complete {
                Some(event.block_number)
            } else {
                event.block_number.checked_sub(1)
            };
            state = self.step(state, event, sync_block).await?;
        }
        Ok(state)
    }

    /// One reduction step: fold, then persist and publish the result.
    async fn step(
        &mut self,
        state: AppState,
        event: &ChainEvent,
        sync_block: Option<u64>,
    ) -> Result<AppState, SyncError> {
        let next = self.reducer.reduce(state, event).await?;
        self.progress.record_event(event.block_number);
        self.progress.log_progress(false);

        if let Some(block) = sync_block {
            self.cache.save(&next, block).await?;
        }
        self.publisher.send_replace(next.clone());
        Ok(next)
    }
}
