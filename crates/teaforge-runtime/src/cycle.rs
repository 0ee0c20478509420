//! The cycle sequencer.
//!
//! One cycle applies the program's pending effects in order, then polls every
//! active subscription once. [`CycleRunner`] owns the platform state between
//! cycles and threads it through the kernel by value.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use teaforge_kernel::{Effect, PlatformState, Subscription, SubscriptionRecord, apply_all};
use tracing::{debug, warn};

/// Handle returned by [`CycleRunner::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Wall-clock timing of the cycles run so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleStats {
    pub cycles: u64,
    /// Cycles that took longer than the configured period.
    pub overruns: u64,
    pub last: Duration,
    pub max: Duration,
}

pub struct CycleRunner<M> {
    state: PlatformState,
    records: BTreeMap<SubscriptionId, SubscriptionRecord<M>>,
    next_id: u64,
    period: Duration,
    stats: CycleStats,
}

impl<M> CycleRunner<M> {
    pub fn new(state: PlatformState, period: Duration) -> Self {
        Self {
            state,
            records: BTreeMap::new(),
            next_id: 0,
            period,
            stats: CycleStats::default(),
        }
    }

    pub fn state(&self) -> &PlatformState {
        &self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of active subscriptions.
    pub fn active(&self) -> usize {
        self.records.len()
    }

    /// Start `subscription`; it is polled from the next cycle on.
    pub fn subscribe(&mut self, subscription: Subscription<M>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let record = subscription.start(&self.state);
        debug!(%id, kind = record.kind(), "subscribed");
        self.records.insert(id, record);
        id
    }

    /// Stop the subscription behind `id`. Unknown ids are ignored.
    pub fn unsubscribe(mut self, id: SubscriptionId) -> Self {
        if let Some(record) = self.records.remove(&id) {
            debug!(%id, kind = record.kind(), "unsubscribed");
            self.state = record.stop(self.state);
        }
        self
    }

    /// Run one cycle: `effects` first, in order, then one poll of every
    /// subscription in subscription order. Returns the runner and every
    /// message produced, effect messages first.
    pub fn run_cycle(mut self, effects: impl IntoIterator<Item = Effect<M>>) -> (Self, Vec<M>) {
        let started = Instant::now();

        let (state, mut messages) = apply_all(self.state, effects);
        self.state = state;
        for record in self.records.values_mut() {
            messages.extend(record.poll(&self.state));
        }

        let elapsed = started.elapsed();
        self.stats.cycles += 1;
        self.stats.last = elapsed;
        self.stats.max = self.stats.max.max(elapsed);
        if elapsed > self.period {
            self.stats.overruns += 1;
            warn!(
                cycle = self.stats.cycles,
                elapsed_us = elapsed.as_micros() as u64,
                period_us = self.period.as_micros() as u64,
                "cycle overran its period"
            );
        }
        (self, messages)
    }

    /// Stop every subscription, then release everything the state holds.
    pub fn shutdown(self) {
        let mut state = self.state;
        for (id, record) in self.records {
            debug!(%id, kind = record.kind(), "stopping subscription");
            state = record.stop(state);
        }
        state.shutdown();
    }
}

impl<M> fmt::Debug for CycleRunner<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleRunner")
            .field("period", &self.period)
            .field("subscriptions", &self.records.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
