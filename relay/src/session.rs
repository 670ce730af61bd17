use derive_more::Display;
use futures::{
    future::{BoxFuture, Future, FutureExt},
    stream::{FuturesUnordered, StreamExt},
};
use rankedturbo_core::{
    cache::RatingCache,
    detector::{Verdict, WinDetector},
    host::Host,
    message::{Notification, Phase, Signal},
    opt_in::OptInTracker,
    player::{PlayerIdentity, Slot, Team},
    publisher::{Presentation, ResultPublisher},
    rating::Rating,
    settlement::{self, Settlement},
};
use rankedturbo_store::{RatingStore, StoreClient};
use std::{collections::HashMap, time::Duration};
use tokio::{sync::mpsc, time::sleep};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time between a winner being decided and ratings being settled.
    pub settle_delay: Duration,
    /// Time between settling and reading the new ratings back from the store.
    pub verify_delay: Duration,
    /// Time between the match starting and players being sent their current rating.
    pub start_push_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            verify_delay: Duration::from_millis(200),
            start_push_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Copy, Debug, Display, Default, PartialEq, Eq)]
#[display("{_0}")]
pub struct MatchId(u64);

/// State which lives for exactly one match.
#[derive(Debug, Default)]
struct MatchContext {
    id: MatchId,
    cache: RatingCache,
    opt_in: OptInTracker,
    detector: WinDetector,
    // Slots waiting for a rating fetch to finish before they are sent their current rating.
    awaiting_current: HashMap<PlayerIdentity, Vec<Slot>>,
}

#[derive(Debug)]
enum Deferred {
    Settle { winner: Team },
    Verify { settlements: Vec<Settlement> },
    PushCurrent,
}

#[derive(Debug)]
enum Completion {
    Warmed {
        identity: PlayerIdentity,
        rating: Rating,
    },
    Written {
        identity: PlayerIdentity,
        ok: bool,
    },
    Verified {
        settlement: Settlement,
        rating: Option<Rating>,
    },
}

#[derive(Debug)]
enum Event {
    Timer(Deferred),
    Store(Completion),
}

/// Drives rating settlement for a sequence of matches on a single task.
///
/// Engine signals arrive over a channel. Timers and store requests are futures owned by the session
/// and polled by the same loop, so every component is only ever touched from one place and nothing
/// needs a lock. Each deferred future is tagged with the match it was started in; if a new match has
/// begun by the time it completes, the result is discarded.
pub struct Session<H, P, S> {
    host: H,
    publisher: ResultPublisher<P>,
    store: StoreClient<S>,
    config: SessionConfig,
    current: MatchContext,
    matches: u64,
    pending: FuturesUnordered<BoxFuture<'static, (MatchId, Event)>>,
}

impl<H, P, S> Session<H, P, S>
where
    H: Host,
    P: Presentation,
    S: RatingStore + Clone + Send + Sync + 'static,
{
    pub fn new(host: H, presentation: P, store: StoreClient<S>, config: SessionConfig) -> Self {
        Self {
            host,
            publisher: ResultPublisher::new(presentation),
            store,
            config,
            current: Default::default(),
            matches: 0,
            pending: Default::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn cache(&self) -> &RatingCache {
        &self.current.cache
    }

    pub fn opt_in(&self) -> &OptInTracker {
        &self.current.opt_in
    }

    pub fn detector(&self) -> &WinDetector {
        &self.current.detector
    }

    pub fn match_id(&self) -> MatchId {
        self.current.id
    }

    /// Process signals until `inbound` is closed and all deferred work has finished.
    pub async fn run(&mut self, inbound: mpsc::Receiver<Signal>) {
        self.run_with(inbound, Self::handle).await
    }

    /// Like [`run`](Self::run), but for an inbound stream carrying more than engine signals.
    ///
    /// Each item is passed to `handle` in the order it was received, interleaved with deferred work
    /// on the same loop.
    pub async fn run_with<T>(
        &mut self,
        mut inbound: mpsc::Receiver<T>,
        mut handle: impl FnMut(&mut Self, T),
    ) {
        let mut open = true;
        while open || !self.pending.is_empty() {
            tokio::select! {
                item = inbound.recv(), if open => match item {
                    Some(item) => handle(self, item),
                    None => {
                        tracing::debug!(pending = self.pending.len(), "inbound signals closed");
                        open = false;
                    }
                },
                Some((id, event)) = self.pending.next(), if !self.pending.is_empty() => {
                    self.dispatch(id, event);
                }
            }
        }
    }

    /// Handle a single engine signal.
    pub fn handle(&mut self, signal: Signal) {
        tracing::debug!(?signal, "signal");
        match signal {
            Signal::PhaseChanged { phase } => self.phase_changed(phase),
            Signal::OptIn { slot } => self.opt_in_clicked(slot),
            Signal::EntityKilled { killed, attacker } => {
                if let Some(verdict) = self
                    .current
                    .detector
                    .entity_killed(&killed, attacker.as_ref())
                {
                    self.decided(verdict);
                }
            }
            Signal::TeamWin { team } => {
                if let Some(verdict) = self.current.detector.team_win(team) {
                    self.decided(verdict);
                }
            }
        }
    }

    fn phase_changed(&mut self, phase: Phase) {
        match phase {
            Phase::PreMatch => {
                self.matches += 1;
                self.current = MatchContext {
                    id: MatchId(self.matches),
                    ..Default::default()
                };
                tracing::info!(id = %self.current.id, "new match");
                self.warm();
            }
            Phase::InProgress => {
                tracing::info!(id = %self.current.id, "match started");
                self.defer(self.config.start_push_delay, Deferred::PushCurrent);
            }
            Phase::Setup | Phase::PostGame => {
                tracing::debug!(?phase, "phase changed");
            }
        }
    }

    fn warm(&mut self) {
        let participants = self.host.participants();
        let missing = self
            .current
            .cache
            .begin_warm(participants.iter().map(|participant| &participant.identity));
        tracing::debug!(players = participants.len(), fetching = missing.len(), "warming cache");
        for identity in missing {
            let store = self.store.clone();
            self.request(async move {
                let rating = store.get_or_init(&identity).await;
                Completion::Warmed { identity, rating }
            });
        }
    }

    fn opt_in_clicked(&mut self, slot: Slot) {
        if self.current.detector.is_decided() {
            tracing::info!(%slot, "ignoring opt-in after the match was decided");
            return;
        }
        let Some(participant) = self.current.opt_in.record(&self.host, slot) else {
            return;
        };
        if let Err(err) = self
            .host
            .announce(&format!("{}: I doubled down!", participant.name))
        {
            tracing::warn!(%slot, "failed to announce opt-in: {err:#}");
        }
    }

    fn decided(&mut self, verdict: Verdict) {
        if verdict.must_declare() {
            if let Err(err) = self.host.declare_winner(verdict.winner) {
                tracing::error!(winner = %verdict.winner, "failed to declare winner: {err:#}");
            }
        }
        self.defer(
            self.config.settle_delay,
            Deferred::Settle {
                winner: verdict.winner,
            },
        );
        self.current.detector.settlement_scheduled();
    }

    fn dispatch(&mut self, id: MatchId, event: Event) {
        if id != self.current.id {
            tracing::debug!(%id, current = %self.current.id, ?event, "dropping event from old match");
            return;
        }
        match event {
            Event::Timer(deferred) => {
                if let Err(err) = self.fire(deferred) {
                    tracing::error!("deferred callback failed: {err:#}");
                }
            }
            Event::Store(completion) => self.complete(completion),
        }
    }

    fn fire(&mut self, deferred: Deferred) -> anyhow::Result<()> {
        match deferred {
            Deferred::Settle { winner } => self.settle(winner)?,
            Deferred::Verify { settlements } => {
                for settlement in settlements {
                    let store = self.store.clone();
                    self.request(async move {
                        let rating = store.read(&settlement.identity).await;
                        Completion::Verified { settlement, rating }
                    });
                }
            }
            Deferred::PushCurrent => self.push_current(),
        }
        Ok(())
    }

    fn settle(&mut self, winner: Team) -> anyhow::Result<()> {
        tracing::info!(%winner, "settling ratings");
        let settlements = settlement::finalize(
            &self.host,
            &mut self.current.cache,
            &self.current.opt_in,
            winner,
            self.store.baseline(),
        )?;

        for settlement in &settlements {
            let store = self.store.clone();
            let identity = settlement.identity.clone();
            let rating = settlement.new;
            self.request(async move {
                let ok = store.write(&identity, rating).await;
                Completion::Written { identity, ok }
            });
            self.publisher
                .publish(&settlement.identity, &settlement.snapshot());
        }

        self.defer(self.config.verify_delay, Deferred::Verify { settlements });
        Ok(())
    }

    fn push_current(&mut self) {
        for participant in self.host.participants() {
            if participant.is_bot() {
                continue;
            }
            if let Some(mmr) = self.current.cache.get(&participant.identity) {
                self.notify(participant.slot, Notification::Current { mmr });
                continue;
            }

            // Joins a fetch already in flight from warming, if there is one.
            let missing = self.current.cache.begin_warm([&participant.identity]);
            self.current
                .awaiting_current
                .entry(participant.identity.clone())
                .or_default()
                .push(participant.slot);
            for identity in missing {
                let store = self.store.clone();
                self.request(async move {
                    let rating = store.get_or_init(&identity).await;
                    Completion::Warmed { identity, rating }
                });
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Warmed { identity, rating } => {
                let mmr = self.current.cache.finish_warm(identity.clone(), rating);
                tracing::debug!(%identity, rating = mmr, "cached rating");
                let slots = self
                    .current
                    .awaiting_current
                    .remove(&identity)
                    .unwrap_or_default();
                for slot in slots {
                    let still_here = self
                        .host
                        .participant(slot)
                        .is_some_and(|participant| participant.identity == identity);
                    if still_here {
                        self.notify(slot, Notification::Current { mmr });
                    }
                }
            }
            Completion::Written { identity, ok } => {
                tracing::debug!(%identity, ok, "settlement write finished");
            }
            Completion::Verified { settlement, rating } => {
                let verified = match rating {
                    Some(rating) => rating,
                    None => {
                        tracing::warn!(
                            identity = %settlement.identity,
                            "could not verify rating, keeping optimistic value"
                        );
                        settlement.new
                    }
                };
                if verified != settlement.new {
                    tracing::warn!(
                        identity = %settlement.identity,
                        optimistic = settlement.new,
                        verified,
                        "stored rating diverged"
                    );
                }
                tracing::info!(identity = %settlement.identity, old = settlement.old, new = verified, "verified");

                let verification = settlement.verify(&self.host, verified);
                for (slot, notification) in verification.notifications {
                    self.notify(slot, notification);
                }
                if let Some(snapshot) = verification.snapshot {
                    self.publisher.publish(&settlement.identity, &snapshot);
                }
            }
        }
    }

    fn notify(&mut self, slot: Slot, notification: Notification) {
        if let Err(err) = self.host.notify(slot, notification) {
            tracing::warn!(%slot, ?notification, "failed to notify player: {err:#}");
        }
    }

    fn defer(&mut self, delay: Duration, deferred: Deferred) {
        let id = self.current.id;
        self.pending.push(
            async move {
                sleep(delay).await;
                (id, Event::Timer(deferred))
            }
            .boxed(),
        );
    }

    fn request(&mut self, request: impl Future<Output = Completion> + Send + 'static) {
        let id = self.current.id;
        self.pending
            .push(async move { (id, Event::Store(request.await)) }.boxed());
    }
}
