use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use uuid::Uuid;

use crate::cards::{Card, CardSet};

use super::session::{Intent, Session};

/// Rendering details for the card on display.
#[derive(Debug, serde::Serialize)]
pub struct CurrentCard {
    index: usize,
    image: Option<String>,
    rare: bool,
    revealed: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMessage {
    /// Sent once, before any snapshot.
    Ready {
        set: CardSet,
        logo: Option<String>,
        pool_size: usize,
    },
    Snapshot {
        session: Session,
        current: Option<CurrentCard>,
        all_revealed: bool,
    },
    /// The set couldn't be loaded. The connection is closed after this.
    Unavailable,
}

impl SessionMessage {
    pub fn ready(set: CardSet, pool_size: usize) -> Self {
        SessionMessage::Ready {
            logo: set.logo_url(),
            set,
            pool_size,
        }
    }

    pub fn snapshot(session: &Session) -> Self {
        let index = session.current_index();
        let current = session.current_card().map(|card| CurrentCard {
            index,
            image: card.image_url("high"),
            rare: card.is_rare(),
            revealed: session.is_revealed(index),
        });
        SessionMessage::Snapshot {
            session: session.clone(),
            current,
            all_revealed: session.all_revealed(),
        }
    }
}

#[derive(Debug)]
pub enum SessionRequest {
    Intent(Intent),
    /// The opening delay for the given generation has passed.
    DelayElapsed(u64),
}

/// Owns a single session and processes requests for it one at a time.
pub struct SessionServer {
    id: Uuid,
    session: Session,
    pool: Vec<Card>,
    delay: Duration,
    rng: StdRng,
    requests: UnboundedReceiver<SessionRequest>,

    /// Handed to delay timers. Weak so the server stops once the connection
    /// drops its sender and no timers are pending.
    timers: WeakUnboundedSender<SessionRequest>,

    client: UnboundedSender<SessionMessage>,
}

impl SessionServer {
    pub fn new(
        id: Uuid,
        pool: Vec<Card>,
        delay: Duration,
        client: UnboundedSender<SessionMessage>,
    ) -> (Self, UnboundedSender<SessionRequest>) {
        let (sender, requests) = unbounded_channel();
        let server = Self {
            id,
            session: Session::new(),
            pool,
            delay,
            rng: StdRng::from_entropy(),
            requests,
            timers: sender.downgrade(),
            client,
        };
        (server, sender)
    }

    #[cfg(test)]
    fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    fn schedule_completion(&self, generation: u64) {
        let Some(sender) = self.timers.upgrade() else {
            return;
        };
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sender.send(SessionRequest::DelayElapsed(generation)).ok();
        });
    }

    pub async fn run(mut self) {
        tracing::debug!(session = %self.id, "Session started with pool of {}.", self.pool.len());

        while let Some(req) = self.requests.recv().await {
            let changed = match req {
                SessionRequest::Intent(intent) => {
                    if let Some(generation) = self.session.apply(intent) {
                        self.schedule_completion(generation);
                    }
                    tracing::debug!(
                        session = %self.id,
                        "{intent:?}: now {:?} at generation {}, {} revealed.",
                        self.session.stage(),
                        self.session.generation(),
                        self.session.revealed().len()
                    );
                    true
                }
                SessionRequest::DelayElapsed(generation) => {
                    let completed = self.session.complete(generation, &self.pool, &mut self.rng);
                    if completed {
                        tracing::debug!(
                            session = %self.id,
                            "Opened pack of {} cards.",
                            self.session.pack().len()
                        );
                    } else {
                        tracing::debug!(session = %self.id, "Ignoring stale open {generation}.");
                    }
                    completed
                }
            };

            if changed {
                if self.client.send(SessionMessage::snapshot(&self.session)).is_err() {
                    break;
                }
            }
        }

        tracing::debug!(session = %self.id, "Session ended.");
    }
}
