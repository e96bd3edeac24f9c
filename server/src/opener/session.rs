use std::collections::BTreeSet;

use rand::Rng;

use crate::cards::Card;

use super::{
    packs::{generate_pack_with, Pack},
    PackConfig,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Unopened,
    Opening,
    Opened,
}

/// Something the user asked for. Opening is asynchronous and is handled by
/// whoever owns the session, see `Session::open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Open,
    Reveal { index: usize },
    Next,
    Prev,
    Reset,
}

/// One user's pack opening. Requests that don't make sense in the current
/// stage are ignored.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct Session {
    stage: Stage,
    pack: Pack,
    current_index: usize,
    revealed: BTreeSet<usize>,

    /// Bumped on every open and reset. A pending open only completes if it
    /// still carries the current generation.
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn pack(&self) -> &[Card] {
        &self.pack
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.pack.get(self.current_index)
    }

    pub fn revealed(&self) -> &BTreeSet<usize> {
        &self.revealed
    }

    pub fn is_revealed(&self, index: usize) -> bool {
        self.revealed.contains(&index)
    }

    pub fn all_revealed(&self) -> bool {
        self.stage == Stage::Opened && self.revealed.len() == self.pack.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn clear(&mut self) {
        self.pack.clear();
        self.current_index = 0;
        self.revealed.clear();
        self.generation += 1;
    }

    /// Begin opening a new pack, discarding any current one. Returns the
    /// generation to pass to `complete` once the opening delay has elapsed.
    pub fn open(&mut self) -> u64 {
        self.clear();
        self.stage = Stage::Opening;
        self.generation
    }

    /// Finish an open started with `open`. Does nothing and returns false if
    /// the session has been reset or reopened since.
    pub fn complete<R: Rng>(&mut self, generation: u64, pool: &[Card], rng: &mut R) -> bool {
        self.complete_with(generation, pool, &PackConfig::default(), rng)
    }

    pub fn complete_with<R: Rng>(
        &mut self,
        generation: u64,
        pool: &[Card],
        config: &PackConfig,
        rng: &mut R,
    ) -> bool {
        if self.stage != Stage::Opening || generation != self.generation {
            return false;
        }

        self.pack = generate_pack_with(pool, config, rng);
        self.current_index = 0;
        self.revealed.clear();
        self.stage = Stage::Opened;
        true
    }

    pub fn reveal(&mut self, index: usize) {
        if self.stage == Stage::Opened && index < self.pack.len() {
            self.revealed.insert(index);
        }
    }

    pub fn next(&mut self) {
        if self.stage == Stage::Opened && self.current_index + 1 < self.pack.len() {
            self.current_index += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.stage == Stage::Opened && self.current_index > 0 {
            self.current_index -= 1;
        }
    }

    pub fn reset(&mut self) {
        if self.stage != Stage::Unopened {
            self.clear();
            self.stage = Stage::Unopened;
        }
    }

    /// Apply a synchronous intent. Returns the generation of a newly started
    /// open, which the caller must complete later.
    pub fn apply(&mut self, intent: Intent) -> Option<u64> {
        match intent {
            Intent::Open => return Some(self.open()),
            Intent::Reveal { index } => self.reveal(index),
            Intent::Next => self.next(),
            Intent::Prev => self.prev(),
            Intent::Reset => self.reset(),
        }
        None
    }
}
