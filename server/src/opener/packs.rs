use std::fmt::Debug;

use rand::{thread_rng, Rng};

use crate::cards::{Card, RarityGroup};

use super::PackConfig;

pub type Pack = Vec<Card>;

/// Positions in a card pool, bucketed by rarity group.
struct RarityBuckets {
    commons: Vec<usize>,
    uncommons: Vec<usize>,
    rares: Vec<usize>,
}

impl RarityBuckets {
    fn new(pool: &[Card]) -> Self {
        let mut buckets = Self {
            commons: Vec::new(),
            uncommons: Vec::new(),
            rares: Vec::new(),
        };
        for (i, card) in pool.iter().enumerate() {
            match card.rarity_group() {
                RarityGroup::Common => buckets.commons.push(i),
                RarityGroup::Uncommon => buckets.uncommons.push(i),
                RarityGroup::Rare => buckets.rares.push(i),
            }
        }
        buckets
    }

    fn bucket_mut(&mut self, rarity: RarityGroup) -> &mut Vec<usize> {
        match rarity {
            RarityGroup::Common => &mut self.commons,
            RarityGroup::Uncommon => &mut self.uncommons,
            RarityGroup::Rare => &mut self.rares,
        }
    }
}

impl Debug for RarityBuckets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RarityBuckets {{ commons: {}, uncommons: {}, rares: {} }}",
            self.commons.len(),
            self.uncommons.len(),
            self.rares.len()
        )
    }
}

/// Remove up to `count` uniformly chosen entries from `candidates` and push
/// them to `out`. Each pick swaps the last candidate into the hole, so every
/// call is bounded by `count` regardless of what's been picked before.
fn take_random<R: Rng>(
    rng: &mut R,
    candidates: &mut Vec<usize>,
    count: usize,
    out: &mut Vec<usize>,
) {
    for _ in 0..count {
        if candidates.is_empty() {
            break;
        }
        let index = rng.gen_range(0..candidates.len());
        out.push(candidates.swap_remove(index));
    }
}

/// Build a pack with the default layout: 6 commons, 3 uncommons and a rare,
/// topped up from the rest of the pool if any group runs short.
pub fn generate_pack(pool: &[Card]) -> Pack {
    generate_pack_with(pool, &PackConfig::default(), &mut thread_rng())
}

pub fn generate_pack_with<R: Rng>(pool: &[Card], config: &PackConfig, rng: &mut R) -> Pack {
    let mut buckets = RarityBuckets::new(pool);
    tracing::debug!("Generating pack from {buckets:?}");

    let mut picked = Vec::with_capacity(config.cards_per_pack);
    for (rarity, count) in [
        (RarityGroup::Common, config.commons),
        (RarityGroup::Uncommon, config.uncommons),
        (RarityGroup::Rare, config.rares),
    ] {
        take_random(rng, buckets.bucket_mut(rarity), count, &mut picked);
    }
    picked.truncate(config.cards_per_pack);

    if picked.len() < config.cards_per_pack {
        let mut chosen = vec![false; pool.len()];
        for &i in &picked {
            chosen[i] = true;
        }
        let mut remaining: Vec<usize> = (0..pool.len()).filter(|&i| !chosen[i]).collect();
        let missing = config.cards_per_pack - picked.len();
        take_random(rng, &mut remaining, missing, &mut picked);
    }

    picked.into_iter().map(|i| pool[i].clone()).collect()
}
