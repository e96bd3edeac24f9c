pub mod handlers;
pub mod packs;
pub mod server;
pub mod session;

/// Slot layout of a pack.
#[derive(Clone, Debug)]
pub struct PackConfig {
    pub cards_per_pack: usize,
    pub commons: usize,
    pub uncommons: usize,
    pub rares: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        PackConfig {
            cards_per_pack: 10,
            commons: 6,
            uncommons: 3,
            rares: 1,
        }
    }
}
