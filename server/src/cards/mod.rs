pub mod tcgdex;

/// Coarse rarity bucket used when building packs. Every printed rarity
/// (holo, ultra, secret, ...) that isn't common or uncommon is a rare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum RarityGroup {
    Common,
    Uncommon,
    Rare,
}

impl RarityGroup {
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.is_empty() || (label.contains("common") && !label.contains("uncommon")) {
            RarityGroup::Common
        } else if label.contains("uncommon") {
            RarityGroup::Uncommon
        } else {
            RarityGroup::Rare
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CardCount {
    pub total: u32,
    pub official: u32,
}

/// The parts of a set that each of its cards carries around.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SetRef {
    pub id: String,
    pub name: String,
    pub card_count: CardCount,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Card {
    pub id: String,

    /// Number of the card within its set, as printed.
    pub local_id: String,

    pub name: String,

    /// Raw rarity label, e.g. "Rare Holo". Never empty once a card leaves the
    /// catalog client.
    pub rarity: String,

    /// Base image references. Render with `image_url`.
    pub images: Vec<String>,

    pub category: Option<String>,
    pub hp: Option<u32>,
    pub types: Vec<String>,
    pub set: SetRef,
}

impl Card {
    pub fn rarity_group(&self) -> RarityGroup {
        RarityGroup::classify(&self.rarity)
    }

    pub fn is_rare(&self) -> bool {
        self.rarity_group() == RarityGroup::Rare
    }

    /// Concrete URL for the card's first image at the given quality ("high"
    /// or "low").
    pub fn image_url(&self, quality: &str) -> Option<String> {
        self.images
            .first()
            .map(|base| format!("{}/{quality}.webp", base.trim_end_matches('/')))
    }

    #[cfg(test)]
    pub fn sample(rarity: &str) -> Self {
        static ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(1);

        let id = ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Self::sample_with_id(&format!("tst-{id}"), rarity)
    }

    #[cfg(test)]
    pub fn sample_with_id(id: &str, rarity: &str) -> Self {
        Self {
            id: id.to_string(),
            local_id: id.rsplit('-').next().unwrap_or(id).to_string(),
            name: format!("Card {id}"),
            rarity: rarity.to_string(),
            images: vec![format!("https://example.com/tst/{id}")],
            category: Some("Pokemon".to_string()),
            hp: Some(60),
            types: vec!["Grass".to_string()],
            set: SetRef {
                id: "tst".to_string(),
                name: "Test Set".to_string(),
                card_count: CardCount {
                    total: 100,
                    official: 100,
                },
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Series {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CardSet {
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
    pub symbol: Option<String>,
    pub release_date: Option<String>,
    pub card_count: CardCount,
    pub series: Option<Series>,

    /// Only present when the set was fetched individually.
    pub cards: Option<Vec<Card>>,
}

impl CardSet {
    pub fn logo_url(&self) -> Option<String> {
        self.logo.as_ref().map(|logo| format!("{logo}.png"))
    }
}

#[cfg(test)]
mod test {
    use super::{Card, RarityGroup};

    #[test]
    fn test_classify() {
        assert_eq!(RarityGroup::classify("Common"), RarityGroup::Common);
        assert_eq!(RarityGroup::classify("Uncommon"), RarityGroup::Uncommon);
        assert_eq!(RarityGroup::classify("Rare Holo"), RarityGroup::Rare);
        assert_eq!(RarityGroup::classify(""), RarityGroup::Common);
        assert_eq!(RarityGroup::classify("UNCOMMON"), RarityGroup::Uncommon);
    }

    #[test]
    fn test_classify_folds_high_rarities() {
        for label in ["Rare", "Holo Rare V", "Ultra Rare", "Secret Rare", "None"] {
            assert_eq!(RarityGroup::classify(label), RarityGroup::Rare, "{label}");
        }
        assert_eq!(RarityGroup::classify("cOmMoN"), RarityGroup::Common);
    }

    #[test]
    fn test_image_url() {
        let mut card = Card::sample_with_id("sv1-001", "Common");
        assert_eq!(
            card.image_url("high").as_deref(),
            Some("https://example.com/tst/sv1-001/high.webp")
        );
        assert!(!card.is_rare());

        card.images.clear();
        assert!(card.image_url("low").is_none());
    }
}
