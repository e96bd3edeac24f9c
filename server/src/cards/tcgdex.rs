use bytes::Buf;
use futures_util::{stream, StreamExt};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{
    cards::{Card, CardCount, CardSet, Series, SetRef},
    err, Res,
};

pub const DEFAULT_URL: &str = "https://api.tcgdex.net/v2/en";

const USER_AGENT: &str = concat!("packopener/", env!("CARGO_PKG_VERSION"));

/// Label given to cards the catalog has no rarity for.
const DEFAULT_RARITY: &str = "Common";

/// Maximum number of card detail requests in flight while hydrating a pool.
const HYDRATION_CONCURRENCY: usize = 8;

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub base_url: String,

    /// Sent as `X-Api-Key` when present.
    pub api_key: Option<String>,

    /// Fetch per-card details for cards listed in a set without a rarity.
    pub hydrate: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            api_key: None,
            hydrate: true,
        }
    }
}

fn decode_json<T: DeserializeOwned>(bytes: bytes::Bytes) -> Res<T> {
    serde_json::de::from_reader(bytes.reader()).map_err(|e| e.to_string())
}

#[derive(serde::Deserialize, Default, Clone, Copy)]
struct TcgdexCardCount {
    #[serde(default)]
    total: u32,

    #[serde(default)]
    official: u32,
}

impl From<TcgdexCardCount> for CardCount {
    fn from(count: TcgdexCardCount) -> Self {
        CardCount {
            total: count.total,
            official: count.official,
        }
    }
}

#[derive(serde::Deserialize)]
struct TcgdexSerie {
    id: String,
    name: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TcgdexSetRef {
    id: String,
    name: String,

    #[serde(default)]
    card_count: TcgdexCardCount,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TcgdexCard {
    /// Globally unique, e.g. "swsh3-136".
    id: String,

    /// Number within the set, e.g. "136".
    local_id: String,

    name: String,

    /// Base asset URL, without quality or extension.
    image: Option<String>,

    /// Missing from the brief cards embedded in a set.
    rarity: Option<String>,

    category: Option<String>,
    hp: Option<u32>,

    #[serde(default)]
    types: Vec<String>,

    /// Only present on the full card.
    set: Option<TcgdexSetRef>,
}

impl TcgdexCard {
    fn to_card(self, owner: &SetRef) -> Card {
        let set = match self.set {
            Some(set) => SetRef {
                id: set.id,
                name: set.name,
                card_count: set.card_count.into(),
            },
            None => owner.clone(),
        };

        let rarity = match self.rarity {
            Some(rarity) if !rarity.trim().is_empty() => rarity,
            _ => DEFAULT_RARITY.to_string(),
        };

        Card {
            id: self.id,
            local_id: self.local_id,
            name: self.name,
            rarity,
            images: self.image.into_iter().collect(),
            category: self.category,
            hp: self.hp,
            types: self.types,
            set,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TcgdexSet {
    id: String,
    name: String,
    logo: Option<String>,
    symbol: Option<String>,

    #[serde(default)]
    card_count: TcgdexCardCount,

    release_date: Option<String>,
    serie: Option<TcgdexSerie>,

    /// Brief cards. Only present when fetching a single set.
    cards: Option<Vec<TcgdexCard>>,
}

impl TcgdexSet {
    fn set_ref(&self) -> SetRef {
        SetRef {
            id: self.id.clone(),
            name: self.name.clone(),
            card_count: self.card_count.into(),
        }
    }

    fn to_set(self) -> CardSet {
        let owner = self.set_ref();
        CardSet {
            cards: self
                .cards
                .map(|cards| cards.into_iter().map(|c| c.to_card(&owner)).collect()),
            id: self.id,
            name: self.name,
            logo: self.logo,
            symbol: self.symbol,
            release_date: self.release_date,
            card_count: self.card_count.into(),
            series: self.serie.map(|s| Series {
                id: s.id,
                name: s.name,
            }),
        }
    }
}

/// Read-only client for the card catalog. Public operations never fail,
/// errors are logged and turned into empty results.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base: Url,
    config: CatalogConfig,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> Res<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| format!("Invalid catalog URL {}: {e}", config.base_url))?;
        if base.cannot_be_a_base() {
            return err(format!("Invalid catalog URL {}", config.base_url));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self { http, base, config })
    }

    fn url(&self, segments: &[&str]) -> Res<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| format!("Catalog URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document. Ok(None) if the catalog reports it doesn't exist.
    async fn fetch<T: DeserializeOwned>(&self, segments: &[&str]) -> Res<Option<T>> {
        let url = self.url(segments)?;
        let mut request = self.http.get(url.clone());
        if let Some(key) = &self.config.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return err(format!("{url} returned {status}"));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        decode_json(bytes).map(Some)
    }

    async fn fetch_set(&self, id: &str) -> Option<TcgdexSet> {
        match self.fetch::<TcgdexSet>(&["sets", id]).await {
            Ok(Some(set)) => Some(set),
            Ok(None) => {
                tracing::debug!("Set {id} not found in catalog.");
                None
            }
            Err(e) => {
                tracing::error!("Error fetching set {id}: {e}");
                None
            }
        }
    }

    pub async fn list_sets(&self) -> Vec<CardSet> {
        match self.fetch::<Vec<TcgdexSet>>(&["sets"]).await {
            Ok(Some(sets)) => sets.into_iter().map(TcgdexSet::to_set).collect(),
            Ok(None) => {
                tracing::error!("Failed to fetch sets: catalog returned not found.");
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to fetch sets: {e}");
                Vec::new()
            }
        }
    }

    pub async fn get_set(&self, id: &str) -> Option<CardSet> {
        self.fetch_set(id).await.map(TcgdexSet::to_set)
    }

    /// All cards of a set, each with a rarity label and a reference back to
    /// the set.
    pub async fn card_pool(&self, set_id: &str) -> Vec<Card> {
        let Some(mut set) = self.fetch_set(set_id).await else {
            return Vec::new();
        };
        let owner = set.set_ref();
        let cards = match set.cards.take() {
            Some(cards) if !cards.is_empty() => cards,
            _ => {
                tracing::error!("No cards found for set {set_id}");
                return Vec::new();
            }
        };

        let cards = if self.config.hydrate {
            self.hydrate(cards).await
        } else {
            cards
        };

        tracing::debug!("Loaded pool of {} cards for set {set_id}.", cards.len());
        cards.into_iter().map(|c| c.to_card(&owner)).collect()
    }

    /// Replace brief cards lacking a rarity with their full catalog entry.
    /// Cards whose details can't be fetched are kept as they are.
    async fn hydrate(&self, cards: Vec<TcgdexCard>) -> Vec<TcgdexCard> {
        let missing = cards.iter().filter(|c| c.rarity.is_none()).count();
        if missing == 0 {
            return cards;
        }
        tracing::debug!("Fetching details for {missing} cards without a rarity.");

        stream::iter(cards)
            .map(|card| async move {
                if card.rarity.is_some() {
                    return card;
                }

                match self.fetch::<TcgdexCard>(&["cards", card.id.as_str()]).await {
                    Ok(Some(detail)) => detail,
                    Ok(None) => {
                        tracing::warn!("Card {} not found in catalog.", card.id);
                        card
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch card {}: {e}", card.id);
                        card
                    }
                }
            })
            .buffered(HYDRATION_CONCURRENCY)
            .collect()
            .await
    }
}
