use std::{path::PathBuf, time::Duration};

use crate::{cards::tcgdex::CatalogConfig, err, Res};

pub const USAGE: &str = "Usage: server <static path> <port>

Environment:
    CATALOG_URL      catalog API base URL (default https://api.tcgdex.net/v2/en)
    CATALOG_API_KEY  sent to the catalog as X-Api-Key
    CATALOG_HYDRATE  set to 0 or false to skip per-card rarity lookups
    OPEN_DELAY_MS    delay before an opened pack is revealed (default 1500)";

const DEFAULT_OPEN_DELAY_MS: u64 = 1500;

#[derive(Debug)]
pub struct Config {
    /// Directory of static presentation files.
    pub content: PathBuf,
    pub port: u16,
    pub catalog: CatalogConfig,
    pub open_delay: Duration,
}

impl Config {
    pub fn from_env() -> Res<Self> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    fn parse<A, E>(mut args: A, env: E) -> Res<Self>
    where
        A: Iterator<Item = String>,
        E: Fn(&str) -> Option<String>,
    {
        let Some(content) = args.next() else {
            return err("Missing static path.");
        };
        let Some(port) = args.next() else {
            return err("Missing port.");
        };
        let Ok(port) = port.parse::<u16>() else {
            return err(format!("Invalid port number: {port}"));
        };

        let mut catalog = CatalogConfig::default();
        if let Some(url) = env("CATALOG_URL").filter(|s| !s.is_empty()) {
            catalog.base_url = url;
        }
        catalog.api_key = env("CATALOG_API_KEY").filter(|s| !s.is_empty());
        if let Some(hydrate) = env("CATALOG_HYDRATE") {
            catalog.hydrate = match hydrate.to_ascii_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => return err(format!("Invalid value for CATALOG_HYDRATE: {hydrate}")),
            };
        }

        let open_delay = match env("OPEN_DELAY_MS") {
            Some(ms) => match ms.parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => return err(format!("Invalid value for OPEN_DELAY_MS: {ms}")),
            },
            None => Duration::from_millis(DEFAULT_OPEN_DELAY_MS),
        };

        Ok(Config {
            content: PathBuf::from(content),
            port,
            catalog,
            open_delay,
        })
    }
}
