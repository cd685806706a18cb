use once_cell::sync::Lazy;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::{Card, Color};
use crate::fetch::{CardSource, FetchError, FetchResult, PageRequest};

pub const DEFAULT_API_URL: &str = "https://api.magicthegathering.io/v1";

const AGENT: &str = concat!("alexandria/", env!("CARGO_PKG_VERSION"));

static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    build_client(Duration::from_secs(30)).unwrap_or_else(|err| {
        warn!("Falling back to a client without timeout: {}", err);
        reqwest::Client::new()
    })
});

fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn check_status(status: StatusCode) -> FetchResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::StatusError(status.as_u16()))
    }
}

/// A 404 on a detail request means the id is unknown.
fn detail_error(err: FetchError, id: &str) -> FetchError {
    match err {
        FetchError::StatusError(code) if code == StatusCode::NOT_FOUND.as_u16() => {
            FetchError::NotFound(id.to_owned())
        }
        other => other,
    }
}

// ---- Raw magicthegathering.io JSON Datafields ---- //

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCard {
    id: String,
    name: String,
    #[serde(rename = "type")]
    type_line: String,
    #[serde(default)]
    cmc: f64,
    mana_cost: Option<String>,
    text: Option<String>,
    power: Option<String>,
    toughness: Option<String>,
    #[serde(default)]
    set_name: String,
    #[serde(default)]
    rarity: String,
    image_url: Option<String>,
    #[serde(default)]
    color_identity: Vec<String>,
}

#[derive(Deserialize)]
struct RawPage {
    cards: Vec<RawCard>,
}

#[derive(Deserialize)]
struct RawDetail {
    card: RawCard,
}

// -------------------------------------- //

impl TryFrom<RawCard> for Card {
    type Error = FetchError;

    fn try_from(raw: RawCard) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(FetchError::DataParseError(format!(
                "card '{}' has an empty id",
                raw.name
            )));
        }
        if raw.name.trim().is_empty() {
            return Err(FetchError::DataParseError(format!(
                "card {} has an empty name",
                raw.id
            )));
        }
        let mut color_identity = BTreeSet::<Color>::new();
        for symbol in raw.color_identity.iter() {
            match symbol.parse::<Color>() {
                Ok(c) => {
                    color_identity.insert(c);
                }
                Err(err) => warn!(card = %raw.id, "Ignoring color identity symbol: {}", err),
            }
        }
        Ok(Card {
            id: raw.id,
            name: raw.name,
            image_url: raw.image_url.filter(|u| !u.is_empty()),
            type_line: raw.type_line,
            cmc: raw.cmc,
            mana_cost: raw.mana_cost,
            text: raw.text,
            power: raw.power,
            toughness: raw.toughness,
            set_name: raw.set_name,
            rarity: raw.rarity,
            color_identity,
        })
    }
}

fn parse_page(body: &str) -> FetchResult<Vec<Card>> {
    let page: RawPage = serde_json::from_str(body)?;
    page.cards
        .into_iter()
        .map(Card::try_from)
        .collect::<FetchResult<Vec<Card>>>()
}

fn parse_detail(body: &str) -> FetchResult<Card> {
    let detail: RawDetail = serde_json::from_str(body)?;
    Card::try_from(detail.card)
}

// ---- Interface ---- //

#[derive(Clone)]
pub struct MtgIoFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl MtgIoFetcher {
    pub fn new(base_url: &str) -> Self {
        MtgIoFetcher {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: SHARED_CLIENT.clone(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> FetchResult<Self> {
        Ok(MtgIoFetcher {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client(timeout).map_err(FetchError::ClientError)?,
        })
    }

    pub fn page_url(&self, request: &PageRequest) -> String {
        let mut url = format!(
            "{}/cards?page={}&pageSize={}",
            self.base_url, request.page, request.page_size
        );
        if let Some(fragment) = request.filter.query_fragment() {
            url.push('&');
            url.push_str(&fragment);
        }
        url
    }

    /// Detail URL with `id` as a single encoded path segment.
    pub fn card_url(&self, id: &str) -> FetchResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| FetchError::InvalidUrl(format!("{}: {}", self.base_url, err)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("cards")
            .push(id);
        Ok(url)
    }

    async fn get_body(&self, url: &str) -> FetchResult<String> {
        let retrieval = |source| FetchError::RetrievalError {
            url: url.to_owned(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(retrieval)?;
        check_status(resp.status())?;
        resp.text().await.map_err(retrieval)
    }
}

impl Default for MtgIoFetcher {
    fn default() -> Self {
        MtgIoFetcher::new(DEFAULT_API_URL)
    }
}

impl CardSource for MtgIoFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> FetchResult<Vec<Card>> {
        let url = self.page_url(request);
        debug!(%url, "Fetching card page");
        let body = self.get_body(&url).await?;
        parse_page(&body)
    }

    async fn fetch_card(&self, id: &str) -> FetchResult<Card> {
        let url = self.card_url(id)?;
        debug!(%url, "Fetching card detail");
        let body = self
            .get_body(url.as_str())
            .await
            .map_err(|err| detail_error(err, id))?;
        parse_detail(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColorFilter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PAGE: &str = r#"{
        "cards": [
            {
                "name": "Shock",
                "manaCost": "{R}",
                "cmc": 1.0,
                "colors": ["Red"],
                "colorIdentity": ["R"],
                "type": "Instant",
                "rarity": "Common",
                "set": "M19",
                "setName": "Core Set 2019",
                "text": "Shock deals 2 damage to any target.",
                "imageUrl": "http://gatherer.wizards.com/Handlers/Image.ashx?multiverseid=447364&type=card",
                "id": "4d3e2b9f-1f8e-5b8a-9a5c-6d1b0b3b2b1a"
            },
            {
                "name": "Grizzly Bears",
                "manaCost": "{1}{G}",
                "cmc": 2,
                "colorIdentity": ["G"],
                "type": "Creature — Bear",
                "rarity": "Common",
                "setName": "Limited Edition Alpha",
                "power": "2",
                "toughness": "2",
                "id": "a1"
            }
        ]
    }"#;

    #[test]
    fn parses_page_into_cards() {
        let cards = parse_page(PAGE).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].name, "Shock");
        assert_eq!(cards[0].mana_cost.as_deref(), Some("{R}"));
        assert!(cards[0].color_identity.contains(&Color::Red));
        assert!(cards[0].image_url.is_some());
        assert_eq!(cards[1].cmc, 2.0);
        assert_eq!(cards[1].power_toughness().as_deref(), Some("2/2"));
        assert_eq!(cards[1].image_url, None);
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let body = r#"{"cards": [{"id": "x", "type": "Instant"}]}"#;
        assert!(matches!(
            parse_page(body),
            Err(FetchError::DataParseError(_))
        ));
    }

    #[test]
    fn empty_name_is_parse_error() {
        let body = r#"{"card": {"id": "x", "name": " ", "type": "Instant"}}"#;
        assert!(matches!(
            parse_detail(body),
            Err(FetchError::DataParseError(_))
        ));
    }

    #[test]
    fn unexpected_shape_is_parse_error() {
        assert!(matches!(
            parse_page(r#"{"data": []}"#),
            Err(FetchError::DataParseError(_))
        ));
        assert!(matches!(
            parse_page("<html></html>"),
            Err(FetchError::DataParseError(_))
        ));
    }

    #[test]
    fn unknown_identity_symbols_are_dropped() {
        let body = r#"{"card": {"id": "x", "name": "Odd", "type": "Artifact", "colorIdentity": ["C", "U"]}}"#;
        let card = parse_detail(body).unwrap();
        assert_eq!(card.color_identity, BTreeSet::from([Color::Blue]));
    }

    #[test]
    fn builds_page_urls() {
        let fetcher = MtgIoFetcher::new("https://example.test/v1/");
        let mut req = PageRequest::first(ColorFilter::default());
        assert_eq!(
            fetcher.page_url(&req),
            "https://example.test/v1/cards?page=1&pageSize=100"
        );
        req.page = 3;
        req.filter = ColorFilter::parse("ur").unwrap();
        assert_eq!(
            fetcher.page_url(&req),
            "https://example.test/v1/cards?page=3&pageSize=100&colors=blue,red"
        );
        assert_eq!(
            fetcher.card_url("abc").unwrap().as_str(),
            "https://example.test/v1/cards/abc"
        );
    }

    #[test]
    fn card_id_stays_inside_cards_path() {
        let fetcher = MtgIoFetcher::new("https://example.test/v1");
        let url = fetcher.card_url("../sets").unwrap();
        let segments = url.path_segments().unwrap().collect::<Vec<&str>>();
        assert_eq!(segments.len(), 3);
        assert_eq!(&segments[..2], &["v1", "cards"]);
        assert_ne!(url.path(), "/v1/sets");
        assert!(matches!(
            MtgIoFetcher::new("not a url").card_url("abc"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn non_success_status_is_an_error() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(matches!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(FetchError::StatusError(500))
        ));
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND),
            Err(FetchError::StatusError(404))
        ));
    }

    #[test]
    fn detail_404_means_not_found() {
        assert!(matches!(
            detail_error(FetchError::StatusError(404), "abc"),
            FetchError::NotFound(id) if id == "abc"
        ));
        assert!(matches!(
            detail_error(FetchError::StatusError(500), "abc"),
            FetchError::StatusError(500)
        ));
    }

    /// Answers every connection on 127.0.0.1 with `status_line` and an
    /// empty body, or holds it open without answering when `None`.
    async fn local_server(status_line: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = vec![];
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                match status_line {
                    Some(status) => {
                        let resp = format!(
                            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                            status
                        );
                        let _ = sock.write_all(resp.as_bytes()).await;
                        let _ = sock.shutdown().await;
                    }
                    None => held.push(sock),
                }
            }
        });
        format!("http://{}/v1", addr)
    }

    fn local_fetcher(base_url: &str, timeout: Duration) -> MtgIoFetcher {
        MtgIoFetcher {
            base_url: base_url.to_owned(),
            client: reqwest::Client::builder()
                .no_proxy()
                .timeout(timeout)
                .build()
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn http_404_on_detail_is_not_found() {
        let base = local_server(Some("404 Not Found")).await;
        let fetcher = local_fetcher(&base, Duration::from_secs(5));
        assert!(matches!(
            fetcher.fetch_card("abc").await,
            Err(FetchError::NotFound(id)) if id == "abc"
        ));
    }

    #[tokio::test]
    async fn http_500_on_page_is_status_error() {
        let base = local_server(Some("500 Internal Server Error")).await;
        let fetcher = local_fetcher(&base, Duration::from_secs(5));
        let req = PageRequest::first(ColorFilter::default());
        assert!(matches!(
            fetcher.fetch_page(&req).await,
            Err(FetchError::StatusError(500))
        ));
    }

    #[tokio::test]
    async fn configured_timeout_applies() {
        assert!(MtgIoFetcher::with_timeout(DEFAULT_API_URL, Duration::from_secs(1)).is_ok());

        let base = local_server(None).await;
        let fetcher = local_fetcher(&base, Duration::from_millis(200));
        let req = PageRequest::first(ColorFilter::default());
        match fetcher.fetch_page(&req).await {
            Err(FetchError::RetrievalError { source, .. }) => assert!(source.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other.map(|c| c.len())),
        }
    }
}
