// crates/adapters/src/naver.rs
use crate::{Board, FundListing, ListingSource, PriceSnapshot, QuoteSource, RateLimiter};
use async_trait::async_trait;
use common::config::NaverConfig;
use common::{Error, Instrument, Result};
use once_cell::sync::Lazy;
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::time::Duration;

const MARKET_SUM_PATH: &str = "/sise/sise_market_sum.naver";
const ETF_LIST_PATH: &str = "/api/sise/etfItemList.nhn";
const ITEM_MAIN_PATH: &str = "/item/main.naver";

const TARGET_PRICE_LABEL: &str = "목표주가";

static LISTING_TABLE: Lazy<Selector> = Lazy::new(|| selector("table.type_2"));
static LISTING_ROW: Lazy<Selector> = Lazy::new(|| selector("tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a"));
static CURRENT_PRICE: Lazy<Selector> = Lazy::new(|| selector(".no_today .blind"));
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| selector("th"));
static EMPHASIS: Lazy<Selector> = Lazy::new(|| selector("em"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

/// Naver Finance scraper for listings and quotes
pub struct NaverFinance {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    quote_timeout: Duration,
    rate_limiter: RateLimiter,
}

impl NaverFinance {
    pub fn new(config: &NaverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.listing_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            quote_timeout: Duration::from_millis(config.quote_timeout_ms),
            rate_limiter: RateLimiter::new(config.rate_limit_burst, config.rate_limit_per_sec),
        })
    }

    async fn get_text(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.rate_limiter.acquire().await;

        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .header(USER_AGENT, &self.user_agent);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("{} {:?}", path, query))
            } else {
                Error::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("{} returned {}", path, status)));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ListingSource for NaverFinance {
    async fn market_cap_page(&self, board: Board, page: u32) -> Result<Vec<Instrument>> {
        let html = self
            .get_text(
                MARKET_SUM_PATH,
                &[("sosok", board.sosok().to_string()), ("page", page.to_string())],
                None,
            )
            .await
            .map_err(|e| Error::Listing(format!("{:?} page {}: {}", board, page, e)))?;

        let rows = parse_market_cap_page(&html).unwrap_or_default();
        tracing::debug!("{:?} page {}: {} rows", board, page, rows.len());
        Ok(rows)
    }

    async fn fund_listing(&self) -> Result<Vec<FundListing>> {
        let body = self
            .get_text(ETF_LIST_PATH, &[], None)
            .await
            .map_err(|e| Error::Listing(format!("ETF list: {}", e)))?;

        parse_fund_listing(&body)
    }
}

#[async_trait]
impl QuoteSource for NaverFinance {
    async fn fetch_prices(&self, ticker: &str) -> Result<PriceSnapshot> {
        let html = self
            .get_text(ITEM_MAIN_PATH, &[("code", ticker.to_string())], Some(self.quote_timeout))
            .await
            .map_err(|e| Error::Quote(format!("{}: {}", ticker, e)))?;

        Ok(parse_quote_page(&html))
    }
}

/// Rows of a market-cap ranking page. `None` when the ranking table is absent.
pub fn parse_market_cap_page(html: &str) -> Option<Vec<Instrument>> {
    let document = Html::parse_document(html);
    let table = document.select(&LISTING_TABLE).next()?;

    let rows = table
        .select(&LISTING_ROW)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&CELL).collect();
            if cells.len() <= 2 {
                return None;
            }
            let link = cells[1].select(&LINK).next()?;
            let name = link.text().collect::<String>().trim().to_string();
            let href = link.value().attr("href")?;
            let ticker = href.rsplit("code=").next().unwrap_or(href).trim().to_string();
            if ticker.is_empty() {
                return None;
            }
            Some(Instrument { ticker, name })
        })
        .collect();

    Some(rows)
}

/// Fund listing payload: `{"result": {"etfItemList": [...]}}`
pub fn parse_fund_listing(body: &str) -> Result<Vec<FundListing>> {
    #[derive(Deserialize)]
    struct Response {
        result: ResultBody,
    }

    #[derive(Deserialize)]
    struct ResultBody {
        #[serde(rename = "etfItemList")]
        etf_item_list: Vec<EtfItem>,
    }

    #[derive(Deserialize)]
    struct EtfItem {
        itemcode: String,
        itemname: String,
        #[serde(rename = "marketSum", default)]
        market_sum: Option<f64>,
    }

    let resp: Response = serde_json::from_str(body)
        .map_err(|e| Error::InvalidData(format!("ETF list payload: {}", e)))?;

    Ok(resp
        .result
        .etf_item_list
        .into_iter()
        .map(|item| FundListing {
            instrument: Instrument::new(item.itemcode, item.itemname),
            market_sum: item.market_sum.unwrap_or(0.0),
        })
        .collect())
}

/// Current price and consensus target from an item page
pub fn parse_quote_page(html: &str) -> PriceSnapshot {
    let document = Html::parse_document(html);

    let current_price = document
        .select(&CURRENT_PRICE)
        .next()
        .and_then(|el| parse_price(&el.text().collect::<String>()));

    let target_price = document
        .select(&HEADER_CELL)
        .find(|th| th.text().any(|t| t.contains(TARGET_PRICE_LABEL)))
        .and_then(|th| th.parent().and_then(ElementRef::wrap))
        .and_then(|row| {
            // first <em> is the analyst opinion, second the target price
            let ems: Vec<ElementRef> = row.select(&EMPHASIS).collect();
            ems.get(1)
                .and_then(|em| parse_price(&em.text().collect::<String>()))
        });

    PriceSnapshot {
        current_price,
        target_price,
    }
}

/// "65,000" -> 65000
fn parse_price(raw: &str) -> Option<u64> {
    raw.trim().replace(',', "").parse().ok()
}
