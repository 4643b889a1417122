//! EVE Swagger Interface adapter for corporation wallet journals.

use super::util::with_retry;
use crate::core::error::{AdapterError, AdapterErrorKind};
use crate::core::journal::{AccountId, Division, DivisionId, LedgerRecord};
use crate::core::source::{JournalPage, JournalSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = "walletbook/0.3";
const PAGES_HEADER: &str = "X-Pages";

/// Provides the OAuth access token for upstream requests.
///
/// Implementations own verification and refresh; the adapter only asks for a
/// currently valid token before every request.
#[async_trait]
pub trait AccessToken: Send + Sync {
    async fn access_token(&self) -> Result<String, AdapterErrorKind>;
}

/// A token that never changes, read from config or the environment.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessToken for StaticToken {
    async fn access_token(&self) -> Result<String, AdapterErrorKind> {
        if self.0.is_empty() {
            return Err(AdapterErrorKind::Unauthorized("empty access token".to_string()));
        }
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CharacterInfo {
    corporation_id: i64,
}

#[derive(Debug, Deserialize)]
struct CorporationDivisions {
    #[serde(default)]
    wallet: Vec<WalletDivision>,
}

#[derive(Debug, Deserialize)]
struct WalletDivision {
    division: DivisionId,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JournalEntry {
    id: i64,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    balance: f64,
    ref_type: String,
    date: DateTime<Utc>,
    #[serde(default)]
    description: String,
    reason: Option<String>,
    context_id: Option<i64>,
    context_id_type: Option<String>,
    first_party_id: Option<i32>,
    second_party_id: Option<i32>,
    tax: Option<f64>,
    tax_receiver_id: Option<i32>,
}

impl From<JournalEntry> for LedgerRecord {
    fn from(entry: JournalEntry) -> Self {
        LedgerRecord {
            id: entry.id,
            amount: entry.amount,
            balance: entry.balance,
            ref_type: entry.ref_type,
            timestamp: entry.date,
            description: entry.description,
            reason: entry.reason.filter(|r| !r.is_empty()),
            context_id: entry.context_id,
            context_id_type: entry.context_id_type,
            first_party_id: entry.first_party_id,
            second_party_id: entry.second_party_id,
            tax: entry.tax,
            tax_receiver_id: entry.tax_receiver_id,
        }
    }
}

fn classify(status: StatusCode, body: String) -> AdapterErrorKind {
    let message = format!("HTTP {status}: {body}");
    match status.as_u16() {
        401 | 403 => AdapterErrorKind::Unauthorized(message),
        420 | 429 => AdapterErrorKind::RateLimited(message),
        404 => AdapterErrorKind::NotFound(message),
        _ if status.is_server_error() => AdapterErrorKind::Transient(message),
        _ => AdapterErrorKind::Malformed(message),
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, AdapterErrorKind> {
    serde_json::from_str(text).map_err(|e| AdapterErrorKind::Malformed(e.to_string()))
}

/// Corporation wallet journals of one authenticated character.
pub struct EsiSource {
    base_url: String,
    client: reqwest::Client,
    token: Arc<dyn AccessToken>,
    account: AccountId,
    retries: usize,
    retry_delay_ms: u64,
}

impl EsiSource {
    /// Builds the adapter for an already known corporation.
    pub fn new(
        base_url: &str,
        account: AccountId,
        token: Arc<dyn AccessToken>,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AdapterError::new(account, AdapterErrorKind::Transient(e.to_string())))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token,
            account,
            retries: 3,
            retry_delay_ms: 500,
        })
    }

    /// Looks up the character's corporation and builds the adapter for it.
    pub async fn connect(
        base_url: &str,
        character_id: i64,
        token: Arc<dyn AccessToken>,
    ) -> Result<Self, AdapterError> {
        let mut source = Self::new(base_url, AccountId::new(character_id, 0), token)?;
        let info: CharacterInfo = source
            .get_json(&format!("/characters/{character_id}/"))
            .await
            .map(|(info, _)| info)
            .map_err(|kind| AdapterError::new(source.account, kind))?;
        source.account = AccountId::new(character_id, info.corporation_id);
        info!(account = %source.account, "ESI source initialized");
        Ok(source)
    }

    pub fn with_retry_policy(mut self, retries: usize, delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = delay_ms;
        self
    }

    async fn send_once(&self, url: &str) -> Result<reqwest::Response, AdapterErrorKind> {
        let token = self.token.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AdapterErrorKind::Transient(format!("Request error: {e} URL: {url}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, body))
    }

    /// GETs `path` and decodes the JSON body, returning the response headers too.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<(T, reqwest::header::HeaderMap), AdapterErrorKind> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Requesting {}", url);
        let response = with_retry(
            || self.send_once(&url),
            self.retries,
            self.retry_delay_ms,
            |kind: &AdapterErrorKind| matches!(kind, AdapterErrorKind::Transient(_)),
        )
        .await?;

        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterErrorKind::Transient(format!("Failed to read body: {e}")))?;
        Ok((decode(&text)?, headers))
    }
}

fn total_pages(headers: &reqwest::header::HeaderMap) -> Result<u32, AdapterErrorKind> {
    let Some(value) = headers.get(PAGES_HEADER) else {
        return Ok(1);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| AdapterErrorKind::Malformed(format!("invalid {PAGES_HEADER} header: {value:?}")))
}

#[async_trait]
impl JournalSource for EsiSource {
    fn account(&self) -> AccountId {
        self.account
    }

    #[instrument(name = "EsiDivisions", skip(self), fields(account = %self.account))]
    async fn divisions(&self) -> Result<Vec<Division>, AdapterError> {
        let path = format!("/corporations/{}/divisions/", self.account.corporation_id);
        let (divisions, _): (CorporationDivisions, _) = self
            .get_json(&path)
            .await
            .map_err(|kind| AdapterError::new(self.account, kind))?;
        Ok(divisions
            .wallet
            .into_iter()
            .map(|d| Division::new(d.division, d.name.unwrap_or_default()))
            .collect())
    }

    #[instrument(
        name = "EsiJournalPage",
        skip(self, division),
        fields(account = %self.account, division = division.id)
    )]
    async fn journal_page(
        &self,
        division: &Division,
        page: u32,
    ) -> Result<JournalPage, AdapterError> {
        let path = format!(
            "/corporations/{}/wallets/{}/journal/?page={}",
            self.account.corporation_id, division.id, page
        );
        let fail = |kind| {
            AdapterError::new(self.account, kind)
                .in_division(division.id)
                .on_page(page)
        };
        let (entries, headers): (Vec<serde_json::Value>, _) =
            self.get_json(&path).await.map_err(fail)?;
        let total_pages = total_pages(&headers).map_err(fail)?;

        let records = entries
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<JournalEntry>(value) {
                Ok(entry) => Some(LedgerRecord::from(entry)),
                Err(e) => {
                    warn!(page, error = %e, "Skipping malformed journal entry");
                    None
                }
            })
            .collect();
        Ok(JournalPage {
            records,
            total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::collect_journal;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHARACTER: i64 = 90000001;
    const CORPORATION: i64 = 98000001;

    fn token() -> Arc<dyn AccessToken> {
        Arc::new(StaticToken::new("secret"))
    }

    fn source(server: &MockServer) -> EsiSource {
        EsiSource::new(&server.uri(), AccountId::new(CHARACTER, CORPORATION), token())
            .unwrap()
            .with_retry_policy(2, 1)
    }

    fn journal_path(division: DivisionId) -> String {
        format!("/corporations/{CORPORATION}/wallets/{division}/journal/")
    }

    fn entry(id: i64, amount: f64, ref_type: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "amount": amount,
            "balance": 1000.0,
            "ref_type": ref_type,
            "date": "2024-03-02T11:00:00Z",
            "description": "test entry",
            "first_party_id": 1000125
        })
    }

    #[tokio::test]
    async fn test_connect_resolves_corporation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/characters/{CHARACTER}/")))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Some Pilot",
                "corporation_id": CORPORATION
            })))
            .mount(&server)
            .await;

        let source = EsiSource::connect(&server.uri(), CHARACTER, token()).await.unwrap();
        assert_eq!(source.account(), AccountId::new(CHARACTER, CORPORATION));
    }

    #[tokio::test]
    async fn test_divisions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/corporations/{CORPORATION}/divisions/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hangar": [{"division": 1, "name": "Stuff"}],
                "wallet": [{"division": 1}, {"division": 2, "name": "Industry"}]
            })))
            .mount(&server)
            .await;

        let divisions = source(&server).divisions().await.unwrap();
        assert_eq!(divisions, vec![Division::new(1, ""), Division::new(2, "Industry")]);
        assert_eq!(divisions[0].display_name(), "Main");
    }

    #[tokio::test]
    async fn test_journal_follows_pages_header() {
        let server = MockServer::start().await;
        for page in 1..=2 {
            Mock::given(method("GET"))
                .and(path(journal_path(1)))
                .and(query_param("page", page.to_string()))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header(PAGES_HEADER, "2")
                        .set_body_json(serde_json::json!([entry(page, 10.0 * page as f64, "bounty_prizes")])),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let source = source(&server);
        let records = collect_journal(&source, &Division::new(1, "")).await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(records[1].amount, 20.0);
        assert_eq!(records[0].first_party_id, Some(1000125));
        assert_eq!(records[0].description, "test entry");
    }

    #[tokio::test]
    async fn test_missing_pages_header_means_single_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(journal_path(1)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let page = source(&server).journal_page(&Division::new(1, ""), 1).await.unwrap();
        assert_eq!(page.total_pages, 1);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pages_header_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(journal_path(1)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(PAGES_HEADER, "many")
                    .set_body_json(serde_json::json!([])),
            )
            .mount(&server)
            .await;

        let err = source(&server)
            .journal_page(&Division::new(1, ""), 1)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, AdapterErrorKind::Malformed(_)));
        assert_eq!(err.page, Some(1));
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(journal_path(3)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                entry(1, 5.0, "insurance"),
                {"id": 2, "amount": 1.0},
                entry(3, -5.0, "brokers_fee")
            ])))
            .mount(&server)
            .await;

        let page = source(&server).journal_page(&Division::new(3, "Ops"), 1).await.unwrap();
        let ids: Vec<i64> = page.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(journal_path(1)))
            .respond_with(ResponseTemplate::new(403).set_body_string("token is expired"))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server)
            .journal_page(&Division::new(1, ""), 2)
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.division, Some(1));
        assert_eq!(err.page, Some(2));
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(420).set_body_string("error limited"))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server).divisions().await.unwrap_err();
        assert!(matches!(err.kind, AdapterErrorKind::RateLimited(_)));
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = source(&server).divisions().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server)
            .journal_page(&Division::new(9, ""), 1)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, AdapterErrorKind::NotFound(_)));
        assert!(!err.is_auth());
    }

    #[tokio::test]
    async fn test_empty_token_is_unauthorized() {
        let server = MockServer::start().await;
        let source = EsiSource::new(
            &server.uri(),
            AccountId::new(CHARACTER, CORPORATION),
            Arc::new(StaticToken::new("")),
        )
        .unwrap();
        let err = source.divisions().await.unwrap_err();
        assert!(err.is_auth());
    }
}
