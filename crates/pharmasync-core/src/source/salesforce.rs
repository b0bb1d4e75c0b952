//! Salesforce source -- open shopper inspections via the REST query API.
//!
//! Login uses the OAuth2 username-password token grant. The query follows
//! `nextRecordsUrl` until the server reports `done`, so the full result
//! set is materialized before it is returned.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use url::Url;

use super::window::QueryWindow;
use super::Source;
use crate::config::SalesforceConfig;
use crate::error::{CoreError, SourceError};
use crate::model::{records_from_response, SourceRecord};

const SERVICE: &str = "salesforce";

/// Columns selected from `Shopper_Inspection__c` and its contract.
const INSPECTION_FIELDS: &[&str] = &[
    "Id",
    "Name",
    "CreatedDate",
    "Shopper_Contract__c",
    "Shopper_Contract__r.Account_Information__c",
    "Shopper_Contract__r.Status__c",
    "Shopper_Contract__r.Shelf_Details__c",
    "Shopper_Contract__r.Shelf_Length__c",
    "Shopper_Contract__r.Shelf_Width__c",
    "Shopper_Contract__r.Contact__c",
    "Shopper_Contract__r.Active__c",
    "Shopper_Contract__r.Shopper_Termination__c",
    "Shopper_Contract__r.Shopper_Termination_Reason__c",
    "Shopper_Contract__r.IsDeleted",
];

/// Build the inspection query for `window`.
pub fn inspection_query(window: &QueryWindow) -> String {
    format!(
        "SELECT {} FROM Shopper_Inspection__c WHERE {} AND Status__c = 'Open'",
        INSPECTION_FIELDS.join(", "),
        window.soql_predicate("CreatedDate"),
    )
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

/// One page of a query result.
#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    done: bool,
    #[serde(rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
    #[serde(default)]
    records: Vec<Value>,
}

pub struct SalesforceSource {
    config: SalesforceConfig,
    http_client: Client,
    runtime: Runtime,
}

impl SalesforceSource {
    /// Validate credentials and build the HTTP client.
    ///
    /// # Errors
    /// Returns an error if a required credential is missing or the client
    /// cannot be constructed.
    pub fn new(config: SalesforceConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(SourceError::Transport)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            http_client,
            runtime,
        })
    }

    async fn login(&self) -> Result<TokenResponse, SourceError> {
        let password = format!(
            "{}{}",
            self.config.resolved_password(),
            self.config.security_token
        );
        let params = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", password.as_str()),
        ];

        let resp = self
            .http_client
            .post(format!("{}/services/oauth2/token", self.config.login_url()))
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.get("error_description")
                        .or_else(|| body.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("login rejected with HTTP {}", status.as_u16()));
            return Err(SourceError::Authentication {
                service: SERVICE.into(),
                message,
            });
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Payload(format!("token response: {e}")))?;
        tracing::debug!(instance_url = %token.instance_url, "connection to Salesforce established");
        Ok(token)
    }

    async fn get_page(&self, token: &TokenResponse, url: &str, soql: Option<&str>) -> Result<QueryPage, SourceError> {
        let mut request = self.http_client.get(url).bearer_auth(&token.access_token);
        if let Some(q) = soql {
            request = request.query(&[("q", q)]);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SourceError::Authentication {
                service: SERVICE.into(),
                message: "session rejected by query endpoint".into(),
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SourceError::Query {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<QueryPage>()
            .await
            .map_err(|e| SourceError::Payload(format!("query response: {e}")))
    }

    /// Run `soql` and collect every page of the result.
    async fn query_all(&self, token: &TokenResponse, soql: &str) -> Result<Vec<Value>, SourceError> {
        let base = Url::parse(&token.instance_url)
            .map_err(|e| SourceError::Payload(format!("instance_url: {e}")))?;
        let resolve = |path: &str| {
            base.join(path)
                .map_err(|e| SourceError::Payload(format!("{path}: {e}")))
        };
        let first = resolve(&format!("/services/data/v{}/query", self.config.api_version))?;

        let mut page = self.get_page(token, first.as_str(), Some(soql)).await?;
        let mut rows = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                return Err(SourceError::Payload(
                    "result not done but no nextRecordsUrl".into(),
                ));
            };
            page = self.get_page(token, resolve(&next)?.as_str(), None).await?;
            tracing::debug!(page_rows = page.records.len(), "fetched next result page");
            rows.append(&mut page.records);
        }

        Ok(rows)
    }
}

impl Source for SalesforceSource {
    fn name(&self) -> &str {
        SERVICE
    }

    fn fetch(&self, window: &QueryWindow) -> Result<Vec<SourceRecord>, SourceError> {
        let soql = inspection_query(window);
        tracing::debug!(query = %soql, "querying inspections");

        let rows = self.runtime.block_on(async {
            let token = self.login().await?;
            self.query_all(&token, &soql).await
        })?;

        let records = records_from_response(&serde_json::json!({ "records": rows }))?;
        tracing::info!(count = records.len(), "fetched flagged pharmacies");
        Ok(records)
    }
}
