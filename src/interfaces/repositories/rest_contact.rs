use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};
use url::Url;
use zeroize::Zeroizing;

use crate::{entities::contact::ContactSubmission, errors::StoreError, repositories::contact::ContactStore};

/// Contact store backed by the BaaS REST interface
/// (`POST {base}/rest/v1/{table}`).
#[derive(Clone)]
pub struct RestContactStore {
    client: Client,
    endpoint: Url,
    api_key: Zeroizing<String>,
}

impl RestContactStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(&format!("rest/v1/{}", urlencoding::encode(table)))?;

        Ok(RestContactStore {
            client: Client::new(),
            endpoint,
            api_key: Zeroizing::new(api_key.to_string()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ContactStore for RestContactStore {
    #[tracing::instrument(name = "Create contact record", skip_all, fields(endpoint = %self.endpoint))]
    async fn create(&self, submission: &ContactSubmission) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
            .header("Prefer", HeaderValue::from_static("return=minimal"))
            .json(submission)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }

    /// Zero-row read of the contacts table.
    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("select", "*"), ("limit", "0")])
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
