use std::{future::Future, sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    auth::csrf::CsrfValidator,
    entities::contact::{ContactForm, ContactResponse, ContactSubmission, ValidatedContact},
    errors::{IntakeError, StoreError},
    repositories::{
        contact::ContactStore,
        rate_limit::{RateDecision, RateLimitStore},
    },
    settings::AppConfig,
};

/// Knobs of the intake pipeline that come from configuration.
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    pub max_requests: u32,
    pub retry_after_secs: u64,
    pub store_timeout: Duration,
    pub owner_id: Option<Uuid>,
}

impl IntakePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        IntakePolicy {
            max_requests: config.rate_limit.max_requests,
            retry_after_secs: config.rate_limit.retry_after_secs,
            store_timeout: config.store.timeout(),
            owner_id: config.store.owner_id,
        }
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        IntakePolicy {
            max_requests: 10,
            retry_after_secs: 60,
            store_timeout: Duration::from_secs(5),
            owner_id: None,
        }
    }
}

/// One submission. `body` is only awaited once the rate and CSRF gates
/// have passed, so rejected requests never have their payload read.
pub struct IntakeRequest<'a, B> {
    pub client: &'a str,
    pub csrf_token: Option<&'a str>,
    pub csrf_session: Option<&'a str>,
    pub body: B,
}

/// Contact intake pipeline: rate gate, CSRF gate, shape gate, persist gate.
/// Each gate short-circuits the rest.
pub struct ContactIntake {
    limiter: Arc<dyn RateLimitStore>,
    csrf: CsrfValidator,
    store: Arc<dyn ContactStore>,
    policy: IntakePolicy,
}

impl ContactIntake {
    pub fn new(
        limiter: Arc<dyn RateLimitStore>,
        csrf: CsrfValidator,
        store: Arc<dyn ContactStore>,
        policy: IntakePolicy,
    ) -> Self {
        ContactIntake { limiter, csrf, store, policy }
    }

    pub fn csrf(&self) -> &CsrfValidator {
        &self.csrf
    }

    pub fn limiter(&self) -> &dyn RateLimitStore {
        self.limiter.as_ref()
    }

    pub fn store(&self) -> &dyn ContactStore {
        self.store.as_ref()
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.policy
    }

    /// Runs every gate in order.
    #[tracing::instrument(name = "Contact intake", skip_all, fields(client = %request.client))]
    pub async fn submit<B>(&self, request: IntakeRequest<'_, B>) -> Result<ContactResponse, IntakeError>
    where
        B: Future<Output = Result<Vec<u8>, IntakeError>>,
    {
        self.check_rate(request.client).await?;
        self.check_csrf(request.csrf_token, request.csrf_session)?;
        let body = request.body.await?;
        let contact = Self::parse_form(&body)?;
        self.persist(contact).await
    }

    /// Rate gate. A limiter backend failure fails closed.
    pub async fn check_rate(&self, client: &str) -> Result<(), IntakeError> {
        match self.limiter.check(self.policy.max_requests, client).await {
            Ok(RateDecision::Allowed { remaining }) => {
                tracing::debug!(remaining, "Rate limit check passed");
                Ok(())
            }
            Ok(RateDecision::Rejected { reset_in }) => {
                tracing::warn!(client, reset_in_secs = reset_in.as_secs(), "Contact rate limit exceeded");
                Err(IntakeError::RateLimited {
                    retry_after_secs: self.policy.retry_after_secs,
                })
            }
            Err(e) => {
                tracing::error!("Rate limiter unavailable: {}", e);
                Err(IntakeError::Limiter(e))
            }
        }
    }

    /// CSRF gate.
    pub fn check_csrf(&self, token: Option<&str>, session: Option<&str>) -> Result<(), IntakeError> {
        if self.csrf.validate(token, session) {
            Ok(())
        } else {
            tracing::warn!(mode = self.csrf.mode_name(), token_present = token.is_some(), "Rejected CSRF token");
            Err(IntakeError::InvalidCsrfToken)
        }
    }

    /// Shape gate. A body that is not a JSON object of strings counts as
    /// missing fields.
    pub fn parse_form(body: &[u8]) -> Result<ValidatedContact, IntakeError> {
        let form: ContactForm = serde_json::from_slice(body).map_err(|e| {
            tracing::info!("Unparseable contact body: {}", e);
            IntakeError::MissingFields
        })?;

        form.try_into().inspect_err(|e: &IntakeError| {
            tracing::info!("Contact form rejected: {}", e);
        })
    }

    /// Persist gate: sanitize, then one bounded write attempt.
    pub async fn persist(&self, contact: ValidatedContact) -> Result<ContactResponse, IntakeError> {
        let submission = ContactSubmission::from_validated(contact, self.policy.owner_id);
        let timeout = self.policy.store_timeout;

        let result = match tokio::time::timeout(timeout, self.store.create(&submission)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                tracing::info!(backend = self.store.backend_name(), "Contact message stored");
                Ok(ContactResponse::sent())
            }
            Err(e) => {
                tracing::error!(backend = self.store.backend_name(), "Failed to store contact message: {}", e);
                Err(IntakeError::Persistence(e))
            }
        }
    }
}
