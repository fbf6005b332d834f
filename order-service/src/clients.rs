use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shared::{
    ApiKeyConfig, ScheduleStatus, ServiceError, ServiceResult, API_KEY_HEADER, REQUEST_AT_HEADER,
    SERVICE_NAME_HEADER,
};
use std::time::Duration;
use uuid::Uuid;

/// What the orchestrator needs to know about a slot before selling it.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotInfo {
    pub uuid: Uuid,
    pub field_id: Uuid,
    pub date: NaiveDate,
    pub price_per_hour: BigDecimal,
    pub status: ScheduleStatus,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLink {
    pub uuid: Uuid,
    pub payment_link: String,
    pub expired_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FieldApi: Send + Sync {
    async fn get_slot(&self, slot: Uuid, bearer: Option<&str>) -> ServiceResult<SlotInfo>;
    /// Booking confirmation. Idempotent on the field side; safe to retry.
    async fn mark_booked(&self, slot: Uuid) -> ServiceResult<()>;
}

#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn create_payment_link(
        &self,
        order_id: Uuid,
        amount: &BigDecimal,
        expired_at: DateTime<Utc>,
        description: Option<&str>,
    ) -> ServiceResult<PaymentLink>;
}

/// Shared plumbing for the signed internal HTTP clients.
#[derive(Clone)]
struct InternalClient {
    http: reqwest::Client,
    base_url: String,
    auth: ApiKeyConfig,
}

impl InternalClient {
    fn new(base_url: String, auth: ApiKeyConfig, timeout: Duration) -> ServiceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Validation(format!("invalid http client config: {e}")))?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    fn signed(&self, builder: reqwest::RequestBuilder, bearer: Option<&str>) -> reqwest::RequestBuilder {
        let unix_ts = Utc::now().timestamp();
        let mut builder = builder
            .header(API_KEY_HEADER, self.auth.sign(unix_ts))
            .header(SERVICE_NAME_HEADER, self.auth.service_name.as_str())
            .header(REQUEST_AT_HEADER, unix_ts.to_string());
        if let Some(token) = bearer {
            builder = builder.header(reqwest::header::AUTHORIZATION, token);
        }
        builder
    }
}

/// Maps a remote response onto the local taxonomy: 404 stays NotFound,
/// 409 stays Conflict, other well-formed errors are non-retryable upstream
/// failures, transport errors are retryable.
async fn check_response(
    service: &'static str,
    entity: &'static str,
    result: Result<reqwest::Response, reqwest::Error>,
) -> ServiceResult<reqwest::Response> {
    let response = result.map_err(|e| ServiceError::upstream(service, e))?;
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(ServiceError::NotFound(entity)),
        StatusCode::CONFLICT => {
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::Conflict(body))
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::Upstream {
                service,
                reason: format!("status {status}: {body}"),
                retryable: status.is_server_error(),
            })
        }
    }
}

pub struct HttpFieldClient {
    inner: InternalClient,
}

impl HttpFieldClient {
    pub fn new(base_url: String, auth: ApiKeyConfig, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            inner: InternalClient::new(base_url, auth, timeout)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct UpdateStatusBody {
    field_schedule_id: Uuid,
}

#[async_trait]
impl FieldApi for HttpFieldClient {
    async fn get_slot(&self, slot: Uuid, bearer: Option<&str>) -> ServiceResult<SlotInfo> {
        let url = format!("{}/api/v1/field/schedule/{}", self.inner.base_url, slot);
        let response = self
            .inner
            .signed(self.inner.http.get(&url), bearer)
            .send()
            .await;
        check_response("field-service", "field schedule", response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::upstream("field-service", e))
    }

    async fn mark_booked(&self, slot: Uuid) -> ServiceResult<()> {
        let url = format!("{}/api/v1/field/schedule/status", self.inner.base_url);
        let response = self
            .inner
            .signed(self.inner.http.patch(&url), None)
            .json(&UpdateStatusBody {
                field_schedule_id: slot,
            })
            .send()
            .await;
        check_response("field-service", "field schedule", response).await?;
        Ok(())
    }
}

pub struct HttpPaymentClient {
    inner: InternalClient,
}

impl HttpPaymentClient {
    pub fn new(base_url: String, auth: ApiKeyConfig, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            inner: InternalClient::new(base_url, auth, timeout)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody<'a> {
    order_id: Uuid,
    amount: &'a BigDecimal,
    expired_at: DateTime<Utc>,
    description: Option<&'a str>,
}

#[async_trait]
impl PaymentApi for HttpPaymentClient {
    async fn create_payment_link(
        &self,
        order_id: Uuid,
        amount: &BigDecimal,
        expired_at: DateTime<Utc>,
        description: Option<&str>,
    ) -> ServiceResult<PaymentLink> {
        let url = format!("{}/api/v1/payment", self.inner.base_url);
        let response = self
            .inner
            .signed(self.inner.http.post(&url), None)
            .json(&CreatePaymentBody {
                order_id,
                amount,
                expired_at,
                description,
            })
            .send()
            .await;
        check_response("payment-service", "payment", response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::upstream("payment-service", e))
    }
}
