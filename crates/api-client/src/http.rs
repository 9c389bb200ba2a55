use crate::error::ApiError;
use crate::responses::{
    AccountResponse, GatewayErrorResponse, KlineResponse, MainContractResponse, SubscribeRequest,
    TargetPosRequest, WaitUpdateResponse,
};
use crate::{TradingApi, UpdateEvent};
use async_trait::async_trait;
use configuration::GatewayConfig;
use core_types::Bar;
use reqwest::{RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A `TradingApi` backed by an HTTP gateway that fronts the broker SDK.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    request_timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &GatewayConfig) -> Result<Self, ApiError> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.user, Some(&self.password))
            .timeout(self.request_timeout)
    }

    /// Sends a request and deserializes a 2xx body, mapping anything else to `ApiError::Gateway`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let text = Self::check(response).await?;
        serde_json::from_str::<T>(&text).map_err(|e| {
            ApiError::Deserialization(format!("{}. Original text: {}", e, text))
        })
    }

    /// Like `send`, for endpoints whose success body carries nothing.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn check(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            return Ok(text);
        }
        // Prefer the gateway's own message; fall back to the raw body.
        let message = serde_json::from_str::<GatewayErrorResponse>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        Err(ApiError::Gateway {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TradingApi for HttpApi {
    async fn subscribe_klines(
        &self,
        symbol: &str,
        period_secs: u64,
        window_len: usize,
    ) -> Result<(), ApiError> {
        tracing::info!(symbol, period_secs, window_len, "Subscribing to bar window");
        let body = SubscribeRequest {
            symbol,
            period_secs,
            window_len,
        };
        self.send_empty(self.post("/subscribe").json(&body)).await
    }

    async fn kline_window(&self, symbol: &str, period_secs: u64) -> Result<Vec<Bar>, ApiError> {
        let period = period_secs.to_string();
        let raw: Vec<KlineResponse> = self
            .send(
                self.get("/klines")
                    .query(&[("symbol", symbol), ("period_secs", period.as_str())]),
            )
            .await?;

        // Leading slots of a fresh window may be unfilled; a gap inside the window is an error.
        raw.into_iter()
            .skip_while(|k| k.datetime <= 0)
            .map(Bar::try_from)
            .collect()
    }

    async fn wait_update(&self, deadline: Duration) -> Result<UpdateEvent, ApiError> {
        let response: WaitUpdateResponse = self
            .send(
                self.get("/wait_update")
                    .query(&[("timeout_secs", deadline.as_secs())])
                    // The gateway holds the request open for up to `deadline`.
                    .timeout(deadline + self.request_timeout),
            )
            .await?;
        Ok(response.into())
    }

    async fn account_balance(&self) -> Result<Decimal, ApiError> {
        let account: AccountResponse = self.send(self.get("/account")).await?;
        Ok(account.balance)
    }

    async fn query_main_contract(&self, exchange: &str, product: &str) -> Result<String, ApiError> {
        let response: MainContractResponse = self
            .send(
                self.get("/main_contract")
                    .query(&[("exchange", exchange), ("product", product)]),
            )
            .await?;
        if response.symbol.is_empty() {
            return Err(ApiError::InvalidData(format!(
                "No main contract for {}.{}",
                exchange, product
            )));
        }
        Ok(response.symbol)
    }

    async fn set_target_volume(&self, symbol: &str, lots: i64) -> Result<(), ApiError> {
        tracing::info!(symbol, lots, "Sending target position");
        let body = TargetPosRequest {
            symbol,
            volume: lots,
        };
        self.send_empty(self.post("/target_pos").json(&body)).await
    }

    async fn close(&self) -> Result<(), ApiError> {
        tracing::info!("Closing gateway session");
        self.send_empty(self.post("/close")).await
    }
}
