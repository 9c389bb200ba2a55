use crate::UpdateEvent;
use crate::error::ApiError;
use chrono::DateTime;
use core_types::Bar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// The gateway speaks snake_case JSON, so the field names map one to one.

/// Body of `POST /subscribe`.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest<'a> {
    pub symbol: &'a str,
    pub period_secs: u64,
    pub window_len: usize,
}

/// Body of `POST /target_pos`.
#[derive(Debug, Clone, Serialize)]
pub struct TargetPosRequest<'a> {
    pub symbol: &'a str,
    pub volume: i64,
}

/// A single bar from `GET /klines`. The gateway stamps bars in epoch nanoseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineResponse {
    pub datetime: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl TryFrom<KlineResponse> for Bar {
    type Error = ApiError;

    fn try_from(raw: KlineResponse) -> Result<Self, Self::Error> {
        // A zero stamp marks a slot the gateway has not filled yet.
        if raw.datetime <= 0 {
            return Err(ApiError::InvalidData(format!(
                "Bar has no timestamp: {}",
                raw.datetime
            )));
        }
        Ok(Bar {
            datetime: DateTime::from_timestamp_nanos(raw.datetime).naive_utc(),
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        })
    }
}

/// The response from `GET /wait_update`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WaitUpdateResponse {
    Changed { symbols: Vec<String> },
    Timeout,
    Finished,
}

impl From<WaitUpdateResponse> for UpdateEvent {
    fn from(response: WaitUpdateResponse) -> Self {
        match response {
            WaitUpdateResponse::Changed { symbols } => UpdateEvent::Changed(symbols.into_iter().collect()),
            WaitUpdateResponse::Timeout => UpdateEvent::Timeout,
            WaitUpdateResponse::Finished => UpdateEvent::Finished,
        }
    }
}

/// The account snapshot from `GET /account`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balance: Decimal,
    pub available: Decimal,
    #[serde(default)]
    pub float_profit: Decimal,
}

/// The response from `GET /main_contract`.
#[derive(Debug, Clone, Deserialize)]
pub struct MainContractResponse {
    pub symbol: String,
}

/// Represents an error body returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn wait_update_is_tagged_by_status() {
        let changed: WaitUpdateResponse =
            serde_json::from_str(r#"{"status":"changed","symbols":["SHFE.rb2510","CZCE.SA601"]}"#)
                .unwrap();
        let event = UpdateEvent::from(changed);
        match event {
            UpdateEvent::Changed(symbols) => {
                assert_eq!(symbols.len(), 2);
                assert!(symbols.contains("SHFE.rb2510"));
            }
            other => panic!("expected Changed, got {:?}", other),
        }

        let timeout: WaitUpdateResponse = serde_json::from_str(r#"{"status":"timeout"}"#).unwrap();
        assert_eq!(UpdateEvent::from(timeout), UpdateEvent::Timeout);
        let finished: WaitUpdateResponse = serde_json::from_str(r#"{"status":"finished"}"#).unwrap();
        assert_eq!(UpdateEvent::from(finished), UpdateEvent::Finished);
    }

    #[test]
    fn kline_converts_nanosecond_stamp() {
        let raw: KlineResponse = serde_json::from_str(
            r#"{"datetime":1743498000000000000,"open":"3500","high":"3512.5","low":"3498","close":"3510","volume":"1200"}"#,
        )
        .unwrap();
        let bar = Bar::try_from(raw).unwrap();
        assert_eq!(bar.datetime.to_string(), "2025-04-01 09:00:00");
        assert_eq!(bar.high, dec!(3512.5));
    }

    #[test]
    fn unfilled_kline_slot_is_rejected() {
        let raw = KlineResponse {
            datetime: 0,
            open: dec!(0),
            high: dec!(0),
            low: dec!(0),
            close: dec!(0),
            volume: dec!(0),
        };
        assert!(matches!(Bar::try_from(raw), Err(ApiError::InvalidData(_))));
    }
}
