//! services/provider_service.rs
//! Cliente HTTP de SMS-Activate y el trait que consume el scheduler.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::ProviderError;
use crate::models::provider_model::{
    NumberGrant, NumberQuery, ProviderAck, RemoteStatus, SetStatusCode,
};

/// Llamadas remotas de las que depende el scheduler.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn request_number(&self, query: &NumberQuery) -> Result<NumberGrant, ProviderError>;

    async fn get_status(&self, id: &str) -> Result<RemoteStatus, ProviderError>;

    async fn cancel(&self, id: &str) -> Result<ProviderAck, ProviderError>;

    async fn request_resend(&self, id: &str) -> Result<ProviderAck, ProviderError>;

    /// Avisa al proveedor que el código se usó y la activación puede cerrarse.
    async fn finish(&self, id: &str) -> Result<ProviderAck, ProviderError>;

    async fn get_balance(&self) -> Result<f64, ProviderError>;
}

/// Errores que el proveedor responde en lugar de un payload.
const LOGICAL_ERRORS: &[&str] = &[
    "NO_NUMBERS",
    "NO_BALANCE",
    "BAD_KEY",
    "BAD_ACTION",
    "BAD_SERVICE",
    "BAD_STATUS",
    "NO_ACTIVATION",
    "ERROR_SQL",
    "EARLY_CANCEL_DENIED",
    "WRONG_ACTIVATION_ID",
    "WRONG_MAX_PRICE",
    "BANNED",
    "CHANNELS_LIMIT",
];

pub fn is_logical_error(raw: &str) -> bool {
    let raw = raw.trim();
    LOGICAL_ERRORS
        .iter()
        .any(|code| raw == *code || raw.starts_with(&format!("{code}:")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NumberV2Response {
    activation_id: serde_json::Value,
    phone_number: serde_json::Value,
    activation_cost: Option<serde_json::Value>,
    activation_operator: Option<String>,
}

fn json_scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parsea una respuesta de `getNumberV2`. También acepta la forma de texto
/// antigua `ACCESS_NUMBER:<id>:<phone>`.
pub fn parse_number_response(raw: &str) -> Result<NumberGrant, ProviderError> {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix("ACCESS_NUMBER:") {
        let mut parts = rest.splitn(2, ':');
        return match (parts.next(), parts.next()) {
            (Some(id), Some(phone)) if !id.is_empty() && !phone.is_empty() => Ok(NumberGrant {
                id: id.to_string(),
                phone_number: phone.to_string(),
                operator: None,
                cost: None,
            }),
            _ => Err(ProviderError::Malformed(raw.to_string())),
        };
    }

    if is_logical_error(raw) {
        return Err(ProviderError::Logical(raw.to_string()));
    }

    let parsed: NumberV2Response =
        serde_json::from_str(raw).map_err(|_| ProviderError::Malformed(raw.to_string()))?;

    let id = json_scalar_to_string(&parsed.activation_id)
        .ok_or_else(|| ProviderError::Malformed(raw.to_string()))?;
    let phone_number = json_scalar_to_string(&parsed.phone_number)
        .ok_or_else(|| ProviderError::Malformed(raw.to_string()))?;
    let cost = parsed
        .activation_cost
        .as_ref()
        .and_then(json_scalar_to_string)
        .and_then(|c| c.parse::<f64>().ok());

    Ok(NumberGrant {
        id,
        phone_number,
        operator: parsed.activation_operator.filter(|op| !op.is_empty()),
        cost,
    })
}

pub fn parse_balance_response(raw: &str) -> Result<f64, ProviderError> {
    let raw = raw.trim();
    if let Some(amount) = raw.strip_prefix("ACCESS_BALANCE:") {
        return amount
            .trim()
            .parse::<f64>()
            .map_err(|_| ProviderError::Malformed(raw.to_string()));
    }
    if is_logical_error(raw) {
        return Err(ProviderError::Logical(raw.to_string()));
    }
    Err(ProviderError::Malformed(raw.to_string()))
}

pub fn parse_status_response(raw: &str) -> Result<RemoteStatus, ProviderError> {
    if is_logical_error(raw) {
        return Err(ProviderError::Logical(raw.trim().to_string()));
    }
    Ok(RemoteStatus::from_wire(raw))
}

#[derive(Clone)]
pub struct SmsActivateClient {
    api_key: String,
    base_url: String,
    http_client: Client,
}

impl SmsActivateClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Precondition("la API key está vacía".to_string()));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Precondition(format!("cliente HTTP: {e}")))?;

        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url.to_string(),
            http_client,
        })
    }

    /// GET `?api_key=..&action=..&<params>` y devuelve el cuerpo en texto.
    async fn call(&self, action: &str, params: &[(&str, String)]) -> Result<String, ProviderError> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(params.len() + 2);
        query.push(("api_key", self.api_key.clone()));
        query.push(("action", action.to_string()));
        query.extend(params.iter().cloned());

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        log::debug!("proveedor action={} respuesta={}", action, body.trim());
        Ok(body)
    }

    async fn set_status(&self, id: &str, code: SetStatusCode) -> Result<ProviderAck, ProviderError> {
        let body = self
            .call(
                "setStatus",
                &[("id", id.to_string()), ("status", (code as u8).to_string())],
            )
            .await?;
        Ok(ProviderAck::new(body.trim()))
    }
}

#[async_trait]
impl ProviderClient for SmsActivateClient {
    async fn request_number(&self, query: &NumberQuery) -> Result<NumberGrant, ProviderError> {
        let mut params = vec![
            ("service", query.service.clone()),
            ("country", query.country.clone()),
        ];
        if !query.operators.is_empty() {
            params.push(("operator", query.operators.join(",")));
        }
        if let Some(max_price) = query.max_price {
            params.push(("maxPrice", max_price.to_string()));
        }
        if let Some(ref_code) = &query.ref_code {
            params.push(("ref", ref_code.clone()));
        }

        let body = self.call("getNumberV2", &params).await?;
        parse_number_response(&body)
    }

    async fn get_status(&self, id: &str) -> Result<RemoteStatus, ProviderError> {
        let body = self.call("getStatus", &[("id", id.to_string())]).await?;
        parse_status_response(&body)
    }

    async fn cancel(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        self.set_status(id, SetStatusCode::Cancel).await
    }

    async fn request_resend(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        self.set_status(id, SetStatusCode::RequestResend).await
    }

    async fn finish(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        self.set_status(id, SetStatusCode::Finish).await
    }

    async fn get_balance(&self) -> Result<f64, ProviderError> {
        let body = self.call("getBalance", &[]).await?;
        parse_balance_response(&body)
    }
}
