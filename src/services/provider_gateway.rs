//! services/provider_gateway.rs
//! Punto único de acceso al proveedor: exige API key configurada y registra
//! cada llamada en `api_logs` cuando el log está activado.

use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::errors::ProviderError;
use crate::models::api_log_model::ApiLogRecord;
use crate::models::provider_model::{NumberGrant, NumberQuery, ProviderAck, RemoteStatus};
use crate::services::provider_service::{ProviderClient, SmsActivateClient};
use crate::services::store_service::ActivationStore;

#[derive(Clone)]
pub struct ProviderGateway {
    client: Arc<RwLock<Option<Arc<dyn ProviderClient>>>>,
    store: Arc<dyn ActivationStore>,
    base_url: String,
    timeout: Duration,
}

impl ProviderGateway {
    pub fn new(store: Arc<dyn ActivationStore>, base_url: &str, timeout: Duration) -> Self {
        ProviderGateway {
            client: Arc::new(RwLock::new(None)),
            store,
            base_url: base_url.to_string(),
            timeout,
        }
    }

    /// Construye un cliente nuevo de SMS-Activate para `api_key` y lo instala.
    pub fn configure(&self, api_key: &str) -> Result<(), ProviderError> {
        let client = SmsActivateClient::new(api_key, &self.base_url, self.timeout)?;
        self.install(Arc::new(client));
        log::info!("Cliente del proveedor configurado");
        Ok(())
    }

    pub fn install(&self, client: Arc<dyn ProviderClient>) {
        match self.client.write() {
            Ok(mut slot) => *slot = Some(client),
            Err(poisoned) => *poisoned.into_inner() = Some(client),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.current().is_ok()
    }

    fn current(&self) -> Result<Arc<dyn ProviderClient>, ProviderError> {
        let slot = self
            .client
            .read()
            .map_err(|_| ProviderError::Precondition("lock del proveedor envenenado".to_string()))?;
        slot.clone()
            .ok_or_else(|| ProviderError::Precondition("API key no configurada".to_string()))
    }

    async fn audit<T: Debug>(&self, mut record: ApiLogRecord, outcome: &Result<T, ProviderError>) {
        // El log nunca hace fallar la llamada
        match self.store.get_logging_enabled().await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                log::warn!("No se pudo leer el switch de logging: {:?}", e);
                return;
            }
        }

        match outcome {
            Ok(value) => {
                record.success = true;
                record.response = Some(format!("{:?}", value));
            }
            Err(e) => {
                record.success = false;
                record.response = Some(e.to_string());
            }
        }

        if let Err(e) = self.store.save_api_log(&record).await {
            log::warn!("No se pudo guardar el log de api para {}: {:?}", record.action, e);
        }
    }

    fn record_for(action: &str, activation_id: Option<&str>) -> ApiLogRecord {
        let mut record = ApiLogRecord::new(action, Utc::now());
        record.activation_id = activation_id.map(str::to_string);
        if let Some(id) = activation_id {
            record.params = Some(json!({ "id": id }));
        }
        record
    }
}

#[async_trait]
impl ProviderClient for ProviderGateway {
    async fn request_number(&self, query: &NumberQuery) -> Result<NumberGrant, ProviderError> {
        let client = self.current()?;
        let outcome = client.request_number(query).await;

        let mut record = Self::record_for("getNumber", None);
        record.params = Some(json!({
            "service": query.service,
            "country": query.country,
            "operators": query.operators,
            "maxPrice": query.max_price,
            "ref": query.ref_code,
        }));
        record.service = Some(query.service.clone());
        record.country = Some(query.country.clone());
        record.operator = match &outcome {
            Ok(grant) => grant.operator.clone(),
            Err(_) => (!query.operators.is_empty()).then(|| query.operators.join(",")),
        };
        if let Ok(grant) = &outcome {
            record.activation_id = Some(grant.id.clone());
        }
        self.audit(record, &outcome).await;
        outcome
    }

    async fn get_status(&self, id: &str) -> Result<RemoteStatus, ProviderError> {
        let client = self.current()?;
        let outcome = client.get_status(id).await;
        self.audit(Self::record_for("getStatus", Some(id)), &outcome)
            .await;
        outcome
    }

    async fn cancel(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        let client = self.current()?;
        let outcome = client.cancel(id).await;
        self.audit(Self::record_for("cancelActivation", Some(id)), &outcome)
            .await;
        outcome
    }

    async fn request_resend(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        let client = self.current()?;
        let outcome = client.request_resend(id).await;
        self.audit(Self::record_for("requestResend", Some(id)), &outcome)
            .await;
        outcome
    }

    async fn finish(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        let client = self.current()?;
        let outcome = client.finish(id).await;
        self.audit(Self::record_for("finishActivation", Some(id)), &outcome)
            .await;
        outcome
    }

    async fn get_balance(&self) -> Result<f64, ProviderError> {
        let client = self.current()?;
        let outcome = client.get_balance().await;
        self.audit(Self::record_for("getBalance", None), &outcome)
            .await;
        outcome
    }
}
