//! services/store_service.rs
//! Persistencia de activaciones, mensajes, configuración y logs de la API (SQLite).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{FromRow, Pool, Sqlite};

use crate::models::activation_model::{Activation, ActivationStatus, SmsMessage};
use crate::models::api_log_model::{ApiConfigView, ApiLogFilter, ApiLogRecord, ApiLogRow};

/// Lo que el scheduler necesita del almacenamiento durable.
#[async_trait]
pub trait ActivationStore: Send + Sync {
    async fn save_activation(&self, activation: &Activation) -> Result<()>;

    async fn get_activation(&self, id: &str) -> Result<Option<Activation>>;

    /// Mueve una fila no terminal a `status`. Devuelve `false` si la fila no
    /// existe o ya es terminal; en ese caso no se escribe nada.
    async fn update_status(
        &self,
        id: &str,
        status: ActivationStatus,
        released_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    async fn list_non_terminal_activations(&self) -> Result<Vec<Activation>>;

    async fn save_message(&self, id: &str, text: &str, received_at: DateTime<Utc>) -> Result<()>;

    async fn list_messages(&self, id: &str) -> Result<Vec<SmsMessage>>;

    async fn get_logging_enabled(&self) -> Result<bool>;

    async fn save_api_log(&self, record: &ApiLogRecord) -> Result<()>;
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("Timestamp inválido en la base de datos: {raw}"))
}

#[derive(FromRow)]
struct ActivationRow {
    id: String,
    phone_number: String,
    service: String,
    country: String,
    operator: Option<String>,
    status: String,
    cost: Option<f64>,
    created_at: String,
    expires_at: String,
    released_at: Option<String>,
}

impl TryFrom<ActivationRow> for Activation {
    type Error = anyhow::Error;

    fn try_from(r: ActivationRow) -> Result<Self> {
        Ok(Activation {
            status: r.status.parse()?,
            created_at: parse_ts(&r.created_at)?,
            expires_at: parse_ts(&r.expires_at)?,
            released_at: r.released_at.as_deref().map(parse_ts).transpose()?,
            id: r.id,
            phone_number: r.phone_number,
            service: r.service,
            country: r.country,
            operator: r.operator,
            cost: r.cost,
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    activation_id: String,
    message: String,
    received_at: String,
}

#[derive(FromRow)]
struct ApiConfigRow {
    api_key: Option<String>,
    balance: Option<f64>,
    log_enabled: i64,
    last_updated: Option<String>,
}

#[derive(FromRow)]
struct ApiLogDbRow {
    id: i64,
    timestamp: String,
    action: String,
    params: Option<String>,
    response: Option<String>,
    success: i64,
    service: Option<String>,
    country: Option<String>,
    operator: Option<String>,
    activation_id: Option<String>,
}

const ACTIVATION_COLUMNS: &str = "id, phone_number, service, country, operator, status, cost, \
     created_at, expires_at, released_at";

const TERMINAL_STATUSES_SQL: &str = "('cancelled', 'released', 'completed')";

#[derive(Clone, Debug)]
pub struct SqliteStore {
    db_pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SqliteStore { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo al correr las migraciones")?;
        Ok(())
    }

    // ----------------------------------------------------------------
    // api_config (fila única, id = 1)
    // ----------------------------------------------------------------

    async fn get_config_row(&self) -> Result<Option<ApiConfigRow>> {
        sqlx::query_as::<_, ApiConfigRow>(
            "SELECT api_key, balance, log_enabled, last_updated FROM api_config WHERE id = 1",
        )
        .fetch_optional(&self.db_pool)
        .await
        .context("Fallo al leer api_config")
    }

    pub async fn get_api_key(&self) -> Result<Option<String>> {
        Ok(self
            .get_config_row()
            .await?
            .and_then(|row| row.api_key)
            .filter(|key| !key.is_empty()))
    }

    pub async fn save_api_key(&self, api_key: &str) -> Result<()> {
        let now = format_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO api_config (id, api_key, last_updated)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET api_key = ?1, last_updated = ?2
            "#,
        )
        .bind(api_key)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al guardar la api key")?;
        Ok(())
    }

    pub async fn save_balance(&self, balance: f64) -> Result<()> {
        let now = format_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO api_config (id, balance, last_updated)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET balance = ?1, last_updated = ?2
            "#,
        )
        .bind(balance)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al guardar el saldo")?;
        Ok(())
    }

    pub async fn set_logging_enabled(&self, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_config (id, log_enabled)
            VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET log_enabled = ?1
            "#,
        )
        .bind(enabled as i64)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar log_enabled")?;
        Ok(())
    }

    pub async fn get_api_config(&self) -> Result<ApiConfigView> {
        let row = self.get_config_row().await?;
        let Some(row) = row else {
            return Ok(ApiConfigView {
                has_api_key: false,
                api_key_hint: None,
                balance: None,
                log_enabled: false,
                last_updated: None,
            });
        };

        let key = row.api_key.filter(|k| !k.is_empty());
        Ok(ApiConfigView {
            has_api_key: key.is_some(),
            api_key_hint: key.as_deref().map(mask_key),
            balance: row.balance,
            log_enabled: row.log_enabled != 0,
            last_updated: row.last_updated.as_deref().map(parse_ts).transpose()?,
        })
    }

    // ----------------------------------------------------------------
    // api_logs
    // ----------------------------------------------------------------

    pub async fn list_api_logs(&self, filter: &ApiLogFilter) -> Result<Vec<ApiLogRow>> {
        // Los filtros opcionales se resuelven en SQL con "?n IS NULL OR ..."
        let rows = sqlx::query_as::<_, ApiLogDbRow>(
            r#"
            SELECT id, timestamp, action, params, response, success,
                   service, country, operator, activation_id
            FROM api_logs
            WHERE (?1 IS NULL OR action = ?1)
              AND (?2 IS NULL OR timestamp >= ?2)
              AND (?3 IS NULL OR timestamp <= ?3)
            ORDER BY timestamp DESC, id DESC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(filter.action_filter())
        .bind(filter.start.map(format_ts))
        .bind(filter.end.map(format_ts))
        .bind(filter.effective_limit())
        .bind(filter.effective_offset())
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar los logs de api")?;

        rows.into_iter()
            .map(|r| {
                Ok::<_, anyhow::Error>(ApiLogRow {
                    id: r.id,
                    record: ApiLogRecord {
                        timestamp: parse_ts(&r.timestamp)?,
                        action: r.action,
                        params: r
                            .params
                            .as_deref()
                            .map(serde_json::from_str)
                            .transpose()
                            .context("JSON de params inválido en api_logs")?,
                        response: r.response,
                        success: r.success != 0,
                        service: r.service,
                        country: r.country,
                        operator: r.operator,
                        activation_id: r.activation_id,
                    },
                })
            })
            .collect()
    }

    pub async fn list_api_actions(&self) -> Result<Vec<String>> {
        let actions: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT action FROM api_logs ORDER BY action ASC")
                .fetch_all(&self.db_pool)
                .await
                .context("Fallo al listar las acciones de api")?;
        Ok(actions.into_iter().map(|(a,)| a).collect())
    }
}

fn mask_key(key: &str) -> String {
    let visible: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{visible}")
}

#[async_trait]
impl ActivationStore for SqliteStore {
    async fn save_activation(&self, a: &Activation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activations (
                id, phone_number, service, country, operator,
                status, cost, created_at, expires_at, released_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&a.id)
        .bind(&a.phone_number)
        .bind(&a.service)
        .bind(&a.country)
        .bind(&a.operator)
        .bind(a.status.as_str())
        .bind(a.cost)
        .bind(format_ts(a.created_at))
        .bind(format_ts(a.expires_at))
        .bind(a.released_at.map(format_ts))
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Fallo al insertar la activación {}", a.id))?;

        Ok(())
    }

    async fn get_activation(&self, id: &str) -> Result<Option<Activation>> {
        let sql = format!("SELECT {ACTIVATION_COLUMNS} FROM activations WHERE id = ?1");
        let row = sqlx::query_as::<_, ActivationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .with_context(|| format!("Fallo al cargar la activación {id}"))?;

        row.map(Activation::try_from).transpose()
    }

    async fn update_status(
        &self,
        id: &str,
        status: ActivationStatus,
        released_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        // Una fila terminal nunca se reabre
        let sql = format!(
            r#"
            UPDATE activations
            SET status = ?1,
                released_at = COALESCE(?2, released_at)
            WHERE id = ?3
              AND status NOT IN {TERMINAL_STATUSES_SQL}
            "#
        );

        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(released_at.map(format_ts))
            .bind(id)
            .execute(&self.db_pool)
            .await
            .with_context(|| format!("Fallo al actualizar el estado de la activación {id}"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_non_terminal_activations(&self) -> Result<Vec<Activation>> {
        let sql = format!(
            "SELECT {ACTIVATION_COLUMNS} FROM activations \
             WHERE status NOT IN {TERMINAL_STATUSES_SQL} \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ActivationRow>(&sql)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar las activaciones no terminales")?;

        rows.into_iter().map(Activation::try_from).collect()
    }

    async fn save_message(&self, id: &str, text: &str, received_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sms_messages (activation_id, message, received_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(format_ts(received_at))
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Fallo al guardar el mensaje de la activación {id}"))?;

        Ok(())
    }

    async fn list_messages(&self, id: &str) -> Result<Vec<SmsMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT activation_id, message, received_at
            FROM sms_messages
            WHERE activation_id = ?1
            ORDER BY received_at ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await
        .with_context(|| format!("Fallo al listar los mensajes de la activación {id}"))?;

        rows.into_iter()
            .map(|r| {
                Ok::<_, anyhow::Error>(SmsMessage {
                    received_at: parse_ts(&r.received_at)?,
                    activation_id: r.activation_id,
                    message: r.message,
                })
            })
            .collect()
    }

    async fn get_logging_enabled(&self) -> Result<bool> {
        Ok(self
            .get_config_row()
            .await?
            .map(|row| row.log_enabled != 0)
            .unwrap_or(false))
    }

    async fn save_api_log(&self, record: &ApiLogRecord) -> Result<()> {
        let params = record
            .params
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO api_logs (
                timestamp, action, params, response, success,
                service, country, operator, activation_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(format_ts(record.timestamp))
        .bind(&record.action)
        .bind(params)
        .bind(&record.response)
        .bind(record.success as i64)
        .bind(&record.service)
        .bind(&record.country)
        .bind(&record.operator)
        .bind(&record.activation_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al guardar el log de api")?;

        Ok(())
    }
}
