//! ServiceNow Table API adapter.
//!
//! Incidents are read from `/api/now/table/incident` with display values and
//! without reference links, so reference fields come back as plain names.
//! Work notes are appended with a `PUT` on the record's `sys_id`; the
//! platform journals each write, so earlier notes are never replaced.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::clients::traits::TicketSource;
use crate::config::{AuthConfig, ServiceNowConfig};
use crate::error::TransportError;
use crate::model::Incident;

const INCIDENT_TABLE: &str = "/api/now/table/incident";
const LIST_LIMIT: usize = 100;
/// Error bodies are cut to this many bytes.
const MAX_ERROR_BODY: usize = 512;
/// Refresh OAuth tokens this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TableResponse<T> {
    result: T,
}

/// Incident row as returned with `sysparm_display_value=true`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IncidentRow {
    sys_id: String,
    number: String,
    short_description: String,
    description: String,
    assignment_group: Value,
    state: String,
    sys_created_on: String,
    work_notes: String,
}

impl IncidentRow {
    fn into_incident(self) -> Incident {
        Incident {
            id: self.sys_id,
            number: self.number,
            short_description: self.short_description,
            description: self.description,
            assignment_group: display_value(&self.assignment_group),
            state: self.state,
            created_at: parse_created_on(&self.sys_created_on),
            work_notes: self.work_notes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Reference fields arrive as a plain string, or as an object when the
/// instance ignores `sysparm_exclude_reference_link`.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("display_value")
            .or_else(|| map.get("value"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// `sys_created_on` in the instance's default `YYYY-MM-DD HH:MM:SS` format.
pub fn parse_created_on(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S").ok()
}

/// Encoded query for the monitor listing, newest first.
pub fn list_query(from_date: NaiveDate, work_group: Option<&str>) -> String {
    let mut query = format!("sys_created_on>={}", from_date.format("%Y-%m-%d"));
    if let Some(group) = work_group.filter(|g| !g.is_empty()) {
        query.push_str("^assignment_group.name=");
        query.push_str(group);
    }
    query.push_str("^ORDERBYDESCsys_created_on");
    query
}

pub fn basic_auth_header(user: &str, secret: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(format!("{}:{}", user, secret));
    format!("Basic {}", encoded)
}

fn truncate(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn map_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(status @ (401 | 403), _) => {
            TransportError::Auth(format!("HTTP {}", status))
        }
        ureq::Error::Status(status, response) => TransportError::Http {
            status,
            body: truncate(response.into_string().unwrap_or_default()),
        },
        ureq::Error::Transport(transport) => TransportError::Connection(transport.to_string()),
    }
}

/// Blocking ServiceNow client.
pub struct ServiceNowClient {
    config: ServiceNowConfig,
    agent: ureq::Agent,
    token: Mutex<Option<CachedToken>>,
}

impl ServiceNowClient {
    pub fn new(config: ServiceNowConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            agent,
            token: Mutex::new(None),
        }
    }

    fn table_url(&self) -> String {
        format!("{}{}", self.config.instance_url, INCIDENT_TABLE)
    }

    fn bearer_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<String, TransportError> {
        let mut cached = self.token.lock();
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .agent
            .post(token_url)
            .set("Authorization", &basic_auth_header(client_id, client_secret))
            .set("Accept", "application/json")
            .send_form(&[("grant_type", "client_credentials")])
            .map_err(|e| match map_error(e) {
                TransportError::Http { status, body } => {
                    TransportError::Auth(format!("token request HTTP {}: {}", status, body))
                }
                other => other,
            })?;
        let token: TokenResponse = response
            .into_json()
            .map_err(|e| TransportError::Auth(format!("invalid token response: {}", e)))?;

        let lifetime = token.expires_in.unwrap_or(1800) - TOKEN_REFRESH_MARGIN_SECS;
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime.max(0)),
        });
        Ok(token.access_token)
    }

    fn authorize(&self, request: ureq::Request) -> Result<ureq::Request, TransportError> {
        let request = request
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        match &self.config.auth {
            AuthConfig::Basic { username, password } => {
                Ok(request.set("Authorization", &basic_auth_header(username, password)))
            }
            AuthConfig::OAuth {
                client_id,
                client_secret,
                token_url,
            } => {
                let token = self.bearer_token(client_id, client_secret, token_url)?;
                Ok(request.set("Authorization", &format!("Bearer {}", token)))
            }
            AuthConfig::ApiKey {
                api_key,
                header_name,
            } => Ok(request.set(header_name, api_key)),
        }
    }

    /// Send, dropping a cached OAuth token the server rejected.
    fn send(
        &self,
        request: ureq::Request,
        body: Option<Value>,
    ) -> Result<ureq::Response, TransportError> {
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        result.map_err(|e| {
            let err = map_error(e);
            if matches!(err, TransportError::Auth(_)) {
                self.token.lock().take();
            }
            err
        })
    }

    fn query_incidents(&self, query: &str, limit: usize) -> Result<Vec<Incident>, TransportError> {
        let request = self
            .agent
            .get(&self.table_url())
            .query("sysparm_query", query)
            .query("sysparm_limit", &limit.to_string())
            .query("sysparm_display_value", "true")
            .query("sysparm_exclude_reference_link", "true");
        let response = self.send(self.authorize(request)?, None)?;
        let rows: TableResponse<Vec<IncidentRow>> = response
            .into_json()
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(rows.result.into_iter().map(IncidentRow::into_incident).collect())
    }
}

impl TicketSource for ServiceNowClient {
    fn get_incident(&self, number: &str) -> Result<Incident, TransportError> {
        self.query_incidents(&format!("number={}", number), 1)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::NotFound(number.to_string()))
    }

    fn list_incidents(
        &self,
        from_date: NaiveDate,
        work_group: Option<&str>,
    ) -> Result<Vec<Incident>, TransportError> {
        self.query_incidents(&list_query(from_date, work_group), LIST_LIMIT)
    }

    fn append_annotation(&self, number: &str, text: &str) -> Result<(), TransportError> {
        let incident = self.get_incident(number)?;
        let url = format!("{}/{}", self.table_url(), incident.id);
        let request = self.authorize(self.agent.put(&url))?;
        self.send(request, Some(json!({ "work_notes": text })))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 8).unwrap();
        assert_eq!(
            list_query(date, Some("WG101")),
            "sys_created_on>=2026-01-08^assignment_group.name=WG101^ORDERBYDESCsys_created_on"
        );
        assert_eq!(
            list_query(date, None),
            "sys_created_on>=2026-01-08^ORDERBYDESCsys_created_on"
        );
        assert_eq!(list_query(date, Some("")), list_query(date, None));
    }

    #[test]
    fn test_row_mapping() {
        let body = json!({
            "result": [{
                "sys_id": "9d385017c611228701d22104cc95c371",
                "number": "INC0010022",
                "short_description": "Add inbound rule",
                "description": "security group id: sg-abc123",
                "assignment_group": "WG101",
                "state": "New",
                "sys_created_on": "2026-01-08 16:50:00",
                "work_notes": ""
            }]
        });
        let rows: TableResponse<Vec<IncidentRow>> = serde_json::from_value(body).unwrap();
        let incident = rows.result.into_iter().next().unwrap().into_incident();
        assert_eq!(incident.id, "9d385017c611228701d22104cc95c371");
        assert_eq!(incident.assignment_group, "WG101");
        assert_eq!(
            incident.created_at,
            NaiveDate::from_ymd_opt(2026, 1, 8).and_then(|d| d.and_hms_opt(16, 50, 0))
        );
    }

    #[test]
    fn test_reference_object_and_missing_fields() {
        let body = json!({
            "result": [{
                "number": "INC1",
                "assignment_group": {"display_value": "WG202", "link": "https://x"}
            }]
        });
        let rows: TableResponse<Vec<IncidentRow>> = serde_json::from_value(body).unwrap();
        let incident = rows.result.into_iter().next().unwrap().into_incident();
        assert_eq!(incident.assignment_group, "WG202");
        assert_eq!(incident.created_at, None);
        assert!(incident.work_notes.is_empty());
    }

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth_header("admin", "secret"), "Basic YWRtaW46c2VjcmV0");
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(2000);
        let cut = truncate(body);
        assert_eq!(cut.len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate("short".to_string()), "short");
    }
}
