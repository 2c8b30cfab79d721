//! Telemetry source (AKiPS)
//!
//! The AKiPS database API answers `mget` commands with one plain-text line
//! per attribute:
//!
//! ```text
//! sw-a.example.net sys ip4addr = 10.0.0.1
//! sw-a.example.net Gi1/0/1 IF-MIB.ifOperStatus = up,1,1700000000,1700003600,
//! ```
//!
//! Enum values are `value,number,created,modified,` with epoch seconds.

use crate::records::InterfaceUsageRecord;
use crate::TelemetryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nh_config::NhConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A switch known to the telemetry source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredSwitch {
    pub name: String,
    pub ip: String,
}

/// Inventory and interface usage from the monitoring platform
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn switch_list(&self) -> Result<Vec<DiscoveredSwitch>, TelemetryError>;

    /// Operational status age per interface; an empty list is valid
    async fn interface_usage(
        &self,
        fqdn: &str,
    ) -> Result<Vec<InterfaceUsageRecord>, TelemetryError>;
}

/// Used when `[akips] enabled = false`
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTelemetry;

#[async_trait]
impl TelemetrySource for DisabledTelemetry {
    async fn switch_list(&self) -> Result<Vec<DiscoveredSwitch>, TelemetryError> {
        Ok(Vec::new())
    }

    async fn interface_usage(
        &self,
        _fqdn: &str,
    ) -> Result<Vec<InterfaceUsageRecord>, TelemetryError> {
        Ok(Vec::new())
    }
}

/// AKiPS `api-db` client
#[derive(Debug, Clone)]
pub struct AkipsClient {
    base_url: String,
    password: String,
    group: Option<String>,
    client: reqwest::Client,
}

impl AkipsClient {
    #[must_use]
    pub fn with_client(
        base_url: impl Into<String>,
        password: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            password: password.into(),
            group: None,
            client,
        }
    }

    /// Restrict the switch list to one AKiPS group
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Build from the `[akips]` section
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Config`] when the URL or password is missing,
    /// or [`TelemetryError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &NhConfig) -> Result<Self, TelemetryError> {
        let akips = &config.akips;
        let base_url = akips
            .base_url
            .clone()
            .ok_or_else(|| TelemetryError::Config("akips.base_url is not set".to_string()))?;
        let password = akips
            .password
            .clone()
            .ok_or_else(|| TelemetryError::Config("akips.password is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(config.akips_timeout())
            .build()?;

        let mut source = Self::with_client(base_url, password, client);
        if let Some(group) = &akips.group {
            source = source.with_group(group.clone());
        }
        Ok(source)
    }

    fn switch_list_command(&self) -> String {
        match &self.group {
            Some(group) => format!("mget text * sys ip4addr any group {group}"),
            None => "mget text * sys ip4addr".to_string(),
        }
    }

    fn request(&self, cmds: &str) -> Result<reqwest::Request, reqwest::Error> {
        self.client
            .get(format!("{}/api-db", self.base_url))
            .query(&[("password", self.password.as_str()), ("cmds", cmds)])
            .build()
    }

    #[instrument(skip(self))]
    async fn query(&self, cmds: &str) -> Result<String, TelemetryError> {
        let response = self.client.execute(self.request(cmds)?).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || body.starts_with("ERROR") {
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        debug!(bytes = body.len(), "AKiPS query answered");
        Ok(body)
    }
}

#[async_trait]
impl TelemetrySource for AkipsClient {
    async fn switch_list(&self) -> Result<Vec<DiscoveredSwitch>, TelemetryError> {
        let body = self.query(&self.switch_list_command()).await?;
        Ok(parse_switch_list(&body))
    }

    async fn interface_usage(
        &self,
        fqdn: &str,
    ) -> Result<Vec<InterfaceUsageRecord>, TelemetryError> {
        let body = self
            .query(&format!("mget enum {fqdn} * IF-MIB.ifOperStatus"))
            .await?;
        Ok(parse_interface_usage(&body, Utc::now()))
    }
}

/// Split `<lhs> = <rhs>` into whitespace tokens and the value
fn split_line(line: &str) -> Option<(Vec<&str>, &str)> {
    let (lhs, rhs) = line.split_once(" = ")?;
    Some((lhs.split_whitespace().collect(), rhs.trim()))
}

/// Parse `mget text * sys ip4addr` output
#[must_use]
pub fn parse_switch_list(raw: &str) -> Vec<DiscoveredSwitch> {
    raw.lines()
        .filter_map(split_line)
        .filter_map(|(lhs, ip)| match lhs.as_slice() {
            [name, "sys", "ip4addr"] if !ip.is_empty() => Some(DiscoveredSwitch {
                name: (*name).to_string(),
                ip: ip.to_string(),
            }),
            _ => None,
        })
        .collect()
}

/// Parse `mget enum <dev> * IF-MIB.ifOperStatus` output.
///
/// `last_change` is the modified time in UTC; days, hours and minutes are the
/// time elapsed since then as of `now` (never negative).
#[must_use]
pub fn parse_interface_usage(raw: &str, now: DateTime<Utc>) -> Vec<InterfaceUsageRecord> {
    raw.lines()
        .filter_map(split_line)
        .filter_map(|(lhs, value)| {
            let [_device, interface, "IF-MIB.ifOperStatus"] = lhs.as_slice() else {
                return None;
            };
            let fields: Vec<&str> = value.split(',').collect();
            let status = fields.first().filter(|s| !s.is_empty())?;
            let modified: i64 = fields.get(3)?.trim().parse().ok()?;
            let changed_at = DateTime::from_timestamp(modified, 0)?;

            let elapsed = now.signed_duration_since(changed_at).max(chrono::Duration::zero());
            Some(InterfaceUsageRecord {
                interface: (*interface).to_string(),
                status: (*status).to_string(),
                last_change: changed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                days: elapsed.num_days(),
                hours: elapsed.num_hours() % 24,
                minutes: elapsed.num_minutes() % 60,
            })
        })
        .collect()
}
