use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::namespace::{Method, Namespace};
use crate::protocol::{build_request, parse_message, Message, DEFAULT_FROM};
use crate::{Error, Result};

/// Sends a request to a device and returns its response message.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, namespace: Namespace, method: Method, payload: Value) -> Result<Message>;
}

/// True when `response` acknowledges a request sent with `method`.
pub fn is_ack(method: Method, response: &Message) -> bool {
    method.ack() == Some(response.header.method)
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_from() -> String {
    DEFAULT_FROM.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    pub host: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_from")]
    pub from: String,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            key: String::new(),
            protocol: default_protocol(),
            timeout_secs: default_timeout_secs(),
            from: default_from(),
        }
    }
}

pub struct HttpTransportBuilder {
    config: TransportConfig,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl HttpTransportBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self::from_config(TransportConfig::new(host))
    }

    pub fn from_config(config: TransportConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            config,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = key.into();
        self
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.config.protocol = proto.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, path)?)),
            _ => None,
        };

        Ok(HttpTransport {
            http,
            url: format!("{}://{}/config", self.config.protocol, self.config.host),
            timeout: self.timeout,
            config: self.config,
            logger,
        })
    }
}

/// Signed JSON messages POSTed to the device's `/config` endpoint.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    config: TransportConfig,
    logger: Option<Mutex<MessageLogger>>,
}

impl HttpTransport {
    pub fn builder(host: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(host)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            f(&mut logger);
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, namespace: Namespace, method: Method, payload: Value) -> Result<Message> {
        let request = build_request(namespace, method, payload, &self.config.key, &self.config.from);
        debug!(url = %self.url, %namespace, %method, "sending request");
        self.log(|l| l.log_request(&request));

        let body = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response = parse_message(&body)?;
        trace!(%namespace, method = %response.header.method, "received response");
        if response.header.namespace != namespace.name() {
            return Err(Error::Protocol(format!(
                "response namespace {} does not match {namespace}",
                response.header.namespace
            )));
        }
        self.log(|l| l.log_response(&response));
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_from_json() {
        let config: TransportConfig =
            serde_json::from_value(serde_json::json!({"host": "192.168.1.20", "key": "k"})).unwrap();
        assert_eq!(config.protocol, "http");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.from, DEFAULT_FROM);
    }

    #[test]
    fn builder_formats_url() {
        let transport = HttpTransport::builder("10.0.0.5").key("k").build().unwrap();
        assert_eq!(transport.url(), "http://10.0.0.5/config");
    }

    #[test]
    fn timeout_keeps_sub_second_precision() {
        let transport = HttpTransport::builder("10.0.0.5")
            .timeout(Duration::from_millis(1500))
            .build()
            .unwrap();
        assert_eq!(transport.timeout(), Duration::from_millis(1500));

        let config = TransportConfig::new("10.0.0.5");
        let transport = HttpTransportBuilder::from_config(config).build().unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }
}
