//! Synchronous delivery path.
//!
//! [`LokiHandler::handle`] blocks the caller for the duration of the HTTP
//! push. Delivery failures degrade to a best-effort `tracing` report and
//! never propagate: log emission must not crash the application it
//! instruments. Configuration errors, by contrast, are programmer errors
//! and surface to the caller immediately.

use tracing::error;

use crate::batch;
use crate::client::DeliveryClient;
use crate::config::{Config, ConfigError};
use crate::entry::{LogEntry, LogRecord};
use crate::labels;
use crate::wire::{self, PayloadVersion};

/// Direct handler: format, resolve, encode a batch of one, push.
#[derive(Debug, Clone)]
pub struct LokiHandler {
    config: Config,
    version: PayloadVersion,
    client: DeliveryClient,
}

impl LokiHandler {
    /// Validates the configured payload version and builds the handler.
    /// The payload shape is fixed here for the handler's lifetime.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let version = PayloadVersion::parse(&config.version)?;
        let client =
            DeliveryClient::new(config.url.clone(), config.auth.clone(), config.timeout);
        Ok(LokiHandler {
            config,
            version,
            client,
        })
    }

    /// Ships one record, blocking until the HTTP call returns or fails.
    ///
    /// Returns `Err` only for configuration errors; a failed delivery is
    /// reported internally and looks like success to the caller.
    pub async fn handle(&self, record: LogRecord) -> Result<(), ConfigError> {
        let entry = self.prepare(record)?;
        self.deliver(entry).await;
        Ok(())
    }

    /// Formats a record and resolves its final label set. Computed label
    /// sources are evaluated here, once per record.
    pub(crate) fn prepare(&self, record: LogRecord) -> Result<LogEntry, ConfigError> {
        let labels = labels::resolve(self.version, &self.config.default_labels, &record)?;
        Ok(LogEntry::from_record(record, labels))
    }

    /// Encodes a single-entry batch and pushes it, swallowing failures.
    pub(crate) async fn deliver(&self, entry: LogEntry) {
        let streams = batch::group_streams(vec![entry]);
        let payload = match wire::encode(self.version, &streams) {
            Ok(payload) => payload,
            Err(source) => {
                error!("failed to encode push payload, entry dropped: {source}");
                return;
            }
        };

        if let Err(source) = self.client.push(payload).await {
            error!("failed to push log entry: {source}");
        }
    }

    /// Part of the standard handler surface. The synchronous path buffers
    /// nothing, so there is nothing to flush.
    pub fn flush(&self) {}

    /// Part of the standard handler surface. The synchronous path holds no
    /// resources beyond the HTTP client's own pool.
    pub fn close(&self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::labels::LabelValue;

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn handle_swallows_delivery_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/loki/api/v1/push")
            .with_status(500)
            .with_body("boom")
            .expect(3)
            .create_async()
            .await;

        let handler = LokiHandler::new(Config::new(format!(
            "{}/loki/api/v1/push",
            server.url()
        )))
        .unwrap();

        for _ in 0..3 {
            let record = LogRecord::new("test", crate::entry::Level::Error, "failing");
            handler.handle(record).await.unwrap();
        }
        mock.assert_async().await;
        assert!(logs_contain("failed to push log entry"));
    }

    #[tokio::test]
    async fn handle_swallows_transport_failures() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let handler = LokiHandler::new(Config::new(format!(
            "http://127.0.0.1:{port}/loki/api/v1/push"
        )))
        .unwrap();

        let record = LogRecord::new("test", crate::entry::Level::Info, "unroutable");
        handler.handle(record).await.unwrap();
    }

    #[tokio::test]
    async fn handle_surfaces_configuration_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/loki/api/v1/push")
            .expect(0)
            .create_async()
            .await;

        let config = Config::new(format!("{}/loki/api/v1/push", server.url()))
            .version("0")
            .label("host", LabelValue::computed(|| Some("a".to_string())));
        let handler = LokiHandler::new(config).unwrap();

        let record = LogRecord::new("test", crate::entry::Level::Info, "Test");
        let err = handler.handle(record).await.unwrap_err();
        assert!(matches!(err, ConfigError::ComputedLabel { .. }));
        mock.assert_async().await;
    }

    #[test]
    fn new_rejects_unknown_version() {
        let config = Config::new("http://localhost:3100/loki/api/v1/push").version("7");
        assert!(matches!(
            LokiHandler::new(config),
            Err(ConfigError::InvalidVersion(_))
        ));
    }
}
