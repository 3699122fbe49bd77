//! AMQP broker connection with bounded reconnect attempts

use crate::config::AmqpSettings;
use crate::error::{PartyFinderError, Result};
use amqprs::channel::Channel;
use amqprs::connection::{Connection, OpenConnectionArguments};
use anyhow::Context;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// An open connection to the AMQP broker
pub struct AmqpConnection {
    connection: Connection,
    broker: String,
}

impl AmqpConnection {
    /// Connect to the broker, backing off exponentially between attempts
    ///
    /// Gives up with `AmqpConnectionFailed` once `max_retry_attempts`
    /// additional attempts have been spent.
    pub async fn connect(settings: &AmqpSettings) -> Result<Self> {
        let broker = format!("{}:{}", settings.host, settings.port);
        let mut delay = Duration::from_millis(settings.retry_delay_ms);
        let mut attempt = 0u32;

        let connection = loop {
            match Self::open_once(settings).await {
                Ok(connection) => break connection,
                Err(e) if attempt < settings.max_retry_attempts => {
                    attempt += 1;
                    warn!(
                        "Connection to {} failed (attempt {}): {}. Next try in {:?}",
                        broker, attempt, e, delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(30000));
                }
                Err(e) => {
                    return Err(PartyFinderError::AmqpConnectionFailed {
                        message: format!(
                            "Gave up on {} after {} attempts: {}",
                            broker,
                            settings.max_retry_attempts + 1,
                            e
                        ),
                    }
                    .into());
                }
            }
        };

        info!("Connected to AMQP broker at {}", broker);
        Ok(Self { connection, broker })
    }

    async fn open_once(settings: &AmqpSettings) -> Result<Connection> {
        let mut args = OpenConnectionArguments::new(
            &settings.host,
            settings.port,
            &settings.username,
            &settings.password,
        );
        args.virtual_host(&settings.vhost);

        Connection::open(&args)
            .await
            .context("AMQP handshake failed")
    }

    /// Open a channel on this connection
    pub async fn open_channel(&self) -> Result<Channel> {
        self.connection.open_channel(None).await.map_err(|e| {
            PartyFinderError::AmqpConnectionFailed {
                message: format!("Failed to open channel on {}: {}", self.broker, e),
            }
            .into()
        })
    }

    /// The broker this connection points at, as host:port
    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Close the connection
    pub async fn close(self) -> Result<()> {
        self.connection
            .close()
            .await
            .context("Failed to close AMQP connection")
    }
}
