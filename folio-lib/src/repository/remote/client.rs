use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};
use url::Url;

use crate::repository::{
    config::{RemoteConfig, TransportKind},
    remote::{
        CancelToken, Error, MemoryTransport, Request, Response, Result, RpcTransport,
        TableTransport, Transport,
    },
};

/// The single entry point for remote calls.
///
/// Adds what the transports don't do on their own: a bounded wait per attempt, one retry for
/// reads that failed transiently, and cooperative cancellation. Writes are never retried.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    retry_backoff: Duration,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, retry_backoff: Duration) -> Self {
        Self {
            transport,
            timeout,
            retry_backoff,
        }
    }

    /// Build a client for the transport selected in the configuration.
    pub fn from_config(cfg: &RemoteConfig) -> crate::Result<Self> {
        let transport: Arc<dyn Transport> = match cfg.transport {
            TransportKind::Memory => Arc::new(MemoryTransport::new()),
            kind => {
                let url = Url::parse(&cfg.base_url).map_err(|e| {
                    crate::Error::Config(format!("invalid base_url '{}': {e}", cfg.base_url))
                })?;
                if kind == TransportKind::Rpc {
                    Arc::new(RpcTransport::new(url))
                } else {
                    Arc::new(TableTransport::new(url))
                }
            }
        };

        Ok(Self::new(transport, cfg.timeout(), cfg.retry_backoff()))
    }

    pub async fn call(&self, request: Request) -> Result<Response> {
        self.call_with(request, &CancelToken::new()).await
    }

    pub async fn call_with(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        let operation = request.operation();
        let retry = request.is_read().then(|| request.clone());

        debug!("Calling {operation}");

        let result = match (self.attempt(request, cancel).await, retry) {
            (Err(e), Some(request)) if e.is_transient() => {
                warn!("{operation} failed ({e}), retrying once");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::Cancelled),
                    _ = tokio::time::sleep(self.retry_backoff) => {
                        self.attempt(request, cancel).await
                    }
                }
            }
            (result, _) => result,
        };

        if let Err(e) = &result {
            warn!("{operation} failed: {e}");
        }

        result
    }

    async fn attempt(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(self.timeout, self.transport.call(request)) => {
                match result {
                    Ok(response) => response,
                    Err(_elapsed) => Err(Error::Timeout),
                }
            }
        }
    }
}
