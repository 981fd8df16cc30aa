//! # Transport
//!
//! The seam between the engine and the network. Production hosts use
//! [`HttpTransport`]; anything that can turn a request into a response
//! implements [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use rustls::ClientConfig;
use rustls::crypto::aws_lc_rs;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info};

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::request::RequestDescriptor;
use crate::response::{Response, ServedFrom};

/// Performs a single HTTP exchange. Status codes are not interpreted here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response, FetchError>;
}

/// Create a reqwest client from the fetcher configuration
pub fn create_client(config: &FetcherConfig) -> Result<Client, FetchError> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))?
        .with_platform_verifier()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.pool_idle_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.pool_idle_timeout);
    }

    if config.use_system_proxy {
        info!("Using system proxy settings for fetches");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for fetches");
    }

    client_builder.build().map_err(FetchError::from)
}

/// [`Transport`] backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response, FetchError> {
        let upstream = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    FetchError::NetworkUnreachable(e.to_string())
                } else {
                    FetchError::HttpError(e)
                }
            })?;

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = upstream.bytes().await?;

        debug!(
            url = %request.url(),
            status = status.as_u16(),
            size = body.len(),
            "Upstream responded"
        );

        Ok(Response::new(status, headers, body).with_served_from(ServedFrom::Network))
    }
}
