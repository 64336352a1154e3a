// HTTP+script connector: issues an HTTP request with `reqwest`, then feeds the
// response body to an injected `ScriptEvaluator` that returns a map of
// attributes. TLS trust material / client certs / max response size are this
// crate's concern; only "body -> attributes" is delegated (SPEC_FULL.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{ConnectorHealth, ResolutionContext};
use crate::scripting::{Bindings, ScriptEvaluator, ScriptValue};
use crate::validation::ValidationContext;

use super::{ConnectorMeta, DataConnector, ResolveOutcome};

pub struct HttpConnector {
    meta: ConnectorMeta,
    client: Client,
    url: String,
    method: Method,
    body: Option<String>,
    max_response_size: usize,
    script: String,
    evaluator: Arc<dyn ScriptEvaluator>,
    timeout: Duration,
    health: ConnectorHealth,
    lifecycle: Lifecycle,
}

impl Identified for HttpConnector {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

#[async_trait]
impl DataConnector for HttpConnector {
    fn meta(&self) -> &ConnectorMeta {
        &self.meta
    }

    fn health(&self) -> &ConnectorHealth {
        &self.health
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn resolve(&self, ctx: &ResolutionContext) -> Result<ResolveOutcome, EngineError> {
        self.lifecycle.ensure_invocable("HttpConnector", self.id())?;

        let mut request = self.client.request(self.method.clone(), &self.url);
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let send = async {
            let response = request
                .send()
                .await
                .map_err(|e| EngineError::resolution(self.id(), format!("HTTP request failed: {e}")))?;
            read_capped_body(response, self.max_response_size, self.id()).await
        };

        let body_text = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                self.health.record_failure();
                return Err(e);
            }
            Err(_) => {
                self.health.record_failure();
                return Err(EngineError::resolution(self.id(), "HTTP request timed out"));
            }
        };

        let bindings = Bindings::new()
            .with_scalar("body", body_text)
            .with_scalar("principal", ctx.principal.clone())
            .with_scalar("issuerId", ctx.issuer_id.clone())
            .with_scalar("recipientId", ctx.recipient_id.clone());

        match self.evaluator.evaluate(&self.script, &bindings) {
            Ok(ScriptValue::Attributes(raw)) => {
                self.health.record_success();
                let mapped = raw
                    .into_iter()
                    .map(|(id, values)| {
                        Ok((
                            id.clone(),
                            crate::model::Attribute::with_values(
                                crate::types::AttributeId::new(id)?,
                                values,
                            ),
                        ))
                    })
                    .collect::<Result<std::collections::HashMap<_, _>, EngineError>>()?;
                if mapped.is_empty() {
                    Ok(ResolveOutcome::NoResults)
                } else {
                    Ok(ResolveOutcome::Attributes(mapped))
                }
            }
            Ok(ScriptValue::Values(_)) => {
                self.health.record_failure();
                Err(EngineError::resolution(
                    self.id(),
                    "HTTP connector script must return attributes, not a bare value list",
                ))
            }
            Err(e) => {
                self.health.record_failure();
                Err(e)
            }
        }
    }
}

/// Stream the body, aborting once it exceeds `max_size` rather than buffering
/// an unbounded response (SPEC_FULL.md §5, "Resource discipline").
async fn read_capped_body(
    response: reqwest::Response,
    max_size: usize,
    connector_id: &str,
) -> Result<String, EngineError> {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| EngineError::resolution(connector_id, format!("error reading HTTP body: {e}")))?;
        buf.extend_from_slice(&chunk);
        if buf.len() > max_size {
            return Err(EngineError::resolution(
                connector_id,
                format!("HTTP response exceeded maxResponseSize of {max_size} bytes"),
            ));
        }
    }
    String::from_utf8(buf).map_err(|e| EngineError::resolution(connector_id, format!("HTTP response was not valid UTF-8: {e}")))
}

pub struct HttpConnectorBuilder {
    meta: ConnectorMeta,
    url: Option<String>,
    method: Method,
    body: Option<String>,
    max_response_size: usize,
    script: Option<String>,
    evaluator: Option<Arc<dyn ScriptEvaluator>>,
    timeout: Duration,
    user_agent: Option<String>,
    certificate_authority_pem: Option<Vec<u8>>,
    client_certificate_pem: Option<Vec<u8>>,
}

impl HttpConnectorBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: ConnectorMeta::new(id),
            url: None,
            method: Method::GET,
            body: None,
            max_response_size: 1024 * 1024,
            script: None,
            evaluator: None,
            timeout: Duration::from_secs(10),
            user_agent: None,
            certificate_authority_pem: None,
            client_certificate_pem: None,
        }
    }

    /// PEM-encoded CA certificate the HTTP client trusts in addition to the
    /// platform root store (SPEC_FULL.md §6, `certificateAuthority`).
    pub fn certificate_authority_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.certificate_authority_pem = Some(pem.into());
        self
    }

    /// PEM-encoded client identity (certificate + private key, concatenated)
    /// presented for mutual TLS (SPEC_FULL.md §6, `clientCertificate`).
    pub fn client_certificate_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_certificate_pem = Some(pem.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn failover_connector_id(mut self, id: impl Into<String>) -> Self {
        self.meta.failover_connector_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<HttpConnector, EngineError> {
        ValidationContext::new("HttpConnectorBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "connector id must not be empty")?;
        let url = self
            .url
            .ok_or_else(|| EngineError::init_error("HttpConnector", &self.meta.id, "url is required"))?;
        let script = self
            .script
            .ok_or_else(|| EngineError::init_error("HttpConnector", &self.meta.id, "scriptPath is required"))?;
        let evaluator: Arc<dyn ScriptEvaluator> = self
            .evaluator
            .unwrap_or_else(|| Arc::new(crate::scripting::NoScriptEvaluator));

        let mut client_builder = Client::builder();
        if let Some(ua) = &self.user_agent {
            client_builder = client_builder.user_agent(ua.clone());
        }
        if let Some(ca_pem) = &self.certificate_authority_pem {
            let cert = reqwest::Certificate::from_pem(ca_pem).map_err(|e| {
                EngineError::init_error("HttpConnector", &self.meta.id, format!("invalid certificateAuthority PEM: {e}"))
            })?;
            client_builder = client_builder.add_root_certificate(cert);
        }
        if let Some(client_pem) = &self.client_certificate_pem {
            let identity = reqwest::Identity::from_pem(client_pem).map_err(|e| {
                EngineError::init_error("HttpConnector", &self.meta.id, format!("invalid clientCertificate PEM: {e}"))
            })?;
            client_builder = client_builder.identity(identity);
        }
        let client = client_builder
            .build()
            .map_err(|e| EngineError::init_error("HttpConnector", &self.meta.id, format!("failed to build HTTP client: {e}")))?;

        Ok(HttpConnector {
            meta: self.meta,
            client,
            url,
            method: self.method,
            body: self.body,
            max_response_size: self.max_response_size,
            script,
            evaluator,
            timeout: self.timeout,
            health: ConnectorHealth::new(),
            lifecycle: Lifecycle::new(),
        })
    }
}
