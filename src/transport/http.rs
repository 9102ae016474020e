//! Plain HTTP transport backed by reqwest.

use std::time::Duration;
use url::Url;

use crate::config::TransportConfig;
use crate::transport::handle::RequestHandle;
use crate::transport::types::{Method, Outcome, Params, RequestSpec, Response, TransportError};
use crate::transport::{spawn_request, Transport};

/// Issues requests with a shared reqwest client, one tokio task each.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn issue(&self, spec: RequestSpec) -> RequestHandle {
        let handle = RequestHandle::new(spec.method, spec.url.clone());
        let url = match parse_url(&spec.url) {
            Ok(url) => url,
            Err(e) => {
                handle.finish(Outcome::Failed(e));
                return handle;
            }
        };

        let client = self.client.clone();
        spawn_request(&handle, async move {
            send(&client, spec.method, url, &spec.params).await
        });
        handle
    }
}

pub(crate) fn build_client(config: &TransportConfig) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| TransportError::Request(e.to_string()))
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, TransportError> {
    Url::parse(raw).map_err(|e| TransportError::InvalidRequest(format!("{}: {}", raw, e)))
}

/// Send one request and translate the result into an [`Outcome`].
///
/// GET carries the parameters in the query string, POST as a form body.
pub(crate) async fn send(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    params: &Params,
) -> Outcome {
    let builder = match method {
        Method::Get => client.get(url).query(params.as_slice()),
        Method::Post => client.post(url).form(params.as_slice()),
    };

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return Outcome::Failed(TransportError::Request(e.to_string())),
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return Outcome::Failed(TransportError::Request(e.to_string())),
    };

    if status.is_success() {
        Outcome::Completed(Response {
            status: status.as_u16(),
            body,
        })
    } else {
        Outcome::Failed(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
