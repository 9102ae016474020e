//! JSONP transport.
//!
//! Requests carry a generated `callback` parameter and the server answers
//! with `callback(<json>)`. The JSON payload is unwrapped and delivered as
//! the response body.

use crate::config::TransportConfig;
use crate::transport::handle::RequestHandle;
use crate::transport::http::{build_client, parse_url, send};
use crate::transport::types::{Method, Outcome, RequestSpec, Response, TransportError};
use crate::transport::{spawn_request, Transport};

/// Name of the query parameter carrying the callback.
pub const CALLBACK_PARAM: &str = "callback";

#[derive(Clone)]
pub struct JsonpTransport {
    client: reqwest::Client,
    callback_prefix: String,
}

impl JsonpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config)?,
            callback_prefix: config.jsonp_callback_prefix.clone(),
        })
    }

    fn next_callback(&self) -> String {
        format!("{}{}", self.callback_prefix, fastrand::u32(..))
    }
}

impl Transport for JsonpTransport {
    fn issue(&self, spec: RequestSpec) -> RequestHandle {
        let handle = RequestHandle::new(spec.method, spec.url.clone());

        if spec.method != Method::Get {
            handle.finish(Outcome::Failed(TransportError::InvalidRequest(
                "JSONP only supports GET".to_string(),
            )));
            return handle;
        }

        let url = match parse_url(&spec.url) {
            Ok(url) => url,
            Err(e) => {
                handle.finish(Outcome::Failed(e));
                return handle;
            }
        };

        let callback = self.next_callback();
        let mut params = spec.params;
        params.push(CALLBACK_PARAM, callback.clone());

        let client = self.client.clone();
        spawn_request(&handle, async move {
            match send(&client, Method::Get, url, &params).await {
                Outcome::Completed(response) => match unwrap_jsonp(&response.body, &callback) {
                    Some(payload) => Outcome::Completed(Response {
                        status: response.status,
                        body: payload.to_string(),
                    }),
                    None => Outcome::Failed(TransportError::MalformedJsonp { callback }),
                },
                other => other,
            }
        });
        handle
    }
}

/// Strip `callback( ... );` from a JSONP body and check the payload is JSON.
pub fn unwrap_jsonp<'a>(body: &'a str, callback: &str) -> Option<&'a str> {
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    let payload = body
        .strip_prefix(callback)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')?
        .trim();

    serde_json::from_str::<serde_json::Value>(payload).ok()?;
    Some(payload)
}
