//! Application-facing request client.
//!
//! Combines a transport, a supervisor and a dedup cache:
//! - `get`/`post` always start a new request
//! - `get_single`/`post_single` collapse concurrent identical requests
//! - `*_supervised` variants also put the request under a timeout

use std::sync::Arc;

use crate::dedup::DedupCache;
use crate::supervisor::{ControllerOptions, RequestController, RequestSupervisor};
use crate::transport::{Method, Params, RequestHandle, RequestSpec, Transport};

pub struct RequestClient<T: Transport> {
    transport: Arc<T>,
    supervisor: Arc<RequestSupervisor>,
    dedup: Arc<DedupCache>,
    dedup_enabled: bool,
}

impl<T: Transport> Clone for RequestClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            supervisor: self.supervisor.clone(),
            dedup: self.dedup.clone(),
            dedup_enabled: self.dedup_enabled,
        }
    }
}

impl<T: Transport> RequestClient<T> {
    pub fn new(transport: Arc<T>, supervisor: Arc<RequestSupervisor>, dedup: Arc<DedupCache>) -> Self {
        Self {
            transport,
            supervisor,
            dedup,
            dedup_enabled: true,
        }
    }

    /// Turn deduplication of `*_single` calls on or off.
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup_enabled = enabled;
        self
    }

    pub fn supervisor(&self) -> &Arc<RequestSupervisor> {
        &self.supervisor
    }

    pub fn dedup(&self) -> &Arc<DedupCache> {
        &self.dedup
    }

    pub fn request(&self, method: Method, url: &str, params: Params) -> RequestHandle {
        self.transport.issue(RequestSpec::new(method, url, params))
    }

    pub fn get(&self, url: &str, params: Params) -> RequestHandle {
        self.request(Method::Get, url, params)
    }

    pub fn post(&self, url: &str, params: Params) -> RequestHandle {
        self.request(Method::Post, url, params)
    }

    /// Issue a request unless an identical one is still in flight, in which
    /// case its handle is returned.
    pub fn single(&self, method: Method, url: &str, params: Params) -> RequestHandle {
        if !self.dedup_enabled {
            return self.request(method, url, params);
        }
        self.dedup
            .issue_or_reuse(method, url, &params, || self.request(method, url, params.clone()))
    }

    pub fn get_single(&self, url: &str, params: Params) -> RequestHandle {
        self.single(Method::Get, url, params)
    }

    pub fn post_single(&self, url: &str, params: Params) -> RequestHandle {
        self.single(Method::Post, url, params)
    }

    /// Put `handle` under this client's supervisor.
    pub fn supervise(&self, handle: RequestHandle, options: ControllerOptions) -> RequestController {
        RequestController::new(&self.supervisor, handle, options)
    }

    /// Stop supervising `handle`, e.g. after it completed normally.
    pub fn stop_supervising(&self, handle: &RequestHandle) -> bool {
        self.supervisor.stop_supervising(handle)
    }

    /// Deduplicated request under supervision. A reused handle is already
    /// supervised, so the returned controller's registration is a no-op.
    pub fn single_supervised(
        &self,
        method: Method,
        url: &str,
        params: Params,
        options: ControllerOptions,
    ) -> (RequestHandle, RequestController) {
        let handle = self.single(method, url, params);
        let controller = self.supervise(handle.clone(), options);
        (handle, controller)
    }

    pub fn get_single_supervised(
        &self,
        url: &str,
        params: Params,
        options: ControllerOptions,
    ) -> (RequestHandle, RequestController) {
        self.single_supervised(Method::Get, url, params, options)
    }

    pub fn post_single_supervised(
        &self,
        url: &str,
        params: Params,
        options: ControllerOptions,
    ) -> (RequestHandle, RequestController) {
        self.single_supervised(Method::Post, url, params, options)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SweepConfig;
    use crate::transport::{Outcome, Response};
    use std::sync::Mutex;

    /// Transport that records every issued handle and never finishes them.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub issued: Mutex<Vec<RequestHandle>>,
    }

    impl RecordingTransport {
        pub fn issued(&self) -> usize {
            self.issued.lock().unwrap().len()
        }
    }

    impl Transport for RecordingTransport {
        fn issue(&self, spec: RequestSpec) -> RequestHandle {
            let handle = RequestHandle::new(spec.method, spec.url);
            self.issued.lock().unwrap().push(handle.clone());
            handle
        }
    }

    fn client() -> (Arc<RecordingTransport>, RequestClient<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let supervisor = Arc::new(RequestSupervisor::new(&SweepConfig::new("ajax", 1000)));
        let client = RequestClient::new(transport.clone(), supervisor, Arc::new(DedupCache::new()));
        (transport, client)
    }

    fn params() -> Params {
        Params::new().with("a", "1")
    }

    #[test]
    fn test_get_single_issues_once_while_in_flight() {
        let (transport, client) = client();
        let first = client.get_single("/api", params());
        let second = client.get_single("/api", params());

        assert_eq!(first, second);
        assert_eq!(transport.issued(), 1);
    }

    #[test]
    fn test_get_single_reissues_after_completion() {
        let (transport, client) = client();
        let first = client.get_single("/api", params());
        first.finish(Outcome::Completed(Response {
            status: 200,
            body: "{}".into(),
        }));
        let second = client.get_single("/api", params());

        assert_ne!(first, second);
        assert_eq!(transport.issued(), 2);
    }

    #[test]
    fn test_plain_get_never_dedups() {
        let (transport, client) = client();
        client.get("/api", params());
        client.get("/api", params());
        assert_eq!(transport.issued(), 2);
    }

    #[test]
    fn test_dedup_can_be_disabled() {
        let (transport, client) = client();
        let client = client.with_dedup(false);
        client.post_single("/api", params());
        client.post_single("/api", params());
        assert_eq!(transport.issued(), 2);
    }

    #[test]
    fn test_supervised_duplicate_registers_once() {
        let (transport, client) = client();
        let options = ControllerOptions::new().timeout_ms(1000);
        let (h1, c1) = client.get_single_supervised("/api", params(), options.clone());
        let (h2, c2) = client.get_single_supervised("/api", params(), options);

        assert_eq!(h1, h2);
        assert_eq!(transport.issued(), 1);
        assert_eq!(client.supervisor().count(), 1);
        assert!(c1.is_registered());
        assert!(!c2.is_registered());

        assert!(client.stop_supervising(&h1));
        assert_eq!(client.supervisor().count(), 0);
    }
}
