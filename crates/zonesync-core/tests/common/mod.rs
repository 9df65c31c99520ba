//! Test doubles and common utilities for contract tests
//!
//! - [`MockDnsProvider`]: in-memory zone with call counters and scripted
//!   per-key failures
//! - [`FakeApi`]: an `HttpBackend` serving a GoDaddy-shaped API from an
//!   in-memory zone, for tests that go through the real `Transport`
//! - [`ApiProvider`]: minimal `DnsProvider` mapping onto [`FakeApi`] paths

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use zonesync_core::error::{Error, Result};
use zonesync_core::transport::{BackendError, HttpBackend, HttpRequest, HttpResponse, Method};
use zonesync_core::{
    Credentials, DnsProvider, MemoryCredentialStore, RateLimitConfig, RateLimiter, Record,
    RecordKey, RecordSet, Transport, TransportConfig,
};

/// Failure a mock call should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    /// `Error::Transport`, as after exhausted retries
    Transport,
    /// `Error::Authentication`
    Auth,
    /// `Error::NotFound`
    NotFound,
    /// The call panics
    Panic,
}

impl Fail {
    fn error(self, key: &RecordKey) -> Error {
        match self {
            Fail::Transport => Error::transport(Some(500), 6, format!("retries exhausted for {}", key)),
            Fail::Auth => Error::Authentication {
                status: Some(401),
                message: "Unable to authenticate".into(),
            },
            Fail::NotFound => Error::not_found(format!("{} not found", key)),
            Fail::Panic => panic!("mock provider panicked on {}", key),
        }
    }
}

/// A mock DnsProvider backed by an in-memory zone
///
/// Successful mutations are applied to the zone, so a second reconcile sees
/// the result of the first.
pub struct MockDnsProvider {
    zone: Arc<Mutex<RecordSet>>,
    list_calls: Arc<AtomicUsize>,
    mutation_calls: Arc<AtomicUsize>,
    failures: Arc<Mutex<HashMap<RecordKey, Fail>>>,
    list_failure: Arc<Mutex<Option<Fail>>>,
    latency: Duration,
    in_flight: Arc<Mutex<HashSet<RecordKey>>>,
    max_in_flight: Arc<AtomicUsize>,
    overlapping_key: Arc<AtomicUsize>,
    mutated_keys: Arc<Mutex<Vec<RecordKey>>>,
}

impl MockDnsProvider {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            zone: Arc::new(Mutex::new(RecordSet::from_records(records))),
            list_calls: Arc::new(AtomicUsize::new(0)),
            mutation_calls: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(Mutex::new(HashMap::new())),
            list_failure: Arc::new(Mutex::new(None)),
            latency: Duration::ZERO,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            overlapping_key: Arc::new(AtomicUsize::new(0)),
            mutated_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every mutation take this long
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make mutations of `key` fail
    pub fn fail_key(&self, key: RecordKey, fail: Fail) {
        self.failures.lock().unwrap().insert(key, fail);
    }

    /// Make the live-state fetch fail
    pub fn fail_list(&self, fail: Fail) {
        *self.list_failure.lock().unwrap() = Some(fail);
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_call_count(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Times a mutation started while another one for the same key was running
    pub fn overlapping_key_count(&self) -> usize {
        self.overlapping_key.load(Ordering::SeqCst)
    }

    pub fn mutated_keys(&self) -> Vec<RecordKey> {
        self.mutated_keys.lock().unwrap().clone()
    }

    pub fn zone(&self) -> RecordSet {
        self.zone.lock().unwrap().clone()
    }

    async fn mutate(&self, key: &RecordKey, apply: impl FnOnce(&mut RecordSet)) -> Result<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.mutated_keys.lock().unwrap().push(key.clone());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(key.clone()) {
                self.overlapping_key.fetch_add(1, Ordering::SeqCst);
            }
            self.max_in_flight.fetch_max(in_flight.len(), Ordering::SeqCst);
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.lock().unwrap().remove(key);

        let failure = self.failures.lock().unwrap().get(key).copied();
        if let Some(fail) = failure {
            return Err(fail.error(key));
        }
        let mut zone = self.zone.lock().unwrap();
        apply(&mut *zone);
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_records(&self, _domain: &str) -> Result<Vec<Record>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let failure = *self.list_failure.lock().unwrap();
        if let Some(fail) = failure {
            return Err(fail.error(&RecordKey::new("@", "ANY")));
        }
        Ok(self.zone.lock().unwrap().records().cloned().collect())
    }

    async fn create_record_set(&self, _domain: &str, key: &RecordKey, records: &[Record]) -> Result<()> {
        let records = records.to_vec();
        self.mutate(key, |zone| zone.insert(key.clone(), records)).await
    }

    async fn replace_record_set(&self, _domain: &str, key: &RecordKey, records: &[Record]) -> Result<()> {
        let records = records.to_vec();
        self.mutate(key, |zone| zone.insert(key.clone(), records)).await
    }

    async fn delete_record_set(&self, _domain: &str, key: &RecordKey) -> Result<()> {
        self.mutate(key, |zone| {
            zone.remove(key);
        })
        .await
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// HttpBackend serving `/v1/domains/{domain}/records[/{type}/{name}]`
///
/// Requests to paths listed with [`FakeApi::fail_path`] get the scripted
/// status every time.
pub struct FakeApi {
    zone: Mutex<RecordSet>,
    failing_paths: Mutex<HashMap<String, u16>>,
    calls: Mutex<Vec<(Instant, Method, String)>>,
}

impl FakeApi {
    pub fn new(records: Vec<Record>) -> Arc<Self> {
        Arc::new(Self {
            zone: Mutex::new(RecordSet::from_records(records)),
            failing_paths: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer every request whose URL ends with `path` with `status`
    pub fn fail_path(&self, path: &str, status: u16) {
        self.failing_paths
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Times of every request received
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _, _)| *t).collect()
    }

    pub fn calls_to(&self, suffix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, url)| url.ends_with(suffix))
            .count()
    }

    pub fn zone(&self) -> RecordSet {
        self.zone.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpBackend for FakeApi {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.method, request.url.clone()));

        let failing = self
            .failing_paths
            .lock()
            .unwrap()
            .iter()
            .find(|(path, _)| request.url.ends_with(path.as_str()))
            .map(|(_, status)| *status);
        if let Some(status) = failing {
            return Ok(HttpResponse::new(status, r#"{"code":"SERVER_ERROR","message":"boom"}"#));
        }

        let path = request
            .url
            .split("/records")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let mut zone = self.zone.lock().unwrap();
        match (request.method, path.as_str()) {
            (Method::Get, "") => {
                let records: Vec<&Record> = zone.records().collect();
                Ok(HttpResponse::new(200, serde_json::to_string(&records).unwrap()))
            }
            (Method::Patch, "") => {
                let records: Vec<Record> =
                    serde_json::from_value(request.body.unwrap_or_default()).unwrap();
                for record in records {
                    zone.push(record);
                }
                Ok(HttpResponse::new(200, ""))
            }
            (Method::Put, rest) | (Method::Delete, rest) => {
                let mut parts = rest.trim_start_matches('/').splitn(2, '/');
                let record_type = parts.next().unwrap_or_default();
                let name = parts.next().unwrap_or_default();
                let key = RecordKey::new(name, record_type);
                if request.method == Method::Delete {
                    zone.remove(&key);
                } else {
                    let records: Vec<Record> =
                        serde_json::from_value(request.body.unwrap_or_default()).unwrap();
                    zone.insert(key, records);
                }
                Ok(HttpResponse::new(200, ""))
            }
            _ => Ok(HttpResponse::new(404, "")),
        }
    }
}

/// Minimal provider mapping record-set calls onto [`FakeApi`] paths
pub struct ApiProvider {
    transport: Transport,
}

impl ApiProvider {
    pub fn new(api: Arc<FakeApi>, limits: RateLimitConfig, config: TransportConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(&limits).unwrap());
        let credentials = Arc::new(MemoryCredentialStore::with_profile(
            "default",
            Credentials::new("test-key", "test-secret"),
        ));
        let transport = Transport::new(
            api,
            credentials,
            "default",
            limiter,
            "https://api.example.test",
            config,
        )
        .unwrap();
        Self { transport }
    }

    fn set_path(domain: &str, key: &RecordKey) -> String {
        format!("/v1/domains/{}/records/{}/{}", domain, key.record_type, key.name)
    }
}

#[async_trait]
impl DnsProvider for ApiProvider {
    async fn list_records(&self, domain: &str) -> Result<Vec<Record>> {
        self.transport
            .execute_json(Method::Get, &format!("/v1/domains/{}/records", domain), None)
            .await
    }

    async fn create_record_set(&self, domain: &str, _key: &RecordKey, records: &[Record]) -> Result<()> {
        let body = serde_json::to_value(records)?;
        self.transport
            .execute(Method::Patch, &format!("/v1/domains/{}/records", domain), Some(&body))
            .await
            .map(|_| ())
    }

    async fn replace_record_set(&self, domain: &str, key: &RecordKey, records: &[Record]) -> Result<()> {
        let body = serde_json::to_value(records)?;
        self.transport
            .execute(Method::Put, &Self::set_path(domain, key), Some(&body))
            .await
            .map(|_| ())
    }

    async fn delete_record_set(&self, domain: &str, key: &RecordKey) -> Result<()> {
        self.transport
            .execute(Method::Delete, &Self::set_path(domain, key), None)
            .await
            .map(|_| ())
    }

    fn provider_name(&self) -> &'static str {
        "fake-api"
    }
}

/// An A record with a valid TTL
pub fn a(name: &str, ip: &str) -> Record {
    Record::new(name, "A", ip, 600)
}

/// Desired state from records
pub fn desired(records: Vec<Record>) -> RecordSet {
    RecordSet::from_records(records)
}
