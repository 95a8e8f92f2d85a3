//! Integration tests for the extraction pipeline
//!
//! These tests drive the public API end to end with a scripted mock
//! transport: window partitioning, work-unit slicing, cursor pagination,
//! timeout retry, and failure classification.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use marketo_lead_extractor::client::{
    AuthHeader, Credentials, RETRY_TIMEOUT_COUNT, RpcFailure, RpcTransport, SoapClient,
};
use marketo_lead_extractor::error::MarketoError;
use marketo_lead_extractor::lead::NormalizedRecord;
use marketo_lead_extractor::pipeline::{ExtractionConfig, run_extraction};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn lead(id: i64, email: &str, company: &str) -> Value {
    json!({
        "Id": id,
        "Email": email,
        "leadAttributeList": [
            {"attrName": "Company", "attrType": "string", "attrValue": company},
        ],
    })
}

fn page(records: Vec<Value>, remaining: i64, cursor: Option<&str>) -> Value {
    let mut response = json!({
        "returnCount": records.len(),
        "remainingCount": remaining,
        "leadRecordList": records,
    });
    if let Some(cursor) = cursor {
        response["newStreamPosition"] = Value::String(cursor.to_string());
    }
    response
}

/// Mock service: responses keyed by `(window_from, stream_position)`,
/// with a configurable number of leading timeouts.
struct MockMarketo {
    pages: HashMap<(String, String), Value>,
    timeouts_before_success: Mutex<u32>,
    calls: Mutex<u32>,
}

impl MockMarketo {
    fn new(pages: HashMap<(String, String), Value>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            timeouts_before_success: Mutex::new(0),
            calls: Mutex::new(0),
        })
    }

    fn with_timeouts(pages: HashMap<(String, String), Value>, timeouts: u32) -> Arc<Self> {
        let mock = Self::new(pages);
        *mock.timeouts_before_success.lock().unwrap() = timeouts;
        mock
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RpcTransport for MockMarketo {
    async fn call(
        &self,
        _operation: &str,
        auth: &AuthHeader,
        body: &Value,
    ) -> Result<Value, RpcFailure> {
        *self.calls.lock().unwrap() += 1;
        assert!(!auth.signature.is_empty(), "every call must be signed");

        {
            let mut timeouts = self.timeouts_before_success.lock().unwrap();
            if *timeouts > 0 {
                *timeouts -= 1;
                return Err(RpcFailure::Timeout);
            }
        }

        let from = body["leadSelector"]["oldestUpdatedAt"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let cursor = body["streamPosition"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(self
            .pages
            .get(&(from, cursor))
            .cloned()
            .unwrap_or_else(|| page(vec![], 0, None)))
    }

    fn endpoint(&self) -> &str {
        "https://marketo.example.com/soap/mktows/2_0"
    }
}

fn client(transport: Arc<dyn RpcTransport>) -> SoapClient {
    SoapClient::new(transport, Credentials::new("user_id", "TOPSECRET"))
}

fn config(hours: u32, tasks: usize) -> ExtractionConfig {
    ExtractionConfig {
        from: Utc.with_ymd_and_hms(2015, 8, 1, 0, 0, 0).unwrap(),
        to: Some(Utc.with_ymd_and_hms(2015, 8, 1, hours, 0, 0).unwrap()),
        interval_seconds: 3600,
        batch_size: 250,
        task_count: tasks,
    }
}

fn collected(sink: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    sink.lock().unwrap().clone()
}

fn collector(sink: Arc<Mutex<Vec<String>>>) -> impl Fn(usize) -> CollectorHandler {
    move |_| {
        let sink = sink.clone();
        Box::new(move |record: NormalizedRecord| {
            let email = record
                .get("email")
                .map(|f| f.value.as_str().unwrap_or_default().to_string())
                .unwrap_or_default();
            sink.lock().unwrap().push(email);
            Ok(())
        })
    }
}

type CollectorHandler = Box<dyn FnMut(NormalizedRecord) -> Result<(), MarketoError> + Send>;

#[tokio::test]
async fn test_extraction_with_cursor_pagination() {
    let mut pages = HashMap::new();
    // first window: two pages chained by cursor
    pages.insert(
        ("2015-08-01T00:00:00Z".to_string(), String::new()),
        page(
            vec![
                lead(1, "manyo@example.com", "Manyo"),
                lead(2, "everyleaf@example.com", "Everyleaf"),
            ],
            1,
            Some("cursor-a"),
        ),
    );
    pages.insert(
        ("2015-08-01T00:00:00Z".to_string(), "cursor-a".to_string()),
        page(vec![lead(3, "ten-thousand-leaf@example.com", "Manyoshu")], 0, None),
    );
    // second window: single page
    pages.insert(
        ("2015-08-01T01:00:00Z".to_string(), String::new()),
        page(vec![lead(4, "late@example.com", "Latecomer")], 0, None),
    );

    let mock = MockMarketo::new(pages);
    let sink = Arc::new(Mutex::new(Vec::new()));

    let total = run_extraction(client(mock.clone()), &config(2, 1), collector(sink.clone()))
        .await
        .unwrap();

    assert_eq!(total, 4);
    assert_eq!(
        collected(&sink),
        vec![
            "manyo@example.com",
            "everyleaf@example.com",
            "ten-thousand-leaf@example.com",
            "late@example.com",
        ]
    );
    // 2 pages for window one, 1 page for window two
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn test_timeouts_are_retried_transparently() {
    let mut pages = HashMap::new();
    pages.insert(
        ("2015-08-01T00:00:00Z".to_string(), String::new()),
        page(vec![lead(1, "manyo@example.com", "Manyo")], 0, None),
    );

    // three timeouts fit inside the retry budget of five
    let mock = MockMarketo::with_timeouts(pages, 3);
    let sink = Arc::new(Mutex::new(Vec::new()));

    let total = run_extraction(client(mock.clone()), &config(1, 1), collector(sink.clone()))
        .await
        .unwrap();

    assert_eq!(total, 1);
    assert_eq!(mock.calls(), 4);
}

#[tokio::test]
async fn test_exhausted_timeout_budget_is_fatal() {
    // more timeouts than the first attempt plus five retries
    let mock = MockMarketo::with_timeouts(HashMap::new(), RETRY_TIMEOUT_COUNT + 2);
    let sink = Arc::new(Mutex::new(Vec::new()));

    let err = run_extraction(client(mock.clone()), &config(1, 1), collector(sink.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, MarketoError::Transport(_)));
    assert_eq!(mock.calls(), 1 + RETRY_TIMEOUT_COUNT);
    assert!(collected(&sink).is_empty());
}

struct FaultingTransport(RpcFailure);

#[async_trait]
impl RpcTransport for FaultingTransport {
    async fn call(
        &self,
        _operation: &str,
        _auth: &AuthHeader,
        _body: &Value,
    ) -> Result<Value, RpcFailure> {
        Err(match &self.0 {
            RpcFailure::SoapFault { code, message } => RpcFailure::SoapFault {
                code: code.clone(),
                message: message.clone(),
            },
            RpcFailure::Http { status, body } => RpcFailure::Http {
                status: *status,
                body: body.clone(),
            },
            RpcFailure::Connect(message) => RpcFailure::Connect(message.clone()),
            RpcFailure::Timeout => RpcFailure::Timeout,
        })
    }

    fn endpoint(&self) -> &str {
        "https://marketo.example.com/soap/mktows/2_0"
    }
}

#[tokio::test]
async fn test_client_fault_surfaces_as_config_error() {
    let transport = Arc::new(FaultingTransport(RpcFailure::SoapFault {
        code: "SOAP-ENV:Client".to_string(),
        message: "20014 - Authentication failed".to_string(),
    }));
    let sink = Arc::new(Mutex::new(Vec::new()));

    let err = run_extraction(client(transport), &config(1, 1), collector(sink))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketoError::Config(_)));
}

#[tokio::test]
async fn test_rate_limit_surfaces_as_retryable() {
    let transport = Arc::new(FaultingTransport(RpcFailure::Http {
        status: 500,
        body: "<ns1:serviceException><message>Request limit exceeded</message>\
               <code>20015</code></ns1:serviceException>"
            .to_string(),
    }));
    let sink = Arc::new(Mutex::new(Vec::new()));

    let err = run_extraction(client(transport), &config(1, 1), collector(sink))
        .await
        .unwrap_err();
    match err {
        MarketoError::RetryableService { code, .. } => assert_eq!(code, "20015"),
        other => panic!("expected RetryableService, got {:?}", other),
    }
}

#[tokio::test]
async fn test_parallel_tasks_cover_all_windows() {
    let mut pages = HashMap::new();
    for hour in 0..6 {
        pages.insert(
            (format!("2015-08-01T0{}:00:00Z", hour), String::new()),
            page(
                vec![lead(hour, &format!("lead-{}@example.com", hour), "Acme")],
                0,
                None,
            ),
        );
    }

    let mock = MockMarketo::new(pages);
    let sink = Arc::new(Mutex::new(Vec::new()));

    let total = run_extraction(client(mock.clone()), &config(6, 3), collector(sink.clone()))
        .await
        .unwrap();

    assert_eq!(total, 6);
    let mut seen = collected(&sink);
    seen.sort();
    let expected: Vec<String> = (0..6).map(|h| format!("lead-{}@example.com", h)).collect();
    assert_eq!(seen, expected);
    assert_eq!(mock.calls(), 6);
}
