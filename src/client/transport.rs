//! Wire transport for Marketo SOAP calls.
//!
//! The extraction core only depends on the [`RpcTransport`] trait: one signed
//! call in, one structured response body (or a classified wire failure) out.
//! [`HttpSoapTransport`] is the production implementation over reqwest. It
//! renders the SOAP 1.1 envelope, POSTs it to the endpoint, and scrapes the
//! known response fields into a `serde_json::Value` so nothing above this
//! module touches XML.

use super::auth::AuthHeader;
use async_trait::async_trait;
use eyre::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default connect and read timeout per call, in seconds.
pub const CALL_TIMEOUT_SECS: u64 = 90;

/// Wire-level failure, before classification into the error taxonomy.
#[derive(Debug, Error)]
pub enum RpcFailure {
    /// The call did not complete within the per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a SOAP fault envelope.
    #[error("SOAP fault {code}: {message}")]
    SoapFault { code: String, message: String },

    /// Non-success HTTP response carrying an application error body.
    /// Marketo reports application errors as HTTP 500 with an embedded
    /// `<code>`/`<message>` pair.
    #[error("HTTP {status}")]
    Http { status: u16, body: String },

    /// Could not reach the endpoint at all (DNS, connection refused).
    #[error("connection failed: {0}")]
    Connect(String),
}

/// Opaque remote-procedure-call capability the extraction core depends on.
///
/// Implementations receive the operation name, a freshly computed
/// authentication header, and a structured request body; they return the
/// structured response body or a [`RpcFailure`].
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        operation: &str,
        auth: &AuthHeader,
        body: &Value,
    ) -> std::result::Result<Value, RpcFailure>;

    /// Configured endpoint, for connection-failure diagnostics.
    fn endpoint(&self) -> &str;
}

/// Production SOAP transport over HTTP.
pub struct HttpSoapTransport {
    client: Client,
    endpoint: Url,
    wsdl: String,
}

impl HttpSoapTransport {
    /// Build a transport with the default 90 s connect/read timeouts.
    pub fn try_new(endpoint: Url, wsdl: impl Into<String>) -> Result<Self> {
        Self::try_new_with_timeout(endpoint, wsdl, CALL_TIMEOUT_SECS)
    }

    pub fn try_new_with_timeout(
        endpoint: Url,
        wsdl: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .with_context(|| "Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            wsdl: wsdl.into(),
        })
    }

    pub fn wsdl(&self) -> &str {
        &self.wsdl
    }

    fn envelope(&self, operation: &str, auth: &AuthHeader, body: &Value) -> String {
        let mut request_body = String::new();
        if let Some(fields) = body.as_object() {
            for (name, value) in fields {
                write_element(&mut request_body, name, value);
            }
        }

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" "#,
                r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
                r#"xmlns:ns1="http://www.marketo.com/mktows/">"#,
                "<SOAP-ENV:Header><ns1:AuthenticationHeader>",
                "<mktowsUserId>{user_id}</mktowsUserId>",
                "<requestSignature>{signature}</requestSignature>",
                "<requestTimestamp>{timestamp}</requestTimestamp>",
                "</ns1:AuthenticationHeader></SOAP-ENV:Header>",
                "<SOAP-ENV:Body><ns1:{operation}>{body}</ns1:{operation}></SOAP-ENV:Body>",
                "</SOAP-ENV:Envelope>",
            ),
            user_id = escape_xml(&auth.user_id),
            signature = escape_xml(&auth.signature),
            timestamp = escape_xml(&auth.timestamp),
            operation = operation,
            body = request_body,
        )
    }
}

#[async_trait]
impl RpcTransport for HttpSoapTransport {
    async fn call(
        &self,
        operation: &str,
        auth: &AuthHeader,
        body: &Value,
    ) -> std::result::Result<Value, RpcFailure> {
        let envelope = self.envelope(operation, auth, body);
        log::trace!("SOAP request to {}: {}", self.endpoint, operation);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}\"", operation))
            .body(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcFailure::Timeout
                } else {
                    RpcFailure::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RpcFailure::Timeout
            } else {
                RpcFailure::Connect(e.to_string())
            }
        })?;

        if let Some((code, message)) = parse_soap_fault(&text) {
            return Err(RpcFailure::SoapFault { code, message });
        }
        if !status.is_success() {
            return Err(RpcFailure::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(parse_response_body(operation, &text))
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

impl std::fmt::Display for HttpSoapTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    // leadSelector carries the selector type attribute the service dispatches on
    let attrs = if name == "leadSelector" {
        r#" xsi:type="ns1:LastUpdateAtSelector""#
    } else {
        ""
    };

    match value {
        Value::Object(fields) => {
            out.push_str(&format!("<{}{}>", name, attrs));
            for (child_name, child) in fields {
                write_element(out, child_name, child);
            }
            out.push_str(&format!("</{}>", name));
        }
        Value::Null => {}
        Value::String(s) => {
            out.push_str(&format!("<{0}{1}>{2}</{0}>", name, attrs, escape_xml(s)));
        }
        other => {
            out.push_str(&format!("<{0}{1}>{2}</{0}>", name, attrs, other));
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// First capture of `pattern` within `text`, XML-unescaped.
fn capture(pattern: &str, text: &str) -> Option<String> {
    let regex = Regex::new(pattern).ok()?;
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str()))
}

/// All first captures of `pattern` within `text`, not unescaped (used for
/// nested element blocks that are parsed further).
fn capture_all(pattern: &str, text: &str) -> Vec<String> {
    let Ok(regex) = Regex::new(pattern) else {
        return Vec::new();
    };
    regex
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Detect a SOAP fault envelope and extract its faultcode/faultstring.
fn parse_soap_fault(body: &str) -> Option<(String, String)> {
    let code = capture(r"(?s)<faultcode>(.*?)</faultcode>", body)?;
    let message =
        capture(r"(?s)<faultstring>(.*?)</faultstring>", body).unwrap_or_default();
    Some((code.trim().to_string(), message.trim().to_string()))
}

/// Scrape a successful response into the structured shape the core consumes.
fn parse_response_body(operation: &str, body: &str) -> Value {
    match operation {
        "describeMObject" => parse_describe_response(body),
        _ => parse_leads_response(body),
    }
}

fn parse_leads_response(body: &str) -> Value {
    let records: Vec<Value> = capture_all(r"(?s)<leadRecord>(.*?)</leadRecord>", body)
        .iter()
        .map(|block| {
            let attributes: Vec<Value> = capture_all(r"(?s)<attribute>(.*?)</attribute>", block)
                .iter()
                .map(|attr| {
                    json!({
                        "attrName": capture(r"(?s)<attrName>(.*?)</attrName>", attr)
                            .unwrap_or_default(),
                        "attrType": capture(r"(?s)<attrType>(.*?)</attrType>", attr)
                            .unwrap_or_default(),
                        "attrValue": capture(r"(?s)<attrValue>(.*?)</attrValue>", attr)
                            .unwrap_or_default(),
                    })
                })
                .collect();

            json!({
                "Id": capture(r"(?s)<Id>(.*?)</Id>", block)
                    .and_then(|id| id.trim().parse::<i64>().ok())
                    .unwrap_or_default(),
                "Email": capture(r"(?s)<Email>(.*?)</Email>", block).unwrap_or_default(),
                "leadAttributeList": attributes,
            })
        })
        .collect();

    let remaining = capture(r"<remainingCount>(\d+)</remainingCount>", body)
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(0);

    let mut response = json!({
        "returnCount": records.len(),
        "remainingCount": remaining,
        "leadRecordList": records,
    });
    if let Some(position) = capture(r"(?s)<newStreamPosition>(.*?)</newStreamPosition>", body) {
        if !position.is_empty() {
            response["newStreamPosition"] = Value::String(position);
        }
    }
    response
}

fn parse_describe_response(body: &str) -> Value {
    let fields: Vec<Value> = capture_all(r"(?s)<field>(.*?)</field>", body)
        .iter()
        .map(|block| {
            json!({
                "name": capture(r"(?s)<name>(.*?)</name>", block).unwrap_or_default(),
                "dataType": capture(r"(?s)<dataType>(.*?)</dataType>", block)
                    .unwrap_or_default(),
                "isCustom": capture(r"(?s)<isCustom>(.*?)</isCustom>", block)
                    .map(|v| v.trim() == "true")
                    .unwrap_or(false),
                "isDynamic": capture(r"(?s)<isDynamic>(.*?)</isDynamic>", block)
                    .map(|v| v.trim() == "true")
                    .unwrap_or(false),
            })
        })
        .collect();

    json!({ "metadata": { "fieldList": fields } })
}
