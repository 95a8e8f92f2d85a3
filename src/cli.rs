//! CLI helper functions

use crate::{
    client::{Credentials, HttpSoapTransport, SoapClient},
    lead::{Column, LeadFetcher, generate_columns},
    pipeline::{ExtractionConfig, run_extraction},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use eyre::{Context, Result};
use std::sync::Arc;
use url::Url;

/// Load a signed SOAP client from environment variables.
///
/// Expected environment variables:
/// - MARKETO_ENDPOINT: SOAP endpoint URL (required)
/// - MARKETO_USER_ID: API user id (required)
/// - MARKETO_ENCRYPTION_KEY: API encryption key (required)
/// - MARKETO_WSDL: WSDL URL (optional, defaults to `{endpoint}?WSDL`)
pub fn load_soap_client() -> Result<SoapClient> {
    let endpoint_str =
        std::env::var("MARKETO_ENDPOINT").context("MARKETO_ENDPOINT environment variable not set")?;
    let endpoint = Url::parse(&endpoint_str)
        .with_context(|| format!("Invalid MARKETO_ENDPOINT: {}", endpoint_str))?;

    let user_id =
        std::env::var("MARKETO_USER_ID").context("MARKETO_USER_ID environment variable not set")?;
    let encryption_key = std::env::var("MARKETO_ENCRYPTION_KEY")
        .context("MARKETO_ENCRYPTION_KEY environment variable not set")?;

    let wsdl =
        std::env::var("MARKETO_WSDL").unwrap_or_else(|_| format!("{}?WSDL", endpoint_str));

    let transport = HttpSoapTransport::try_new(endpoint, wsdl)
        .context("Failed to create SOAP transport")?;

    Ok(SoapClient::new(
        Arc::new(transport),
        Credentials::new(user_id, encryption_key),
    ))
}

/// Parse a CLI datetime argument.
///
/// Accepts RFC 3339 (`2015-08-01T00:00:00Z`), `YYYY-MM-DD HH:MM:SS`
/// (interpreted as UTC), or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    eyre::bail!(
        "Invalid datetime '{}'. Expected RFC 3339, 'YYYY-MM-DD HH:MM:SS', or 'YYYY-MM-DD'",
        text
    );
}

/// Discover the output column schema from the remote lead object.
pub async fn guess_columns() -> Result<Vec<Column>> {
    let client = load_soap_client()?;
    let fetcher = LeadFetcher::new(client);

    log::info!("Describing remote lead object...");
    let fields = fetcher.describe().await?;
    log::info!("Described {} field(s)", fields.len());

    Ok(generate_columns(&fields))
}

/// Run a full extraction, writing each normalized record as one JSON line
/// to stdout.
pub async fn extract_leads(config: ExtractionConfig) -> Result<u64> {
    let client = load_soap_client()?;

    let count = run_extraction(client, &config, |_unit| {
        |record: crate::lead::NormalizedRecord| {
            let line = serde_json::to_string(&record).map_err(|e| {
                crate::error::MarketoError::Config(format!("failed to encode record: {}", e))
            })?;
            println!("{}", line);
            Ok(())
        }
    })
    .await?;

    Ok(count)
}

/// Verify endpoint and credentials with one signed call.
pub async fn test_auth() -> Result<()> {
    let client = load_soap_client()?;
    log::info!("Testing authentication against {}", client.endpoint());

    let fetcher = LeadFetcher::new(client);
    let fields = fetcher.describe().await?;
    log::info!("✓ Authenticated; lead object has {} field(s)", fields.len());
    Ok(())
}
