//! Per-window lead fetching with cursor pagination.
//!
//! One query per time window, continued with the server-issued opaque
//! stream position until the server reports no remaining records. The
//! loop is strictly sequential per window: the next cursor only exists in
//! the previous response, so parallelism lives across windows, never
//! within one.

use super::record::{NormalizedRecord, RawLeadRecord};
use super::schema::FieldMetadata;
use crate::client::SoapClient;
use crate::error::MarketoError;
use crate::timeslice::TimeWindow;
use chrono::SecondsFormat;
use serde_json::{Value, json};

/// Default page size. The service caps at 1000, but a full page at that
/// size takes around two minutes per request; 250 keeps a request near
/// thirty seconds.
pub const BATCH_SIZE_DEFAULT: u32 = 250;

const GET_MULTIPLE_LEADS: &str = "getMultipleLeads";
const DESCRIBE_M_OBJECT: &str = "describeMObject";
const LEAD_OBJECT_NAME: &str = "LeadRecord";

/// Fetches leads for one window at a time through a [`SoapClient`].
#[derive(Clone)]
pub struct LeadFetcher {
    client: SoapClient,
}

impl LeadFetcher {
    pub fn new(client: SoapClient) -> Self {
        Self { client }
    }

    /// Describe the lead object's queryable fields (schema discovery).
    pub async fn describe(&self) -> Result<Vec<FieldMetadata>, MarketoError> {
        let response = self
            .client
            .call(DESCRIBE_M_OBJECT, &json!({ "objectName": LEAD_OBJECT_NAME }))
            .await?;

        serde_json::from_value(response["metadata"]["fieldList"].clone()).map_err(|e| {
            MarketoError::Config(format!("unexpected describe response shape: {}", e))
        })
    }

    /// Fetch every lead whose last-updated instant lies in the window,
    /// invoking `handler` synchronously per record in server order.
    ///
    /// The handler runs before the next page is requested, so downstream
    /// pacing applies backpressure to the fetch loop. Any error from the
    /// client or the handler aborts the window and propagates unchanged.
    ///
    /// Returns the number of records handled.
    pub async fn fetch_window<F>(
        &self,
        window: &TimeWindow,
        batch_size: u32,
        handler: &mut F,
    ) -> Result<u64, MarketoError>
    where
        F: FnMut(NormalizedRecord) -> Result<(), MarketoError> + Send,
    {
        let request = json!({
            "leadSelector": {
                "oldestUpdatedAt": window.from.to_rfc3339_opts(SecondsFormat::Secs, true),
                "latestUpdatedAt": window.to.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            "batchSize": batch_size,
        });
        log::info!("Fetching from '{}' to '{}'...", window.from, window.to);

        let mut total = 0;
        let (count, mut cursor) = self.fetch_page(&request, handler).await?;
        total += count;

        while let Some(position) = cursor {
            // the cursor, not a new time range, drives continuation
            let mut continued = request.clone();
            continued["streamPosition"] = Value::String(position);
            let (count, next) = self.fetch_page(&continued, handler).await?;
            total += count;
            cursor = next;
        }

        Ok(total)
    }

    /// Issue one page request; returns the record count and the cursor for
    /// the next page, if the server reports records remaining.
    async fn fetch_page<F>(
        &self,
        request: &Value,
        handler: &mut F,
    ) -> Result<(u64, Option<String>), MarketoError>
    where
        F: FnMut(NormalizedRecord) -> Result<(), MarketoError> + Send,
    {
        let started = std::time::Instant::now();
        let response = self.client.call(GET_MULTIPLE_LEADS, request).await?;
        log::info!("Fetched in {:.2} seconds", started.elapsed().as_secs_f64());

        let records = response["leadRecordList"].as_array().cloned().unwrap_or_default();
        let remaining = response["remainingCount"].as_i64().unwrap_or(0);
        log::info!("Fetched records in the range: {}", records.len());
        log::info!("Remaining records in the range: {}", remaining);

        for record in &records {
            handler(RawLeadRecord::from_value(record).normalize())?;
        }

        let cursor = if remaining > 0 {
            let position = response["newStreamPosition"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if position.is_empty() {
                log::warn!(
                    "Server reported {} remaining record(s) but returned no stream position; \
                     stopping pagination",
                    remaining
                );
                None
            } else {
                Some(position)
            }
        } else {
            None
        };

        Ok((records.len() as u64, cursor))
    }
}
