//! Lead extraction domain: paginated fetching, record normalization, and
//! output schema discovery.

mod fetcher;
mod record;
mod schema;

pub use fetcher::{BATCH_SIZE_DEFAULT, LeadFetcher};
pub use record::{LeadAttribute, LeadField, NormalizedRecord, RawLeadRecord};
pub use schema::{Column, ColumnType, FieldMetadata, generate_columns};
