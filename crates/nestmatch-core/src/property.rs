//! Listing records as read by the engine for hydration. Ingestion is owned by
//! another system; the engine never writes these.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
  pub property_id:     Uuid,
  pub address:         String,
  pub city:            String,
  pub state:           String,
  pub neighborhood_id: Option<String>,
  /// Asking price in whole dollars.
  pub price:           Option<i64>,
  pub bedrooms:        Option<u8>,
}
