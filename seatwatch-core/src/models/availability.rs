//! Vendor availability payload and retrieval outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::CoreError;

// ============================================================================
// Availability Payload
// ============================================================================

/// Typed view of the vendor's availability response.
///
/// Unknown fields are ignored. The raw JSON is what callers receive; this
/// view only exists for summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityPayload {
    /// Seat groups, each tied to one or more offers.
    #[serde(default)]
    pub groups: Vec<SeatGroup>,
    /// Offers referenced by groups.
    #[serde(default)]
    pub offers: Vec<Offer>,
}

/// A block of seats sold under the same offers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatGroup {
    /// Offer ids; the first one determines the group's ticket type.
    #[serde(default)]
    pub offer_ids: Vec<String>,
    /// `section -> row -> seats`.
    #[serde(default)]
    pub places: BTreeMap<String, BTreeMap<String, Vec<Value>>>,
}

impl SeatGroup {
    /// Counts seats across all sections and rows.
    pub fn seat_count(&self) -> usize {
        self.places
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

/// A priced offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    /// Offer id referenced from [`SeatGroup::offer_ids`].
    pub id: String,
    /// Offer type: `standard`, `resale`, or vendor-specific values.
    #[serde(rename = "type", default)]
    pub offer_type: String,
}

/// Seat totals per ticket type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatTotals {
    /// Seats offered at face value.
    pub total_standard: usize,
    /// Seats offered on the resale market.
    pub total_resale: usize,
}

impl AvailabilityPayload {
    /// Parses the typed view out of a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidData`] if the JSON does not have the
    /// expected shape.
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::InvalidData(
                "availability payload is not an object".to_string(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::InvalidData(format!("unexpected payload shape: {e}")))
    }

    /// Looks up an offer by id.
    pub fn offer(&self, id: &str) -> Option<&Offer> {
        self.offers.iter().find(|o| o.id == id)
    }

    /// Sums seats per ticket type.
    ///
    /// A group counts toward the type of its first offer. Groups without
    /// offers, or whose first offer is unknown, are skipped.
    pub fn seat_totals(&self) -> SeatTotals {
        let mut totals = SeatTotals::default();

        for group in &self.groups {
            let Some(offer) = group.offer_ids.first().and_then(|id| self.offer(id)) else {
                continue;
            };

            match offer.offer_type.as_str() {
                "standard" => totals.total_standard += group.seat_count(),
                "resale" => totals.total_resale += group.seat_count(),
                _ => {}
            }
        }

        totals
    }
}

// ============================================================================
// Retrieval Result
// ============================================================================

/// Classification of one vendor API response.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalResult {
    /// JSON payload, passed through unmodified.
    Success {
        /// The raw availability JSON.
        payload: Value,
    },
    /// The anti-bot layer rejected the request, possibly under a 2xx status.
    Blocked {
        /// Response body as received.
        raw_body: String,
    },
    /// Non-2xx status.
    UpstreamError {
        /// HTTP status code.
        status_code: u16,
        /// Reason phrase.
        status_text: String,
    },
    /// A 2xx response whose body is not JSON.
    MalformedPayload {
        /// Response body as received.
        raw_body: String,
    },
}

impl RetrievalResult {
    /// Returns true for [`RetrievalResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns a short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Blocked { .. } => "blocked",
            Self::UpstreamError { .. } => "upstream_error",
            Self::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
