//! Domain models for Seatwatch.
//!
//! ## Submodules
//!
//! - [`event`] - Inbound requests and event id extraction
//! - [`proxy`] - Proxy endpoint parsing with separated credentials
//! - [`credential`] - Session credentials and the plausibility policy
//! - [`availability`] - Vendor payload view and retrieval outcomes

mod availability;
mod credential;
mod event;
mod proxy;

pub use availability::{AvailabilityPayload, Offer, RetrievalResult, SeatGroup, SeatTotals};
pub use credential::{
    join_cookie_pairs, CredentialDefect, CredentialPolicy, CredentialSource, SessionCredential,
    DEFAULT_MIN_COOKIE_LENGTH,
};
pub use event::{extract_id, EventRequest, ResourceId};
pub use proxy::ProxyConfig;
