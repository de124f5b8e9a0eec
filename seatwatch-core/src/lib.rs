// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `Seatwatch` Core
//!
//! Core types, parsing, and the failure taxonomy for the `Seatwatch`
//! availability pipeline. Nothing in this crate performs I/O.
//!
//! ## Key Types
//!
//! ### Request Side
//! - [`EventRequest`] - One inbound call: event URL plus optional cookie
//! - [`ResourceId`] - Event id taken from the URL's trailing digit run
//! - [`ProxyConfig`] - Proxy address with credentials held apart
//!
//! ### Session
//! - [`SessionCredential`] - Cookie string scoped to the vendor domain
//! - [`CredentialPolicy`] - Plausibility rules applied before use
//!
//! ### Response Side
//! - [`RetrievalResult`] - Classification of a vendor response
//! - [`AvailabilityPayload`] - Typed view for seat summaries
//! - [`PipelineError`] / [`ErrorResponse`] - Caller-facing failures

pub mod error;
pub mod failure;
pub mod models;

pub use error::CoreError;
pub use failure::{ErrorResponse, PipelineError, SessionFailureReason};

pub use models::{
    // Request side
    extract_id,
    EventRequest,
    ProxyConfig,
    ResourceId,
    // Session
    join_cookie_pairs,
    CredentialDefect,
    CredentialPolicy,
    CredentialSource,
    SessionCredential,
    DEFAULT_MIN_COOKIE_LENGTH,
    // Response side
    AvailabilityPayload,
    Offer,
    RetrievalResult,
    SeatGroup,
    SeatTotals,
};
