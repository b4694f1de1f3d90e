//! # Shared Types Crate
//!
//! Entities and seams shared across the bridge subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the loan aggregate, the credit passport and
//!   the stored chain event are defined once and used by both pipelines.
//! - **Shared persisted state only**: the outbox worker and the event
//!   projector never call each other; they meet on the loan aggregate.
//! - **Injected time**: every component reads "now" through [`Clock`].

pub mod clock;
pub mod entities;
pub mod errors;
pub mod passport;
pub mod primitives;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entities::*;
pub use errors::*;
pub use passport::{credit_score, PassportCache, MAX_CREDIT_SCORE, MIN_CREDIT_SCORE};
pub use primitives::{parse_hex_u64, to_hex_quantity, Address, AddressError};
