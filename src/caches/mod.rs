//! Durable external-lookup caches
//!
//! Each cache follows the same find-or-fetch contract: return the
//! stored record for a natural key if one exists, otherwise call the
//! external source once, persist the transformed record, and return it.
//! None of the caches serialize concurrent resolves for an unseen key;
//! the store's unique constraints catch the resulting race and losers
//! re-read the winner's record.

pub mod authority;
pub mod crime;
pub mod postcode;
pub mod stops;

/// Stop and crime references copied onto a record, at most this many each
pub const MAX_LINKED_REFS: usize = 5;

pub use authority::{parse_authority_entry, AuthorityCache, ParsedAuthority};
pub use crime::CrimeCache;
pub use postcode::{normalize_postcode, PostcodeCache};
pub use stops::StopCache;
