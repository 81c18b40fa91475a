//! # Perimeter Core
//!
//! The scope/target engine of the scanner: given operator-supplied
//! seeds, whitelist, and blacklist, answers whether a discovered entity
//! is in scope, deterministically and fast enough to sit on the hot
//! path of every scan worker.
//!
//! * [`index::HostIndex`]: prefix/suffix tries over normalized hosts.
//! * [`target::patterns`]: typed-token dispatch (`ORG:`, `USER:`, `REGEX:`).
//! * [`target::set::TargetSet`]: one target collection with content hash.
//! * [`target::model::ScopeModel`]: the scan-facing composition.

pub mod index;
pub mod target;

pub use index::HostIndex;
pub use target::model::{ScopeModel, ScopeView};
pub use target::patterns::SpecialPatternRegistry;
pub use target::set::{SetOptions, TargetSet};
