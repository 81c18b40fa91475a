pub mod entry;
pub mod error;
pub mod host;

pub use entry::{Entry, EntryKind, TargetInput};
pub use error::{Result, ScopeError};
pub use host::Host;
