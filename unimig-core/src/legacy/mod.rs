//! Reading the legacy relational schema.
//!
//! Rows are streamed a page at a time in one of three query shapes (current,
//! history, trash) and carry a synthetic resource version built by
//! [`version::encode`].

pub mod broadcast;
pub mod query;
pub mod rows;
pub mod token;
pub mod version;

mod source;

pub use broadcast::{Subscription, WriteEvent, WriteEventBroadcaster};
pub use query::{DashboardKind, Page, PageRequest, QueryShape, SortOrder};
pub use rows::{DashboardRow, LibraryPanelRow, PlaylistItemRow, PlaylistRow, ShortUrlRow};
pub use source::LegacyRowSource;
pub use token::ContinueToken;
