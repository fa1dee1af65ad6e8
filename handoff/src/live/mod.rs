//! Live queries: filtered, ordered views over a collection that deliver a
//! complete snapshot on subscribe and again after every change.

mod channel;
mod hub;
mod query;
mod remote;
mod source;

pub use channel::{LiveQueryChannel, ObserverHandle, Snapshot, Subscription, ViewState};
pub use hub::{ChangeEvent, ChangeHub, DEFAULT_HUB_CAPACITY};
pub use query::{
    sort_records, Collection, FieldFilter, LiveQuery, LiveRecord, QueryPlan, SortDirection,
    SortKey, FIELD_CREATED_AT, FIELD_STATUS,
};
pub use remote::HttpSource;
pub use source::{ChangeFeed, LocalSource, QuerySource};
