use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::{HandoffError, Result};
use crate::models::{newest_first, HelpRequest, KnowledgeBaseEntry, RequestStatus};

pub const FIELD_STATUS: &str = "status";
pub const FIELD_CREATED_AT: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    HelpRequests,
    KnowledgeBase,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HelpRequests => "help_requests",
            Self::KnowledgeBase => "knowledge_base",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    Equals { field: String, value: String },
    OneOf { field: String, values: Vec<String> },
}

impl FieldFilter {
    pub fn equals(field: &str, value: impl Into<String>) -> Self {
        Self::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn one_of<I, S>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. } | Self::OneOf { field, .. } => field,
        }
    }

    fn values(&self) -> Vec<&str> {
        match self {
            Self::Equals { value, .. } => vec![value.as_str()],
            Self::OneOf { values, .. } => values.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn created_at_desc() -> Self {
        Self {
            field: FIELD_CREATED_AT.to_string(),
            direction: SortDirection::Descending,
        }
    }
}

/// A filtered, ordered view over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveQuery {
    pub collection: Collection,
    pub filters: Vec<FieldFilter>,
    pub sort: SortKey,
}

impl LiveQuery {
    /// Requests awaiting a supervisor.
    pub fn pending() -> Self {
        Self::help_requests_with_status(&[RequestStatus::Pending])
    }

    /// Requests that reached a terminal state.
    pub fn history() -> Self {
        Self::help_requests_with_status(&RequestStatus::TERMINAL)
    }

    pub fn knowledge_base() -> Self {
        Self {
            collection: Collection::KnowledgeBase,
            filters: Vec::new(),
            sort: SortKey::created_at_desc(),
        }
    }

    /// An empty status list means every request.
    pub fn help_requests_with_status(statuses: &[RequestStatus]) -> Self {
        let filters = if statuses.is_empty() {
            Vec::new()
        } else {
            vec![FieldFilter::one_of(
                FIELD_STATUS,
                statuses.iter().map(|s| s.as_str()),
            )]
        };

        Self {
            collection: Collection::HelpRequests,
            filters,
            sort: SortKey::created_at_desc(),
        }
    }

    /// Checks the query against the fields each collection knows about and
    /// reduces it to something a store can answer.
    pub fn plan(&self) -> Result<QueryPlan> {
        if self.sort.field != FIELD_CREATED_AT {
            return Err(HandoffError::Subscription(format!(
                "cannot sort {} by unknown field '{}'",
                self.collection, self.sort.field
            )));
        }

        match self.collection {
            Collection::HelpRequests => {
                let mut statuses: Option<BTreeSet<RequestStatus>> = None;
                for filter in &self.filters {
                    if filter.field() != FIELD_STATUS {
                        return Err(HandoffError::Subscription(format!(
                            "cannot filter {} by unknown field '{}'",
                            self.collection,
                            filter.field()
                        )));
                    }
                    let allowed = filter
                        .values()
                        .into_iter()
                        .map(|raw| {
                            raw.parse::<RequestStatus>()
                                .map_err(HandoffError::Subscription)
                        })
                        .collect::<Result<BTreeSet<_>>>()?;
                    statuses = Some(match statuses {
                        Some(current) => current.intersection(&allowed).copied().collect(),
                        None => allowed,
                    });
                }

                Ok(QueryPlan::HelpRequests {
                    statuses: statuses.map(|set| set.into_iter().collect()),
                    direction: self.sort.direction,
                })
            }
            Collection::KnowledgeBase => {
                if let Some(filter) = self.filters.first() {
                    return Err(HandoffError::Subscription(format!(
                        "cannot filter {} by unknown field '{}'",
                        self.collection,
                        filter.field()
                    )));
                }
                Ok(QueryPlan::KnowledgeBase {
                    direction: self.sort.direction,
                })
            }
        }
    }
}

/// A validated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    HelpRequests {
        /// `None` is unfiltered; `Some(empty)` matches nothing.
        statuses: Option<Vec<RequestStatus>>,
        direction: SortDirection,
    },
    KnowledgeBase {
        direction: SortDirection,
    },
}

/// Records that carry the sort and tie-break fields of a live query.
pub trait LiveRecord: Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn record_id(&self) -> &str;
    fn record_created_at(&self) -> Option<DateTime<Utc>>;
}

impl LiveRecord for HelpRequest {
    const COLLECTION: Collection = Collection::HelpRequests;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn record_created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl LiveRecord for KnowledgeBaseEntry {
    const COLLECTION: Collection = Collection::KnowledgeBase;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn record_created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Orders by `createdAt` in `direction`. Records without a timestamp go last
/// and ties break on id ascending, in both directions.
pub fn sort_records<T: LiveRecord>(items: &mut [T], direction: SortDirection) {
    items.sort_by(|a, b| match direction {
        SortDirection::Descending => newest_first(
            a.record_created_at(),
            a.record_id(),
            b.record_created_at(),
            b.record_id(),
        ),
        SortDirection::Ascending => match (a.record_created_at(), b.record_created_at()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.record_id().cmp(b.record_id())),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_channel_definitions_plan() {
        assert_eq!(
            LiveQuery::pending().plan().unwrap(),
            QueryPlan::HelpRequests {
                statuses: Some(vec![RequestStatus::Pending]),
                direction: SortDirection::Descending,
            }
        );
        assert_eq!(
            LiveQuery::history().plan().unwrap(),
            QueryPlan::HelpRequests {
                statuses: Some(vec![RequestStatus::Resolved, RequestStatus::Unresolved]),
                direction: SortDirection::Descending,
            }
        );
        assert_eq!(
            LiveQuery::knowledge_base().plan().unwrap(),
            QueryPlan::KnowledgeBase {
                direction: SortDirection::Descending
            }
        );
        assert_eq!(
            LiveQuery::help_requests_with_status(&[]).plan().unwrap(),
            QueryPlan::HelpRequests {
                statuses: None,
                direction: SortDirection::Descending,
            }
        );
    }

    #[test]
    fn test_unknown_fields_fail_the_plan() {
        let mut query = LiveQuery::pending();
        query.filters.push(FieldFilter::equals("priority", "high"));
        assert!(matches!(query.plan(), Err(HandoffError::Subscription(_))));

        let mut query = LiveQuery::knowledge_base();
        query.sort.field = "answer".to_string();
        assert!(matches!(query.plan(), Err(HandoffError::Subscription(_))));

        let mut query = LiveQuery::knowledge_base();
        query.filters.push(FieldFilter::equals(FIELD_STATUS, "pending"));
        assert!(query.plan().is_err());
    }

    #[test]
    fn test_unknown_status_value_fails_the_plan() {
        let mut query = LiveQuery::pending();
        query.filters = vec![FieldFilter::equals(FIELD_STATUS, "archived")];
        assert!(query.plan().is_err());
    }

    #[test]
    fn test_filters_intersect() {
        let mut query = LiveQuery::history();
        query
            .filters
            .push(FieldFilter::equals(FIELD_STATUS, "pending"));
        assert_eq!(
            query.plan().unwrap(),
            QueryPlan::HelpRequests {
                statuses: Some(vec![]),
                direction: SortDirection::Descending,
            }
        );
    }

    fn req(id: &str, created_at: Option<DateTime<Utc>>) -> HelpRequest {
        let mut r = HelpRequest::new(id.to_string(), "q".to_string());
        r.created_at = created_at;
        r
    }

    #[test]
    fn test_sort_records_both_directions() {
        let now = Utc::now();
        let mut items = vec![
            req("z", None),
            req("b", Some(now)),
            req("a", Some(now)),
            req("old", Some(now - Duration::seconds(9))),
        ];

        sort_records(&mut items, SortDirection::Descending);
        let ids: Vec<&str> = items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "old", "z"]);

        sort_records(&mut items, SortDirection::Ascending);
        let ids: Vec<&str> = items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "a", "b", "z"]);
    }
}
