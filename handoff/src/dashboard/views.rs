use std::fmt;

use chrono::{DateTime, Utc};

use super::countdown::{CountdownBand, CountdownReading};
use crate::live::ViewState;
use crate::models::{ChatRole, HelpRequest, KnowledgeBaseEntry, RequestStatus};

pub const NO_CONVERSATION: &str = "No conversation history available.";
pub const NO_PENDING: &str = "No pending requests found. Great job!";
pub const NO_HISTORY: &str = "No historical requests yet.";
pub const NO_LEARNED: &str = "The agent has not learned any new answers yet.";
pub const TIMED_OUT_NOTE: &str = "This request timed out before a supervisor could respond.";

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "Unknown".to_string(),
    }
}

/// What one tab shows.
#[derive(Debug, Clone, PartialEq)]
pub enum TabView<C> {
    Loading(&'static str),
    Failed(String),
    Empty(&'static str),
    Cards(Vec<C>),
}

impl<C> TabView<C> {
    fn project<T>(
        state: &ViewState<T>,
        loading: &'static str,
        failed: &'static str,
        empty: &'static str,
        card: impl Fn(&T) -> C,
    ) -> Self {
        match state {
            ViewState::Loading => Self::Loading(loading),
            ViewState::Failed(reason) => Self::Failed(format!("{failed}: {reason}")),
            ViewState::Loaded(snapshot) if snapshot.items.is_empty() => Self::Empty(empty),
            ViewState::Loaded(snapshot) => Self::Cards(snapshot.items.iter().map(card).collect()),
        }
    }

    pub fn cards(&self) -> &[C] {
        match self {
            Self::Cards(cards) => cards,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLine {
    pub speaker: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCard {
    pub id: String,
    pub query: String,
    pub received: String,
    /// Empty means the note [`NO_CONVERSATION`] is shown instead.
    pub conversation: Vec<ConversationLine>,
    pub countdown: CountdownReading,
}

impl PendingCard {
    pub fn from_request(req: &HelpRequest, countdown: CountdownReading) -> Self {
        let conversation = req
            .displayable_history()
            .map(|msg| ConversationLine {
                speaker: match msg.role {
                    ChatRole::User => "User",
                    _ => "Agent",
                },
                text: msg.content.clone(),
            })
            .collect();

        Self {
            id: req.id.clone(),
            query: req.original_query.clone(),
            received: format_timestamp(req.created_at),
            conversation,
            countdown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Resolved,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCard {
    pub id: String,
    pub query: String,
    pub outcome: Outcome,
    pub settled_line: String,
    pub answer: String,
}

impl HistoryCard {
    pub fn from_request(req: &HelpRequest) -> Self {
        let settled = format_timestamp(req.settled_at());
        let (outcome, settled_line) = match req.status {
            RequestStatus::Resolved => (Outcome::Resolved, format!("Resolved on: {settled}")),
            _ => (Outcome::TimedOut, format!("Timed out on: {settled}")),
        };
        let answer = match (outcome, req.supervisor_response.as_deref()) {
            (Outcome::Resolved, Some(answer)) => answer.to_string(),
            _ => TIMED_OUT_NOTE.to_string(),
        };

        Self {
            id: req.id.clone(),
            query: req.original_query.clone(),
            outcome,
            settled_line,
            answer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedCard {
    pub question: String,
    pub answer: String,
    pub learned_on: Option<String>,
    pub request_id: Option<String>,
}

impl LearnedCard {
    pub fn from_entry(entry: &KnowledgeBaseEntry) -> Self {
        Self {
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            learned_on: entry
                .created_at
                .map(|ts| format!("Learned on: {}", format_timestamp(Some(ts)))),
            request_id: entry
                .source_request_id
                .as_ref()
                .map(|id| format!("Request ID: {id}")),
        }
    }
}

pub fn pending_view(
    state: &ViewState<HelpRequest>,
    countdown: impl Fn(&HelpRequest) -> CountdownReading,
) -> TabView<PendingCard> {
    TabView::project(
        state,
        "Loading pending requests...",
        "Unable to load pending requests",
        NO_PENDING,
        |req| PendingCard::from_request(req, countdown(req)),
    )
}

pub fn history_view(state: &ViewState<HelpRequest>) -> TabView<HistoryCard> {
    TabView::project(
        state,
        "Loading history...",
        "Unable to load history",
        NO_HISTORY,
        HistoryCard::from_request,
    )
}

pub fn learned_view(state: &ViewState<KnowledgeBaseEntry>) -> TabView<LearnedCard> {
    match state {
        ViewState::Loaded(snapshot) if !snapshot.items.is_empty() => {
            let mut entries: Vec<&KnowledgeBaseEntry> = snapshot.items.iter().collect();
            entries.sort_by(|a, b| a.cmp_newest_first(b));
            TabView::Cards(entries.into_iter().map(LearnedCard::from_entry).collect())
        }
        _ => TabView::project(
            state,
            "Loading learned answers...",
            "Unable to load learned answers",
            NO_LEARNED,
            LearnedCard::from_entry,
        ),
    }
}

/// Everything the console shows at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub pending: TabView<PendingCard>,
    pub history: TabView<HistoryCard>,
    pub learned: TabView<LearnedCard>,
}

fn write_tab<C>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    tab: &TabView<C>,
    card: impl Fn(&mut fmt::Formatter<'_>, &C) -> fmt::Result,
) -> fmt::Result {
    writeln!(f, "== {title} ==")?;
    match tab {
        TabView::Loading(text) | TabView::Empty(text) => writeln!(f, "  {text}")?,
        TabView::Failed(text) => writeln!(f, "  {text}")?,
        TabView::Cards(cards) => {
            for c in cards {
                card(f, c)?;
            }
        }
    }
    writeln!(f)
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tab(f, "Pending", &self.pending, |f, card| {
            let marker = match card.countdown.band {
                CountdownBand::Default => " ",
                CountdownBand::Warning => "!",
                CountdownBand::Expired => "x",
            };
            writeln!(
                f,
                "  [{}{}] {}  ({})",
                marker,
                card.countdown.label(),
                card.query,
                card.id
            )?;
            writeln!(f, "      Received: {}", card.received)?;
            if card.conversation.is_empty() {
                writeln!(f, "      {NO_CONVERSATION}")?;
            }
            for line in &card.conversation {
                writeln!(f, "      {}: {}", line.speaker, line.text)?;
            }
            Ok(())
        })?;

        write_tab(f, "History", &self.history, |f, card| {
            writeln!(f, "  {}  ({})", card.query, card.id)?;
            writeln!(f, "      {}", card.settled_line)?;
            writeln!(f, "      {}", card.answer)
        })?;

        write_tab(f, "Learned Answers", &self.learned, |f, card| {
            writeln!(f, "  Q: {}", card.question)?;
            writeln!(f, "  A: {}", card.answer)?;
            if let Some(line) = &card.learned_on {
                writeln!(f, "      {line}")?;
            }
            if let Some(line) = &card.request_id {
                writeln!(f, "      {line}")?;
            }
            Ok(())
        })
    }
}
