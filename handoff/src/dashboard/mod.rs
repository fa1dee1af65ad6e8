//! Supervisor console: three live views (pending, history, learned answers)
//! plus a countdown and an answer form for every pending request.

mod countdown;
mod submission;
mod views;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;

pub use countdown::{
    remaining, CountdownBand, CountdownReading, CountdownTimer, TimerPool, DEFAULT_TICK,
    WARNING_THRESHOLD_SECS,
};
pub use submission::{HttpResolveClient, ResolveAction, ResolveForm};
pub use views::{
    format_timestamp, history_view, learned_view, pending_view, ConversationLine, DashboardView,
    HistoryCard, LearnedCard, Outcome, PendingCard, TabView, NO_CONVERSATION, NO_HISTORY,
    NO_LEARNED, NO_PENDING, TIMED_OUT_NOTE,
};

use crate::clock::Clock;
use crate::error::{HandoffError, Result};
use crate::live::{LiveQuery, LiveQueryChannel, QuerySource, Subscription, ViewState};
use crate::models::{HelpRequest, KnowledgeBaseEntry};

/// Why [`Dashboard::next_event`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    PendingChanged,
    HistoryChanged,
    LearnedChanged,
    /// Countdowns may have moved.
    Tick,
    /// Every subscription has ended.
    Closed,
}

pub struct Dashboard {
    pending: Subscription<HelpRequest>,
    history: Subscription<HelpRequest>,
    learned: Subscription<KnowledgeBaseEntry>,
    pending_state: ViewState<HelpRequest>,
    history_state: ViewState<HelpRequest>,
    learned_state: ViewState<KnowledgeBaseEntry>,
    timers: TimerPool,
    forms: HashMap<String, Arc<ResolveForm>>,
    action: Arc<dyn ResolveAction>,
    tick: std::time::Duration,
}

impl Dashboard {
    pub fn open(
        requests: Arc<dyn QuerySource<HelpRequest>>,
        knowledge: Arc<dyn QuerySource<KnowledgeBaseEntry>>,
        action: Arc<dyn ResolveAction>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        tick: std::time::Duration,
    ) -> Self {
        let pending = LiveQueryChannel::subscribe(requests.clone(), LiveQuery::pending());
        let history = LiveQueryChannel::subscribe(requests, LiveQuery::history());
        let learned = LiveQueryChannel::subscribe(knowledge, LiveQuery::knowledge_base());

        tracing::info!(timeout_secs = timeout.num_seconds(), "Dashboard opened");

        Self {
            pending,
            history,
            learned,
            pending_state: ViewState::Loading,
            history_state: ViewState::Loading,
            learned_state: ViewState::Loading,
            timers: TimerPool::new(clock, timeout, tick),
            forms: HashMap::new(),
            action,
            tick,
        }
    }

    /// Waits for the next change to any view, or one tick.
    pub async fn next_event(&mut self) -> DashboardEvent {
        if self.pending.is_cancelled() && self.history.is_cancelled() && self.learned.is_cancelled()
        {
            return DashboardEvent::Closed;
        }

        tokio::select! {
            Some(state) = self.pending.next() => {
                self.apply_pending(state);
                DashboardEvent::PendingChanged
            }
            Some(state) = self.history.next() => {
                self.history_state = state;
                DashboardEvent::HistoryChanged
            }
            Some(state) = self.learned.next() => {
                self.learned_state = state;
                DashboardEvent::LearnedChanged
            }
            _ = tokio::time::sleep(self.tick) => DashboardEvent::Tick,
        }
    }

    fn apply_pending(&mut self, state: ViewState<HelpRequest>) {
        match &state {
            ViewState::Loaded(snapshot) => {
                self.timers.reconcile(&snapshot.items);
                self.forms
                    .retain(|id, _| snapshot.items.iter().any(|req| &req.id == id));
                for req in &snapshot.items {
                    self.forms.entry(req.id.clone()).or_insert_with(|| {
                        Arc::new(ResolveForm::new(self.action.clone(), req.id.clone()))
                    });
                }
            }
            ViewState::Failed(reason) => {
                tracing::warn!(%reason, "Pending view unavailable");
                self.timers.reconcile(&[]);
                self.forms.clear();
            }
            ViewState::Loading => {}
        }
        self.pending_state = state;
    }

    pub fn render(&self) -> DashboardView {
        DashboardView {
            pending: pending_view(&self.pending_state, |req| self.timers.reading_for(req)),
            history: history_view(&self.history_state),
            learned: learned_view(&self.learned_state),
        }
    }

    /// Answer form for a request currently shown as pending.
    pub fn form(&self, request_id: &str) -> Option<Arc<ResolveForm>> {
        self.forms.get(request_id).cloned()
    }

    pub async fn submit(&self, request_id: &str, answer: &str) -> Result<()> {
        let form = self.form(request_id).ok_or_else(|| {
            HandoffError::NotFound(format!("Help request {request_id} is not pending"))
        })?;
        form.submit(answer).await
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Cancels every subscription and countdown. Idempotent.
    pub fn shutdown(&mut self) {
        self.pending.cancel();
        self.history.cancel();
        self.learned.cancel();
        self.timers.shutdown();
        self.forms.clear();
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
