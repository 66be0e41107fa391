use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::api::{HttpPipelineApi, PipelineApi, TransportClient};
use crate::auth::AuthGate;
use crate::config::Config;
use crate::dashboard::{
    history_rows, project, ClipboardSink, DraftPreview, EditableForm, HistoryRow, ScheduleCard,
    ScheduleNoteStore, StatusProjection, TopicPresetManager, TriggerCoordinator,
};
use crate::db::Repository;
use crate::error::Result;
use crate::models::{DraftPayload, RunRecord};
use crate::query::{
    invalidation_channel, keys, Invalidator, QueryClient, QueryState, Subscription,
};
use crate::tui::AppAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Trigger,
    Presets,
    Schedule,
    History,
    Draft,
}

impl Pane {
    const ORDER: [Pane; 5] = [
        Pane::Trigger,
        Pane::Presets,
        Pane::Schedule,
        Pane::History,
        Pane::Draft,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|p| *p == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

fn runs_fetcher(
    api: &Arc<dyn PipelineApi>,
) -> impl Fn() -> futures::future::BoxFuture<'static, crate::api::ApiResult<Vec<RunRecord>>>
       + Send
       + Sync
       + 'static {
    let api = Arc::clone(api);
    move || {
        let api = Arc::clone(&api);
        Box::pin(async move { api.get_runs().await })
    }
}

fn draft_fetcher(
    api: &Arc<dyn PipelineApi>,
) -> impl Fn() -> futures::future::BoxFuture<'static, crate::api::ApiResult<Option<DraftPayload>>>
       + Send
       + Sync
       + 'static {
    let api = Arc::clone(api);
    move || {
        let api = Arc::clone(&api);
        Box::pin(async move { api.get_latest_draft().await })
    }
}

/// Backend-facing panes. Only exists while the sign-in gate is open, so
/// nothing here fetches or polls for a signed-out operator.
pub struct Dashboard {
    history: Subscription<Vec<RunRecord>>,
    pub draft: DraftPreview,
    pub trigger: TriggerCoordinator,
    pub presets: TopicPresetManager,
}

impl Dashboard {
    fn open(
        query: &QueryClient,
        api: &Arc<dyn PipelineApi>,
        invalidator: &Invalidator,
        config: &Config,
    ) -> Self {
        tracing::debug!("Opening dashboard");
        Self {
            history: query.subscribe(
                keys::RUNS,
                runs_fetcher(api),
                Some(config.runs_poll_interval()),
            ),
            draft: DraftPreview::new(query, Arc::clone(api), config.draft_poll_interval()),
            trigger: TriggerCoordinator::new(Arc::clone(api), invalidator.clone()),
            presets: TopicPresetManager::new(query, Arc::clone(api), invalidator.clone()),
        }
    }

    pub fn runs_state(&self) -> QueryState<Vec<RunRecord>> {
        self.history.state()
    }

    pub fn history_rows(&self) -> Vec<HistoryRow> {
        self.history
            .data()
            .map(|runs| history_rows(&runs, Utc::now()))
            .unwrap_or_default()
    }

    fn section_count(&self) -> usize {
        self.draft
            .payload()
            .and_then(|draft| (*draft).as_ref().map(|d| d.sections.len()))
            .unwrap_or(0)
    }

    fn section_source(&self, index: usize) -> Option<String> {
        self.draft.payload().and_then(|draft| {
            (*draft)
                .as_ref()
                .and_then(|d| d.sections.get(index))
                .map(|s| s.source_url.clone())
        })
    }
}

pub struct App {
    // Services
    query: QueryClient,
    listener: JoinHandle<()>,
    api: Arc<dyn PipelineApi>,
    invalidator: Invalidator,
    config: Config,
    pub auth: AuthGate,

    // Status header reads runs/draft without polling, signed in or not
    header_runs: Subscription<Vec<RunRecord>>,
    header_draft: Subscription<Option<DraftPayload>>,

    // Components
    dashboard: Option<Dashboard>,
    pub schedule: ScheduleCard,
    clipboard: ClipboardSink,

    // UI State
    pub focus: Pane,
    pub field_index: usize,
    pub editing: bool,
    edit_backup: String,
    pub show_help: bool,
    pub history_selected: usize,
    pub section_selected: usize,
    pub notice: Option<String>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let transport = TransportClient::new(&config.api_base_url)?;
        tracing::info!("Using pipeline API at {}", transport.base_url());
        let api: Arc<dyn PipelineApi> = Arc::new(HttpPipelineApi::new(transport));
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let auth = AuthGate::from_config(config).await?;
        Self::with_services(config, api, repository, auth).await
    }

    /// Wire the components around already-built services.
    pub async fn with_services(
        config: &Config,
        api: Arc<dyn PipelineApi>,
        repository: Arc<Repository>,
        auth: AuthGate,
    ) -> Result<Self> {
        // Load local state before any subscription starts fetching
        let schedule = ScheduleCard::load(ScheduleNoteStore::new(repository)).await?;

        let query = QueryClient::new();
        let (invalidator, rx) = invalidation_channel();
        let listener = query.listen(rx);

        let header_runs = query.subscribe(keys::RUNS, runs_fetcher(&api), None);
        let header_draft = query.subscribe(keys::DRAFT, draft_fetcher(&api), None);

        let mut app = Self {
            query,
            listener,
            api,
            invalidator,
            config: config.clone(),
            auth,
            header_runs,
            header_draft,
            dashboard: None,
            schedule,
            clipboard: ClipboardSink::default(),
            focus: Pane::Trigger,
            field_index: 0,
            editing: false,
            edit_backup: String::new(),
            show_help: false,
            history_selected: 0,
            section_selected: 0,
            notice: None,
        };
        app.sync_dashboard();
        Ok(app)
    }

    /// Open or drop the dashboard to match the sign-in gate.
    fn sync_dashboard(&mut self) {
        match (self.auth.is_open(), self.dashboard.is_some()) {
            (true, false) => {
                self.dashboard = Some(Dashboard::open(
                    &self.query,
                    &self.api,
                    &self.invalidator,
                    &self.config,
                ));
            }
            (false, true) => {
                tracing::debug!("Closing dashboard");
                self.dashboard = None;
                self.editing = false;
                self.notice = None;
                self.set_focus(Pane::Trigger);
            }
            _ => {}
        }
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    pub fn status(&self) -> StatusProjection {
        let runs = self.header_runs.data();
        let draft = self.header_draft.data();
        project(
            runs.as_deref().map(Vec::as_slice).unwrap_or_default(),
            draft.as_deref().and_then(Option::as_ref),
            Utc::now(),
        )
    }

    fn focused_form(&self) -> Option<&dyn EditableForm> {
        let dashboard = self.dashboard.as_ref();
        match self.focus {
            Pane::Trigger => dashboard.map(|d| &d.trigger.form as &dyn EditableForm),
            Pane::Presets => dashboard.map(|d| &d.presets.form as &dyn EditableForm),
            Pane::Schedule => Some(&self.schedule.note as &dyn EditableForm),
            Pane::History | Pane::Draft => None,
        }
    }

    /// The text buffer the input keys edit.
    fn edit_target(&mut self) -> Option<&mut String> {
        if !self.auth.is_open() {
            return Some(&mut self.auth.email_input);
        }
        let index = self.field_index;
        match self.focus {
            Pane::Trigger => self
                .dashboard
                .as_mut()
                .map(|d| d.trigger.form.field_mut(index)),
            Pane::Presets => self
                .dashboard
                .as_mut()
                .map(|d| d.presets.form.field_mut(index)),
            Pane::Schedule => Some(self.schedule.note.field_mut(index)),
            Pane::History | Pane::Draft => None,
        }
    }

    fn set_focus(&mut self, pane: Pane) {
        self.focus = pane;
        self.field_index = 0;
    }

    /// Actions available behind a closed gate: the sign-in form, the status
    /// header refresh, help and quit.
    fn allowed_signed_out(action: &AppAction) -> bool {
        matches!(
            action,
            AppAction::Quit
                | AppAction::StartEdit
                | AppAction::Submit
                | AppAction::RefreshAll
                | AppAction::ShowHelp
                | AppAction::HideHelp
                | AppAction::InputChar(_)
                | AppAction::InputBackspace
                | AppAction::InputConfirm
                | AppAction::InputCancel
        )
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        if !self.auth.is_open() && !Self::allowed_signed_out(&action) {
            return Ok(false);
        }

        match action {
            AppAction::Quit => return Ok(true),

            AppAction::NextPane => self.set_focus(self.focus.next()),
            AppAction::PrevPane => self.set_focus(self.focus.prev()),

            AppAction::MoveUp => match self.focus {
                Pane::History => self.history_selected = self.history_selected.saturating_sub(1),
                Pane::Draft => self.section_selected = self.section_selected.saturating_sub(1),
                _ => self.field_index = self.field_index.saturating_sub(1),
            },

            AppAction::MoveDown => {
                let dashboard = self.dashboard.as_ref();
                let len = match self.focus {
                    Pane::History => dashboard.map(|d| d.history_rows().len()).unwrap_or(0),
                    Pane::Draft => dashboard.map(Dashboard::section_count).unwrap_or(0),
                    _ => self.focused_form().map(|f| f.len()).unwrap_or(0),
                };
                let cursor = match self.focus {
                    Pane::History => &mut self.history_selected,
                    Pane::Draft => &mut self.section_selected,
                    _ => &mut self.field_index,
                };
                if len > 0 && *cursor < len - 1 {
                    *cursor += 1;
                }
            }

            AppAction::StartEdit => {
                if let Some(target) = self.edit_target() {
                    let backup = target.clone();
                    self.edit_backup = backup;
                    self.editing = true;
                }
            }

            AppAction::InputChar(c) => {
                if let Some(target) = self.edit_target() {
                    target.push(c);
                }
            }

            AppAction::InputBackspace => {
                if let Some(target) = self.edit_target() {
                    target.pop();
                }
            }

            AppAction::InputConfirm => {
                self.editing = false;
                if !self.auth.is_open() {
                    self.auth.request_link();
                }
            }

            AppAction::InputCancel => {
                let backup = std::mem::take(&mut self.edit_backup);
                if let Some(target) = self.edit_target() {
                    *target = backup;
                }
                self.editing = false;
            }

            AppAction::Submit => {
                if !self.auth.is_open() {
                    self.auth.request_link();
                } else {
                    self.submit_focused().await;
                }
            }

            AppAction::RefreshAll => {
                self.header_runs.refresh();
                self.header_draft.refresh();
            }

            AppAction::RefreshPane => match (self.focus, self.dashboard.as_ref()) {
                (Pane::History, Some(d)) => d.history.refresh(),
                (Pane::Draft, Some(d)) => d.draft.refresh(),
                (Pane::Presets, Some(d)) => d.presets.presets().refresh(),
                _ => {
                    self.header_runs.refresh();
                    self.header_draft.refresh();
                }
            },

            AppAction::CopyHtml => {
                let Some(dashboard) = self.dashboard.as_mut() else {
                    return Ok(false);
                };
                match dashboard.draft.copy_html(&mut self.clipboard) {
                    Ok(true) => self.notice = None,
                    Ok(false) => self.notice = Some("No draft HTML to copy yet".to_string()),
                    Err(e) => {
                        tracing::warn!("Copy failed: {}", e);
                        self.notice = Some(e.to_string());
                    }
                }
            }

            AppAction::OpenSource => self.open_selected_source(),

            AppAction::SignOut => {
                self.auth.sign_out();
                self.sync_dashboard();
            }

            AppAction::ShowHelp => self.show_help = true,
            AppAction::HideHelp => self.show_help = false,
        }

        Ok(false)
    }

    async fn submit_focused(&mut self) {
        match (self.focus, self.dashboard.as_mut()) {
            (Pane::Trigger, Some(d)) => {
                d.trigger.submit();
            }
            (Pane::Presets, Some(d)) => {
                d.presets.submit();
            }
            (Pane::Schedule, _) => {
                if let Err(e) = self.schedule.save().await {
                    tracing::error!("Failed to save schedule note: {}", e);
                    self.notice = Some(e.to_string());
                }
            }
            _ => {}
        }
    }

    fn open_selected_source(&mut self) {
        let url = self
            .dashboard
            .as_ref()
            .and_then(|d| d.section_source(self.section_selected));
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open {}: {}", url, e);
                self.notice = Some(format!("Could not open {}", url));
            }
        }
    }

    /// Check background writes for results (non-blocking).
    pub fn poll_results(&mut self) {
        if let Some(dashboard) = self.dashboard.as_mut() {
            dashboard.trigger.poll_result();
            dashboard.presets.poll_result();
        }
        self.auth.poll_result();
        self.sync_dashboard();
    }

    /// Fetch runs and draft once and wait for both.
    pub async fn refresh_blocking(&self) -> Result<()> {
        let (runs, draft) = tokio::join!(
            self.header_runs.refetch(),
            self.header_draft.refetch()
        );
        runs?;
        draft?;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.query.shutdown();
        self.listener.abort();
    }
}
