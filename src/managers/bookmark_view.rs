//! The mounted bookmark view.
//!
//! A single task owns the [`BookmarkList`] and is the only code that mutates
//! it. User commands, push notifications and store outcomes are multiplexed
//! into that task and handled one at a time. Store calls run on the blocking
//! pool and report back over an internal channel, so push events keep flowing
//! while a request is outstanding.
//!
//! Create waits for the store before touching the list, since the store mints
//! the id. Delete removes from the list first; if the store then refuses, the
//! list is rebuilt from a full reload.
//!
//! A reload reads the store at some point after it was dispatched, so its
//! result can predate changes the task applied while it was in flight. Those
//! changes are journaled and replayed on top of the reloaded list.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::managers::bookmark_list::BookmarkList;
use crate::managers::change_listener::{ChangeListener, ListenerSignal};
use crate::services::bookmark_store::BookmarkStore;
use crate::services::change_feed::ChangeFeed;
use crate::services::identity::IdentityProvider;
use crate::services::refresh_loader::load_bookmarks;
use crate::types::bookmark::{Bookmark, BookmarkDraft};
use crate::types::change::ChangeEvent;
use crate::types::errors::{BookmarkError, SessionError, StoreError};
use crate::types::session::UserIdentity;
use crate::types::settings::ViewSettings;

type Reply<T> = oneshot::Sender<Result<T, BookmarkError>>;

/// Which controls are currently disabled, plus the list size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewStatus {
    pub submitting: bool,
    pub deleting: Vec<String>,
    pub count: usize,
}

enum ViewCommand {
    Create { draft: BookmarkDraft, reply: Reply<Bookmark> },
    Delete { id: String, reply: Reply<()> },
    Refresh { reply: Reply<usize> },
    Status { reply: oneshot::Sender<ViewStatus> },
    Unmount,
}

enum Outcome {
    Created { result: Result<Bookmark, BookmarkError>, reply: Reply<Bookmark> },
    Deleted { id: String, result: Result<(), BookmarkError>, reply: Reply<()> },
    Refreshed { result: Result<Vec<Bookmark>, BookmarkError>, reasons: Vec<RefreshReason> },
}

enum RefreshReason {
    Mount,
    Lagged,
    Requested(Reply<usize>),
    DeleteRollback { id: String, error: BookmarkError, reply: Reply<()> },
}

/// Entry point for mounting a view.
pub struct BookmarkView;

impl BookmarkView {
    /// Mounts a view for the current user and starts its task.
    ///
    /// The container is seeded with `initial` (filtered to the user), and a
    /// full reload is queued straight away regardless, so the seed is never
    /// trusted as current. Must be called from inside a tokio runtime.
    ///
    /// # Errors
    /// `SessionError::NotAuthenticated` when there is no signed-in user.
    /// Nothing is acquired in that case.
    pub fn mount(
        identity: &dyn IdentityProvider,
        store: Arc<dyn BookmarkStore>,
        feed: &ChangeFeed,
        settings: &ViewSettings,
        initial: Vec<Bookmark>,
    ) -> Result<ViewHandle, SessionError> {
        let user = identity.current_user().ok_or(SessionError::NotAuthenticated)?;

        let listener = ChangeListener::new(feed.subscribe(&user.id));
        let list = BookmarkList::with_records(user.id.clone(), initial);
        let (snapshot_tx, snapshot_rx) = watch::channel(list.to_vec());
        let (command_tx, command_rx) = mpsc::channel(settings.command_buffer.max(1));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let state = ViewState {
            owner: user.id.clone(),
            list,
            store,
            snapshot: snapshot_tx,
            outcomes: outcome_tx,
            submitting: false,
            deleting: HashSet::new(),
            refreshing: false,
            queued_refreshes: Vec::new(),
            applied_during_refresh: Vec::new(),
        };
        let task = tokio::spawn(run(state, listener, command_rx, outcome_rx));

        Ok(ViewHandle {
            user,
            commands: command_tx,
            snapshot: snapshot_rx,
            task: Some(task),
        })
    }
}

/// Caller-side handle to a mounted view.
///
/// Dropping every handle stops the view as well; [`ViewHandle::unmount`]
/// additionally waits until the feed subscription has been released.
pub struct ViewHandle {
    user: UserIdentity,
    commands: mpsc::Sender<ViewCommand>,
    snapshot: watch::Receiver<Vec<Bookmark>>,
    task: Option<JoinHandle<()>>,
}

impl ViewHandle {
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Saves a new bookmark and returns the stored record.
    ///
    /// A draft with a blank title or url is rejected here without any request.
    pub async fn create(&self, draft: BookmarkDraft) -> Result<Bookmark, BookmarkError> {
        let draft = draft.normalized()?;
        self.request(|reply| ViewCommand::Create { draft, reply }).await
    }

    /// Deletes a bookmark. The list drops it before the store answers.
    ///
    /// A bookmark that is already gone from the store counts as deleted.
    /// On any other store failure the list is reloaded before this returns
    /// `BookmarkError::DeleteFailed`.
    pub async fn delete(&self, id: &str) -> Result<(), BookmarkError> {
        let id = id.to_string();
        self.request(|reply| ViewCommand::Delete { id, reply }).await
    }

    /// Reloads the list from the store. Returns the number of bookmarks held.
    pub async fn refresh(&self) -> Result<usize, BookmarkError> {
        self.request(|reply| ViewCommand::Refresh { reply }).await
    }

    pub async fn status(&self) -> Result<ViewStatus, BookmarkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ViewCommand::Status { reply })
            .await
            .map_err(|_| BookmarkError::ViewClosed)?;
        response.await.map_err(|_| BookmarkError::ViewClosed)
    }

    /// The list as of the last change.
    pub fn snapshot(&self) -> Vec<Bookmark> {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified after every change to the list.
    pub fn subscribe_changes(&self) -> watch::Receiver<Vec<Bookmark>> {
        self.snapshot.clone()
    }

    /// Stops the view and waits for its task to finish.
    pub async fn unmount(mut self) {
        // A closed channel means the task is already on its way out.
        let _ = self.commands.send(ViewCommand::Unmount).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "bookmark view task ended abnormally");
            }
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ViewCommand,
    ) -> Result<T, BookmarkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| BookmarkError::ViewClosed)?;
        response.await.map_err(|_| BookmarkError::ViewClosed)?
    }
}

async fn run(
    mut state: ViewState,
    mut listener: ChangeListener,
    mut commands: mpsc::Receiver<ViewCommand>,
    mut outcomes: mpsc::UnboundedReceiver<Outcome>,
) {
    info!(owner = %state.owner, count = state.list.len(), "bookmark view mounted");
    state.start_refresh(RefreshReason::Mount);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ViewCommand::Unmount) | None => break,
                Some(command) => state.handle_command(command),
            },
            signal = listener.next_signal() => state.handle_signal(signal),
            Some(outcome) = outcomes.recv() => state.handle_outcome(outcome),
        }
    }

    listener.release();
    info!(owner = %state.owner, "bookmark view unmounted");
}

struct ViewState {
    owner: String,
    list: BookmarkList,
    store: Arc<dyn BookmarkStore>,
    snapshot: watch::Sender<Vec<Bookmark>>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    submitting: bool,
    deleting: HashSet<String>,
    /// At most one reload runs at a time; requests arriving meanwhile share the next one.
    refreshing: bool,
    queued_refreshes: Vec<RefreshReason>,
    /// Changes applied since the in-flight reload was dispatched.
    applied_during_refresh: Vec<ChangeEvent>,
}

impl ViewState {
    fn handle_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Create { draft, reply } => self.begin_create(draft, reply),
            ViewCommand::Delete { id, reply } => self.begin_delete(id, reply),
            ViewCommand::Refresh { reply } => self.start_refresh(RefreshReason::Requested(reply)),
            ViewCommand::Status { reply } => {
                let mut deleting: Vec<String> = self.deleting.iter().cloned().collect();
                deleting.sort();
                let _ = reply.send(ViewStatus {
                    submitting: self.submitting,
                    deleting,
                    count: self.list.len(),
                });
            }
            ViewCommand::Unmount => {}
        }
    }

    fn handle_signal(&mut self, signal: ListenerSignal) {
        match signal {
            ListenerSignal::Change(event) => {
                if self.apply_change(event) {
                    self.publish();
                }
            }
            ListenerSignal::Lagged(_) => self.start_refresh(RefreshReason::Lagged),
        }
    }

    /// `draft` has already been normalized by [`ViewHandle::create`].
    fn begin_create(&mut self, draft: BookmarkDraft, reply: Reply<Bookmark>) {
        if self.submitting {
            let _ = reply.send(Err(BookmarkError::CreateInFlight));
            return;
        }
        self.submitting = true;

        let owner = self.owner.clone();
        self.dispatch(
            move |store| {
                store
                    .create(&owner, &draft)
                    .map_err(|e| BookmarkError::CreateFailed(e.to_string()))
            },
            BookmarkError::CreateFailed,
            move |result| Outcome::Created { result, reply },
        );
    }

    fn begin_delete(&mut self, id: String, reply: Reply<()>) {
        if self.deleting.contains(&id) {
            let _ = reply.send(Err(BookmarkError::DeleteInFlight(id)));
            return;
        }
        self.deleting.insert(id.clone());

        if self.apply_change(ChangeEvent::Deleted { id: id.clone() }) {
            debug!(%id, "optimistic delete");
            self.publish();
        }

        let owner = self.owner.clone();
        let target = id.clone();
        self.dispatch(
            move |store| match store.delete(&owner, &target) {
                // Already deleted elsewhere; the store matches what was asked.
                Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
                Err(e) => Err(BookmarkError::DeleteFailed(e.to_string())),
            },
            BookmarkError::DeleteFailed,
            move |result| Outcome::Deleted { id, result, reply },
        );
    }

    fn start_refresh(&mut self, reason: RefreshReason) {
        if self.refreshing {
            self.queued_refreshes.push(reason);
            return;
        }
        self.run_refresh(vec![reason]);
    }

    fn run_refresh(&mut self, reasons: Vec<RefreshReason>) {
        self.refreshing = true;
        self.applied_during_refresh.clear();
        let owner = self.owner.clone();
        self.dispatch(
            move |store| load_bookmarks(store, &owner),
            BookmarkError::RefreshFailed,
            move |result| Outcome::Refreshed { result, reasons },
        );
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created { result, reply } => {
                self.submitting = false;
                match &result {
                    Ok(bookmark) => {
                        let inserted =
                            self.apply_change(ChangeEvent::Created(bookmark.clone()));
                        if inserted {
                            self.publish();
                        }
                        info!(id = %bookmark.id, inserted, "bookmark created");
                    }
                    Err(e) => warn!(error = %e, "create failed"),
                }
                let _ = reply.send(result);
            }
            Outcome::Deleted { id, result, reply } => match result {
                Ok(()) => {
                    self.deleting.remove(&id);
                    info!(%id, "bookmark deleted");
                    let _ = reply.send(Ok(()));
                }
                Err(error) => {
                    warn!(%id, %error, "delete failed; reloading bookmarks");
                    self.start_refresh(RefreshReason::DeleteRollback { id, error, reply });
                }
            },
            Outcome::Refreshed { result, reasons } => {
                self.refreshing = false;
                let replay = std::mem::take(&mut self.applied_during_refresh);
                let refreshed = match result {
                    Ok(records) => {
                        self.list.replace_all(records);
                        let replayed = replay.len();
                        for event in replay {
                            ChangeListener::apply(&mut self.list, event);
                        }
                        self.publish();
                        debug!(count = self.list.len(), replayed, "bookmarks reloaded");
                        Ok(self.list.len())
                    }
                    Err(e) => {
                        warn!(error = %e, "reload failed; keeping last known bookmarks");
                        Err(e)
                    }
                };
                for reason in reasons {
                    match reason {
                        RefreshReason::Mount | RefreshReason::Lagged => {}
                        RefreshReason::Requested(reply) => {
                            let _ = reply.send(refreshed.clone());
                        }
                        RefreshReason::DeleteRollback { id, error, reply } => {
                            self.deleting.remove(&id);
                            let _ = reply.send(Err(error));
                        }
                    }
                }
                if !self.queued_refreshes.is_empty() {
                    let reasons = std::mem::take(&mut self.queued_refreshes);
                    self.run_refresh(reasons);
                }
            }
        }
    }

    /// Applies a change to the list, journaling it while a reload is in flight.
    fn apply_change(&mut self, event: ChangeEvent) -> bool {
        if self.refreshing {
            self.applied_during_refresh.push(event.clone());
        }
        ChangeListener::apply(&mut self.list, event)
    }

    /// Runs a store call on the blocking pool and feeds its outcome back to
    /// the view task. `failed` maps a panicked call to an error.
    fn dispatch<T, C, F>(&self, call: C, failed: fn(String) -> BookmarkError, finish: F)
    where
        T: Send + 'static,
        C: FnOnce(&dyn BookmarkStore) -> Result<T, BookmarkError> + Send + 'static,
        F: FnOnce(Result<T, BookmarkError>) -> Outcome + Send + 'static,
    {
        let store = self.store.clone();
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || call(store.as_ref()))
                .await
                .unwrap_or_else(|e| Err(failed(e.to_string())));
            // The view may have unmounted meanwhile.
            let _ = outcomes.send(finish(result));
        });
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.list.to_vec());
    }
}
