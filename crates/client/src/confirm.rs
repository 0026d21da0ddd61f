//! Confirmation workflow gating every mutating command.
//!
//! ```text
//! idle --arm--> armed --proceed--> submitting --result--> resolved --dismiss--> idle
//!                 |                                                  ^
//!                 +------------------------cancel--------------------+ (to idle)
//! ```
//!
//! The state lives in a [`watch`] channel and every transition is applied
//! inside `send_if_modified`, so checking and moving the state is one step.
//! That is what makes repeated `proceed()` calls safe: only the call that
//! moves `armed -> submitting` reaches the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;

use crate::gateway::{Command, CommandDispatcher, TRANSPORT_CAUSE};

const DEFAULT_PROCEED_LABEL: &str = "Confirm";
const DEFAULT_SUCCESS_MESSAGE: &str = "Request sent.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything captured when the operator opens a confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmDialog {
    pub title: String,
    pub description: String,
    pub proceed_label: String,
    /// Destructive actions are highlighted.
    pub dangerous: bool,
    pub command: Command,
    /// Terminal message shown when the executor accepts the command.
    pub success_message: String,
}

impl ConfirmDialog {
    pub fn new(title: impl Into<String>, command: Command) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            proceed_label: DEFAULT_PROCEED_LABEL.to_string(),
            dangerous: false,
            command,
            success_message: DEFAULT_SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn proceed_label(mut self, label: impl Into<String>) -> Self {
        self.proceed_label = label.into();
        self
    }

    pub fn dangerous(mut self) -> Self {
        self.dangerous = true;
        self
    }

    pub fn success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        message: String,
        job_uuid: Option<String>,
    },
    Failure {
        message: String,
    },
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Terminal result of one armed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub session: u64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Armed {
        session: u64,
        dialog: ConfirmDialog,
    },
    Submitting {
        session: u64,
        dialog: ConfirmDialog,
    },
    Resolved(Resolution),
}

/// Renderable view of an open confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmSession {
    pub open: bool,
    pub loading: bool,
    pub title: String,
    pub description: String,
    pub proceed_label: String,
    pub dangerous: bool,
}

impl ConfirmSession {
    fn from_dialog(dialog: &ConfirmDialog, loading: bool) -> Self {
        Self {
            open: true,
            loading,
            title: dialog.title.clone(),
            description: dialog.description.clone(),
            proceed_label: dialog.proceed_label.clone(),
            dangerous: dialog.dangerous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("A confirmation is already open")]
    AlreadyArmed,

    #[error("A confirmed command is still being submitted")]
    Submitting,
}

/// Result of a [`ConfirmationWorkflow::proceed`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProceedOutcome {
    /// This call submitted the command.
    Resolved(Resolution),
    /// Another call is already submitting; nothing was sent.
    AlreadySubmitting,
    /// No confirmation was open; nothing was sent.
    NotArmed,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

struct Inner {
    state: watch::Sender<WorkflowState>,
    dispatcher: Arc<dyn CommandDispatcher>,
    auto_dismiss: Option<Duration>,
    sessions: AtomicU64,
}

/// Handle on one confirmation workflow. Clones share the same state.
#[derive(Clone)]
pub struct ConfirmationWorkflow {
    inner: Arc<Inner>,
}

impl ConfirmationWorkflow {
    /// `auto_dismiss` of `None` keeps resolutions until [`dismiss`](Self::dismiss).
    pub fn new(dispatcher: impl CommandDispatcher, auto_dismiss: Option<Duration>) -> Self {
        Self::with_dispatcher(Arc::new(dispatcher), auto_dismiss)
    }

    pub fn with_dispatcher(
        dispatcher: Arc<dyn CommandDispatcher>,
        auto_dismiss: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                dispatcher,
                auto_dismiss,
                sessions: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.inner.state.subscribe()
    }

    /// View of the open confirmation, if any. `None` while idle or resolved.
    pub fn session(&self) -> Option<ConfirmSession> {
        match &*self.inner.state.borrow() {
            WorkflowState::Armed { dialog, .. } => Some(ConfirmSession::from_dialog(dialog, false)),
            WorkflowState::Submitting { dialog, .. } => {
                Some(ConfirmSession::from_dialog(dialog, true))
            }
            WorkflowState::Idle | WorkflowState::Resolved(_) => None,
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match &*self.inner.state.borrow() {
            WorkflowState::Resolved(resolution) => Some(resolution.clone()),
            _ => None,
        }
    }

    /// Open a confirmation for `dialog` and return its session id.
    ///
    /// A previous resolution still on display is replaced.
    pub fn arm(&self, dialog: ConfirmDialog) -> Result<u64, WorkflowError> {
        let session = self.inner.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let mut result = Ok(session);

        self.inner.state.send_if_modified(|state| match state {
            WorkflowState::Armed { .. } => {
                result = Err(WorkflowError::AlreadyArmed);
                false
            }
            WorkflowState::Submitting { .. } => {
                result = Err(WorkflowError::Submitting);
                false
            }
            WorkflowState::Idle | WorkflowState::Resolved(_) => {
                tracing::debug!(session, title = %dialog.title, "Confirmation armed");
                *state = WorkflowState::Armed { session, dialog };
                true
            }
        });

        result
    }

    /// Close an armed confirmation without sending anything.
    ///
    /// Returns `false` (and changes nothing) unless the workflow is armed.
    pub fn cancel(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if let WorkflowState::Armed { session, .. } = state {
                tracing::debug!(session = *session, "Confirmation cancelled");
                *state = WorkflowState::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Clear a resolution on display.
    pub fn dismiss(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if matches!(state, WorkflowState::Resolved(_)) {
                *state = WorkflowState::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Submit the armed command.
    ///
    /// At most one call per armed session reaches the dispatcher; the others
    /// return immediately.
    pub async fn proceed(&self) -> ProceedOutcome {
        let mut claimed = None;
        let mut outcome = ProceedOutcome::NotArmed;

        self.inner.state.send_if_modified(|state| match state {
            WorkflowState::Armed { session, dialog } => {
                let next = WorkflowState::Submitting {
                    session: *session,
                    dialog: dialog.clone(),
                };
                claimed = Some((*session, dialog.clone()));
                *state = next;
                true
            }
            WorkflowState::Submitting { .. } => {
                outcome = ProceedOutcome::AlreadySubmitting;
                false
            }
            WorkflowState::Idle | WorkflowState::Resolved(_) => false,
        });

        let Some((session, dialog)) = claimed else {
            tracing::debug!(?outcome, "Proceed ignored");
            return outcome;
        };

        // Detached: the session resolves even if this future is dropped.
        let task = tokio::spawn(submit(Arc::clone(&self.inner), session, dialog));
        match task.await {
            Ok(resolution) => ProceedOutcome::Resolved(resolution),
            Err(e) => {
                tracing::error!(session, error = %e, "Submission task failed");
                ProceedOutcome::Resolved(Resolution {
                    session,
                    outcome: Outcome::Failure {
                        message: TRANSPORT_CAUSE.to_string(),
                    },
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Resolves its session as a failure if dropped before [`finish`](Self::finish).
struct SubmitGuard {
    inner: Arc<Inner>,
    session: u64,
    done: bool,
}

impl SubmitGuard {
    fn finish(mut self, outcome: Outcome) -> Resolution {
        self.done = true;
        resolve(&self.inner, self.session, outcome)
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        tracing::warn!(session = self.session, "Submission ended without a result");
        resolve(
            &self.inner,
            self.session,
            Outcome::Failure {
                message: TRANSPORT_CAUSE.to_string(),
            },
        );
    }
}

async fn submit(inner: Arc<Inner>, session: u64, dialog: ConfirmDialog) -> Resolution {
    let guard = SubmitGuard {
        inner: Arc::clone(&inner),
        session,
        done: false,
    };

    let outcome = match inner.dispatcher.dispatch(&dialog.command).await {
        Ok(ack) => Outcome::Success {
            message: dialog.success_message.clone(),
            job_uuid: ack.job_uuid,
        },
        Err(e) => {
            tracing::warn!(session, title = %dialog.title, error = %e, "Confirmed command failed");
            Outcome::Failure { message: e.cause() }
        }
    };
    guard.finish(outcome)
}

/// Move `session` from submitting to resolved and arm the auto-dismiss timer.
fn resolve(inner: &Arc<Inner>, session: u64, outcome: Outcome) -> Resolution {
    let resolution = Resolution { session, outcome };

    inner.state.send_if_modified(|state| match state {
        WorkflowState::Submitting { session: current, .. } if *current == session => {
            *state = WorkflowState::Resolved(resolution.clone());
            true
        }
        _ => false,
    });

    if let Some(delay) = inner.auto_dismiss {
        schedule_dismiss(Arc::downgrade(inner), session, delay);
    }
    resolution
}

/// Return to idle after `delay`, unless a later session has replaced this one.
fn schedule_dismiss(inner: Weak<Inner>, session: u64, delay: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return;
    };
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.state.send_if_modified(|state| match state {
            WorkflowState::Resolved(resolution) if resolution.session == session => {
                *state = WorkflowState::Idle;
                true
            }
            _ => false,
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CommandAck, CommandError};
    use async_trait::async_trait;

    struct Accepting;

    #[async_trait]
    impl CommandDispatcher for Accepting {
        async fn dispatch(&self, _command: &Command) -> Result<CommandAck, CommandError> {
            Ok(CommandAck {
                status: 200,
                job_uuid: Some("j-1".into()),
            })
        }
    }

    fn power_off() -> ConfirmDialog {
        ConfirmDialog::new("Power off srv01?", Command::put("/server/s-1/stop"))
            .proceed_label("Power off")
            .dangerous()
            .success_message("Power off requested.")
    }

    #[test]
    fn session_reflects_armed_dialog() {
        let wf = ConfirmationWorkflow::new(Accepting, None);
        assert_eq!(wf.session(), None);

        wf.arm(power_off()).unwrap();
        let session = wf.session().unwrap();
        assert!(session.open);
        assert!(!session.loading);
        assert!(session.dangerous);
        assert_eq!(session.proceed_label, "Power off");
    }

    #[test]
    fn cancel_only_from_armed() {
        let wf = ConfirmationWorkflow::new(Accepting, None);
        assert!(!wf.cancel());
        wf.arm(power_off()).unwrap();
        assert!(wf.cancel());
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[test]
    fn second_arm_is_rejected() {
        let wf = ConfirmationWorkflow::new(Accepting, None);
        wf.arm(power_off()).unwrap();
        assert_eq!(wf.arm(power_off()), Err(WorkflowError::AlreadyArmed));
    }

    #[tokio::test]
    async fn proceed_resolves_with_success_text() {
        let wf = ConfirmationWorkflow::new(Accepting, None);
        let session = wf.arm(power_off()).unwrap();

        let outcome = wf.proceed().await;
        let expected = Resolution {
            session,
            outcome: Outcome::Success {
                message: "Power off requested.".into(),
                job_uuid: Some("j-1".into()),
            },
        };
        assert_eq!(outcome, ProceedOutcome::Resolved(expected.clone()));
        assert_eq!(wf.resolution(), Some(expected));
        assert_eq!(wf.session(), None);

        assert!(wf.dismiss());
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn proceed_without_arm_is_noop() {
        let wf = ConfirmationWorkflow::new(Accepting, None);
        assert_eq!(wf.proceed().await, ProceedOutcome::NotArmed);
    }
}
