//! Improve-text orchestration.
//!
//! # Responsibility
//! - Pick the target span, call the rewriter, splice the result back.
//! - Serialize improve operations through an `Idle -> Pending -> Idle`
//!   state machine fed by the trigger channel.
//!
//! # Invariants
//! - At most one operation is pending; triggers arriving meanwhile are
//!   dropped, not queued.
//! - The state returns to `Idle` on every exit path.
//! - The surface is never borrowed across the rewrite await.
//! - The splice is one transaction, so one undo reverts it.

use super::target::{extract_target, splice_transaction, ImproveTarget};
use super::trigger::ImproveTrigger;
use crate::editor::surface::EditingSurface;
use crate::rewrite::{RewriteError, Rewriter};
use crate::service::settings::Settings;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImproveState {
    Idle,
    Pending,
}

/// Non-error results of an improve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImproveOutcome {
    Applied(ImproveTarget),
    /// Another operation was already pending.
    SkippedBusy,
    /// The extracted text was blank; nothing was sent.
    SkippedEmpty,
}

/// Receives user-facing failure notifications.
pub trait Notifier {
    fn notify_error(&self, message: &str);
}

/// Resets the state to `Idle` when dropped.
struct PendingGuard<'a> {
    state: &'a Cell<ImproveState>,
}

impl<'a> PendingGuard<'a> {
    fn acquire(state: &'a Cell<ImproveState>) -> Option<Self> {
        if state.get() == ImproveState::Pending {
            return None;
        }
        state.set(ImproveState::Pending);
        Some(Self { state })
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.state.set(ImproveState::Idle);
    }
}

pub struct ImproveOrchestrator<R: Rewriter> {
    rewriter: R,
    model: String,
    api_key: String,
    state: Cell<ImproveState>,
}

impl<R: Rewriter> ImproveOrchestrator<R> {
    pub fn new(rewriter: R, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            rewriter,
            model: model.into(),
            api_key: api_key.into(),
            state: Cell::new(ImproveState::Idle),
        }
    }

    pub fn from_settings(rewriter: R, settings: &Settings) -> Self {
        Self::new(rewriter, settings.model.clone(), settings.api_key.clone())
    }

    pub fn state(&self) -> ImproveState {
        self.state.get()
    }

    /// Runs one improve operation against `surface`.
    ///
    /// # Errors
    /// - `RewriteError::Auth` when no API key is configured; nothing is sent.
    /// - Any error from the rewriter, unchanged. The surface is untouched.
    pub async fn improve<E: EditingSurface>(
        &self,
        surface: &RefCell<E>,
    ) -> Result<ImproveOutcome, RewriteError> {
        if self.api_key.trim().is_empty() {
            return Err(RewriteError::Auth);
        }
        let Some(_pending) = PendingGuard::acquire(&self.state) else {
            debug!("event=improve module=improve status=skip reason=busy");
            return Ok(ImproveOutcome::SkippedBusy);
        };

        let extracted = {
            let surface = surface.borrow();
            extract_target(surface.document(), surface.selection())
        };
        if extracted.is_blank() {
            debug!(
                "event=improve module=improve status=skip reason=empty_target target={}",
                extracted.target.label()
            );
            return Ok(ImproveOutcome::SkippedEmpty);
        }

        let improved = self
            .rewriter
            .improve(&extracted.text, &self.model, &self.api_key)
            .await?;

        surface
            .borrow_mut()
            .apply(splice_transaction(extracted.target, &improved));
        info!(
            "event=improve module=improve status=ok target={} input_chars={} output_chars={}",
            extracted.target.label(),
            extracted.text.chars().count(),
            improved.chars().count()
        );
        Ok(ImproveOutcome::Applied(extracted.target))
    }

    /// Consumes triggers until every sender is gone.
    ///
    /// Each trigger goes through [`Self::improve`]; errors are reported to
    /// `notifier` and never stop the loop.
    pub async fn run<E, N>(
        &self,
        surface: &RefCell<E>,
        mut triggers: mpsc::UnboundedReceiver<ImproveTrigger>,
        notifier: &N,
    ) where
        E: EditingSurface,
        N: Notifier,
    {
        let mut in_flight = FuturesUnordered::new();
        loop {
            tokio::select! {
                received = triggers.recv() => match received {
                    Some(trigger) => in_flight.push(self.handle(trigger, surface, notifier)),
                    None => break,
                },
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }
        while in_flight.next().await.is_some() {}
    }

    async fn handle<E, N>(&self, trigger: ImproveTrigger, surface: &RefCell<E>, notifier: &N)
    where
        E: EditingSurface,
        N: Notifier,
    {
        match self.improve(surface).await {
            Ok(ImproveOutcome::SkippedBusy) => debug!(
                "event=trigger module=improve status=dropped source={}",
                trigger.source.as_str()
            ),
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "event=trigger module=improve status=error source={} error={}",
                    trigger.source.as_str(),
                    err
                );
                notifier.notify_error(&format!("Error improving text: {err}"));
            }
        }
    }
}
