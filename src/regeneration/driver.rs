use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StyleOptions;
use crate::error::{InvalidState, RegenerationError};
use crate::storage::memory::ItemStore;
use crate::types::{ItemId, StaleCommentItem, Status};

use super::generator::Generator;
use super::prompt::PromptTemplate;
use super::response::postprocess;

/// Result of regenerating one item during a bulk run.
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationOutcome {
    pub id: ItemId,
    pub result: Result<StaleCommentItem, RegenerationError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenerationReport {
    pub outcomes: Vec<RegenerationOutcome>,
    pub waves: usize,
}

impl RegenerationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Progress after each wave: `(items settled, items selected)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaveProgress {
    pub wave: usize,
    pub completed: usize,
    pub total: usize,
}

/// Moves an item back to `Detected` if regeneration does not finish, including when the
/// future is dropped mid-flight.
struct RevertOnDrop<'a> {
    store: &'a ItemStore,
    id: &'a ItemId,
    armed: bool,
}

impl RevertOnDrop<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RevertOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let reverted = self.store.update(self.id, |item| {
            if item.status == Status::Regenerating {
                item.status = Status::Detected;
            }
            Ok(())
        });
        if reverted.is_err() {
            debug!(id = %self.id, "item disappeared while regenerating");
        }
    }
}

/// Drives items through `Detected -> Regenerating -> Updated`, using the status as an
/// advisory lock.
pub struct RegenerationDriver {
    store: Arc<ItemStore>,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    style: StyleOptions,
    concurrency: usize,
}

impl RegenerationDriver {
    pub fn new(store: Arc<ItemStore>, generator: Arc<dyn Generator>) -> Self {
        Self {
            store,
            generator,
            template: PromptTemplate::default(),
            style: StyleOptions::default(),
            concurrency: 3,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Regenerate one item. It must currently be `Detected`.
    ///
    /// On success the item is `Updated` and carries the new text; on any failure it is back
    /// to `Detected`.
    pub async fn regenerate(&self, id: &ItemId) -> Result<StaleCommentItem, RegenerationError> {
        let item = self.store.update(id, |item| {
            if item.status != Status::Detected {
                return Err(InvalidState::StatusConflict {
                    id: item.id.clone(),
                    expected: Status::Detected,
                    actual: item.status,
                });
            }
            item.status = Status::Regenerating;
            Ok(item.clone())
        })?;

        let guard = RevertOnDrop {
            store: &self.store,
            id,
            armed: true,
        };

        let prompt = self.template.render(&item, &self.style);
        let raw = match self
            .generator
            .generate(&item.language_id, &prompt, &self.style)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(id = %id, path = %item.file_path.display(), error = %e, "regeneration failed");
                drop(guard);
                return Err(e.into());
            }
        };

        let text = postprocess(&raw, &item.language_id, self.style.comment_only);
        let updated = self.store.update(id, |item| {
            item.regenerated_text = Some(text);
            item.status = Status::Updated;
            Ok(item.clone())
        })?;
        guard.disarm();

        info!(
            path = %updated.file_path.display(),
            line = updated.range.start.line + 1,
            "regenerated comment"
        );
        Ok(updated)
    }

    /// Regenerate every item that has no regenerated text yet, in sequential waves of
    /// `concurrency` items. Failures are reported per item and never stop the run.
    pub async fn regenerate_all<F>(&self, items: &[StaleCommentItem], mut on_progress: F) -> RegenerationReport
    where
        F: FnMut(WaveProgress) + Send,
    {
        let pending: Vec<ItemId> = items
            .iter()
            .filter(|item| !item.has_regenerated_text())
            .map(|item| item.id.clone())
            .collect();
        let total = pending.len();
        let mut report = RegenerationReport::default();

        for wave in pending.chunks(self.concurrency) {
            let results = join_all(wave.iter().map(|id| async move {
                RegenerationOutcome {
                    id: id.clone(),
                    result: self.regenerate(id).await,
                }
            }))
            .await;

            report.outcomes.extend(results);
            report.waves += 1;
            on_progress(WaveProgress {
                wave: report.waves,
                completed: report.outcomes.len(),
                total,
            });
        }

        info!(
            total,
            waves = report.waves,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "bulk regeneration finished"
        );
        report
    }
}
