//! The per-panel generation state machine and the sequential batch
//! driver.
//!
//! Each panel walks `Pending -> Polling -> Downloading -> Uploading ->
//! Done`, or ends in `Failed` for this attempt. Panels are processed in
//! index order with an inter-panel delay so the external service's rate
//! limit is respected; a single 429 anywhere in the protocol earns one
//! doubled-delay retry before the panel is declared failed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use kapow_core::project::Project;
use kapow_core::types::{panel_number, PanelId};
use kapow_cloud::ObjectStore;

use crate::api::{ImageApiError, SubmitRequest};
use crate::ImageService;

/// Base of the deterministic initial-seed sequence.
pub const BASE_SEED: u64 = 814_201;
/// Per-panel stride of the initial-seed sequence.
pub const SEED_STRIDE: u64 = 9_973;

/// Timing knobs for the batch driver.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Polls before a panel is declared timed out.
    pub max_attempts: u32,
    /// Delay between consecutive panel submissions.
    pub panel_delay: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_attempts: 40,
            panel_delay: Duration::from_secs(2),
        }
    }
}

impl GeneratorConfig {
    /// Near-zero delays for mock mode and tests.
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            max_attempts: 40,
            panel_delay: Duration::ZERO,
        }
    }
}

/// Which panels a batch run may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelSelection {
    /// Every incomplete panel. Completed panels are skipped, never
    /// regenerated implicitly.
    All,
    /// Exactly the named panels, regenerated even when complete.
    Ids(Vec<PanelId>),
}

/// Parse a comma-separated panel id list, dropping blanks and
/// duplicates while preserving order.
pub fn parse_selection(raw: &str) -> Vec<PanelId> {
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Protocol position of a panel attempt, for logging and failure
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Pending,
    Polling,
    Downloading,
    Uploading,
    Done,
    Failed,
}

impl PanelState {
    pub fn as_str(self) -> &'static str {
        match self {
            PanelState::Pending => "pending",
            PanelState::Polling => "polling",
            PanelState::Downloading => "downloading",
            PanelState::Uploading => "uploading",
            PanelState::Done => "done",
            PanelState::Failed => "failed",
        }
    }
}

/// One failed panel attempt.
#[derive(Debug, Clone)]
pub struct PanelFailure {
    pub panel_id: PanelId,
    /// Protocol step the attempt died in.
    pub state: PanelState,
    pub error: String,
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct PanelBatchResult {
    /// Panels the selection resolved to, in processing order.
    pub requested: Vec<PanelId>,
    pub successful: Vec<PanelId>,
    pub failed: Vec<PanelFailure>,
    /// Unknown ids, already-complete panels (under `All`), and panels
    /// abandoned by cancellation.
    pub skipped: Vec<PanelId>,
    /// Panel id -> freshly uploaded URL.
    pub source_map: BTreeMap<PanelId, String>,
    pub cancelled: bool,
}

enum AttemptOutcome {
    Done { url: String },
    Failed { state: PanelState, error: String },
    Cancelled,
}

/// Initial generation seed for a zero-based panel index. Stable across
/// runs so initial generation is reproducible.
pub fn initial_seed(index: u32) -> u64 {
    BASE_SEED + index as u64 * SEED_STRIDE
}

/// Regeneration seed for a zero-based panel index: the deterministic
/// base shifted by a fresh random term, re-drawn until it differs from
/// the prior seed so a retry never replays the same point in the
/// model's space.
pub fn regen_seed(index: u32, prior: Option<u64>) -> u64 {
    loop {
        let candidate = initial_seed(index) + u64::from(rand::random::<u32>()) + 1;
        if prior != Some(candidate) {
            return candidate;
        }
    }
}

/// Sequential batch driver over the image service and object storage.
pub struct PanelGenerator {
    service: Arc<dyn ImageService>,
    storage: Arc<dyn ObjectStore>,
    config: GeneratorConfig,
}

impl PanelGenerator {
    pub fn new(
        service: Arc<dyn ImageService>,
        storage: Arc<dyn ObjectStore>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            service,
            storage,
            config,
        }
    }

    /// Generate artwork for the selected panels of `project`.
    ///
    /// Successful panels get their `cloudinaryUrl` and `seed` written
    /// in place; everything else about the project is left untouched.
    /// The caller persists the project afterwards.
    pub async fn generate_panels(
        &self,
        project: &mut Project,
        selection: &PanelSelection,
        cancel: &CancellationToken,
    ) -> PanelBatchResult {
        let mut result = PanelBatchResult::default();

        // Resolve the selection against the project, preserving panel
        // index order for processing.
        let mut indices: Vec<usize> = Vec::new();
        match selection {
            PanelSelection::All => {
                for (i, panel) in project.panels.iter().enumerate() {
                    if panel.is_complete() {
                        tracing::debug!(panel_id = %panel.id, "Panel already complete, skipping");
                        result.skipped.push(panel.id.clone());
                    } else {
                        indices.push(i);
                    }
                }
            }
            PanelSelection::Ids(ids) => {
                for id in ids {
                    match project.panels.iter().position(|p| &p.id == id) {
                        Some(i) => indices.push(i),
                        None => {
                            tracing::warn!(panel_id = %id, "Unknown panel id in selection");
                            result.skipped.push(id.clone());
                        }
                    }
                }
                indices.sort_unstable();
            }
        }
        result.requested = indices
            .iter()
            .map(|&i| project.panels[i].id.clone())
            .collect();

        let regenerating = matches!(selection, PanelSelection::Ids(_));

        for (processed, &i) in indices.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                result
                    .skipped
                    .extend(indices[processed..].iter().map(|&j| project.panels[j].id.clone()));
                tracing::info!("Panel batch cancelled, abandoning remaining panels");
                break;
            }

            if processed > 0 && !self.config.panel_delay.is_zero() {
                tokio::time::sleep(self.config.panel_delay).await;
            }

            let index = i as u32;
            let seed = if regenerating {
                regen_seed(index, project.panels[i].seed)
            } else {
                initial_seed(index)
            };

            let outcome = self.run_panel(project, i, seed, cancel).await;
            let panel = &mut project.panels[i];
            match outcome {
                AttemptOutcome::Done { url } => {
                    panel.cloudinary_url = Some(url.clone());
                    panel.seed = Some(seed);
                    result.source_map.insert(panel.id.clone(), url);
                    result.successful.push(panel.id.clone());
                }
                AttemptOutcome::Failed { state, error } => {
                    tracing::warn!(
                        panel_id = %panel.id,
                        state = state.as_str(),
                        error = %error,
                        "Panel generation failed",
                    );
                    result.failed.push(PanelFailure {
                        panel_id: panel.id.clone(),
                        state,
                        error,
                    });
                }
                AttemptOutcome::Cancelled => {
                    result.cancelled = true;
                    result.skipped.push(panel.id.clone());
                    result
                        .skipped
                        .extend(indices[processed + 1..].iter().map(|&j| project.panels[j].id.clone()));
                    tracing::info!("Panel batch cancelled mid-panel");
                    break;
                }
            }
        }

        tracing::info!(
            requested = result.requested.len(),
            successful = result.successful.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            cancelled = result.cancelled,
            "Panel batch finished",
        );
        result
    }

    /// Run the full protocol for one panel.
    async fn run_panel(
        &self,
        project: &Project,
        panel_index: usize,
        seed: u64,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let panel = &project.panels[panel_index];
        tracing::info!(
            panel_id = %panel.id,
            seed,
            state = PanelState::Pending.as_str(),
            "Submitting panel generation",
        );

        let request = SubmitRequest {
            prompt: panel.prompt.clone(),
            width: panel.width,
            height: panel.height,
            seed,
            context_ids: panel.context_panel_ids.clone(),
        };

        // -- Pending -> Polling --
        let generation_id = match self.submit_with_backoff(&request).await {
            Ok(id) => id,
            Err(e) => {
                return AttemptOutcome::Failed {
                    state: PanelState::Pending,
                    error: e.to_string(),
                }
            }
        };

        // -- Polling --
        let mut rate_limit_retried = false;
        let mut attempts = 0u32;
        let status = loop {
            if cancel.is_cancelled() {
                return AttemptOutcome::Cancelled;
            }
            if attempts >= self.config.max_attempts {
                return AttemptOutcome::Failed {
                    state: PanelState::Polling,
                    error: format!(
                        "timed out after {} polls ({}s interval)",
                        self.config.max_attempts,
                        self.config.poll_interval.as_secs_f64(),
                    ),
                };
            }
            tokio::time::sleep(self.config.poll_interval).await;
            attempts += 1;

            match self.service.status(&generation_id).await {
                Ok(status) if status.status.is_in_flight() => continue,
                Ok(status) => break status,
                Err(e) if e.is_rate_limited() && !rate_limit_retried => {
                    rate_limit_retried = true;
                    tracing::warn!(panel_id = %panel.id, "Rate limited while polling, backing off");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                Err(e) => {
                    return AttemptOutcome::Failed {
                        state: PanelState::Polling,
                        error: e.to_string(),
                    }
                }
            }
        };

        if status.status == crate::GenerationStatus::Failed {
            return AttemptOutcome::Failed {
                state: PanelState::Failed,
                error: status
                    .error
                    .unwrap_or_else(|| "generation failed".to_string()),
            };
        }
        let Some(image_url) = status.images.first() else {
            return AttemptOutcome::Failed {
                state: PanelState::Polling,
                error: "generation completed without images".to_string(),
            };
        };

        // -- Downloading --
        tracing::debug!(panel_id = %panel.id, state = PanelState::Downloading.as_str(), url = %image_url, "Fetching artwork");
        let bytes = match self.service.download(image_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return AttemptOutcome::Failed {
                    state: PanelState::Downloading,
                    error: e.to_string(),
                }
            }
        };

        // -- Uploading --
        let public_id = match panel_number(&panel.id) {
            Some(n) => format!("panel_{n}"),
            None => format!("panel_{}", panel_index + 1),
        };
        tracing::debug!(panel_id = %panel.id, state = PanelState::Uploading.as_str(), public_id = %public_id, "Uploading artwork");
        match self.storage.upload(bytes, &public_id).await {
            Ok(url) => {
                tracing::info!(panel_id = %panel.id, state = PanelState::Done.as_str(), url = %url, "Panel complete");
                AttemptOutcome::Done { url }
            }
            Err(e) => AttemptOutcome::Failed {
                state: PanelState::Uploading,
                error: e.to_string(),
            },
        }
    }

    /// Submit, retrying once after a doubled delay on HTTP 429.
    async fn submit_with_backoff(&self, request: &SubmitRequest) -> Result<String, ImageApiError> {
        match self.service.submit(request).await {
            Err(e) if e.is_rate_limited() => {
                tracing::warn!("Rate limited on submit, backing off");
                tokio::time::sleep(self.config.poll_interval * 2).await;
                self.service.submit(request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Selection parsing --

    #[test]
    fn selection_parses_and_dedups() {
        assert_eq!(
            parse_selection("panel4, panel7,panel4 , ,panel1"),
            vec!["panel4", "panel7", "panel1"]
        );
    }

    #[test]
    fn empty_selection_is_empty() {
        assert!(parse_selection("").is_empty());
        assert!(parse_selection(" , ,").is_empty());
    }

    // -- Seeding --

    #[test]
    fn initial_seeds_are_deterministic_and_distinct() {
        assert_eq!(initial_seed(0), initial_seed(0));
        assert_eq!(initial_seed(0), BASE_SEED);
        assert_ne!(initial_seed(0), initial_seed(1));
    }

    #[test]
    fn regen_seed_never_repeats_the_prior_seed() {
        for _ in 0..100 {
            let prior = initial_seed(3);
            assert_ne!(regen_seed(3, Some(prior)), prior);
        }
    }

    #[test]
    fn regen_seed_differs_from_the_initial_seed() {
        // The random term is always >= 1, so a regeneration can never
        // collide with the deterministic first-run seed.
        for _ in 0..100 {
            assert!(regen_seed(2, None) > initial_seed(2));
        }
    }
}
