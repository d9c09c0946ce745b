//! The coordinator: owns the project document for the duration of a
//! request and orders the stages.
//!
//! `generate_comic` runs Structurer -> Panel Generator -> Dialogue ->
//! Composer, persisting the project after every stage so a crash loses
//! at most one stage's work. Partial failure is tolerated as long as at
//! least one panel holds artwork; the response then carries the failed
//! panel ids alongside the composed pages. Cancellation is checked at
//! every stage boundary and inside the panel batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kapow_cloud::ObjectStore;
use kapow_compose::{compose_pages, PanelImages};
use kapow_core::layout::{clamp_page_count, layout_for};
use kapow_core::project::{
    Project, STATUS_CANCELLED, STATUS_COMPOSED, STATUS_GENERATED, STATUS_GENERATING,
};
use kapow_core::prompts::{vocab_or_warn, StoryRequest, AUDIENCES, GENRES, STYLES};
use kapow_core::types::ProjectId;
use kapow_imagegen::{parse_selection, PanelGenerator, PanelSelection};
use kapow_llm::ChatClient;
use kapow_store::{ProjectStore, StoreError};

use crate::fetch::ImageFetcher;
use crate::{dialogue, structurer, PipelineError};

/// An incoming comic request, as received over HTTP.
#[derive(Debug, Clone)]
pub struct ComicRequest {
    pub prompt: String,
    pub genre: Option<String>,
    pub art_style: Option<String>,
    pub tone: Option<String>,
    pub target_audience: Option<String>,
    pub page_count: Option<u32>,
}

/// One composed, uploaded page.
#[derive(Debug, Clone)]
pub struct PageRef {
    pub page: u32,
    pub url: String,
}

/// The outcome of a full pipeline run.
#[derive(Debug)]
pub struct ComicResult {
    pub project_id: ProjectId,
    pub pages: Vec<PageRef>,
    /// Human-readable stage problems (failed panels, dropped lines).
    pub errors: Vec<String>,
}

/// The outcome of a selective panel regeneration.
#[derive(Debug)]
pub struct RegenResult {
    pub success: bool,
    pub total_requested: usize,
    pub successful_panels: usize,
    pub failed_panel_ids: Vec<String>,
    pub skipped_panel_ids: Vec<String>,
    /// Panel id -> freshly uploaded URL.
    pub source_map: BTreeMap<String, String>,
}

/// Owns the stage clients and the project store.
pub struct Pipeline {
    store: ProjectStore,
    llm: Option<ChatClient>,
    generator: PanelGenerator,
    uploader: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl Pipeline {
    pub fn new(
        store: ProjectStore,
        llm: Option<ChatClient>,
        generator: PanelGenerator,
        uploader: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            store,
            llm,
            generator,
            uploader,
            fetcher,
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Run the full pipeline for one request.
    pub async fn generate_comic(
        &self,
        request: ComicRequest,
        cancel: &CancellationToken,
    ) -> Result<ComicResult, PipelineError> {
        let prompt = request.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(PipelineError::Config("prompt must not be empty".into()));
        }

        let page_count = clamp_page_count(request.page_count);
        let story = StoryRequest {
            prompt: prompt.clone(),
            genre: vocab_or_warn("genre", request.genre.as_deref().unwrap_or("adventure"), GENRES),
            style: vocab_or_warn(
                "style",
                request.art_style.as_deref().unwrap_or("cinematic"),
                STYLES,
            ),
            tone: request.tone.unwrap_or_else(|| "balanced".to_string()),
            target_audience: vocab_or_warn(
                "target_audience",
                request.target_audience.as_deref().unwrap_or("general"),
                AUDIENCES,
            ),
            page_count,
        };

        let mut project = Project::new(uuid::Uuid::new_v4().to_string(), prompt);
        project.genre = story.genre.clone();
        project.style = story.style.clone();
        project.pages = page_count;
        project.target_audience = story.target_audience.clone();
        project.extra.insert(
            "tone".to_string(),
            serde_yaml::Value::String(story.tone.clone()),
        );
        self.store.save(&project).await?;
        tracing::info!(project_id = %project.id, page_count, "Comic request accepted");

        let mut errors = Vec::new();

        // -- Story structurer --
        self.checkpoint(&mut project, cancel).await?;
        structurer::run(self.llm.as_ref(), &mut project, &story).await;
        self.store.save(&project).await?;

        // -- Panel generator, all panels --
        self.checkpoint(&mut project, cancel).await?;
        project.status = STATUS_GENERATING.to_string();
        let batch = self
            .generator
            .generate_panels(&mut project, &PanelSelection::All, cancel)
            .await;
        project.status = STATUS_GENERATED.to_string();
        self.store.save(&project).await?;
        for failure in &batch.failed {
            errors.push(format!("{}: {}", failure.panel_id, failure.error));
        }
        if batch.cancelled {
            self.mark_cancelled(&mut project).await?;
            return Err(PipelineError::Cancelled);
        }
        if !project.panels.iter().any(|p| p.is_complete()) {
            return Err(PipelineError::Fatal(
                "no panel artwork could be generated".into(),
            ));
        }

        // -- Dialogue --
        self.checkpoint(&mut project, cancel).await?;
        let outcome = dialogue::run(self.llm.as_ref(), &mut project).await;
        self.store.save(&project).await?;
        errors.extend(outcome.warnings);

        // -- Composition --
        self.checkpoint(&mut project, cancel).await?;
        let template = layout_for(page_count);
        let images = self.fetch_artwork(&project).await;
        let pages = compose_pages(&project, &template, &images)?;

        let mut page_refs = Vec::new();
        for page in pages {
            let public_id = format!("page_{}", page.page_number);
            match self.uploader.upload(page.bytes, &public_id).await {
                Ok(url) => page_refs.push(PageRef {
                    page: page.page_number,
                    url,
                }),
                Err(e) => {
                    tracing::error!(page = page.page_number, error = %e, "Page upload failed");
                    errors.push(format!("page {} upload failed: {e}", page.page_number));
                }
            }
        }
        if page_refs.is_empty() {
            return Err(PipelineError::Fatal("no pages could be produced".into()));
        }

        project.status = STATUS_COMPOSED.to_string();
        self.store.save(&project).await?;
        tracing::info!(
            project_id = %project.id,
            pages = page_refs.len(),
            errors = errors.len(),
            "Comic complete",
        );

        Ok(ComicResult {
            project_id: project.id,
            pages: page_refs,
            errors,
        })
    }

    /// Regenerate a named subset of panels on an existing project.
    ///
    /// Unknown ids are skipped; a request with zero resolvable ids
    /// writes nothing.
    pub async fn regenerate_panels(
        &self,
        project_id: Option<String>,
        raw_ids: &str,
        cancel: &CancellationToken,
    ) -> Result<RegenResult, PipelineError> {
        let ids = parse_selection(raw_ids);
        if ids.is_empty() {
            return Ok(RegenResult {
                success: false,
                total_requested: 0,
                successful_panels: 0,
                failed_panel_ids: Vec::new(),
                skipped_panel_ids: Vec::new(),
                source_map: BTreeMap::new(),
            });
        }

        let project_id = match project_id {
            Some(id) => id,
            None => self
                .store
                .latest()
                .await?
                .ok_or_else(|| StoreError::NotFound("<latest>".to_string()))?,
        };
        let mut project = self.store.load(&project_id).await?;

        let known: Vec<String> = ids
            .iter()
            .filter(|id| project.panel(id).is_some())
            .cloned()
            .collect();
        if known.is_empty() {
            tracing::warn!(project_id = %project_id, "No resolvable panel ids in regeneration request");
            return Ok(RegenResult {
                success: false,
                total_requested: ids.len(),
                successful_panels: 0,
                failed_panel_ids: Vec::new(),
                skipped_panel_ids: ids,
                source_map: BTreeMap::new(),
            });
        }

        let batch = self
            .generator
            .generate_panels(&mut project, &PanelSelection::Ids(ids.clone()), cancel)
            .await;
        // New URLs are merged in place; persist them even when some
        // panels failed.
        self.store.save(&project).await?;

        if batch.cancelled {
            return Err(PipelineError::Cancelled);
        }

        Ok(RegenResult {
            success: !batch.successful.is_empty() && batch.failed.is_empty(),
            total_requested: ids.len(),
            successful_panels: batch.successful.len(),
            failed_panel_ids: batch.failed.iter().map(|f| f.panel_id.clone()).collect(),
            skipped_panel_ids: batch.skipped,
            source_map: batch.source_map,
        })
    }

    // ---- private helpers ----

    /// Stage boundary: persist-and-bail when the request was cancelled.
    async fn checkpoint(
        &self,
        project: &mut Project,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            self.mark_cancelled(project).await?;
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    async fn mark_cancelled(&self, project: &mut Project) -> Result<(), PipelineError> {
        project.status = STATUS_CANCELLED.to_string();
        self.store.save(project).await?;
        tracing::info!(project_id = %project.id, "Request cancelled, project state persisted");
        Ok(())
    }

    /// Resolve every completed panel's URL to bytes. Fetch failures are
    /// warnings; the composer draws placeholders for the gaps.
    async fn fetch_artwork(&self, project: &Project) -> PanelImages {
        let mut images = PanelImages::new();
        for panel in &project.panels {
            let Some(url) = panel.cloudinary_url.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            match self.fetcher.fetch(url).await {
                Ok(bytes) => {
                    images.insert(panel.id.clone(), bytes);
                }
                Err(e) => {
                    tracing::warn!(
                        panel_id = %panel.id,
                        url,
                        error = %e,
                        "Failed to fetch panel artwork, composing a placeholder",
                    );
                }
            }
        }
        images
    }
}
