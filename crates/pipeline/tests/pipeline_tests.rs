//! Full pipeline runs in mock mode: no network, real store, real
//! composition.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kapow_cloud::MockStore;
use kapow_core::project::{STATUS_CANCELLED, STATUS_COMPOSED};
use kapow_imagegen::{GeneratorConfig, MockImageService, PanelGenerator};
use kapow_pipeline::{ComicRequest, MockFetcher, Pipeline, PipelineError};
use kapow_store::ProjectStore;

async fn mock_pipeline(dir: &std::path::Path) -> Pipeline {
    let store = ProjectStore::open(dir).await.unwrap();
    let storage: Arc<kapow_cloud::MockStore> = Arc::new(MockStore::new());
    let storage_dyn: Arc<dyn kapow_cloud::ObjectStore> = storage.clone();
    let generator = PanelGenerator::new(
        Arc::new(MockImageService::new()),
        storage_dyn,
        GeneratorConfig::fast(),
    );
    Pipeline::new(store, None, generator, storage, Arc::new(MockFetcher::new()))
}

fn request(prompt: &str, page_count: u32) -> ComicRequest {
    ComicRequest {
        prompt: prompt.to_string(),
        genre: Some("sci-fi".to_string()),
        art_style: Some("cinematic".to_string()),
        tone: Some("hopeful".to_string()),
        target_audience: Some("general".to_string()),
        page_count: Some(page_count),
    }
}

#[tokio::test]
async fn mock_happy_path_produces_one_page_per_layout_page() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let result = pipeline
        .generate_comic(
            request("a mars astronaut meets a hologram", 3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 3);
    for (i, page) in result.pages.iter().enumerate() {
        assert_eq!(page.page, i as u32 + 1);
        assert!(page.url.contains(&format!("page_{}", i + 1)));
    }

    let project = pipeline.store().load(&result.project_id).await.unwrap();
    assert_eq!(project.status, STATUS_COMPOSED);
    assert!(project.panels.iter().all(|p| p.is_complete()));
}

#[tokio::test]
async fn cover_invariants_hold_after_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let result = pipeline
        .generate_comic(request("a lighthouse keeper and a sea dragon", 3), &CancellationToken::new())
        .await
        .unwrap();

    let project = pipeline.store().load(&result.project_id).await.unwrap();
    let cover = &project.panels[0];
    assert_eq!(cover.id, "panel1");
    assert!(cover.title.as_deref().is_some_and(|t| !t.is_empty()));
    assert!(cover.dialogue.is_empty());
    assert!(cover.narration.is_none());
}

#[tokio::test]
async fn single_page_requests_compose_just_the_cover() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let result = pipeline
        .generate_comic(request("one page wonder", 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.pages.len(), 1);
}

#[tokio::test]
async fn empty_prompts_are_rejected_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let err = pipeline
        .generate_comic(request("   ", 3), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(pipeline.store().latest().await.unwrap(), None);
}

#[tokio::test]
async fn regeneration_touches_only_the_named_panels() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let result = pipeline
        .generate_comic(request("regeneration target", 3), &CancellationToken::new())
        .await
        .unwrap();
    let before = pipeline.store().load(&result.project_id).await.unwrap();

    let regen = pipeline
        .regenerate_panels(
            Some(result.project_id.clone()),
            "panel4,panel99",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(regen.total_requested, 2);
    assert_eq!(regen.successful_panels, 1);
    assert!(regen.failed_panel_ids.is_empty());
    assert_eq!(regen.skipped_panel_ids, vec!["panel99"]);
    assert!(regen.source_map.contains_key("panel4"));

    let after = pipeline.store().load(&result.project_id).await.unwrap();
    for (b, a) in before.panels.iter().zip(after.panels.iter()) {
        if b.id == "panel4" {
            // A regeneration must explore a different seed.
            assert_ne!(a.seed, b.seed);
        } else {
            assert_eq!(a, b, "panel {} was touched by regeneration", b.id);
        }
    }
}

#[tokio::test]
async fn regeneration_without_a_project_id_uses_the_latest_project() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    pipeline
        .generate_comic(request("latest project", 1), &CancellationToken::new())
        .await
        .unwrap();

    let regen = pipeline
        .regenerate_panels(None, "panel1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(regen.successful_panels, 1);
}

#[tokio::test]
async fn zero_resolvable_ids_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let result = pipeline
        .generate_comic(request("untouched", 1), &CancellationToken::new())
        .await
        .unwrap();
    let before = pipeline.store().load(&result.project_id).await.unwrap();

    let regen = pipeline
        .regenerate_panels(
            Some(result.project_id.clone()),
            "panel77,panel78",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!regen.success);
    assert_eq!(regen.successful_panels, 0);

    let after = pipeline.store().load(&result.project_id).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn dialogue_parse_failure_flags_the_project_but_composition_continues() {
    use httpmock::prelude::*;

    let server = MockServer::start_async().await;
    // The structurer call returns a valid outline...
    let outline = serde_json::json!({
        "title": "Mocked Title",
        "synopsis": "s",
        "scenes": []
    })
    .to_string();
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_includes("story architect");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": outline}}]
            }));
        })
        .await;
    // ...the dialogue call returns prose that parses as nothing.
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_includes("letterer");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Sure! Here you go: panel one says hi"}}]
            }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::open(dir.path()).await.unwrap();
    let storage: Arc<kapow_cloud::MockStore> = Arc::new(MockStore::new());
    let storage_dyn: Arc<dyn kapow_cloud::ObjectStore> = storage.clone();
    let generator = PanelGenerator::new(
        Arc::new(MockImageService::new()),
        storage_dyn,
        GeneratorConfig::fast(),
    );
    let llm = kapow_llm::ChatClient::new(
        server.base_url(),
        "key".to_string(),
        "model".to_string(),
        std::time::Duration::from_secs(5),
    )
    .unwrap();
    let pipeline = Pipeline::new(
        store,
        Some(llm),
        generator,
        storage,
        Arc::new(MockFetcher::new()),
    );

    let result = pipeline
        .generate_comic(request("story survives bad dialogue", 3), &CancellationToken::new())
        .await
        .unwrap();

    // Pages still compose; the dialogue failure is flagged, not fatal.
    assert_eq!(result.pages.len(), 3);
    let project = pipeline.store().load(&result.project_id).await.unwrap();
    assert!(project.dialogue_failed);
    assert_eq!(project.title, "Mocked Title");
    // Pre-call dialogue fields are untouched: the cover keeps the
    // structurer's title, no panel gained dialogue.
    assert_eq!(project.panels[0].title.as_deref(), Some("Mocked Title"));
    assert!(project.panels.iter().all(|p| p.dialogue.is_empty()));
}

#[tokio::test]
async fn cancellation_is_reported_as_cancelled_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = mock_pipeline(dir.path()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = pipeline
        .generate_comic(request("never starts", 3), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));

    // The created project was persisted with a cancelled status.
    let latest = pipeline.store().latest().await.unwrap().unwrap();
    let project = pipeline.store().load(&latest).await.unwrap();
    assert_eq!(project.status, STATUS_CANCELLED);
}
