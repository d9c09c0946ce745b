//! Shared application state and pipeline wiring.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kapow_cloud::{CloudinaryStore, MockStore, ObjectStore};
use kapow_imagegen::{
    GeneratorConfig, ImageService, ImageServiceApi, MockImageService, PanelGenerator,
};
use kapow_llm::ChatClient;
use kapow_pipeline::{HttpFetcher, ImageFetcher, MockFetcher, Pipeline};
use kapow_store::{ProjectStore, StoreError};

use crate::config::{PipelineSettings, ServerConfig};

/// Shared state available to all handlers via `State<AppState>`.
/// Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<ServerConfig>,
    /// Cancelled on graceful shutdown; every request derives its own
    /// child token from it.
    pub shutdown: CancellationToken,
}

/// Wire the pipeline from settings: real clients normally, in-process
/// mocks when `MOCK_GENERATION` is on.
pub async fn build_state(
    config: ServerConfig,
    settings: PipelineSettings,
) -> Result<AppState, StoreError> {
    let store = ProjectStore::open(&settings.data_dir).await?;

    let pipeline = if settings.mock {
        tracing::info!("Mock generation enabled: external services are stubbed");
        let storage: Arc<dyn ObjectStore> = Arc::new(MockStore::new());
        let service: Arc<dyn ImageService> = Arc::new(MockImageService::new());
        let generator = PanelGenerator::new(service, Arc::clone(&storage), GeneratorConfig::fast());
        let fetcher: Arc<dyn ImageFetcher> = Arc::new(MockFetcher::new());
        Pipeline::new(store, None, generator, storage, fetcher)
    } else {
        let storage: Arc<dyn ObjectStore> = Arc::new(CloudinaryStore::new(
            &settings.cloudinary_cloud_name,
            settings.cloudinary_api_key.clone(),
            settings.cloudinary_api_secret.clone(),
        ));
        let service: Arc<dyn ImageService> = Arc::new(ImageServiceApi::new(
            settings.image_api_url.clone(),
            settings.image_api_key.clone(),
        ));
        let generator = PanelGenerator::new(
            service,
            Arc::clone(&storage),
            GeneratorConfig {
                poll_interval: settings.poll_interval,
                max_attempts: settings.max_poll_attempts,
                panel_delay: settings.panel_delay,
            },
        );
        let llm = ChatClient::new(
            settings.llm_api_url.clone(),
            settings.llm_api_key.clone(),
            settings.llm_model.clone(),
            settings.llm_timeout,
        )
        .expect("Failed to build LLM client");
        let fetcher: Arc<dyn ImageFetcher> = Arc::new(HttpFetcher::new());
        Pipeline::new(store, Some(llm), generator, storage, fetcher)
    };

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        config: Arc::new(config),
        shutdown: CancellationToken::new(),
    })
}
