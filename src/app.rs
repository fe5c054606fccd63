use crate::{
    annotator::Annotator,
    config::{Config, OutputConfig},
    prediction::best_prediction,
    workflow_client::{WorkflowClient, WorkflowClientError},
};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Input image not found: {0}")]
    InputNotFound(PathBuf),
    #[error("Failed to read input image {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode input image: {0}")]
    ImageDecode(#[source] image::ImageError),
    #[error(transparent)]
    Workflow(#[from] WorkflowClientError),
    #[error("Failed to create results directory {path}: {source}")]
    ResultsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to save annotated image: {0}")]
    ImageEncode(#[source] image::ImageError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Annotated(PathBuf),
    NoDetection,
}

pub struct App {
    client: WorkflowClient,
    annotator: Annotator,
    output: OutputConfig,
}

impl App {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = WorkflowClient::new(&config.workflow)?;
        let annotator = Annotator::from_config(&config.annotation);

        Ok(Self {
            client,
            annotator,
            output: config.output.clone(),
        })
    }

    #[instrument(skip(self))]
    pub async fn run(&self, image_path: &Path) -> Result<Outcome, AppError> {
        if !image_path.exists() {
            return Err(AppError::InputNotFound(image_path.to_path_buf()));
        }

        let image = load_image(image_path)?;
        println!("Sending image: {}", image_path.display());

        let result = self.client.run_workflow(image_path).await?;
        let Some(best) = best_prediction(&result) else {
            println!("No detection found in the image.");
            return Ok(Outcome::NoDetection);
        };
        tracing::info!(
            "Best prediction: {} with confidence {:.3}",
            best.class_label,
            best.confidence
        );

        let annotated = self.annotator.annotate(&image, &best);

        let results_dir = &self.output.results_dir;
        std::fs::create_dir_all(results_dir).map_err(|source| AppError::ResultsDir {
            path: results_dir.clone(),
            source,
        })?;
        let output_path = self.output.get_output_path(image_path);
        annotated
            .save_with_format(&output_path, ImageFormat::Png)
            .map_err(AppError::ImageEncode)?;

        println!("Result saved to: {}", output_path.display());

        Ok(Outcome::Annotated(output_path))
    }
}

/// Decodes by content, so a JPEG without an extension (or with the wrong
/// one) still loads.
pub fn load_image(path: &Path) -> Result<DynamicImage, AppError> {
    let read_error = |source| AppError::ReadInput {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .map_err(read_error)?
        .with_guessed_format()
        .map_err(read_error)?
        .decode()
        .map_err(AppError::ImageDecode)
}

pub async fn start_app(config: Config) -> Result<Outcome, AppError> {
    let app = match App::new(&config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to initialize workflow client: {:?}", e);
            return Err(e);
        }
    };

    app.run(&config.input.image_path).await
}
