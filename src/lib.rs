mod annotator;
mod bounding_box;
mod font;
mod prediction;
mod workflow_client;

pub mod app;
pub mod config;

pub use annotator::{AnnotationStyle, Annotator};
pub use app::{load_image, start_app, App, AppError, Outcome};
pub use bounding_box::BoundingBox;
pub use font::{FontError, LabelFont, TextMetrics};
pub use prediction::{best_prediction, walk, Node, Prediction, Visitor};
pub use workflow_client::{encode_image, WorkflowClient, WorkflowClientError, WorkflowRequest};
