// Rotator module - the fetch/rotate/upload pipeline and the loop driving it
//
// The pipeline only talks to the outside world through the capability
// traits below, so each external API can be swapped for another adapter.

pub mod file_shim;
pub mod image_fetcher;
pub mod pipeline;
pub mod policy;
pub mod scheduler;
pub mod slack_client;

use async_trait::async_trait;
use std::path::Path;

use crate::errors::AppResult;

pub use file_shim::FileShimUploader;
pub use image_fetcher::HttpImageFetcher;
pub use pipeline::{CycleReport, Pipeline, PipelineStep, StepFailure};
pub use policy::{Decision, FailurePolicy};
pub use scheduler::{
    shutdown_channel, PollScheduler, SchedulerOutcome, ShutdownHandle, ShutdownSignal,
};
pub use slack_client::SlackClient;

/// What the pipeline needs to know about the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
    pub real_name: String,
    /// Full-resolution avatar
    pub avatar_url: String,
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn get_user_profile(&self, user_id: &str) -> AppResult<UserProfile>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> AppResult<Vec<u8>>;
}

#[async_trait]
pub trait AvatarUploader: Send + Sync {
    async fn set_avatar(&self, user_id: &str, image: Vec<u8>) -> AppResult<()>;
}

/// For APIs that insist on reading the new avatar from disk
#[async_trait]
pub trait FileAvatarUploader: Send + Sync {
    async fn set_avatar_from_file(&self, user_id: &str, path: &Path) -> AppResult<()>;
}
