use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::image_processor::{self, ImageInfo};

use super::{
    AvatarUploader, FileShimUploader, HttpImageFetcher, ImageFetcher, ProfileSource, SlackClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    GetProfile,
    FetchImage,
    RotateImage,
    UploadImage,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::GetProfile => "get user profile",
            PipelineStep::FetchImage => "get user image",
            PipelineStep::RotateImage => "rotate image",
            PipelineStep::UploadImage => "set user photo",
        };
        f.write_str(name)
    }
}

/// A cycle failure together with the step it happened in
#[derive(Debug, thiserror::Error)]
#[error("Failed to {step}: {error}")]
pub struct StepFailure {
    pub step: PipelineStep,
    #[source]
    pub error: AppError,
}

impl StepFailure {
    fn at(step: PipelineStep) -> impl FnOnce(AppError) -> StepFailure {
        move |error| StepFailure { step, error }
    }
}

/// Summary of one successful cycle, only ever logged
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub display_name: String,
    pub original: ImageInfo,
    pub rotated: ImageInfo,
    pub uploaded_bytes: usize,
    pub completed_at: DateTime<Utc>,
}

pub struct Pipeline {
    profiles: Box<dyn ProfileSource>,
    images: Box<dyn ImageFetcher>,
    uploader: Box<dyn AvatarUploader>,
    user_id: String,
}

impl Pipeline {
    pub fn new(
        profiles: Box<dyn ProfileSource>,
        images: Box<dyn ImageFetcher>,
        uploader: Box<dyn AvatarUploader>,
        user_id: &str,
    ) -> Self {
        Self {
            profiles,
            images,
            uploader,
            user_id: user_id.to_string(),
        }
    }

    /// Wire the Slack and HTTP adapters; goes through the file shim when a
    /// shim path is configured.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let slack = SlackClient::new(
            &config.slack_token,
            &config.api_base_url,
            config.http_timeout,
        )?;
        let images = HttpImageFetcher::new(config.http_timeout)?;

        let uploader: Box<dyn AvatarUploader> = match &config.shim_path {
            Some(path) => {
                log::info!("Uploading through transport file {}", path.display());
                Box::new(FileShimUploader::new(slack.clone(), path.clone()))
            }
            None => Box::new(slack.clone()),
        };

        Ok(Self::new(
            Box::new(slack),
            Box::new(images),
            uploader,
            &config.slack_user_id,
        ))
    }

    /// Fetch profile, fetch avatar, rotate, upload. Stops at the first
    /// failing step; nothing after it runs.
    pub async fn run_cycle(&self) -> Result<CycleReport, StepFailure> {
        let cycle_id = Uuid::new_v4();
        log::debug!("Starting cycle {}", cycle_id);

        let profile = self
            .profiles
            .get_user_profile(&self.user_id)
            .await
            .map_err(StepFailure::at(PipelineStep::GetProfile))?;
        log::info!("Got user profile: {}", profile.real_name);

        let original = self
            .images
            .fetch_image(&profile.avatar_url)
            .await
            .map_err(StepFailure::at(PipelineStep::FetchImage))?;

        let original_info = image_processor::image_info(&original)
            .map_err(StepFailure::at(PipelineStep::RotateImage))?;
        let rotated = image_processor::rotate_clockwise(&original)
            .map_err(StepFailure::at(PipelineStep::RotateImage))?;
        let rotated_info = image_processor::image_info(&rotated)
            .map_err(StepFailure::at(PipelineStep::RotateImage))?;

        log::debug!(
            "Rotated {}x{} {:?} into {}x{} PNG",
            original_info.width,
            original_info.height,
            original_info.format,
            rotated_info.width,
            rotated_info.height
        );

        let uploaded_bytes = rotated.len();
        self.uploader
            .set_avatar(&self.user_id, rotated)
            .await
            .map_err(StepFailure::at(PipelineStep::UploadImage))?;

        log::info!("Successfully set user photo");

        Ok(CycleReport {
            cycle_id,
            display_name: profile.display_name,
            original: original_info,
            rotated: rotated_info,
            uploaded_bytes,
            completed_at: Utc::now(),
        })
    }
}
