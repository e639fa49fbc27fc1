use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

use super::{AvatarUploader, FileAvatarUploader, ProfileSource, UserProfile};

pub const PROFILE_GET: &str = "users.profile.get";
pub const SET_PHOTO: &str = "users.setPhoto";

const UPLOAD_FILE_NAME: &str = "pfp.png";

#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    real_name: String,
    #[serde(default)]
    real_name_normalized: String,
    #[serde(default)]
    image_original: Option<String>,
    #[serde(default)]
    image_1024: Option<String>,
    #[serde(default)]
    image_512: Option<String>,
    #[serde(default)]
    image_192: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Empty {}

/// Slack Web API client covering the two methods the rotator uses
#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    token: String,
    base_url: String,
}

impl SlackClient {
    pub fn new(token: &str, base_url: &str, timeout: Option<Duration>) -> AppResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// GET users.profile.get
    pub async fn get_profile(&self, user_id: &str) -> AppResult<UserProfile> {
        let response = self
            .client
            .get(self.url(PROFILE_GET))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await?;

        let body: ProfileBody = self.handle_response(PROFILE_GET, response).await?;
        let profile = body
            .profile
            .ok_or_else(|| AppError::not_found(&format!("profile for user {}", user_id)))?;

        profile_from_slack(user_id, profile)
    }

    /// POST users.setPhoto with the image as multipart field `image`
    pub async fn set_photo(&self, image: Vec<u8>) -> AppResult<()> {
        let size = image.len();
        let part = multipart::Part::bytes(image)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("image/png")?;
        let form = multipart::Form::new().part("image", part);

        log::debug!("Uploading {} bytes to {}", size, SET_PHOTO);

        let response = self
            .client
            .post(self.url(SET_PHOTO))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let _: Empty = self.handle_response(SET_PHOTO, response).await?;
        Ok(())
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let url = response.url().to_string();
        let text = response.text().await?;

        log::debug!(
            "Slack {} response (first 300 chars): {}",
            method,
            &text[..floor_char_boundary(&text, 300)]
        );

        if !status.is_success() {
            if status.as_u16() == 429 {
                log::warn!("Slack rate limited {}", method);
            }
            return Err(AppError::http_status(&url, status.as_u16()));
        }

        let envelope: SlackEnvelope<T> = serde_json::from_str(&text)?;
        if !envelope.ok {
            let code = envelope.error.as_deref().unwrap_or("unknown_error");
            return Err(classify_slack_error(method, code));
        }

        Ok(envelope.body)
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

fn profile_from_slack(user_id: &str, profile: SlackProfile) -> AppResult<UserProfile> {
    let avatar_url = match profile.image_original {
        Some(url) if !url.is_empty() => url,
        _ => {
            // No custom avatar uploaded, Slack only serves scaled copies
            let fallback = [profile.image_1024, profile.image_512, profile.image_192]
                .into_iter()
                .flatten()
                .find(|url| !url.is_empty())
                .ok_or_else(|| AppError::not_found(&format!("avatar for user {}", user_id)))?;
            log::warn!(
                "User {} has no original avatar, using scaled copy {}",
                user_id,
                fallback
            );
            fallback
        }
    };

    let real_name = if profile.real_name_normalized.is_empty() {
        profile.real_name
    } else {
        profile.real_name_normalized
    };

    let display_name = if profile.display_name.is_empty() {
        real_name.clone()
    } else {
        profile.display_name
    };

    Ok(UserProfile {
        display_name,
        real_name,
        avatar_url,
    })
}

/// Map a Slack `error` code onto the crate's error taxonomy
pub fn classify_slack_error(method: &str, code: &str) -> AppError {
    match code {
        "not_authed"
        | "invalid_auth"
        | "account_inactive"
        | "token_revoked"
        | "token_expired"
        | "no_permission"
        | "missing_scope"
        | "not_allowed_token_type" => AppError::auth(method, code),
        "user_not_found" | "user_not_visible" => AppError::not_found(&format!("user ({})", code)),
        _ if method == SET_PHOTO => AppError::upload_failed(code),
        _ => AppError::slack_api(method, code),
    }
}

#[async_trait]
impl ProfileSource for SlackClient {
    async fn get_user_profile(&self, user_id: &str) -> AppResult<UserProfile> {
        self.get_profile(user_id).await
    }
}

#[async_trait]
impl AvatarUploader for SlackClient {
    // users.setPhoto always targets the token owner
    async fn set_avatar(&self, user_id: &str, image: Vec<u8>) -> AppResult<()> {
        log::debug!("Setting photo for {} via token owner", user_id);
        self.set_photo(image).await
    }
}

#[async_trait]
impl FileAvatarUploader for SlackClient {
    async fn set_avatar_from_file(&self, user_id: &str, path: &Path) -> AppResult<()> {
        let image = tokio::fs::read(path).await?;
        log::debug!(
            "Read {} bytes from {} for {}",
            image.len(),
            path.display(),
            user_id
        );
        self.set_photo(image).await
    }
}
