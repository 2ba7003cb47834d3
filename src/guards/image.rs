use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{retry_with, Attempt, GenerationBatch, RetryPolicy};
use crate::types::Category;
use crate::{PipelineError, Result, TARGET_WEB_REQUEST};

/// A representative image and the attribution it must be shown with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedImage {
    pub url: String,
    pub credit: String,
}

/// Anything that can suggest an image for a topic.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// `Ok(None)` means the source had nothing for this topic.
    async fn find_image(&self, topic: &str, category: Category) -> Result<Option<SourcedImage>>;
}

/// Asks `source` for an image no other article in this batch uses.
///
/// Collisions are retried per `policy`. An empty answer or an upstream error
/// ends the search: the article goes ahead without an image.
pub async fn acquire_unique_image(
    source: &dyn ImageSource,
    topic: &str,
    category: Category,
    batch: &mut GenerationBatch,
    policy: &RetryPolicy,
) -> Option<SourcedImage> {
    let claimed = batch.claimed_images();
    let found = retry_with(policy, |attempt| async move {
        match source.find_image(topic, category).await {
            Ok(Some(image)) if claimed.contains(&image.url) => {
                debug!(target: TARGET_WEB_REQUEST, "Image {} already used in this batch (attempt {}/{})", image.url, attempt, policy.max_attempts);
                Attempt::Retry
            }
            Ok(Some(image)) => Attempt::Done(image),
            Ok(None) => {
                debug!(target: TARGET_WEB_REQUEST, "No image found for topic '{}'", topic);
                Attempt::GiveUp
            }
            Err(e) => {
                warn!(target: TARGET_WEB_REQUEST, "Image source failed for topic '{}': {}", topic, e);
                Attempt::GiveUp
            }
        }
    })
    .await;

    match found {
        Some(image) => {
            batch.claim_image(image.url.clone());
            Some(image)
        }
        None => {
            info!(target: TARGET_WEB_REQUEST, "Proceeding without image for topic '{}'", topic);
            None
        }
    }
}

/// Absolute http(s) URL in normalized form, so claimed URLs compare reliably.
pub fn usable_image_url(raw: &str) -> Option<String> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Some(url.to_string())
        }
        _ => None,
    }
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
    user: UnsplashUser,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    regular: String,
}

#[derive(Deserialize)]
struct UnsplashUser {
    name: String,
}

/// Random landscape photo from the Unsplash API.
pub struct UnsplashImageSource {
    client: Client,
    endpoint: String,
    access_key: String,
}

impl UnsplashImageSource {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.unsplash.com/photos/random";

    pub fn new(client: Client, endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            access_key: access_key.into(),
        }
    }

    pub fn from_env(client: Client) -> Result<Self> {
        let access_key = std::env::var("IMAGE_SOURCE_ACCESS_KEY")
            .map_err(|_| PipelineError::Config("IMAGE_SOURCE_ACCESS_KEY is not set".into()))?;
        let endpoint = std::env::var("IMAGE_SOURCE_ENDPOINT")
            .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        Ok(Self::new(client, endpoint, access_key))
    }
}

#[async_trait]
impl ImageSource for UnsplashImageSource {
    async fn find_image(&self, topic: &str, category: Category) -> Result<Option<SourcedImage>> {
        let query = format!("{} {}", topic, category);
        debug!(target: TARGET_WEB_REQUEST, "Requesting image for '{}'", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query.as_str()), ("orientation", "landscape")])
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PipelineError::Upstream {
                service: "image source",
                message: format!("status {}", response.status()),
            });
        }

        let photo: UnsplashPhoto = response.json().await?;
        let url = usable_image_url(&photo.urls.regular).ok_or_else(|| PipelineError::Upstream {
            service: "image source",
            message: format!("unusable image url {:?}", photo.urls.regular),
        })?;
        Ok(Some(SourcedImage {
            url,
            credit: format!("Photo by {} on Unsplash", photo.user.name),
        }))
    }
}
