use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::app::session::Session;
use crate::config::ClientConfig;
use crate::domain::engagement::{Comment, CommentId};
use crate::domain::gallery::{FeedPage, GalleryId, GalleryItem};
use crate::http::wire::{self, CommentRequest};
use crate::http::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Remote operations the feed engine depends on.
#[async_trait]
pub trait GalleryApi: Send + Sync {
    /// Pages are 1-based and must be served in a stable order across calls.
    async fn fetch_gallery_page(&self, page: u32, page_size: usize) -> Result<FeedPage, ApiError>;

    async fn fetch_gallery_detail(&self, id: GalleryId) -> Result<GalleryItem, ApiError>;

    /// Flips the viewer's like on the server. Each call toggles once.
    async fn toggle_like(&self, id: GalleryId) -> Result<(), ApiError>;

    async fn submit_comment(
        &self,
        id: GalleryId,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, ApiError>;
}

#[derive(Clone)]
pub struct HttpGalleryApi {
    client: Client,
    base_url: Url,
    session: Session,
}

impl HttpGalleryApi {
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .context("failed to build http client")?;
        Self::with_client(client, &config.api_base_url, session)
    }

    pub fn with_client(client: Client, base_url: &str, session: Session) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with a slash.
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base_url = Url::parse(&normalized).context("invalid api base url")?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.base_url.join(path)?;

        let request_id = Uuid::new_v4();
        debug!(%method, %url, %request_id, "gallery api request");

        let mut builder = self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response: Response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl GalleryApi for HttpGalleryApi {
    async fn fetch_gallery_page(&self, page: u32, page_size: usize) -> Result<FeedPage, ApiError> {
        let builder = self
            .request(Method::GET, "galleries")?
            .query(&[("page", page.to_string()), ("limit", page_size.to_string())]);
        let body = self.send(builder).await?;
        Ok(wire::parse_gallery_page(&body, page_size)?)
    }

    async fn fetch_gallery_detail(&self, id: GalleryId) -> Result<GalleryItem, ApiError> {
        let builder = self.request(Method::GET, &format!("galleries/{}", id))?;
        let body = self.send(builder).await?;
        Ok(wire::parse_gallery(&body)?)
    }

    async fn toggle_like(&self, id: GalleryId) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &format!("galleries/{}/like", id))?;
        self.send(builder).await?;
        Ok(())
    }

    async fn submit_comment(
        &self,
        id: GalleryId,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, ApiError> {
        let payload = CommentRequest {
            content,
            parent_id: parent_id.map(|parent| parent.0),
        };
        let builder = self
            .request(Method::POST, &format!("galleries/{}/comments", id))?
            .json(&payload);
        let body = self.send(builder).await?;
        Ok(wire::parse_comment(&body)?)
    }
}
