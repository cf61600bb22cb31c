//! Lemmy integration -- v3 HTTP API client.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{
    AllowList, CommunityId, Creator, FeatureType, Platform, Post, PostEvent, PostId,
};
use crate::error::PlatformError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct LoginResponse {
    jwt: Option<String>,
}

#[derive(Deserialize)]
struct ApiCommunity {
    id: i64,
}

#[derive(Deserialize)]
struct CommunityView {
    community: ApiCommunity,
}

#[derive(Deserialize)]
struct GetCommunityResponse {
    community_view: CommunityView,
}

#[derive(Deserialize)]
struct ApiPost {
    id: i64,
    name: String,
    community_id: i64,
    #[serde(default)]
    featured_community: bool,
}

#[derive(Deserialize)]
struct ApiPerson {
    name: String,
}

#[derive(Deserialize)]
struct PostView {
    post: ApiPost,
    creator: ApiPerson,
}

#[derive(Deserialize)]
struct PostResponse {
    post_view: PostView,
}

#[derive(Deserialize)]
struct GetPostsResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl From<PostView> for PostEvent {
    fn from(view: PostView) -> Self {
        PostEvent {
            post: Post {
                id: PostId(view.post.id),
                name: view.post.name,
                community_id: CommunityId(view.post.community_id),
                featured_community: view.post.featured_community,
            },
            creator: Creator {
                name: view.creator.name,
            },
        }
    }
}

/// Client for one Lemmy instance, scoped to a federation allow-list.
pub struct LemmyClient {
    base: Url,
    http_client: Client,
    jwt: RwLock<Option<String>>,
    allow_list: AllowList,
}

impl LemmyClient {
    /// Create a client for `instance`.
    ///
    /// A bare host such as `programming.dev` is served over https; a value
    /// carrying its own scheme is used as-is.
    pub fn new(instance: &str, allow_list: AllowList) -> Result<Self, PlatformError> {
        let raw = if instance.contains("://") {
            instance.to_string()
        } else {
            format!("https://{instance}")
        };
        let base = Url::parse(&raw)?;

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("featurebot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base,
            http_client,
            jwt: RwLock::new(None),
            allow_list,
        })
    }

    pub fn instance(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn is_authenticated(&self) -> bool {
        self.jwt.read().map(|jwt| jwt.is_some()).unwrap_or(false)
    }

    /// Log in and keep the session token for later calls.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), PlatformError> {
        let body = json!({
            "username_or_email": username,
            "password": password,
        });

        let resp = self
            .http_client
            .post(self.endpoint("user/login")?)
            .json(&body)
            .send()
            .await?;
        let login: LoginResponse = read_json(resp).await?;
        let token = login.jwt.ok_or(PlatformError::MissingField("jwt"))?;

        if let Ok(mut jwt) = self.jwt.write() {
            *jwt = Some(token);
        }
        tracing::info!(instance = self.instance(), user = username, "logged in");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, PlatformError> {
        Ok(self.base.join(&format!("api/v3/{path}"))?)
    }

    fn token(&self) -> Result<String, PlatformError> {
        self.jwt
            .read()
            .ok()
            .and_then(|jwt| jwt.clone())
            .ok_or_else(|| PlatformError::NotAuthenticated {
                instance: self.instance().to_string(),
            })
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder, PlatformError> {
        Ok(request.bearer_auth(self.token()?))
    }

    fn maybe_authed(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Ok(token) => request.bearer_auth(token),
            Err(_) => request,
        }
    }
}

/// Decode a success body, or turn the status and error body into a
/// [`PlatformError::Api`].
async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(PlatformError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Platform for LemmyClient {
    async fn resolve_community_id(
        &self,
        name: &str,
        instance: &str,
    ) -> Result<CommunityId, PlatformError> {
        if !self.allow_list.allows(name, instance) {
            return Err(PlatformError::NotAllowed {
                community: name.to_string(),
                instance: instance.to_string(),
            });
        }

        let request = self
            .http_client
            .get(self.endpoint("community")?)
            .query(&[("name", format!("{name}@{instance}"))]);
        let resp = self.maybe_authed(request).send().await?;
        let community: GetCommunityResponse = read_json(resp).await?;

        Ok(CommunityId(community.community_view.community.id))
    }

    async fn create_post(
        &self,
        name: &str,
        body: &str,
        community_id: CommunityId,
    ) -> Result<Post, PlatformError> {
        let payload = json!({
            "name": name,
            "body": body,
            "community_id": community_id.0,
        });

        let request = self.http_client.post(self.endpoint("post")?).json(&payload);
        let resp = self.authed(request)?.send().await?;
        let created: PostResponse = read_json(resp).await?;

        Ok(PostEvent::from(created.post_view).post)
    }

    async fn set_featured(
        &self,
        post_id: PostId,
        feature_type: FeatureType,
        featured: bool,
    ) -> Result<(), PlatformError> {
        let payload = json!({
            "post_id": post_id.0,
            "featured": featured,
            "feature_type": feature_type.as_str(),
        });

        let request = self
            .http_client
            .post(self.endpoint("post/feature")?)
            .json(&payload);
        let resp = self.authed(request)?.send().await?;
        let _: PostResponse = read_json(resp).await?;
        Ok(())
    }

    async fn list_new_posts(
        &self,
        community_id: CommunityId,
        limit: u32,
    ) -> Result<Vec<PostEvent>, PlatformError> {
        let request = self.http_client.get(self.endpoint("post/list")?).query(&[
            ("community_id", community_id.0.to_string()),
            ("sort", "New".to_string()),
            ("limit", limit.to_string()),
        ]);
        let resp = self.maybe_authed(request).send().await?;
        let listing: GetPostsResponse = read_json(resp).await?;

        Ok(listing.posts.into_iter().map(PostEvent::from).collect())
    }
}
