//! Typed HTTP client for the Pindrop gateway
//!
//! [`ApiClient`] keeps the current session and attaches its access token to
//! every authenticated call. Sign-up, sign-in and refresh open or replace the
//! session; sign-out and account deletion close it.

use std::sync::Arc;

use common::{
    geo::{BoundingBox, BoundsQuery},
    models::{
        AuthResponse, Circle, CreateCircleRequest, JoinCircleRequest, Member, MessageResponse,
        Pin, Profile, RefreshRequest, SessionTokens, SignInRequest, SignUpRequest,
        UpdateCircleRequest, UpdatePinRequest, UpdateProfileRequest,
    },
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub mod error;
pub mod form;
pub mod geofence;

pub use error::{ClientError, ClientResult};
pub use form::{MediaFile, NewPinForm};

trait WithAuth {
    fn with_auth(self, token: &SessionTokens) -> Self;
}

impl WithAuth for RequestBuilder {
    fn with_auth(self, token: &SessionTokens) -> Self {
        self.bearer_auth(&token.access_token)
    }
}

/// Client of the gateway API
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<RwLock<Option<SessionTokens>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Tokens of the open session
    pub async fn session(&self) -> Option<SessionTokens> {
        self.session.read().await.clone()
    }

    /// Resume a session stored elsewhere
    pub async fn set_session(&self, tokens: Option<SessionTokens>) {
        *self.session.write().await = tokens;
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api{}", self.base_url, path))
    }

    async fn authed(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let session = self.session.read().await;
        let tokens = session.as_ref().ok_or(ClientError::NotSignedIn)?;
        Ok(self.request(method, path).with_auth(tokens))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Gateway answered {}: {}", status, body);
            return Err(error::api_error(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }

    /// Send and keep the session carried by the answer
    async fn open_session(&self, request: RequestBuilder) -> ClientResult<AuthResponse> {
        let response: AuthResponse = self.send(request).await?;
        if let Some(tokens) = &response.session {
            self.set_session(Some(tokens.clone())).await;
        }
        Ok(response)
    }

    fn bounds(request: RequestBuilder, bbox: Option<BoundingBox>) -> RequestBuilder {
        match bbox {
            Some(bbox) => request.query(&BoundsQuery::from(bbox)),
            None => request,
        }
    }

    // Accounts

    pub async fn sign_up(&self, payload: &SignUpRequest) -> ClientResult<AuthResponse> {
        self.open_session(self.request(Method::POST, "/auths/signup").json(payload))
            .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let payload = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.open_session(self.request(Method::POST, "/auths/signin").json(&payload))
            .await
    }

    /// Replace the session using its refresh token
    pub async fn refresh(&self) -> ClientResult<AuthResponse> {
        let refresh_token = self
            .session()
            .await
            .map(|tokens| tokens.refresh_token)
            .ok_or(ClientError::NotSignedIn)?;
        self.open_session(
            self.request(Method::POST, "/auths/refresh")
                .json(&RefreshRequest { refresh_token }),
        )
        .await
    }

    pub async fn sign_out(&self) -> ClientResult<()> {
        let request = self.authed(Method::POST, "/auths/signout").await?;
        let _: MessageResponse = self.send(request).await?;
        self.set_session(None).await;
        Ok(())
    }

    pub async fn me(&self) -> ClientResult<AuthResponse> {
        let request = self.authed(Method::GET, "/auths/me").await?;
        self.send(request).await
    }

    pub async fn delete_account(&self) -> ClientResult<()> {
        let request = self.authed(Method::DELETE, "/auths/user").await?;
        let _: MessageResponse = self.send(request).await?;
        self.set_session(None).await;
        Ok(())
    }

    // Profiles

    pub async fn profile(&self) -> ClientResult<Profile> {
        let request = self.authed(Method::GET, "/profiles").await?;
        self.send(request).await
    }

    pub async fn profile_by_id(&self, id: Uuid) -> ClientResult<Profile> {
        let request = self.authed(Method::GET, &format!("/profiles/{}", id)).await?;
        self.send(request).await
    }

    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> ClientResult<Profile> {
        let request = self.authed(Method::PUT, "/profiles").await?.json(update);
        self.send(request).await
    }

    pub async fn upload_avatar(&self, file: &MediaFile) -> ClientResult<Profile> {
        let request = self
            .authed(Method::POST, "/profiles/avatar")
            .await?
            .multipart(form::avatar_form(file)?);
        self.send(request).await
    }

    // Circles

    pub async fn circles(&self) -> ClientResult<Vec<Circle>> {
        let request = self.authed(Method::GET, "/circles").await?;
        self.send(request).await
    }

    pub async fn discover_circles(&self) -> ClientResult<Vec<Circle>> {
        let request = self.authed(Method::GET, "/circles/discover").await?;
        self.send(request).await
    }

    pub async fn create_circle(&self, payload: &CreateCircleRequest) -> ClientResult<Circle> {
        let request = self.authed(Method::POST, "/circles").await?.json(payload);
        self.send(request).await
    }

    pub async fn circle(&self, id: Uuid) -> ClientResult<Circle> {
        let request = self.authed(Method::GET, &format!("/circles/{}", id)).await?;
        self.send(request).await
    }

    pub async fn update_circle(&self, id: Uuid, update: &UpdateCircleRequest) -> ClientResult<Circle> {
        let request = self
            .authed(Method::PUT, &format!("/circles/{}", id))
            .await?
            .json(update);
        self.send(request).await
    }

    pub async fn delete_circle(&self, id: Uuid) -> ClientResult<()> {
        let request = self.authed(Method::DELETE, &format!("/circles/{}", id)).await?;
        let _: MessageResponse = self.send(request).await?;
        Ok(())
    }

    pub async fn rotate_access_code(&self, id: Uuid) -> ClientResult<Circle> {
        let request = self
            .authed(Method::POST, &format!("/circles/{}/access-code", id))
            .await?;
        self.send(request).await
    }

    pub async fn members(&self, id: Uuid) -> ClientResult<Vec<Member>> {
        let request = self
            .authed(Method::GET, &format!("/circles/{}/members", id))
            .await?;
        self.send(request).await
    }

    pub async fn join_circle(&self, id: Uuid, access_code: &str) -> ClientResult<Member> {
        let request = self
            .authed(Method::POST, &format!("/circles/{}/members", id))
            .await?
            .json(&JoinCircleRequest {
                access_code: access_code.to_string(),
            });
        self.send(request).await
    }

    pub async fn join_by_code(&self, access_code: &str) -> ClientResult<Circle> {
        let request = self
            .authed(Method::POST, "/circles/join")
            .await?
            .json(&JoinCircleRequest {
                access_code: access_code.to_string(),
            });
        self.send(request).await
    }

    pub async fn remove_member(&self, id: Uuid, user_id: Uuid) -> ClientResult<()> {
        let request = self
            .authed(Method::DELETE, &format!("/circles/{}/members/{}", id, user_id))
            .await?;
        let _: MessageResponse = self.send(request).await?;
        Ok(())
    }

    // Pins

    pub async fn public_pins(&self, bbox: Option<BoundingBox>) -> ClientResult<Vec<Pin>> {
        let request = Self::bounds(self.request(Method::GET, "/pins"), bbox);
        self.send(request).await
    }

    pub async fn public_pin(&self, id: Uuid) -> ClientResult<Pin> {
        self.send(self.request(Method::GET, &format!("/pins/{}", id)))
            .await
    }

    /// Own, public and circle-shared pins
    pub async fn visible_pins(&self, bbox: Option<BoundingBox>) -> ClientResult<Vec<Pin>> {
        let request = Self::bounds(self.authed(Method::GET, "/pins/user").await?, bbox);
        self.send(request).await
    }

    pub async fn my_pins(&self) -> ClientResult<Vec<Pin>> {
        let request = self.authed(Method::GET, "/pins/user/mine").await?;
        self.send(request).await
    }

    pub async fn pin(&self, id: Uuid) -> ClientResult<Pin> {
        let request = self.authed(Method::GET, &format!("/pins/user/{}", id)).await?;
        self.send(request).await
    }

    pub async fn create_pin(&self, pin: NewPinForm) -> ClientResult<Pin> {
        let form = pin.into_multipart()?;
        let request = self
            .authed(Method::POST, "/pins/user")
            .await?
            .multipart(form);
        self.send(request).await
    }

    pub async fn update_pin(&self, id: Uuid, update: &UpdatePinRequest) -> ClientResult<Pin> {
        let request = self
            .authed(Method::PUT, &format!("/pins/user/{}", id))
            .await?
            .json(update);
        self.send(request).await
    }

    pub async fn delete_pin(&self, id: Uuid) -> ClientResult<()> {
        let request = self
            .authed(Method::DELETE, &format!("/pins/user/{}", id))
            .await?;
        let _: MessageResponse = self.send(request).await?;
        Ok(())
    }
}
