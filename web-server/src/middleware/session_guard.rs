// web-server/src/middleware/session_guard.rs
use std::rc::Rc;

use actix::Addr;
use actix_web::body::EitherBody;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpResponse};
use common::models::session::SessionResult;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde_json::json;
use vts_client::{GuardOutcome, RouteGuard};

use crate::client_registry::{ClientRegistryActor, GetClientSession, RegisterAnonymousClient, RegistryIdentityStore};
use crate::error::ApiError;

pub const SESSION_COOKIE_NAME: &str = "vts_session";

// Reachable without a session: the login callback and the SPA's static assets
const PUBLIC_PREFIXES: &[&str] = &["/auth/", "/assets/", "/favicon.ico"];

pub fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Global navigation guard.
///
/// Every non-public request gets a browser session (issued on first contact)
/// and runs through [`RouteGuard::before_each`]. Until the session carries an
/// identity nothing renders: pages are redirected to the identity provider and
/// API calls get `401` with the login URL. Once resolved, the identity is put
/// in the request extensions for the handler.
#[derive(Clone)]
pub struct SessionGuard {
    guard: RouteGuard<RegistryIdentityStore>,
    registry: Addr<ClientRegistryActor>,
    secure_cookies: bool,
    cookie_max_age: i64,
}

impl SessionGuard {
    pub fn new(
        guard: RouteGuard<RegistryIdentityStore>,
        registry: Addr<ClientRegistryActor>,
        secure_cookies: bool,
        cookie_max_age: i64,
    ) -> Self {
        Self {
            guard,
            registry,
            secure_cookies,
            cookie_max_age,
        }
    }

    fn session_cookie(&self, token: String) -> Cookie<'static> {
        // Lax, not Strict: the cookie has to survive the top-level redirect back from the provider
        Cookie::build(SESSION_COOKIE_NAME, token)
            .path("/")
            .secure(self.secure_cookies)
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(self.cookie_max_age))
            .finish()
    }

    /// Session token for this browser, registering a new session when the
    /// cookie is missing or stale. The cookie is returned when one was issued.
    async fn resolve_session(&self, presented: Option<String>) -> Result<(String, Option<Cookie<'static>>), ApiError> {
        if let Some(session_token) = presented {
            if let SessionResult::Success(session) = self.registry.send(GetClientSession { session_token }).await? {
                return Ok((session.session_token, None));
            }
            tracing::debug!("Presented session is unknown or expired, issuing a new one");
        }

        let (client_id, token) = self.registry.send(RegisterAnonymousClient).await?;
        tracing::debug!("Issued session cookie for client {}", client_id);
        let cookie = self.session_cookie(token.clone());
        Ok((token, Some(cookie)))
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionGuardMiddleware {
            service: Rc::new(service),
            settings: Rc::new(self.clone()),
        }))
    }
}

pub struct SessionGuardMiddleware<S> {
    service: Rc<S>,
    settings: Rc<SessionGuard>,
}

impl<S, B> Service<ServiceRequest> for SessionGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let service = Rc::clone(&self.service);
        let settings = Rc::clone(&self.settings);

        Box::pin(async move {
            let presented = req.cookie(SESSION_COOKIE_NAME).map(|c| c.value().to_string());
            let (token, issued) = settings.resolve_session(presented).await?;

            // A login started by a data call returns the browser to the app, not to raw JSON
            let api_call = req.path().starts_with("/api/");
            let target = match req.uri().path_and_query() {
                Some(p) if !api_call => p.as_str().to_string(),
                _ if api_call => "/".to_string(),
                _ => req.path().to_string(),
            };

            match settings.guard.before_each(&token, &target).await.map_err(ApiError::from)? {
                GuardOutcome::Proceed(identity) => {
                    req.extensions_mut().insert(identity);
                    let mut res = service.call(req).await?;
                    if let Some(cookie) = issued {
                        if let Err(e) = res.response_mut().add_cookie(&cookie) {
                            tracing::warn!("Failed to set session cookie: {}", e);
                        }
                    }
                    Ok(res.map_into_left_body())
                }
                GuardOutcome::Redirect(login) => {
                    let mut response = if api_call {
                        HttpResponse::Unauthorized().json(json!({
                            "error": "login required",
                            "kind": "auth",
                            "login_url": login.redirect_url.as_str(),
                        }))
                    } else {
                        HttpResponse::Found()
                            .insert_header((header::LOCATION, login.redirect_url.as_str()))
                            .finish()
                    };
                    if let Some(cookie) = issued {
                        if let Err(e) = response.add_cookie(&cookie) {
                            tracing::warn!("Failed to set session cookie: {}", e);
                        }
                    }
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
