//! Shared-token middleware for Actix Web.
//!
//! Callers authenticate by sending a pre-shared token in a request header. The gateway sends its callback token in
//! `x-callback-token` with every webhook, and operator tooling sends the API token in `x-api-token`.
//!
//! A request whose header is missing, or does not match, is refused with `401 Unauthorized` before it reaches the
//! handler. If no token has been configured, every request is refused.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use recon_common::Secret;

use crate::errors::ServerError;

pub struct TokenAuthMiddlewareFactory {
    header: String,
    token: Secret<String>,
}

impl TokenAuthMiddlewareFactory {
    pub fn new(header: &str, token: Secret<String>) -> Self {
        TokenAuthMiddlewareFactory { header: header.into(), token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = TokenAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenAuthMiddlewareService {
            header: self.header.clone(),
            token: self.token.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct TokenAuthMiddlewareService<S> {
    header: String,
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TokenAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorized = self.is_authorized(&req);
        Box::pin(async move {
            if authorized {
                trace!("🔐️ Token check for {} ✅️", req.path());
                service.call(req).await
            } else {
                Err(ServerError::Unauthorized.into())
            }
        })
    }
}

impl<S> TokenAuthMiddlewareService<S> {
    fn is_authorized(&self, req: &ServiceRequest) -> bool {
        if self.token.is_empty() {
            warn!("🔐️ No token is configured for {}. Denying access to {}.", self.header, req.path());
            return false;
        }
        match req.headers().get(&self.header).and_then(|v| v.to_str().ok()) {
            Some(presented) if self.token.matches(presented) => true,
            Some(_) => {
                warn!("🔐️ Invalid {} presented for {}. Denying access.", self.header, req.path());
                false
            },
            None => {
                warn!("🔐️ No {} header found in request for {}. Denying access.", self.header, req.path());
                false
            },
        }
    }
}
