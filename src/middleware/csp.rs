use crate::augment::{PolicyAugmenter, ResponseContext};
use crate::core::config::{AnalyticsConfig, AugmentMode, ConfigStore};
use crate::core::policy::CspPolicy;
use crate::monitoring::stats::CspStats;
use crate::security::nonce::{NonceToken, RequestNonce};
use crate::snippet::{DataLayer, PiwikSnippet};
use crate::utils::is_html;
use actix_web::{
    body::{to_bytes, BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    web::Data,
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::{rc::Rc, sync::Arc};

struct MiddlewareState {
    base_policy: CspPolicy,
    config: ConfigStore,
    augmenter: PolicyAugmenter,
}

/// Sends `base_policy`, extended for the analytics integration, with every
/// response.
///
/// Handlers describe the page through request extensions (see
/// [`CspExtensions`](crate::middleware::CspExtensions)): the [`DataLayer`]
/// pushed by the page and, when known, the nonce it was rendered with.
/// Without a known nonce the HTML body is buffered and scanned for it.
#[derive(Clone)]
pub struct CspAugmentMiddleware {
    state: Arc<MiddlewareState>,
}

impl CspAugmentMiddleware {
    pub fn new(base_policy: CspPolicy, config: ConfigStore, augmenter: PolicyAugmenter) -> Self {
        Self {
            state: Arc::new(MiddlewareState {
                base_policy,
                config,
                augmenter,
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &ConfigStore {
        &self.state.config
    }

    #[inline]
    pub fn stats(&self) -> &Arc<CspStats> {
        self.state.augmenter.stats()
    }
}

impl<S, B> Transform<S, ServiceRequest> for CspAugmentMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = CspAugmentMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CspAugmentMiddlewareService {
            service: Rc::new(service),
            state: self.state.clone(),
        }))
    }
}

pub struct CspAugmentMiddlewareService<S> {
    service: Rc<S>,
    state: Arc<MiddlewareState>,
}

impl<S, B> Service<ServiceRequest> for CspAugmentMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let state = self.state.clone();

        Box::pin(async move {
            let res = service.call(req).await?.map_into_boxed_body();

            let config = state.config.snapshot();
            let attachable = is_html(res.headers());
            let (nonce, data_layer) = {
                let extensions = res.request().extensions();
                (
                    extensions
                        .get::<RequestNonce>()
                        .cloned()
                        .map(NonceToken::from),
                    extensions.get::<DataLayer>().cloned(),
                )
            };

            let needs_body = attachable
                && nonce.is_none()
                && config.domain().is_some()
                && config.mode() == AugmentMode::NonceOnly;

            let (mut res, body) = if needs_body {
                let (req, res) = res.into_parts();
                let (res, body) = res.into_parts();
                let bytes = to_bytes(body).await.map_err(ErrorInternalServerError)?;
                let res = res.set_body(BoxBody::new(bytes.clone()));
                (ServiceResponse::new(req, res), Some(bytes))
            } else {
                (res, None)
            };
            let body_text = body.as_deref().map(String::from_utf8_lossy);

            let snippet = snippet_for(&config, data_layer);
            let mut context = ResponseContext::new(attachable);
            if let Some(snippet) = &snippet {
                context = context.with_snippets(snippet);
            }
            if let Some(body) = body_text.as_deref() {
                context = context.with_body(body);
            }
            if let Some(nonce) = &nonce {
                context = context.with_nonce(nonce);
            }

            let mut policy = state.base_policy.clone();
            if let Err(e) = state
                .augmenter
                .augment(&mut policy, &config, &context)
                .await
            {
                log::warn!("CSP augmentation failed, sending base policy: {}", e);
            }

            if !policy.is_empty() {
                match policy.header_value() {
                    Ok(value) => {
                        res.headers_mut().insert(policy.header_name(), value);
                    }
                    Err(e) => log::error!("Failed to serialize CSP header: {}", e),
                }
            }

            Ok(res)
        })
    }
}

fn snippet_for(config: &AnalyticsConfig, data_layer: Option<DataLayer>) -> Option<PiwikSnippet> {
    let data_layer = data_layer.unwrap_or_else(|| DataLayer::for_site(config));
    match PiwikSnippet::new(config, &data_layer) {
        Ok(snippet) => Some(snippet),
        Err(e) => {
            log::warn!("Failed to build analytics snippets: {}", e);
            None
        }
    }
}

/// Middleware for `policy` and a fixed analytics configuration.
pub fn csp_augment_middleware(policy: CspPolicy, config: AnalyticsConfig) -> CspAugmentMiddleware {
    CspAugmentMiddleware::new(policy, ConfigStore::new(config), PolicyAugmenter::new())
}

/// Shares `store` with handlers, which need the same settings to render the
/// snippets the middleware authorizes.
pub fn configure_csp(store: ConfigStore) -> impl FnOnce(&mut actix_web::web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(Data::new(store));
    }
}
