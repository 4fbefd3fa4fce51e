use crate::security::nonce::RequestNonce;
use crate::snippet::DataLayer;
use actix_web::HttpMessage;

/// Request-scoped inputs of [`CspAugmentMiddleware`](crate::middleware::CspAugmentMiddleware).
pub trait CspExtensions {
    /// Nonce the page was rendered with, if a handler recorded one.
    fn analytics_nonce(&self) -> Option<String>;
    fn set_analytics_nonce(&self, nonce: impl Into<String>);
    fn set_data_layer(&self, data_layer: DataLayer);
}

impl<T> CspExtensions for T
where
    T: HttpMessage,
{
    fn analytics_nonce(&self) -> Option<String> {
        self.extensions()
            .get::<RequestNonce>()
            .map(|nonce| nonce.0.clone())
    }

    fn set_analytics_nonce(&self, nonce: impl Into<String>) {
        self.extensions_mut().insert(RequestNonce(nonce.into()));
    }

    fn set_data_layer(&self, data_layer: DataLayer) {
        self.extensions_mut().insert(data_layer);
    }
}
