//! The HTTP server: routing, authorization and logging of requests.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::Method;
use log::{error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::commons::error::Error;
use crate::daemon::config::Config;
use crate::daemon::endpoints;
use crate::server::CaRegistry;
use super::auth::Authorizer;
use super::request::{BodyLimits, HyperRequest, PathIter, Request};
use super::response::{HttpResponse, HyperResponse};


//------------ HttpServer ----------------------------------------------------

#[derive(Debug)]
pub struct HttpServer {
    registry: Arc<CaRegistry>,
    authorizer: Authorizer,
    limits: BodyLimits,
}

impl HttpServer {
    pub fn new(registry: Arc<CaRegistry>, config: &Config) -> Arc<Self> {
        Arc::new(HttpServer {
            registry,
            authorizer: Authorizer::new(&config.api_key),
            limits: BodyLimits::from_config(config),
        })
    }

    /// Handles a single request. Never fails: errors become responses.
    pub async fn process_request(
        &self,
        request: HyperRequest,
    ) -> Result<HyperResponse, Infallible> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let request = Request::new(request, self.limits);
        let response = self.dispatch(request).await.unwrap_or_else(|response| response);

        log_response(&method, &path, &response);
        Ok(response.into_hyper())
    }

    async fn dispatch(&self, request: Request) -> Result<HttpResponse, HttpResponse> {
        let path = request.path();
        let mut path = path.iter().strip_trailing_slash();

        match path.next() {
            Some("health") => health(request, path),
            Some("crypto") => match path.next() {
                Some("ca") => self.api_call(request, path, endpoints::create_ca).await,
                Some("csr") => self.api_call(request, path, endpoints::sign_csr).await,
                Some("validate") => self.api_call(request, path, endpoints::validate).await,
                Some("certs") => {
                    self.api_call(request, path, endpoints::list_certificates).await
                }
                _ => Err(HttpResponse::not_found()),
            },
            _ => Err(HttpResponse::not_found()),
        }
    }

    /// Runs an authorized JSON API call on the blocking thread pool.
    async fn api_call<In, Out, F>(
        &self,
        request: Request,
        path: PathIter<'_>,
        op: F,
    ) -> Result<HttpResponse, HttpResponse>
    where
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        F: FnOnce(&CaRegistry, In) -> Result<Out, Error> + Send + 'static,
    {
        path.check_exhausted()?;
        request.check_post()?;
        let request = request.proceed_authorized(&self.authorizer)?;
        let input: In = request.read_json().await?;

        let registry = self.registry.clone();
        let output = tokio::task::spawn_blocking(move || op(&registry, input))
            .await
            .map_err(|e| Error::custom(format!("request handler failed: {}", e)))??;

        Ok(HttpResponse::json(&output))
    }
}


//------------ /health -------------------------------------------------------

fn health(request: Request, path: PathIter<'_>) -> Result<HttpResponse, HttpResponse> {
    path.check_exhausted()?;
    request.check_get()?;
    Ok(HttpResponse::ok())
}


//------------ Logging -------------------------------------------------------

fn log_response(method: &Method, path: &str, response: &HttpResponse) {
    let status = response.status();
    match response.cause() {
        Some(cause) if status.is_server_error() => {
            error!("{} {} {}: {}", method, path, status.as_u16(), cause)
        }
        Some(cause) => warn!("{} {} {}: {}", method, path, status.as_u16(), cause),
        None => info!("{} {} {}", method, path, status.as_u16()),
    }
}
