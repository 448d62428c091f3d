//! HTTP requests.

use std::error;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::Method;
use hyper::body::Body;
use serde::de::DeserializeOwned;

use crate::commons::error::Error;
use crate::constants::HTTP_API_KEY_HEADER;
use crate::daemon::config::Config;
use super::auth::Authorizer;
use super::response::HttpResponse;


//------------ HyperRequest --------------------------------------------------

/// A type alias for the request we receive from Hyper.
pub type HyperRequest = hyper::Request<hyper::body::Incoming>;


//------------ Request -------------------------------------------------------

/// A request that has not been authorized yet.
///
/// The body can only be read once the request has been authorized and
/// turned into an [`AuthedRequest`].
pub struct Request {
    request: HyperRequest,
    limits: BodyLimits,
}

impl Request {
    pub fn new(request: HyperRequest, limits: BodyLimits) -> Self {
        Request { request, limits }
    }

    /// Checks whether the request is a GET or returns an error response.
    pub fn check_get(&self) -> Result<(), HttpResponse> {
        match *self.request.method() {
            Method::GET => Ok(()),
            _ => Err(HttpResponse::method_not_allowed()),
        }
    }

    /// Checks whether the request is a POST or returns an error response.
    pub fn check_post(&self) -> Result<(), HttpResponse> {
        match *self.request.method() {
            Method::POST => Ok(()),
            _ => Err(HttpResponse::method_not_allowed()),
        }
    }

    /// Returns the current request path.
    pub fn path(&self) -> RequestPath {
        RequestPath::new(self.request.uri().path())
    }

    /// Returns the raw value of the API key header, if present.
    pub fn api_key(&self) -> Option<&[u8]> {
        self.request
            .headers()
            .get(HTTP_API_KEY_HEADER)
            .map(|value| value.as_bytes())
    }

    /// Checks the API key and progresses to reading the body.
    pub fn proceed_authorized(self, authorizer: &Authorizer) -> Result<AuthedRequest, HttpResponse> {
        if authorizer.is_authorized(self.api_key()) {
            Ok(AuthedRequest {
                request: self.request,
                limits: self.limits,
            })
        } else {
            Err(HttpResponse::forbidden())
        }
    }
}


//------------ AuthedRequest -------------------------------------------------

/// A request that may have its body read.
pub struct AuthedRequest {
    request: HyperRequest,
    limits: BodyLimits,
}

impl AuthedRequest {
    /// Returns the raw bytes of the request body.
    pub async fn read_bytes(self) -> Result<Bytes, Error> {
        let limit = self.limits.post_limit_api;
        self.read_body(limit).await
    }

    /// Get a json object from a post body
    pub async fn read_json<T: DeserializeOwned>(self) -> Result<T, Error> {
        let bytes = self.read_bytes().await?;
        serde_json::from_slice(&bytes).map_err(Error::JsonError)
    }

    async fn read_body(self, limit: u64) -> Result<Bytes, Error> {
        read_limited(self.request.into_body(), limit).await
    }
}

/// Reads a whole body of at most `limit` bytes.
///
/// A size hint beyond the limit is refused before reading. A body without
/// one, such as a chunked one, is refused once it grows past the limit.
async fn read_limited<B>(body: B, limit: u64) -> Result<Bytes, Error>
where
    B: Body,
    B::Error: Into<Box<dyn error::Error + Send + Sync>>,
{
    if body.size_hint().lower() > limit {
        return Err(Error::PostTooBig);
    }

    match Limited::new(body, limit.try_into().unwrap_or(usize::MAX))
        .collect()
        .await
    {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(Error::PostTooBig),
        Err(_) => Err(Error::PostCannotRead),
    }
}


//------------ RequestPath ---------------------------------------------------

/// The path of a request’s URI.
#[derive(Clone, Debug)]
pub struct RequestPath {
    path: String,
}

impl RequestPath {
    fn new(path: &str) -> Self {
        RequestPath {
            path: path.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn iter(&self) -> PathIter<'_> {
        PathIter::new(self.as_str())
    }
}

impl AsRef<str> for RequestPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}


//------------ PathIter ------------------------------------------------------

/// Iterates over the segments of a request path.
#[derive(Debug)]
pub struct PathIter<'a> {
    remaining: Option<&'a str>,
}

impl<'a> PathIter<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            remaining: Some(path.strip_prefix('/').unwrap_or(path)),
        }
    }

    /// Returns a copy with a possible trailing slash removed.
    pub fn strip_trailing_slash(&self) -> Self {
        // Some("") means there _was_ a trailing slash and we are now just
        // past it. So we need to transform this case into an exhausted path.
        let remaining = match self.remaining {
            Some("") | None => None,
            Some(remaining) => Some(remaining.strip_suffix('/').unwrap_or(remaining)),
        };
        Self { remaining }
    }

    /// Checks that the path has been exhausted.
    ///
    /// Returns a 404 error response if it isn’t.
    pub fn check_exhausted(&self) -> Result<(), HttpResponse> {
        if self.remaining.is_some() {
            Err(HttpResponse::not_found())
        } else {
            Ok(())
        }
    }
}

impl<'a> Iterator for PathIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.remaining?;
        match remaining.find('/') {
            Some(slash) => {
                self.remaining = Some(&remaining[slash + 1..]);
                Some(&remaining[..slash])
            }
            None => {
                self.remaining = None;
                Some(remaining)
            }
        }
    }
}


//------------ BodyLimits ----------------------------------------------------

/// The size limits of a request body.
#[derive(Clone, Copy, Debug)]
pub struct BodyLimits {
    /// The POST limit for API data.
    post_limit_api: u64,
}

impl BodyLimits {
    /// Creates the limits from the config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            post_limit_api: config.post_limit_api,
        }
    }
}


//============ Tests =========================================================
