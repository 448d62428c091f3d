//! HTTP responses.

use bytes::Bytes;
use http_body_util::{Either, Empty, Full};
use hyper::StatusCode;
use serde::Serialize;

use crate::commons::error::Error;


//----------- ContentType ----------------------------------------------------

#[derive(Clone, Copy)]
enum ContentType {
    Json,
    Text,
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Text => "text/plain",
        }
    }
}


//------------ HyperResponse -------------------------------------------------

pub type HyperResponseBody = Either<Empty<Bytes>, Full<Bytes>>;
pub type HyperResponse = hyper::Response<HyperResponseBody>;


//----------- Response -------------------------------------------------------

struct Response {
    status: StatusCode,
    content_type: ContentType,
    body: Bytes,
    cause: Option<Error>,
}

impl Response {
    fn new(status: StatusCode) -> Self {
        Response {
            status,
            content_type: ContentType::Text,
            body: Bytes::default(),
            cause: None,
        }
    }

    fn finalize(self) -> HttpResponse {
        let body = if self.body.is_empty() {
            Either::Left(Empty::new())
        } else {
            Either::Right(Full::new(self.body))
        };

        let mut response = hyper::Response::new(body);
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static(self.content_type.as_str()),
        );

        HttpResponse {
            response,
            cause: self.cause,
        }
    }
}


//------------ HttpResponse --------------------------------------------------

#[derive(Debug)]
pub struct HttpResponse {
    response: HyperResponse,
    cause: Option<Error>,
}

impl HttpResponse {
    pub fn into_hyper(self) -> HyperResponse {
        self.response
    }

    /// The error this response was made from, for logging.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn json<O: Serialize>(object: &O) -> Self {
        match serde_json::to_string(object) {
            Ok(json) => Response {
                status: StatusCode::OK,
                content_type: ContentType::Json,
                body: json.into(),
                cause: None,
            }
            .finalize(),
            Err(e) => Self::response_from_error(Error::custom(format!("cannot encode response: {}", e))),
        }
    }

    pub fn response_from_error(error: Error) -> Self {
        let status = error.status();
        let body = error.to_error_response().to_string();
        Response {
            status,
            content_type: ContentType::Json,
            body: body.into(),
            cause: Some(error),
        }
        .finalize()
    }

    pub fn ok() -> Self {
        Response::new(StatusCode::OK).finalize()
    }

    pub fn not_found() -> Self {
        Self::response_from_error(Error::ApiUnknownResource)
    }

    pub fn forbidden() -> Self {
        Self::response_from_error(Error::ApiInvalidCredentials)
    }

    pub fn method_not_allowed() -> Self {
        Self::response_from_error(Error::ApiMethodNotAllowed)
    }
}

impl From<Error> for HttpResponse {
    fn from(error: Error) -> Self {
        Self::response_from_error(error)
    }
}


//------------ Tests ---------------------------------------------------------
