use crate::http::{full_body, make_error_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Health and readiness endpoints served on a separate listener.
///
/// `/health` answers as long as the process is serving. `/ready` consults the
/// readiness callback on every call, so it can flip without a restart.
pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }

    pub fn respond(&self, method: &Method, path: &str) -> Response<BoxBody<Bytes, E>>
    where
        E: 'static,
    {
        if method != Method::GET && method != Method::HEAD {
            return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        match path {
            "/health" => status_response(StatusCode::OK, "ok"),
            "/ready" => match (self.is_ready)() {
                true => status_response(StatusCode::OK, "ok"),
                false => status_response(StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            },
            _ => make_error_response(StatusCode::NOT_FOUND),
        }
    }
}

fn status_response<E: 'static>(status: StatusCode, label: &str) -> Response<BoxBody<Bytes, E>> {
    let body = serde_json::json!({ "status": label }).to_string();
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> bool,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = self.respond(req.method(), req.uri().path());
        Box::pin(async move { Ok(res) })
    }
}
