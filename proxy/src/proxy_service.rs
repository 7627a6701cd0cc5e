use crate::config::Config;
use crate::cors::apply_cors;
use crate::errors::{ProxyError, UpstreamError};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS, UPSTREAM_DURATION};
use crate::relay::{
    BAD_REQUEST_MESSAGE, MISSING_SECRET_MESSAGE, NOT_FOUND_MESSAGE, error_response,
    relay_upstream, transport_failure_response,
};
use http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service as HyperService;
use hyper::{Method, Request, Response, StatusCode, Uri};
use shared::http::full_body;
use shared::{counter, histogram};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Forwards requests under the mount prefix to the analytics API with the
/// access token attached. Cheap to clone; clones share one HTTP client.
#[derive(Clone)]
pub struct ProxyService {
    inner: Arc<Forwarder>,
}

struct Forwarder {
    client: reqwest::Client,
    mount_prefix: String,
    upstream_base: String,
    timeout: Option<Duration>,
    secret: Option<String>,
}

impl ProxyService {
    /// `secret` is the bearer token. Without one the service still starts, but
    /// answers every proxied request with a 500.
    pub fn new(config: &Config, secret: Option<String>) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            inner: Arc::new(Forwarder {
                client,
                mount_prefix: config.mount_prefix.clone(),
                upstream_base: config.upstream_url.as_str().trim_end_matches('/').to_string(),
                timeout: config.upstream_timeout(),
                secret,
            }),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.inner.secret.is_some()
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Display,
    {
        self.inner.handle(req).await
    }
}

impl Forwarder {
    async fn handle<B>(&self, req: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Display,
    {
        let start = Instant::now();

        let (outcome, mut response) = if req.method() == Method::OPTIONS {
            let mut response = Response::new(Bytes::new());
            *response.status_mut() = StatusCode::NO_CONTENT;
            ("preflight", response)
        } else {
            self.forward(req).await
        };

        apply_cors(response.headers_mut());

        counter!(REQUESTS, "outcome" => outcome).increment(1);
        histogram!(REQUEST_DURATION, "status" => response.status().as_u16().to_string())
            .record(start.elapsed().as_secs_f64());

        response
    }

    async fn forward<B>(&self, req: Request<B>) -> (&'static str, Response<Bytes>)
    where
        B: Body,
        B::Error: Display,
    {
        let Some(secret) = self.secret.as_deref() else {
            tracing::error!("Appfigures PAT missing, refusing to proxy");
            return (
                "missing_secret",
                error_response(StatusCode::INTERNAL_SERVER_ERROR, MISSING_SECRET_MESSAGE),
            );
        };

        let Some(target) = self.upstream_target(req.uri()) else {
            tracing::debug!(path = %req.uri().path(), "Path outside mount prefix");
            return (
                "not_found",
                error_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
            );
        };

        let (parts, body) = req.into_parts();
        let mut upstream = self
            .client
            .request(parts.method.clone(), &target)
            .bearer_auth(secret);

        if parts.method != Method::GET && parts.method != Method::HEAD {
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read request body");
                    return (
                        "bad_request",
                        error_response(StatusCode::BAD_REQUEST, BAD_REQUEST_MESSAGE),
                    );
                }
            };

            if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
                upstream = upstream.header(CONTENT_TYPE, content_type.clone());
            }
            if !bytes.is_empty() {
                upstream = upstream.body(bytes);
            }
        }

        if let Some(timeout) = self.timeout {
            upstream = upstream.timeout(timeout);
        }

        tracing::info!(method = %parts.method, target = %target, "Proxying request");

        let upstream_start = Instant::now();
        let (status, body) = match send(upstream).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Proxy fetch failed");
                return ("transport_error", transport_failure_response(&e.to_string()));
            }
        };
        histogram!(UPSTREAM_DURATION, "status" => status.as_u16().to_string())
            .record(upstream_start.elapsed().as_secs_f64());

        let (outcome, response) = relay_upstream(status, &body);
        (outcome.as_str(), response)
    }

    /// Maps an inbound URI onto the upstream, or `None` when the path is not
    /// under the mount prefix. The query string is carried over verbatim.
    fn upstream_target(&self, uri: &Uri) -> Option<String> {
        let suffix = uri.path().strip_prefix(&self.mount_prefix)?;
        if !suffix.is_empty() && !suffix.starts_with('/') {
            return None;
        }

        let mut target = format!("{}{}", self.upstream_base, suffix);
        if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }
        Some(target)
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<(StatusCode, Bytes), UpstreamError> {
    let response = request.send().await.map_err(UpstreamError::Request)?;
    let status = response.status();
    let body = response.bytes().await.map_err(UpstreamError::Body)?;
    Ok((status, body))
}

impl HyperService<Request<Incoming>> for ProxyService {
    type Response = Response<BoxBody<Bytes, ProxyError>>;
    type Error = ProxyError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.handle(req).await.map(full_body)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        AUTHORIZATION,
    };
    use http_body_util::Full;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioExecutor;
    use serde_json::{Value, json};
    use std::convert::Infallible;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;
    use url::Url;

    /// What the mock upstream saw for one request
    #[derive(Clone, Debug)]
    struct Captured {
        method: Method,
        path_and_query: String,
        authorization: Option<String>,
        content_type: Option<String>,
        body: Bytes,
    }

    type Log = Arc<Mutex<Vec<Captured>>>;

    fn header_value(headers: &http::HeaderMap, name: http::HeaderName) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    /// Start a mock upstream that records every request and answers with a fixed response
    async fn start_mock_upstream(status: StatusCode, response_body: &'static str) -> (u16, Log) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let server_log = log.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);
                let log = server_log.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let log = log.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let captured = Captured {
                                method: parts.method.clone(),
                                path_and_query: parts
                                    .uri
                                    .path_and_query()
                                    .map(|pq| pq.to_string())
                                    .unwrap_or_default(),
                                authorization: header_value(&parts.headers, AUTHORIZATION),
                                content_type: header_value(&parts.headers, CONTENT_TYPE),
                                body: body.collect().await.unwrap().to_bytes(),
                            };
                            log.lock().await.push(captured);

                            let mut response =
                                Response::new(Full::new(Bytes::from(response_body)));
                            *response.status_mut() = status;
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        (port, log)
    }

    fn test_service(port: u16, secret: Option<&str>) -> ProxyService {
        let config = Config {
            upstream_url: Url::parse(&format!("http://127.0.0.1:{port}/v2")).unwrap(),
            ..Default::default()
        };
        ProxyService::new(&config, secret.map(String::from)).unwrap()
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    fn body_json(response: &Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn assert_cors(response: &Response<Bytes>) {
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
    }

    #[tokio::test]
    async fn test_preflight_on_any_path() {
        let (port, log) = start_mock_upstream(StatusCode::OK, "{}").await;

        // Preflight never needs the secret
        let service = test_service(port, None);
        for path in ["/api/appfigures-proxy/products/mine", "/elsewhere", "/"] {
            let response = service.handle(request(Method::OPTIONS, path, "")).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(response.body().is_empty());
            assert_cors(&response);
        }

        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let (port, log) = start_mock_upstream(StatusCode::OK, "{}").await;
        let service = test_service(port, None);
        assert!(!service.is_ready());

        for method in [Method::GET, Method::POST, Method::DELETE] {
            let response = service
                .handle(request(method, "/api/appfigures-proxy/ratings", ""))
                .await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                body_json(&response),
                json!({ "error": "Appfigures PAT environment variable not set." })
            );
            assert_cors(&response);
        }

        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_forwards_path_query_and_token() {
        let (port, log) =
            start_mock_upstream(StatusCode::OK, r#"{"111": {"downloads": 50}, "222": {}}"#).await;
        let service = test_service(port, Some("secret-pat"));
        assert!(service.is_ready());

        let response = service
            .handle(request(
                Method::GET,
                "/api/appfigures-proxy/reports/sales?group_by=product&products=111,222",
                "",
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            body_json(&response),
            json!({"111": {"downloads": 50}, "222": {}})
        );
        assert_cors(&response);

        let log = log.lock().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].method, Method::GET);
        assert_eq!(
            log[0].path_and_query,
            "/v2/reports/sales?group_by=product&products=111,222"
        );
        assert_eq!(log[0].authorization.as_deref(), Some("Bearer secret-pat"));
        assert!(log[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_post_body_is_forwarded_verbatim() {
        let (port, log) = start_mock_upstream(StatusCode::CREATED, r#"{"ok": true}"#).await;
        let service = test_service(port, Some("secret-pat"));

        let raw = "{ \"name\" :\"Decaff\",  \"tags\":[1, 2] }";
        let mut req = request(Method::POST, "/api/appfigures-proxy/products", raw);
        req.headers_mut()
            .insert(CONTENT_TYPE, "application/json".parse().unwrap());

        let response = service.handle(req).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(&response), json!({"ok": true}));

        let log = log.lock().await;
        assert_eq!(log[0].method, Method::POST);
        assert_eq!(log[0].path_and_query, "/v2/products");
        assert_eq!(log[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(log[0].body.as_ref(), raw.as_bytes());
    }

    #[tokio::test]
    async fn test_upstream_error_statuses() {
        let (port, _log) = start_mock_upstream(StatusCode::NOT_FOUND, r#"{"error": "nope"}"#).await;
        let service = test_service(port, Some("pat"));
        let response = service
            .handle(request(Method::GET, "/api/appfigures-proxy/ratings?products=1", ""))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&response), json!({"error": "nope"}));
        assert_cors(&response);

        let (port, _log) = start_mock_upstream(StatusCode::TOO_MANY_REQUESTS, "slow down").await;
        let service = test_service(port, Some("pat"));
        let response = service
            .handle(request(Method::GET, "/api/appfigures-proxy/reports/usage", ""))
            .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(response.body().as_ref(), b"slow down");
    }

    #[tokio::test]
    async fn test_invalid_success_body() {
        let (port, _log) = start_mock_upstream(StatusCode::OK, "<html>maintenance</html>").await;
        let service = test_service(port, Some("pat"));

        let response = service
            .handle(request(Method::GET, "/api/appfigures-proxy/products/mine", ""))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(&response),
            json!({ "error": "Received invalid JSON response from Appfigures API." })
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let service = test_service(port, Some("pat"));

        let response = service
            .handle(request(Method::GET, "/api/appfigures-proxy/products/mine", ""))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_cors(&response);

        let body = body_json(&response);
        assert_eq!(
            body["error"],
            "Proxy failed to fetch data from Appfigures API."
        );
        assert!(!body["details"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paths_outside_prefix() {
        let (port, log) = start_mock_upstream(StatusCode::OK, "{}").await;
        let service = test_service(port, Some("pat"));

        for path in ["/api/other", "/api/appfigures-proxyx/products", "/"] {
            let response = service.handle(request(Method::GET, path, "")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_cors(&response);
        }
        assert!(log.lock().await.is_empty());

        // The bare prefix maps onto the upstream base
        let response = service
            .handle(request(Method::GET, "/api/appfigures-proxy", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(log.lock().await[0].path_and_query, "/v2");
    }

    #[tokio::test]
    async fn test_upstream_target() {
        let service = test_service(9000, Some("pat"));
        let target = |uri: &str| service.inner.upstream_target(&uri.parse::<Uri>().unwrap());

        assert_eq!(
            target("/api/appfigures-proxy/reports/usage?group_by=network,product&networks=apple:analytics"),
            Some(
                "http://127.0.0.1:9000/v2/reports/usage?group_by=network,product&networks=apple:analytics"
                    .to_string()
            )
        );
        assert_eq!(
            target("/api/appfigures-proxy/ratings?"),
            Some("http://127.0.0.1:9000/v2/ratings".to_string())
        );
        assert_eq!(target("/api/appfigures-proxy-v2/ratings"), None);
    }
}
