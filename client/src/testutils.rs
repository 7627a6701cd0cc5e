use crate::cache::Clock;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Clock that only moves when told to.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        ManualClock {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    /// Query string exactly as it arrived
    pub raw_query: String,
    pub query: HashMap<String, String>,
}

type Route = (&'static str, StatusCode, &'static str);

/// HTTP server on a random local port answering fixed bodies by path.
/// Unknown paths get the proxy's 404 body.
pub struct MockUpstream {
    pub port: u16,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let log = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);
        let server_log = log.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let log = server_log.clone();
                let routes = routes.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let log = log.clone();
                        let routes = routes.clone();
                        async move {
                            let path = req.uri().path().to_string();
                            let raw_query = req.uri().query().unwrap_or("").to_string();
                            let query = url::form_urlencoded::parse(raw_query.as_bytes())
                                .into_owned()
                                .collect();
                            log.lock().await.push(RecordedRequest {
                                path: path.clone(),
                                raw_query,
                                query,
                            });

                            let (status, body) = routes
                                .iter()
                                .find(|(route, _, _)| *route == path)
                                .map(|(_, status, body)| (*status, *body))
                                .unwrap_or((StatusCode::NOT_FOUND, r#"{"error":"Not found."}"#));

                            let mut response = Response::new(Full::new(Bytes::from(body)));
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

        MockUpstream { port, log }
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().await.clone()
    }
}

/// A port nothing is listening on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
