use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::{header, Method, StatusCode};
use routetree::handler::Handler;
use routetree::middleware::{
    Instrumented, Middleware, PrometheusMiddleware, TracingMiddleware, UNMATCHED_PATH_LABEL,
};
use routetree::{RequestCtx, Router};

fn users_router(prom: &Arc<PrometheusMiddleware>) -> Router {
    let mut router = Router::new();
    prom.register(&mut router).unwrap();
    router
        .get("/users/{id}", |ctx: &mut RequestCtx| {
            let body = format!("user {}", ctx.param("id").unwrap_or_default());
            ctx.text(StatusCode::OK, body);
        })
        .unwrap();
    router
}

fn call<H: Handler>(app: &H, method: Method, path: &str) -> RequestCtx {
    let mut ctx = RequestCtx::new(method, path);
    app.handle(&mut ctx);
    ctx
}

#[test]
fn test_metrics_by_raw_path() {
    let prom = Arc::new(PrometheusMiddleware::new("api"));
    let router = users_router(&prom);
    let app = Instrumented::new(router)
        .with(Arc::clone(&prom) as Arc<dyn Middleware>)
        .with(Arc::new(TracingMiddleware));

    call(&app, Method::GET, "/users/1");
    call(&app, Method::GET, "/users/2");
    call(&app, Method::GET, "/users/2");
    call(&app, Method::GET, "/nowhere");

    assert_eq!(prom.observed_count(StatusCode::OK, "/users/1", &Method::GET), 1);
    assert_eq!(prom.observed_count(StatusCode::OK, "/users/2", &Method::GET), 2);
    assert_eq!(
        prom.observed_count(StatusCode::NOT_FOUND, "/nowhere", &Method::GET),
        1
    );
}

#[test]
fn test_metrics_grouped_by_route() {
    let mut prom = PrometheusMiddleware::new("");
    prom.set_path_grouping(true);
    let prom = Arc::new(prom);
    let app = Instrumented::new(users_router(&prom)).with(Arc::clone(&prom) as Arc<dyn Middleware>);

    call(&app, Method::GET, "/users/1");
    call(&app, Method::GET, "/users/2");
    call(&app, Method::DELETE, "/users/3");
    call(&app, Method::GET, "/nowhere");
    call(&app, Method::GET, "/USERS/4");

    assert_eq!(prom.observed_count(StatusCode::OK, "/users/{id}", &Method::GET), 2);
    assert_eq!(
        prom.observed_count(StatusCode::METHOD_NOT_ALLOWED, UNMATCHED_PATH_LABEL, &Method::DELETE),
        1
    );
    assert_eq!(
        prom.observed_count(StatusCode::NOT_FOUND, UNMATCHED_PATH_LABEL, &Method::GET),
        1
    );
    assert_eq!(
        prom.observed_count(StatusCode::MOVED_PERMANENTLY, UNMATCHED_PATH_LABEL, &Method::GET),
        1
    );
    assert_eq!(prom.observed_count(StatusCode::NOT_FOUND, "/nowhere", &Method::GET), 0);
}

#[test]
fn test_grouped_series_stay_bounded_for_unmatched_paths() {
    let mut prom = PrometheusMiddleware::new("");
    prom.set_path_grouping(true);
    let prom = Arc::new(prom);
    let app = Instrumented::new(users_router(&prom)).with(Arc::clone(&prom) as Arc<dyn Middleware>);

    for i in 0..1000 {
        call(&app, Method::GET, &format!("/scan/{i}"));
        call(&app, Method::POST, &format!("/users/{i}"));
    }

    // one 404 series and one 405 series, however many paths were tried
    assert_eq!(prom.series_count(), 2);
    assert_eq!(
        prom.observed_count(StatusCode::NOT_FOUND, UNMATCHED_PATH_LABEL, &Method::GET),
        1000
    );
    assert_eq!(
        prom.observed_count(StatusCode::METHOD_NOT_ALLOWED, UNMATCHED_PATH_LABEL, &Method::POST),
        1000
    );
}

#[test]
fn test_metrics_route_renders_exposition() {
    let prom = Arc::new(PrometheusMiddleware::new("shop"));
    let app = Instrumented::new(users_router(&prom)).with(Arc::clone(&prom) as Arc<dyn Middleware>);

    call(&app, Method::GET, "/users/7");
    let ctx = call(&app, Method::GET, "/metrics");

    assert_eq!(ctx.status(), StatusCode::OK);
    assert!(ctx
        .header(header::CONTENT_TYPE)
        .unwrap()
        .starts_with("text/plain; version=0.0.4"));
    let text = String::from_utf8(ctx.body().to_vec()).unwrap();
    assert!(text.contains("# TYPE shop_request_duration_seconds histogram"));
    assert!(text.contains(
        "shop_request_duration_seconds_count{code=\"200\",path=\"/users/7\",method=\"GET\"} 1"
    ));
    // scraping is not itself observed
    assert!(!text.contains("path=\"/metrics\""));
    assert_eq!(prom.observed_count(StatusCode::OK, "/metrics", &Method::GET), 0);
}

#[test]
fn test_custom_metrics_path() {
    let mut prom = PrometheusMiddleware::new("");
    prom.set_metrics_path("/internal/prom");
    let prom = Arc::new(prom);
    let router = users_router(&prom);

    assert_eq!(router.list()[0].1, ["/internal/prom", "/users/{id}"]);
}

#[derive(Default)]
struct Recorder {
    short_circuit: bool,
    before_calls: AtomicUsize,
    after_calls: AtomicUsize,
    last_latency_nanos: AtomicUsize,
}

impl Middleware for Recorder {
    fn before(&self, ctx: &mut RequestCtx) -> bool {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        if self.short_circuit {
            ctx.error("Unauthorized", StatusCode::UNAUTHORIZED);
        }
        self.short_circuit
    }

    fn after(&self, _ctx: &mut RequestCtx, latency: Duration) {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        self.last_latency_nanos
            .store(latency.as_nanos() as usize, Ordering::SeqCst);
    }
}

#[test]
fn test_early_response_skips_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut router = Router::new();
    let counter = Arc::clone(&hits);
    router
        .get("/secret", move |ctx: &mut RequestCtx| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.text(StatusCode::OK, "classified");
        })
        .unwrap();

    let gate = Arc::new(Recorder {
        short_circuit: true,
        ..Recorder::default()
    });
    let observer = Arc::new(Recorder::default());
    let app = Instrumented::new(router)
        .with(Arc::clone(&gate) as Arc<dyn Middleware>)
        .with(Arc::clone(&observer) as Arc<dyn Middleware>);

    let ctx = call(&app, Method::GET, "/secret");
    assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // every hook still runs, and the skipped handler reports no latency
    for mw in [&gate, &observer] {
        assert_eq!(mw.before_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mw.after_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mw.last_latency_nanos.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn test_handler_runs_without_early_response() {
    let mut router = Router::new();
    router
        .get("/open", |ctx: &mut RequestCtx| ctx.text(StatusCode::OK, "hi"))
        .unwrap();
    let observer = Arc::new(Recorder::default());
    let app = Instrumented::new(router).with(Arc::clone(&observer) as Arc<dyn Middleware>);

    let ctx = call(&app, Method::GET, "/open");
    assert_eq!(ctx.body(), b"hi");
    assert_eq!(observer.after_calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.inner().list()[0].1, ["/open"]);
}
