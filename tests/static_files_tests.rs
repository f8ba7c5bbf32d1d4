use std::fs;

use http::{header, Method, StatusCode};
use routetree::static_files::StaticFiles;
use routetree::{Outcome, RequestCtx, RouteError, Router};
use tempfile::TempDir;

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("css")).unwrap();
    fs::write(dir.path().join("index.html"), "<h1>Hello</h1>").unwrap();
    fs::write(dir.path().join("css/site.css"), "body { margin: 0 }").unwrap();
    fs::write(dir.path().join("bundle.js"), "console.log('bundled');\n").unwrap();
    dir
}

fn get(router: &Router, path: &str) -> (Outcome, RequestCtx) {
    let mut ctx = RequestCtx::new(Method::GET, path);
    let outcome = router.serve(&mut ctx);
    (outcome, ctx)
}

#[test]
fn test_load_reports_content_type() {
    let dir = site();
    let sf = StaticFiles::new(dir.path());

    let (bytes, ct) = sf.load("/bundle.js").unwrap();
    assert_eq!(ct, "application/javascript");
    assert_eq!(String::from_utf8(bytes).unwrap(), "console.log('bundled');\n");

    let (_, ct) = sf.load("css/site.css").unwrap();
    assert_eq!(ct, "text/css; charset=utf-8");
}

#[test]
fn test_traversal_prevented() {
    let dir = site();
    let sf = StaticFiles::new(dir.path().join("css"));
    assert!(sf.load("../index.html").is_err());
    assert!(sf.load("/css/../../index.html").is_err());
}

#[test]
fn test_serve_files_through_router() {
    let dir = site();
    let mut router = Router::new();
    router.serve_files("/static/*filepath", dir.path()).unwrap();

    let (outcome, ctx) = get(&router, "/static/index.html");
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(ctx.status(), StatusCode::OK);
    assert_eq!(ctx.header(header::CONTENT_TYPE), Some("text/html; charset=utf-8"));
    assert_eq!(ctx.body(), b"<h1>Hello</h1>");
    assert_eq!(ctx.param("filepath"), Some("/index.html"));

    let (_, ctx) = get(&router, "/static/css/site.css");
    assert_eq!(ctx.body(), b"body { margin: 0 }");
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = site();
    let mut router = Router::new();
    router.serve_files("/static/*filepath", dir.path()).unwrap();

    // the route matched, so the router reports the request handled
    let (outcome, ctx) = get(&router, "/static/nope.txt");
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(ctx.status(), StatusCode::NOT_FOUND);

    let (_, ctx) = get(&router, "/static/css");
    assert_eq!(ctx.status(), StatusCode::NOT_FOUND);

    let (_, ctx) = get(&router, "/static/../Cargo.toml");
    assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_serve_files_in_group() {
    let dir = site();
    let mut router = Router::new();
    router
        .group("/v1")
        .group("/assets")
        .serve_files("/{filepath:*}", dir.path())
        .unwrap();

    assert_eq!(router.list()[0].1, ["/v1/assets/{filepath:*}"]);
    let (outcome, ctx) = get(&router, "/v1/assets/bundle.js");
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(ctx.header(header::CONTENT_TYPE), Some("application/javascript"));
}

#[test]
fn test_serve_files_requires_filepath_catch_all() {
    let dir = site();
    let mut router = Router::new();
    for bad in ["/static", "/static/:filepath", "/static/*path"] {
        assert_eq!(
            router.serve_files(bad, dir.path()),
            Err(RouteError::InvalidFilesPath {
                path: bad.to_string()
            }),
            "{bad}"
        );
    }
    assert!(router.list().is_empty());
}
