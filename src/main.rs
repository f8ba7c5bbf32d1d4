use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use http::{Method, StatusCode};
use routetree::handler::panic_message;
use routetree::logging::{init_logging, LogFormat};
use routetree::middleware::{Instrumented, PrometheusMiddleware, TracingMiddleware};
use routetree::{Handler, PanicPayload, RequestCtx, Router, RouterConfig};
use serde_json::json;

/// Route a single request through the demo router and print the response
#[derive(Parser)]
#[command(name = "routetree")]
#[command(about = "routetree demo router", long_about = None)]
struct Cli {
    /// Request target: path plus optional query, e.g. `/values/42?x=1`
    target: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Prometheus subsystem used as metric name prefix
    #[arg(long, default_value = "", env = "ROUTETREE_SUBSYSTEM")]
    subsystem: String,

    /// Label metrics by matched route pattern instead of raw path
    #[arg(long, default_value_t = false)]
    group_paths: bool,

    /// Print the registered routes before dispatching
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Print the metrics exposition after dispatching
    #[arg(long, default_value_t = false)]
    metrics: bool,

    /// Log output format (json or pretty)
    #[arg(long, default_value = "pretty", env = "ROUTETREE_LOG_FORMAT")]
    log_format: String,
}

fn handle_health(ctx: &mut RequestCtx) {
    ctx.set_status(StatusCode::OK);
    ctx.set_content_type("application/json");
    ctx.set_body(json!({ "status": "pass" }).to_string());
}

fn handle_value(ctx: &mut RequestCtx) {
    let id = ctx.param("id").unwrap_or_default().to_owned();
    ctx.set_status(StatusCode::OK);
    ctx.set_content_type("application/json");
    ctx.set_body(json!({ "id": id }).to_string());
}

fn build_router(prom: &Arc<PrometheusMiddleware>) -> Result<Router> {
    let mut router = Router::with_config(RouterConfig::from_env());
    router.set_panic_handler(|ctx: &mut RequestCtx, payload: PanicPayload| {
        let message = format!("Internal Server Error: {}", panic_message(payload.as_ref()));
        ctx.error(&message, StatusCode::INTERNAL_SERVER_ERROR);
    });

    prom.register(&mut router)
        .context("Failed to register metrics route")?;
    router.get("/health", handle_health)?;
    router.get("/values/{id}", handle_value)?;
    Ok(router)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogFormat::parse(&cli.log_format), "info")?;

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid request method '{}'", cli.method))?;

    let mut prom = PrometheusMiddleware::new(&cli.subsystem);
    prom.set_path_grouping(cli.group_paths);
    let prom = Arc::new(prom);

    let router = build_router(&prom)?;
    if cli.list {
        for (method, paths) in router.list() {
            for path in paths {
                println!("[route] {method} {path}");
            }
        }
    }

    let app = Instrumented::new(router)
        .with(Arc::clone(&prom) as _)
        .with(Arc::new(TracingMiddleware));

    let mut ctx = RequestCtx::new(method, &cli.target);
    app.handle(&mut ctx);

    let res = ctx.into_response();
    println!("{:?} {}", res.version(), res.status());
    for (name, value) in res.headers() {
        println!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    println!();
    println!("{}", String::from_utf8_lossy(res.body()));

    if cli.metrics {
        print!("{}", prom.render());
    }
    Ok(())
}
