//! # sendline Main Entry Point
//!
//! Send one request built from the command line or loaded from the saved
//! requests, print the response and record it in history.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use sendline::cmd_args::CommandLineArgs;
use sendline::config::{
    expand_path, get_profile_path, Profile, DEFAULT_HISTORY_PATH, DEFAULT_REQUESTS_PATH,
};
use sendline::{
    ExecutionContext, FileHistory, FileRequests, HistoryService, HttpEngine, Request,
    RequestService, Response,
};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "SENDLINE_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommandLineArgs::parse();
    let profile = Profile::load(&get_profile_path(), args.profile())?;
    init_logging(profile.log_level());

    let history_path = match profile.history_path() {
        Some(path) => path.to_path_buf(),
        None => expand_path(DEFAULT_HISTORY_PATH)?,
    };
    let history = Arc::new(FileHistory::new(history_path));

    if let Some(limit) = args.history() {
        let service = HistoryService::new(history, tracing::info_span!("history"));
        for entry in service.history(limit)? {
            let outcome = match &entry.error {
                Some(error) => format!("error: {error}"),
                None => entry.status.clone(),
            };
            println!(
                "{} {} {} {} -> {} ({} ms)",
                entry.executed_at.to_rfc3339(),
                entry.id,
                entry.method,
                entry.url,
                outcome,
                entry.response_time_ms
            );
        }
        return Ok(());
    }

    let requests_path = match profile.requests_path() {
        Some(path) => path.to_path_buf(),
        None => expand_path(DEFAULT_REQUESTS_PATH)?,
    };
    let requests = Arc::new(FileRequests::new(requests_path));

    let engine = HttpEngine::new(profile.client().clone())?;
    let service = RequestService::new(
        engine,
        history,
        requests,
        tracing::info_span!("request", profile = %profile.name()),
    );

    if args.list_saved() {
        for request in service.list_requests()? {
            println!(
                "{} {} {} {} {}",
                request.created_at().to_rfc3339(),
                request.id(),
                request.method(),
                request.url(),
                request.name()
            );
        }
        return Ok(());
    }

    if let Some(id) = args.delete_saved() {
        service.delete_request(id)?;
        return Ok(());
    }

    let request = match args.run() {
        Some(id) => service.load_request(id)?,
        None => service.create_request(build_request(&args, &profile)?)?,
    };
    if args.save() {
        service.save_request(&request)?;
    }

    let ctx = ExecutionContext::new();
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let response = if args.no_history() {
        service.execute(&ctx, &request).await?
    } else {
        service.execute_and_record(&ctx, &request).await?
    };

    print_response(&response, args.verbose());
    Ok(())
}

fn init_logging(profile_level: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(profile_level.unwrap_or("warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
}

/// Profile headers first, so the command line can override them.
fn build_request(args: &CommandLineArgs, profile: &Profile) -> Result<Request> {
    let url = args.url().ok_or_else(|| anyhow!("a URL is required"))?;
    let mut request = Request::with_method_and_url(args.method(), url);

    if let Some(name) = args.name() {
        request.set_name(name.to_string());
    }
    for (name, value) in profile.headers() {
        request.set_header(name, value);
    }
    for (name, value) in args.headers().map_err(anyhow::Error::msg)? {
        request.set_header(&name, &value);
    }
    for (name, value) in args.query_params().map_err(anyhow::Error::msg)? {
        request.set_query_param(&name, &value);
    }
    if let Some(body) = args.data() {
        if !request.is_body_allowed() {
            tracing::warn!("Ignoring body for {} request", request.method());
        }
        request.set_body(body.to_string());
    }
    request.set_auth(args.auth()?);

    Ok(request)
}

fn print_response(response: &Response, verbose: bool) {
    if verbose {
        println!("{}", response.status);
        let mut headers: Vec<_> = response.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            println!("{name}: {value}");
        }
        println!();
    }
    println!("{}", response.body);
    if verbose {
        eprintln!(
            "{} {} bytes in {} ms",
            response.status_class(),
            response.content_length,
            response.duration_millis()
        );
    }
}
