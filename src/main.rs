#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use portprobe::input::{Config, Opts};
use portprobe::limits::{current_file_limit, infer_max_concurrency, raise_file_limit};
use portprobe::scanner::{ScanConfig, ScanEngine, ScanOutcome};
use portprobe::target::Target;
use portprobe::{detail, output, warning};

use anyhow::Context;
use colored::Colorize;
use itertools::Itertools;
use log::debug;
use std::net::SocketAddr;

/// Faster scanning of one host, with the UI never waiting on a socket.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone())?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    let target = match opts.target() {
        Ok(target) => target,
        Err(e) => {
            warning!(format!("Cannot start the scan: {e}"));
            std::process::exit(1);
        }
    };

    let quiet = opts.greppable || opts.json;
    let mut scan_config = opts.scan_config();
    adjust_concurrency(&opts, &mut scan_config, quiet);

    detail!(
        format!(
            "Scanning {target} with up to {} probes in flight.",
            scan_config.max_concurrent_probes
        ),
        quiet,
        opts.accessible
    );

    let handle = ScanEngine::new(target, scan_config).spawn();

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = handle.join().await.context("the scan task failed")?;
    debug!("Scan outcome {outcome:?}");

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if opts.greppable {
        println!(
            "{} -> [{}]",
            target.address(),
            outcome.result().open_ports().iter().join(",")
        );
    } else {
        print_outcome(&target, &outcome, opts.accessible);
    }

    Ok(())
}

/// Applies `--ulimit` and keeps the cap under the open file limit.
fn adjust_concurrency(opts: &Opts, scan_config: &mut ScanConfig, quiet: bool) {
    if let Some(limit) = opts.ulimit {
        match raise_file_limit(limit) {
            Ok(()) => detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                quiet,
                opts.accessible
            ),
            Err(e) => warning!(
                format!("ERROR. Failed to set ulimit value: {e}"),
                quiet,
                opts.accessible
            ),
        }
    }

    let Some(ulimit) = current_file_limit() else {
        return;
    };

    let requested = scan_config.max_concurrent_probes;
    let cap = infer_max_concurrency(requested, ulimit);
    if cap < requested {
        warning!(
            format!(
                "File limit {ulimit} is too low for {requested} concurrent probes, using {cap}. Consider upping it with '--ulimit 5000'."
            ),
            quiet,
            opts.accessible
        );
    }
    scan_config.max_concurrent_probes = cap;
}

fn print_outcome(target: &Target, outcome: &ScanOutcome, accessible: bool) {
    let result = outcome.result();

    if outcome.is_cancelled() {
        warning!(
            "Scan cancelled, showing the ports confirmed so far.",
            false,
            accessible
        );
    }

    if result.is_empty() {
        output!(
            format!("Scan finished, no open ports on {}.", target.address()),
            false,
            accessible
        );
    } else {
        for &port in result.open_ports() {
            let socket = SocketAddr::new(target.address(), port);
            if accessible {
                println!("Open {socket}");
            } else {
                println!("Open {}", socket.to_string().purple());
            }
        }
    }

    let errors = result.errors().count();
    if errors > 0 {
        warning!(
            format!("{errors} ports could not be probed, run with RUST_LOG=debug for details."),
            false,
            accessible
        );
    }

    detail!(
        format!(
            "Resolved {} of {} ports in {:.2?}.",
            result.probes().len(),
            target.len(),
            result.elapsed()
        ),
        false,
        accessible
    );
}
