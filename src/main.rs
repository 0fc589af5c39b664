//! sotacrack entry point
//!
//! Dispatches to the four sub-modes: local solve, benchmark, distributed
//! client, and server configuration.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use sotacrack::config::{Args, LocalParams, RunMode};
use sotacrack::kangaroo::orchestrator::{Orchestrator, SolveRequest};
use sotacrack::kangaroo::worker::{CpuKang, Worker};
use sotacrack::math::{curve, Scalar320};
use sotacrack::server::client::{HttpWorkApi, WorkApi};

/// Backoff when the server has no work to hand out.
const NO_WORK_BACKOFF: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("sotacrack - SOTA kangaroo method for solving ECDLP over secp256k1 intervals");

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    match args.mode()? {
        RunMode::Configure { url, request } => {
            let api = HttpWorkApi::new(&url);
            let resp = api.configure(&request)?;
            if resp.success {
                println!("Server configured successfully: {}", resp.message);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Failed to configure server: {}", resp.message);
                Ok(ExitCode::from(1))
            }
        }
        RunMode::Bench { devices } => run_bench(args, &devices),
        RunMode::Local { params, devices } => run_local(&params, &devices),
        RunMode::Client {
            url,
            client_id,
            devices,
        } => run_client_loop(args, &url, &client_id, &devices),
    }
}

fn run_bench(args: &Args, devices: &[usize]) -> Result<ExitCode> {
    println!("BENCH MODE");
    let mut rng = StdRng::from_entropy();
    let pubkey = curve::random_point(&mut rng);
    let start = Scalar320::from_pow2(77);
    print_range(&start, 78);

    let mut req = SolveRequest::new(pubkey, start, 78, 16);
    req.max_factor = args.max.unwrap_or(0.0);
    req.stats_prefix = "BENCH".to_string();
    Orchestrator::new(req).run_local(make_workers(devices)?)?;
    Ok(ExitCode::SUCCESS)
}

fn run_local(params: &LocalParams, devices: &[usize]) -> Result<ExitCode> {
    println!("MAIN MODE");
    print_range(&params.start, params.range_bits);

    let mut req = SolveRequest::new(
        params.pubkey,
        params.start,
        params.range_bits,
        params.dp_bits,
    );
    req.max_factor = params.max_factor;
    req.tames = params.tames.clone();
    Orchestrator::new(req).run_local(make_workers(devices)?)?;
    Ok(ExitCode::SUCCESS)
}

fn run_client_loop(
    args: &Args,
    url: &str,
    client_id: &str,
    devices: &[usize],
) -> Result<ExitCode> {
    println!("CLIENT MODE");
    println!("Server: {}", url);
    println!("Client ID: {}", client_id);
    let api = HttpWorkApi::new(url);

    loop {
        let work = match api.get_work(client_id) {
            Ok(resp) => resp,
            Err(e) => {
                warn!("get_work failed: {}", e);
                thread::sleep(NO_WORK_BACKOFF);
                continue;
            }
        };
        let assignment = match (work.success, work.work) {
            (true, Some(assignment)) => assignment,
            _ => {
                println!("No work available from server, waiting...");
                thread::sleep(NO_WORK_BACKOFF);
                continue;
            }
        };
        println!(
            "Working on range: {} to {} [{}]",
            assignment.start_range, assignment.end_range, assignment.range_id
        );

        let pubkey = match curve::parse_point(&assignment.pubkey) {
            Ok(p) => p,
            Err(e) => {
                error!("invalid public key from server: {}", e);
                continue;
            }
        };
        let start = match Scalar320::from_hex(&assignment.start_range) {
            Ok(s) => s,
            Err(e) => {
                error!("invalid start range from server: {}", e);
                continue;
            }
        };

        let mut req = SolveRequest::new(pubkey, start, assignment.bit_range, assignment.dp_bits);
        req.max_factor = args.max.unwrap_or(0.0);
        match Orchestrator::new(req).run_client(make_workers(devices)?, &api, client_id) {
            Ok(Some(_)) => {
                println!("Range completed with solution found!");
                return Ok(ExitCode::SUCCESS);
            }
            Ok(None) => println!("Range completed, requesting new work..."),
            Err(e) => {
                error!("work unit failed: {}", e);
                thread::sleep(NO_WORK_BACKOFF);
            }
        }
    }
}

fn make_workers(devices: &[usize]) -> Result<Vec<Box<dyn Worker>>> {
    let workers: Vec<Box<dyn Worker>> = devices
        .iter()
        .map(|&i| Box::new(CpuKang::new(i)) as Box<dyn Worker>)
        .collect();
    if workers.is_empty() {
        bail!("no workers found");
    }
    println!("Total workers for work: {}", workers.len());
    Ok(workers)
}

fn print_range(start: &Scalar320, range_bits: u32) {
    let end = start.add(&Scalar320::from_pow2(range_bits));
    println!("Start Range: {}", start.to_hex());
    println!("End   Range: {}", end.to_hex());
    println!("Bits: {}", range_bits);
}
