//! Command line surface and run-mode resolution
//!
//! Sub-modes are selected by which flags are present: a pubkey starts a
//! local solve, its absence runs the benchmark, `--server` switches to
//! distributed client mode, and `--server --configure` administers the
//! coordination server.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use crate::kangaroo::planner::{MAX_DP_BITS, MAX_RANGE_BITS, MIN_DP_BITS, MIN_RANGE_BITS};
use crate::math::{curve, CurvePoint, Scalar320};
use crate::server::api::ConfigureRequest;

/// SOTA kangaroo ECDLP solver for secp256k1.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sotacrack", version, about, long_about = None)]
pub struct Args {
    /// Target public key, SEC1 hex; omit to run the benchmark
    #[arg(long)]
    pub pubkey: Option<String>,

    /// Range width in bits, or startHex:endHex
    #[arg(long)]
    pub range: Option<String>,

    /// Range start offset, hex (required with the bit-width range form)
    #[arg(long)]
    pub start: Option<String>,

    /// Distinguished point threshold, bits
    #[arg(long)]
    pub dp: Option<u32>,

    /// Worker devices to use, as digits (e.g. "02"); default is all
    #[arg(long)]
    pub gpu: Option<String>,

    /// Stop after max * expected operations
    #[arg(long)]
    pub max: Option<f64>,

    /// Preload a binary tame table before solving
    #[arg(long)]
    pub tames: Option<PathBuf>,

    /// Coordination server URL (distributed client mode)
    #[arg(long)]
    pub server: Option<String>,

    /// Client identifier reported to the server
    #[arg(long)]
    pub clientid: Option<String>,

    /// Configure the server search
    #[arg(long, num_args = 5, value_names = ["START", "END", "PUBKEY", "DP_BITS", "RANGE_SIZE"])]
    pub configure: Option<Vec<String>>,
}

/// Parameters of a local solve.
#[derive(Debug, Clone)]
pub struct LocalParams {
    pub pubkey: CurvePoint,
    pub start: Scalar320,
    pub range_bits: u32,
    pub dp_bits: u32,
    pub max_factor: f64,
    pub tames: Option<PathBuf>,
}

/// Which of the four sub-modes the flags select.
pub enum RunMode {
    Bench { devices: Vec<usize> },
    Local { params: LocalParams, devices: Vec<usize> },
    Client { url: String, client_id: String, devices: Vec<usize> },
    Configure { url: String, request: ConfigureRequest },
}

impl Args {
    /// Validate the flags and resolve the run mode.
    pub fn mode(&self) -> Result<RunMode> {
        let devices = parse_devices(self.gpu.as_deref())?;

        if let Some(url) = &self.server {
            if let Some(cfg) = &self.configure {
                let dp_bits: u32 = cfg[3]
                    .parse()
                    .map_err(|_| anyhow!("invalid dp_bits: {}", cfg[3]))?;
                return Ok(RunMode::Configure {
                    url: url.clone(),
                    request: ConfigureRequest {
                        start_range: cfg[0].clone(),
                        end_range: cfg[1].clone(),
                        pubkey: cfg[2].clone(),
                        dp_bits,
                        range_size: cfg[4].clone(),
                    },
                });
            }
            let client_id = self
                .clientid
                .clone()
                .unwrap_or_else(default_client_id);
            return Ok(RunMode::Client {
                url: url.clone(),
                client_id,
                devices,
            });
        }
        if self.configure.is_some() {
            bail!("configure mode requires --server");
        }

        let pubkey_hex = match &self.pubkey {
            None => return Ok(RunMode::Bench { devices }),
            Some(hex_str) => hex_str,
        };
        let pubkey = curve::parse_point(pubkey_hex)?;

        let range_str = self
            .range
            .as_ref()
            .ok_or_else(|| anyhow!("range is required"))?;
        let (start, range_bits) = if let Some((start_hex, end_hex)) = range_str.split_once(':') {
            let start = Scalar320::from_hex(start_hex)?;
            let end = Scalar320::from_hex(end_hex)?;
            if end.cmp_unsigned(&start) != std::cmp::Ordering::Greater {
                bail!("range end must be above range start");
            }
            (start, end.sub(&start).bit_length())
        } else {
            let bits: u32 = range_str
                .parse()
                .map_err(|_| anyhow!("invalid range: {}", range_str))?;
            let start_hex = self
                .start
                .as_ref()
                .ok_or_else(|| anyhow!("start offset is required"))?;
            (Scalar320::from_hex(start_hex)?, bits)
        };

        if !(MIN_RANGE_BITS..=MAX_RANGE_BITS).contains(&range_bits) {
            bail!("unsupported range value ({})", range_bits);
        }
        let dp_bits = self.dp.ok_or_else(|| anyhow!("DP value is required"))?;
        if !(MIN_DP_BITS..=MAX_DP_BITS).contains(&dp_bits) {
            bail!("unsupported DP value ({})", dp_bits);
        }

        Ok(RunMode::Local {
            params: LocalParams {
                pubkey,
                start,
                range_bits,
                dp_bits,
                max_factor: self.max.unwrap_or(0.0),
                tames: self.tames.clone(),
            },
            devices,
        })
    }
}

fn parse_devices(mask: Option<&str>) -> Result<Vec<usize>> {
    match mask {
        None => {
            let n = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            Ok((0..n).collect())
        }
        Some(digits) => {
            let mut out = Vec::new();
            for ch in digits.chars() {
                let d = ch
                    .to_digit(10)
                    .ok_or_else(|| anyhow!("invalid device list: {}", digits))?
                    as usize;
                if !out.contains(&d) {
                    out.push(d);
                }
            }
            if out.is_empty() {
                bail!("empty device list");
            }
            Ok(out)
        }
    }
}

/// `<hostname>_<unix-time>` when no client id was given.
pub fn default_client_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "client".to_string());
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}_{}", host, secs)
}
