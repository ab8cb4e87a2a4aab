//! DKG Party CLI
//!
//! Command-line interface around the DKG core:
//! - Simulate a full DKG round among local parties
//! - Inspect a persisted key share
//! - Recover the joint secret from a threshold of key shares

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use dkg_core::{
    algebra::{Secp256k1, Suite},
    dkg::participants_from_file,
    keygen,
    mpc::MemoryRelay,
    poly::recover_secret,
    DistKeyShare, KeyShareFile, LongTermKey, SessionConfig,
};
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

/// DKG Party - threshold key establishment
#[derive(Parser)]
#[command(name = "dkg-party")]
#[command(about = "Verifiable secret sharing and distributed key generation")]
#[command(version)]
struct Cli {
    /// Party ID (0-indexed)
    #[arg(short, long, env = "PARTY_ID", default_value_t = 0)]
    party_id: usize,

    /// Data directory for key shares
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a DKG round among local parties over an in-memory relay
    Simulate {
        /// Number of parties
        #[arg(short, long, default_value_t = dkg_core::DEFAULT_PARTIES)]
        n: usize,

        /// Threshold (t-of-n)
        #[arg(short, long, default_value_t = dkg_core::DEFAULT_THRESHOLD)]
        t: usize,

        /// Per-round timeout in seconds
        #[arg(long, default_value_t = dkg_core::DEFAULT_ROUND_TIMEOUT.as_secs())]
        timeout: u64,
    },

    /// Show key share info
    Info,

    /// Recover the joint secret from key shares
    Recover {
        /// Party IDs whose shares to combine (comma-separated)
        #[arg(short = 'P', long)]
        parties: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { n, t, timeout } => {
            std::fs::create_dir_all(&cli.dest)?;
            run_simulation(&cli.dest, n, t, Duration::from_secs(timeout)).await?;
        }
        Commands::Info => {
            show_info(&cli.dest, cli.party_id)?;
        }
        Commands::Recover { ref parties } => {
            run_recover(&cli.dest, &parse_parties(parties)?)?;
        }
    }

    Ok(())
}

async fn run_simulation(dest: &Path, n: usize, t: usize, round_timeout: Duration) -> Result<()> {
    info!(n_parties = n, threshold = t, "Starting simulated DKG");

    let config = SessionConfig::new(n, t, 0)?.with_round_timeout(round_timeout);
    let keys: Vec<_> = (0..n).map(|_| LongTermKey::generate(&mut OsRng)).collect();
    let participants: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
    let relay = MemoryRelay::new();

    let mut handles = Vec::with_capacity(n);
    for (party_id, key) in keys.into_iter().enumerate() {
        let config = config.for_party(party_id)?;
        let participants = participants.clone();
        let relay = relay.clone();
        handles.push(tokio::spawn(async move {
            keygen::run_dkg::<Secp256k1, _>(&config, &key, &participants, &relay).await
        }));
    }

    let mut public_key = None;
    for (party_id, handle) in handles.into_iter().enumerate() {
        let key_share = handle
            .await
            .map_err(|e| anyhow!("party {party_id} task failed: {e}"))??;
        let file = key_share.to_file(&participants);

        let path = key_share_path(dest, party_id);
        std::fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        info!(party_id, path = ?path, "Key share saved");

        public_key = file.public_key().map(str::to_owned);
    }

    let public_key = public_key.ok_or_else(|| anyhow!("no parties"))?;
    info!(public_key = %public_key, "DKG completed");

    // Print public key
    println!("Public Key: {public_key}");

    Ok(())
}

fn show_info(dest: &Path, party_id: usize) -> Result<()> {
    let file = load_key_share_file(dest, party_id)?;
    let key_share = DistKeyShare::<Secp256k1>::from_file(&file)?;
    let participants = participants_from_file(&file)?;

    println!("Key Share Info:");
    println!("  Suite: {}", file.suite);
    println!("  Party ID: {}", file.party_id);
    println!("  N Parties: {}", participants.len());
    println!("  Threshold: {}", key_share.threshold());
    println!("  Qualified: {:?}", key_share.qualified);
    println!(
        "  Public Key: {}",
        hex::encode(Secp256k1::encode_point(&key_share.public_key()))
    );
    println!(
        "  Public Share: {}",
        hex::encode(Secp256k1::encode_point(
            &key_share.public_share(key_share.index()).value
        ))
    );

    Ok(())
}

fn run_recover(dest: &Path, parties: &[usize]) -> Result<()> {
    let key_shares = parties
        .iter()
        .map(|&party_id| {
            let file = load_key_share_file(dest, party_id)?;
            DistKeyShare::<Secp256k1>::from_file(&file)
                .with_context(|| format!("key share of party {party_id}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let first = key_shares.first().ok_or_else(|| anyhow!("no parties given"))?;
    if key_shares.iter().any(|k| k.commits != first.commits) {
        bail!("key shares belong to different DKG rounds");
    }

    info!(parties = ?parties, threshold = first.threshold(), "Recovering joint secret");
    let shares: Vec<_> = key_shares.iter().map(|k| k.share.clone()).collect();
    let secret = recover_secret(&shares, first.threshold())?;

    if Secp256k1::base() * secret != first.public_key() {
        bail!("recovered secret does not match the public key");
    }

    println!("Secret: {}", hex::encode(Secp256k1::encode_scalar(&secret)));
    println!(
        "Public Key: {}",
        hex::encode(Secp256k1::encode_point(&first.public_key()))
    );

    Ok(())
}

fn parse_parties(parties: &str) -> Result<Vec<usize>> {
    parties
        .split(',')
        .map(|s| {
            s.trim()
                .parse()
                .with_context(|| format!("invalid party id {s:?}"))
        })
        .collect()
}

fn key_share_path(dest: &Path, party_id: usize) -> PathBuf {
    dest.join(format!("keyshare.{party_id}.json"))
}

fn load_key_share_file(dest: &Path, party_id: usize) -> Result<KeyShareFile> {
    let path = key_share_path(dest, party_id);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}
