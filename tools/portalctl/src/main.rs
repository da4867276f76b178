// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! portalctl - CCNx portal stack utility
//!
//! Encodes and decodes routing anchors, writes and checks configuration
//! files, and exercises portal stacks over the in-process loopback hub.

use ccnx_portal::backend::LoopbackHub;
use ccnx_portal::{
    Name, PortalAnchor, PortalConfig, PortalFactory, PortalMessage, StackTimeout,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CCNx portal stack utility
#[derive(Parser, Debug)]
#[command(name = "portalctl")]
#[command(version)]
#[command(about = "Inspect routing anchors and exercise CCNx portal stacks")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Routing anchor encoding
    Anchor {
        #[command(subcommand)]
        action: AnchorAction,
    },

    /// Print a configuration file with default values
    GenConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a configuration file
    Validate {
        /// Configuration file (TOML)
        path: PathBuf,
    },

    /// Exchange messages between two stacks on a loopback hub
    Loopback {
        /// Name prefix the consumer listens on
        #[arg(short, long, default_value = "ccnx:/portalctl/demo")]
        prefix: String,

        /// Number of messages to send
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum AnchorAction {
    /// Build an anchor and print its encoded form
    Encode {
        /// Name prefix (ccnx:/... or lci:/...)
        prefix: String,

        /// Absolute expiration (seconds since the Unix epoch)
        #[arg(short, long, conflicts_with = "lifetime")]
        expire: Option<i64>,

        /// Expiration relative to now (seconds)
        #[arg(short, long, default_value = "3600")]
        lifetime: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: AnchorFormat,
    },

    /// Decode an anchor from JSON text or hex bytes
    Decode {
        /// JSON object or hex string
        input: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnchorFormat {
    Json,
    Hex,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    match &args.command {
        Command::Anchor { action } => run_anchor(action),
        Command::GenConfig { output } => run_gen_config(output.as_deref()),
        Command::Validate { path } => run_validate(path),
        Command::Loopback {
            prefix,
            count,
            config,
        } => run_loopback(prefix, *count, config.as_deref()),
    }
}

fn run_anchor(action: &AnchorAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AnchorAction::Encode {
            prefix,
            expire,
            lifetime,
            format,
        } => {
            let name: Name = prefix.parse()?;
            let anchor = match expire {
                Some(at) => PortalAnchor::new(name, *at),
                None => PortalAnchor::with_lifetime(name, Duration::from_secs(*lifetime)),
            };
            match format {
                AnchorFormat::Json => println!("{}", anchor.to_json()),
                AnchorFormat::Hex => println!("{}", hex::encode(anchor.to_bytes()?)),
            }
        }
        AnchorAction::Decode { input } => {
            let input = input.trim();
            let anchor = if input.starts_with('{') {
                PortalAnchor::from_json_str(input)?
            } else {
                PortalAnchor::from_bytes(&hex::decode(input)?)?
            };
            println!("{}", anchor);
            println!("  valid:   {}", anchor.is_valid());
            println!("  expired: {}", anchor.is_expired(std::time::SystemTime::now()));
            println!("  json:    {}", anchor.to_json());
        }
    }
    Ok(())
}

fn run_gen_config(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let text = PortalConfig::default().to_toml()?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn run_validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = PortalConfig::from_file(path)?;
    let factory = PortalFactory::from_config(&config);

    println!("{}: OK", path.display());
    println!("  key_id:      {}", factory.key_id());
    println!("  properties:  {}", factory.properties().len());
    println!("  queue_depth: {}", config.attributes.queue_depth);
    println!("  receive:     {}", config.timeouts.receive());
    println!("  send:        {}", config.timeouts.send());
    Ok(())
}

fn run_loopback(
    prefix: &str,
    count: usize,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => PortalConfig::from_file(path)?,
        None => PortalConfig::default(),
    };
    let prefix: Name = prefix.parse()?;

    let hub = LoopbackHub::new();
    let factory = PortalFactory::from_config(&config);
    let producer = factory.loopback_stack(&hub, config.attributes.clone())?;
    let consumer = factory.loopback_stack(&hub, config.attributes.clone())?;

    producer.start()?;
    consumer.start()?;
    consumer.listen(&prefix, config.timeouts.listen())?;

    // Never block forever on a demo run
    let receive_timeout = match config.timeouts.receive() {
        StackTimeout::Never => StackTimeout::from_millis(1000),
        other => other,
    };

    let mut received = 0;
    for seq in 0..count {
        let name = prefix.child(seq.to_string())?;
        let msg = PortalMessage::content(name, format!("message {}", seq).into_bytes());
        producer.send(&msg, config.timeouts.send())?;

        match consumer.receive(receive_timeout)? {
            Some(msg) => {
                received += 1;
                println!("received {}: {}", msg, String::from_utf8_lossy(msg.payload()));
            }
            None => println!("timed out waiting for {}", seq),
        }
    }

    consumer.ignore(&prefix, config.timeouts.listen())?;
    producer.stop()?;
    consumer.stop()?;

    println!(
        "\n{}/{} delivered (hub: {} queued, {} unmatched)",
        received,
        count,
        hub.delivered(),
        hub.unmatched()
    );
    Ok(())
}
