//! Demo server: a read-only in-memory filesystem over NFSv3.
//!
//! ```text
//! cargo run --example memfs -- --config server.toml
//! mount -t nfs -o port=2049,mountport=2049,tcp,nfsvers=3,nolock 127.0.0.1:/ /mnt/demo
//! ```
//!
//! With a `[capture]` section the traffic is written to a `.pcap` file;
//! adding `[capture.ring]` keeps the most recent packets in memory
//! instead, and `SIGHUP` dumps them to the file.

mod filesystem;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use filesystem::MemFs;
use nfswire::config::Config;
use nfswire::pcap::ring::RingSink;
use nfswire::pcap::sink::FileSink;
use nfswire::pcap::{self, CaptureSink};
use nfswire::server::{CaptureOptions, CaptureSinkHandle, Server};

#[derive(Debug, Parser)]
#[command(name = "memfs", about = "Serve a small in-memory filesystem over NFSv3")]
struct Args {
    /// TOML config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let listener = TcpListener::bind(config.listen).await?;
    info!(listen = %config.listen, export = %config.export, "serving");

    let mut server = Server::new(Arc::new(MemFs::demo(&config.export)));
    let mut file_sink = None;
    let mut ring = None;
    if let Some(capture) = &config.capture {
        let sink = FileSink::open(
            &capture.path,
            Box::new(|error| eprintln!("pcap write failed: {error}")),
        )?;
        let tap = match &capture.ring {
            None => {
                sink.handle().record(pcap::file_header());
                info!(path = %capture.path.display(), "streaming capture");
                CaptureSinkHandle::File(sink.handle())
            }
            Some(limits) => {
                let ring_sink = RingSink::new(limits.max_fragments, limits.max_bytes);
                ring = Some(ring_sink.clone());
                info!(
                    path = %capture.path.display(),
                    max_fragments = limits.max_fragments,
                    max_bytes = limits.max_bytes,
                    "ring capture armed; SIGHUP dumps it"
                );
                CaptureSinkHandle::Ring(ring_sink)
            }
        };
        server = server.with_capture(CaptureOptions { sink: tap, mode: capture.mode.into() });
        file_sink = Some(sink);
    }

    let controller = server.controller();
    let mut hangup = signal(SignalKind::hangup())?;
    let serve = server.serve(listener);
    tokio::pin!(serve);
    loop {
        tokio::select! {
            result = &mut serve => {
                result?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                let _ = controller.initiate_shutdown().await;
                break;
            }
            _ = hangup.recv() => {
                if let (Some(ring), Some(sink)) = (&ring, &file_sink) {
                    info!("dumping retained packets");
                    let mut handle = sink.handle();
                    ring.dump(&mut handle);
                }
            }
        }
    }

    if let Some(sink) = file_sink {
        sink.sync_close();
    }
    Ok(())
}
