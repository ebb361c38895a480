//! rnfd, the reflexive-Interest NDN forwarding daemon.
//!
//! One current-thread reactor drives everything: face I/O tasks feed
//! decoded packets into an event channel, the forwarder core consumes them
//! between timer deadlines, and a Unix control socket accepts `nfdc`
//! management requests.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rust_rnfd_common::types::{FaceId, FaceScope};
use rust_rnfd_fwd::config::RnfdConfig;
use rust_rnfd_fwd::fw::Forwarder;
use rust_rnfd_fwd::mgmt::{self, ControlRequest, ControlResponse};
use rust_rnfd_transport::{self as transport, Endpoint, FaceEvent, FaceUri, Listener};
use serde_json::json;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

/// rNFD forwarding daemon
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long)]
    verbose: bool,

    /// Path to the configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit without starting
    #[clap(long)]
    check_config: bool,

    /// Face URIs to listen on (overrides the configuration)
    #[clap(long)]
    listen: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let config = match &cli.config {
        Some(path) => {
            if cli.check_config {
                RnfdConfig::dry_run(path)?;
                println!("{}: OK", path.display());
                return Ok(());
            }
            RnfdConfig::load(path)?
        }
        None => {
            if cli.check_config {
                anyhow::bail!("--check-config requires --config");
            }
            RnfdConfig::default()
        }
    };

    let listen = if cli.listen.is_empty() {
        config.daemon.listen.clone()
    } else {
        cli.listen.clone()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the reactor")?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run(config, listen))
}

async fn run(config: RnfdConfig, listen: Vec<String>) -> Result<()> {
    let forwarder = Rc::new(RefCell::new(Forwarder::new(config.forwarder_options())));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<FaceEvent>();

    for uri in &listen {
        let uri: FaceUri = uri.parse()?;
        let listener = transport::bind_listener(&uri).await?;
        info!("listening on {}", uri);
        spawn_accept_loop(listener, uri, forwarder.clone(), event_tx.clone());
    }

    let control = UnixListener::bind(&config.daemon.control_socket)
        .or_else(|_| {
            // a stale socket from a previous run
            std::fs::remove_file(&config.daemon.control_socket)?;
            UnixListener::bind(&config.daemon.control_socket)
        })
        .with_context(|| format!("binding control socket {}", config.daemon.control_socket))?;
    info!("control socket at {}", config.daemon.control_socket);
    spawn_control_loop(control, forwarder.clone(), event_tx.clone());

    info!("rnfd up");
    loop {
        let deadline = forwarder.borrow().next_timer_deadline();
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(FaceEvent::Packet(face, packet)) => {
                    forwarder.borrow_mut().handle_packet(face, packet);
                }
                Some(FaceEvent::Closed(face)) => {
                    forwarder.borrow_mut().remove_face(face);
                }
                None => break,
            },
            _ = async {
                tokio::time::sleep_until(tokio::time::Instant::from_std(
                    deadline.expect("guarded by the branch condition"),
                ))
                .await
            }, if deadline.is_some() => {
                forwarder.borrow_mut().poll_timers(Instant::now());
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(&config.daemon.control_socket);
    Ok(())
}

fn spawn_accept_loop(
    listener: Listener,
    uri: FaceUri,
    forwarder: Rc<RefCell<Forwarder>>,
    event_tx: mpsc::UnboundedSender<FaceEvent>,
) {
    tokio::task::spawn_local(async move {
        loop {
            let accepted = match &listener {
                Listener::Tcp(tcp) => match tcp.accept().await {
                    Ok((stream, peer)) => {
                        let scope = if peer.ip().is_loopback() {
                            FaceScope::Local
                        } else {
                            FaceScope::NonLocal
                        };
                        Some((Endpoint::Tcp(stream), format!("tcp://{}", peer), scope))
                    }
                    Err(e) => {
                        warn!("accept on {} failed: {}", uri, e);
                        None
                    }
                },
                Listener::Unix(unix) => match unix.accept().await {
                    Ok((stream, _)) => {
                        Some((Endpoint::Unix(stream), uri.to_string(), FaceScope::Local))
                    }
                    Err(e) => {
                        warn!("accept on {} failed: {}", uri, e);
                        None
                    }
                },
            };
            let Some((endpoint, peer_uri, scope)) = accepted else {
                break;
            };

            let (tx, rx) = mpsc::unbounded_channel();
            let id = forwarder
                .borrow_mut()
                .add_face(peer_uri.clone(), scope, uri.link_type(), tx);
            info!("accepted {} as {}", peer_uri, id);
            transport::spawn_face_io(endpoint, id, event_tx.clone(), rx);
        }
    });
}

fn spawn_control_loop(
    control: UnixListener,
    forwarder: Rc<RefCell<Forwarder>>,
    event_tx: mpsc::UnboundedSender<FaceEvent>,
) {
    tokio::task::spawn_local(async move {
        loop {
            let Ok((stream, _)) = control.accept().await else {
                break;
            };
            let forwarder = forwarder.clone();
            let event_tx = event_tx.clone();
            tokio::task::spawn_local(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let response = match serde_json::from_str::<ControlRequest>(&line) {
                        Ok(request) => {
                            handle_control_request(&forwarder, &event_tx, request).await
                        }
                        Err(e) => ControlResponse::failure(format!("bad request: {}", e)),
                    };
                    let mut out = serde_json::to_string(&response).expect("response is JSON");
                    out.push('\n');
                    if write_half.write_all(out.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
}

/// Face creation and destruction need the transport layer, so they are
/// handled here; everything else goes through the forwarder's dispatcher.
async fn handle_control_request(
    forwarder: &Rc<RefCell<Forwarder>>,
    event_tx: &mpsc::UnboundedSender<FaceEvent>,
    request: ControlRequest,
) -> ControlResponse {
    match (request.noun.as_str(), request.verb.as_str()) {
        ("face", "create") => {
            let Some(uri) = request.args.get("uri").and_then(|v| v.as_str()) else {
                return ControlResponse::failure("missing argument 'uri'");
            };
            let parsed: FaceUri = match uri.parse() {
                Ok(parsed) => parsed,
                Err(e) => return ControlResponse::failure(e),
            };
            match transport::connect(&parsed).await {
                Ok(endpoint) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let id = forwarder.borrow_mut().add_face(
                        parsed.to_string(),
                        parsed.scope(),
                        parsed.link_type(),
                        tx,
                    );
                    transport::spawn_face_io(endpoint, id, event_tx.clone(), rx);
                    info!("created {} for {}", id, parsed);
                    ControlResponse::success(json!({ "id": id.0, "uri": parsed.to_string() }))
                }
                Err(e) => ControlResponse::failure(format!("{:#}", e)),
            }
        }

        ("face", "destroy") => {
            let Some(id) = request.args.get("id").and_then(|v| v.as_u64()) else {
                return ControlResponse::failure("missing argument 'id'");
            };
            forwarder.borrow_mut().remove_face(FaceId(id));
            ControlResponse::success(json!({ "id": id }))
        }

        _ => mgmt::dispatch(&mut forwarder.borrow_mut(), &request),
    }
}
