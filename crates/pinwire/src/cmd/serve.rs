use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pinwire::sim;
use pinwire_engine::{Engine, EngineConfig};
use pinwire_transport::BoardStream;
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, load_config, ServeArgs};
use crate::exit::{engine_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.stdio {
        serve_stream(BoardStream::stdio(), &config, &running)?;
        return Ok(SUCCESS);
    }

    let path = args
        .path
        .ok_or_else(|| CliError::usage("a socket path or --stdio is required"))?;
    listen(&path, &config, &running, args.once)?;
    Ok(SUCCESS)
}

/// Serve one host after another; each connection gets a freshly reset board.
#[cfg(unix)]
fn listen(
    path: &std::path::Path,
    config: &EngineConfig,
    running: &AtomicBool,
    once: bool,
) -> CliResult<()> {
    let socket = pinwire_transport::BoardSocket::bind(path)
        .map_err(|err| transport_error("bind failed", err))?;

    while running.load(Ordering::SeqCst) {
        let stream = socket
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        serve_stream(stream, config, running)?;
        if once {
            break;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn listen(
    _path: &std::path::Path,
    _config: &EngineConfig,
    _running: &AtomicBool,
    _once: bool,
) -> CliResult<()> {
    Err(CliError::usage(
        "socket transport is only available on unix; use --stdio",
    ))
}

fn serve_stream(stream: BoardStream, config: &EngineConfig, running: &AtomicBool) -> CliResult<()> {
    let transport = stream.transport_name();
    let registry = sim::board(config)
        .map_err(|err| CliError::new(INTERNAL, format!("board setup failed: {err}")))?;
    let writer = stream
        .try_clone()
        .map_err(|err| transport_error("stream clone failed", err))?;

    let mut engine = match Engine::new(stream, writer, registry, config.clone()) {
        Ok(engine) => engine,
        Err(err) if err.is_disconnect() => {
            warn!(transport, "host left before the announcement was sent");
            return Ok(());
        }
        Err(err) => return Err(engine_error("engine start failed", err)),
    };
    info!(transport, "serving simulated board");

    engine
        .run(running)
        .map_err(|err| engine_error("engine stopped", err))
}
