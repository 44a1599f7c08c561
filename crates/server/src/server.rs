use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::routes::{handle_connection, AppState};

/// Accept-loop poll interval while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread-per-connection HTTP server.
pub struct HttpServer {
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<AtomicBool>,
}

/// Stops a server running on another thread.
pub struct ServerHandle {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<std::io::Result<()>>>,
}

impl HttpServer {
    pub fn bind(addr: &str, state: Arc<AppState>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            state,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until shut down or the listener fails.
    pub fn serve(self) -> std::io::Result<()> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    // Handlers expect blocking sockets.
                    stream.set_nonblocking(false)?;
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    let state = self.state.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("http-{peer}"))
                        .spawn(move || {
                            if let Err(e) = handle_connection(stream, &state) {
                                log::warn!("Request from {peer} rejected: {e}");
                            }
                        });
                    if let Err(e) = spawned {
                        log::error!("Cannot spawn connection thread: {e}");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => return Err(e),
            }
        }
        self.state.stop_streams();
        log::info!("HTTP server stopped");
        Ok(())
    }

    /// Runs [`HttpServer::serve`] on a background thread.
    pub fn spawn(self) -> std::io::Result<ServerHandle> {
        let addr = self.local_addr()?;
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let join = thread::Builder::new()
            .name("http-accept".into())
            .spawn(move || self.serve())?;
        Ok(ServerHandle {
            addr,
            state,
            shutdown,
            join: Some(join),
        })
    }
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.state.stop_streams();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
