//! TCP port forwarding.
//!
//! Exposes a service on another host (a coprocessor on the robot network,
//! typically) through a port on the controller. Each accepted connection is
//! piped to `remote_host:remote_port` until either side hangs up.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{NetError, NetworkRuntime};

/// A running forward. Dropping it stops accepting new connections.
pub struct PortForward {
    local_port: u16,
    remote: String,
    accept_loop: JoinHandle<()>,
}

impl PortForward {
    /// Bind `local_port` on every interface and start forwarding.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Bind`] when the port is taken or not permitted.
    pub fn start(
        runtime: &NetworkRuntime,
        local_port: u16,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Self, NetError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, local_port));
        let bind_error = |e: std::io::Error| NetError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        };
        let std_listener = StdTcpListener::bind(addr).map_err(bind_error)?;
        std_listener.set_nonblocking(true).map_err(bind_error)?;
        let bound_port = std_listener.local_addr().map_err(bind_error)?.port();

        let listener = {
            let _entered = runtime.handle().enter();
            TcpListener::from_std(std_listener).map_err(bind_error)?
        };

        let remote = format!("{remote_host}:{remote_port}");
        let target = remote.clone();
        let accept_loop = runtime.handle().spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((inbound, peer)) => {
                        let target = target.clone();
                        tokio::spawn(async move {
                            if let Err(e) = pipe(inbound, &target).await {
                                warn!(peer = %peer, target = %target, error = %e, "forwarded connection failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "forward accept error");
                    }
                }
            }
        });

        info!(local_port = bound_port, remote = %remote, "port forward started");
        Ok(Self {
            local_port: bound_port,
            remote,
            accept_loop,
        })
    }

    /// The port actually bound (differs from the request only when `0` was
    /// asked for).
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }
}

async fn pipe(mut inbound: TcpStream, target: &str) -> std::io::Result<()> {
    let mut outbound = TcpStream::connect(target).await?;
    let (up, down) = copy_bidirectional(&mut inbound, &mut outbound).await?;
    debug!(target, up, down, "forwarded connection finished");
    Ok(())
}

impl std::fmt::Debug for PortForward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortForward")
            .field("local_port", &self.local_port)
            .field("remote", &self.remote)
            .finish()
    }
}

impl Drop for PortForward {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}
