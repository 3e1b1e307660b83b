use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::drive::Drive;
use crate::error::{DriveError, ProtocolError};
use crate::middleware::{log_connection, log_request};
use crate::protocol::{Request, Response, handle_request};
use crate::server::config::ServerConfig;

pub struct Server {
    listener: TcpListener,
    drive: Arc<Drive>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Opens the drive and binds the listener.
    ///
    /// With port 0 the OS picks a port; the configuration then reports the
    /// port actually bound.
    pub async fn bind(mut config: ServerConfig) -> Result<Self, DriveError> {
        let drive = Drive::open(&config)?;

        let socket = config.listen_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e.into());
            }
        };
        let local = listener.local_addr()?;
        config.port = local.port();
        info!("Server bound to {}", local);

        Ok(Self {
            listener,
            drive: Arc::new(drive),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn drive(&self) -> Arc<Drive> {
        Arc::clone(&self.drive)
    }

    pub async fn start(self) {
        info!(
            "Starting Rax drive on {} (root {}, max upload {} MB)",
            self.config.listen_socket(),
            self.drive.root().display(),
            self.config.max_upload_mb
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let drive = Arc::clone(&self.drive);
                    let config = Arc::clone(&self.config);

                    // Spawn a task per connection so the accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, drive, config).await {
                            warn!("Failed to serve client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Serves exactly one request, then closes the connection.
async fn handle_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    drive: Arc<Drive>,
    config: Arc<ServerConfig>,
) -> io::Result<()> {
    log_connection(&client_addr);

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let max_body = config.max_upload_bytes();

    let mut request = match Request::read_head(&mut reader).await {
        Ok(request) => request,
        Err(ProtocolError::ConnectionClosed) => {
            debug!("Client {} closed without sending a request", client_addr);
            return Ok(());
        }
        Err(ProtocolError::IoError(e)) => return Err(e),
        Err(e) => {
            let response = Response::from_error(&e.into());
            log_request(&client_addr, "-", "-", response.status());
            response.write_to(&mut write_half).await?;
            return write_half.shutdown().await;
        }
    };

    if request.expects_continue() && request.content_length(max_body).is_ok() {
        write_half.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
    }

    let method = request.method.clone();
    let path = request.path.clone();
    let response = match request.read_body(&mut reader, max_body).await {
        Ok(()) => handle_request(drive, config, request).await,
        Err(ProtocolError::IoError(e)) => return Err(e),
        Err(e) => Response::from_error(&e.into()),
    };

    log_request(&client_addr, &method, &path, response.status());
    response.write_to(&mut write_half).await?;
    write_half.shutdown().await
}
