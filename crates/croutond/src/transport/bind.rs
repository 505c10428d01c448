//! Endpoint binding, including recovery of socket files left behind.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use crouton_config::SocketEndpoint;

use super::{ConnectionStream, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tracing::{debug, warn};

#[cfg(unix)]
use super::LISTENER_TARGET;

/// A bound, not yet accepting, server socket.
#[derive(Debug)]
pub(super) enum BoundSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl BoundSocket {
    pub(super) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => bind_tcp(endpoint, host, *port).map(Self::Tcp),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                bind_unix(endpoint, path.as_std_path()).map(Self::Unix)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(ListenerError::UnixUnsupported {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    pub(super) fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Self::Unix(_) => None,
        }
    }

    /// Lets the accept loop poll its stop flag between connections.
    pub(super) fn poll_accepts(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Accepts one pending connection as a blocking stream; `None` when no
    /// peer is waiting.
    pub(super) fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

fn bind_tcp(endpoint: &SocketEndpoint, host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let resolve_error = |source| ListenerError::Resolve {
        endpoint: endpoint.to_string(),
        source,
    };
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(resolve_error)?
        .next()
        .ok_or_else(|| {
            resolve_error(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no addresses returned",
            ))
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(unix)]
enum SocketFile {
    Absent,
    Abandoned,
    Served,
}

#[cfg(unix)]
fn bind_unix(endpoint: &SocketEndpoint, path: &Path) -> Result<UnixListener, ListenerError> {
    match inspect_socket_file(path)? {
        SocketFile::Absent => {}
        SocketFile::Served => {
            return Err(ListenerError::InUse {
                endpoint: endpoint.to_string(),
            });
        }
        SocketFile::Abandoned => {
            fs::remove_file(path).map_err(|source| stale_socket(path, source))?;
            debug!(
                target: LISTENER_TARGET,
                path = %path.display(),
                "removed abandoned socket file"
            );
        }
    }
    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// A socket file nobody accepts on is abandoned; one that takes a
/// connection belongs to a running server.
#[cfg(unix)]
fn inspect_socket_file(path: &Path) -> Result<SocketFile, ListenerError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(SocketFile::Absent),
        Err(source) => return Err(stale_socket(path, source)),
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket {
            path: path.display().to_string(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_served) => Ok(SocketFile::Served),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            Ok(SocketFile::Abandoned)
        }
        Err(source) => Err(stale_socket(path, source)),
    }
}

#[cfg(unix)]
fn stale_socket(path: &Path, source: io::Error) -> ListenerError {
    ListenerError::StaleSocket {
        path: path.display().to_string(),
        source,
    }
}

/// Removes the socket file of a Unix endpoint once nothing accepts on it.
#[cfg(unix)]
pub(super) fn remove_socket_file(endpoint: &SocketEndpoint) {
    if let Some(path) = endpoint.unix_path()
        && let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            %error,
            %path,
            "socket file left behind"
        );
    }
}

#[cfg(not(unix))]
pub(super) fn remove_socket_file(_endpoint: &SocketEndpoint) {}
