use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use stubdns_domain::ResolveError;
use tracing::debug;

/// Builds the client's single UDP socket, bound to an ephemeral port in
/// the nameserver's address family.
///
/// The socket is deliberately left unconnected: the receive path verifies
/// the sending endpoint against the configured nameserver instead.
pub(crate) fn bind_socket(server: SocketAddr) -> Result<std::net::UdpSocket, ResolveError> {
    let io_err = |e: std::io::Error| ResolveError::IoError(e.to_string());

    let domain = if server.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(io_err)?;

    socket.set_recv_buffer_size(256 * 1024).map_err(io_err)?;
    socket.set_send_buffer_size(128 * 1024).map_err(io_err)?;

    let bind_addr: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse().unwrap()
    } else {
        "[::]:0".parse().unwrap()
    };

    socket.bind(&bind_addr.into()).map_err(io_err)?;
    socket.set_nonblocking(true).map_err(io_err)?;

    let socket: std::net::UdpSocket = socket.into();
    debug!(server = %server, local = ?socket.local_addr().ok(), "UDP socket bound");

    Ok(socket)
}
