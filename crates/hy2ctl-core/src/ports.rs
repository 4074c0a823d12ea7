//! Free local port discovery.

use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;

/// Ask the OS for `count` currently unused TCP ports on the loopback
/// interface.
///
/// All listeners are held open until every port has been collected, so the
/// returned ports are distinct. They are released before returning and may
/// be taken by someone else afterwards.
pub fn get_free_ports(count: usize) -> std::io::Result<Vec<u16>> {
    let listeners = (0..count)
        .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))
        .collect::<std::io::Result<Vec<_>>>()?;

    let ports = listeners
        .iter()
        .map(|l| l.local_addr().map(|addr| addr.port()))
        .collect::<std::io::Result<Vec<_>>>()?;

    debug!(count, ?ports, "Reserved free ports");
    Ok(ports)
}
