//! Byte-stream transports for the console.
//!
//! The console writes commands from the main thread while a reader thread
//! reads value pushes from a cloned handle of the same connection. Both
//! serial ports and TCP sockets support independent clones for the two
//! directions, so no lock guards the transport itself.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, SerialPortType, StopBits};

use crate::config::config as global_config;
use crate::error::StatewireError;

/// Serial ports cannot block forever; this stands in for "no timeout".
const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub enum Transport {
    Serial(Box<dyn SerialPort>),
    Tcp(TcpStream),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial(port) => f
                .debug_tuple("Serial")
                .field(&port.name().unwrap_or_default())
                .finish(),
            Self::Tcp(stream) => f.debug_tuple("Tcp").field(&stream.peer_addr().ok()).finish(),
        }
    }
}

impl Transport {
    /// Open a serial device 8N1 at `STATEWIRE_BAUD` and wait
    /// `STATEWIRE_SETTLE_MS` for the board to come out of reset.
    pub fn open_serial(path: &str) -> Result<Self, StatewireError> {
        let cfg = global_config();
        let port = serialport::new(path, cfg.serial_baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(SERIAL_BLOCKING_TIMEOUT)
            .open()?;
        log::info!("opened {path} at {} baud", cfg.serial_baud);
        if cfg.serial_settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(cfg.serial_settle_ms));
        }
        Ok(Self::Serial(port))
    }

    /// Connect to a `host:port` endpoint, typically the mock controller.
    pub fn connect_tcp(addr: &str) -> Result<Self, StatewireError> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| StatewireError::Transport(format!("invalid TCP endpoint {addr}: {e}")))?
            .next()
            .ok_or_else(|| StatewireError::Transport(format!("no address resolved for {addr}")))?;
        let stream = TcpStream::connect(socket_addr)
            .map_err(|e| StatewireError::Transport(format!("connect {socket_addr}: {e}")))?;
        stream.set_nodelay(true)?;
        log::info!("connected to {socket_addr}");
        Ok(Self::Tcp(stream))
    }

    /// A second handle on the same connection.
    pub fn try_clone(&self) -> Result<Self, StatewireError> {
        Ok(match self {
            Self::Serial(port) => Self::Serial(port.try_clone()?),
            Self::Tcp(stream) => Self::Tcp(stream.try_clone()?),
        })
    }

    /// Bound blocking reads; `None` blocks until data arrives.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), StatewireError> {
        match self {
            Self::Serial(port) => port.set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))?,
            Self::Tcp(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Serial(port) => port.read(buf),
            Self::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::Tcp(stream) => stream.flush(),
        }
    }
}

/// True for read errors that only mean "no data yet".
#[must_use]
pub fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Path of the connected USB serial device reporting `serial_number`.
pub fn find_port_by_serial_number(serial_number: &str) -> Result<Option<String>, StatewireError> {
    let ports = serialport::available_ports()?;
    for port in ports {
        if let SerialPortType::UsbPort(info) = &port.port_type {
            log::debug!(
                "found USB port {} (serial {:?})",
                port.port_name,
                info.serial_number
            );
            if info.serial_number.as_deref() == Some(serial_number) {
                return Ok(Some(port.port_name));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn tcp_clone_reads_while_original_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf).expect("read");
            stream.write_all(&[buf[1], buf[0]]).expect("write");
        });

        let mut writer = Transport::connect_tcp(&addr).expect("connect");
        let mut reader = writer.try_clone().expect("clone");
        writer.write_all(&[1, 2]).expect("write");
        let mut reply = [0u8; 2];
        reader.read_exact(&mut reply).expect("read");
        assert_eq!(reply, [2, 1]);
        server.join().expect("server thread");
    }

    #[test]
    fn read_timeout_surfaces_as_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let mut transport = Transport::connect_tcp(&addr).expect("connect");
        let _held = listener.accept().expect("accept");
        transport
            .set_read_timeout(Some(Duration::from_millis(20)))
            .expect("timeout");
        let mut buf = [0u8; 1];
        let err = transport.read(&mut buf).expect_err("no data");
        assert!(is_timeout(&err), "{err:?}");
    }

    #[test]
    fn unresolvable_endpoint_is_a_transport_error() {
        assert!(matches!(
            Transport::connect_tcp("not an address"),
            Err(StatewireError::Transport(_))
        ));
    }
}
