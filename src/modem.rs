use crate::alert::AlertTransmitter;
use crate::error::TransportError;
use log::{debug, info};
use serialport::SerialPort;
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

type Connector<P> = Box<dyn FnMut() -> io::Result<P> + Send>;

/// Iridium short-burst-data modem driven with AT commands
pub struct SbdModem<P: Read + Write> {
    connect: Connector<P>,
    port: Option<BufReader<P>>,
    /// Sequence number of the last delivered message
    pub last_momsn: Option<u32>,
}

impl SbdModem<Box<dyn SerialPort>> {
    /// Modem on a serial port. Every response line must arrive within
    /// `timeout`, so a silent modem fails the attempt instead of hanging.
    pub fn open(device: &Path, baud: u32, timeout: Duration) -> Self {
        let device = device.to_string_lossy().into_owned();
        Self::new(Box::new(move || {
            serialport::new(device.as_str(), baud)
                .timeout(timeout)
                .open()
                .map_err(io::Error::from)
        }))
    }
}

impl<P: Read + Write> SbdModem<P> {
    /// The port is opened lazily on first use and again on every reconnect
    pub fn new(connect: Connector<P>) -> Self {
        Self {
            connect,
            port: None,
            last_momsn: None,
        }
    }

    fn port(&mut self) -> Result<&mut BufReader<P>, TransportError> {
        if self.port.is_none() {
            let port = (self.connect)().map_err(|e| TransportError::Connect(e.to_string()))?;
            self.port = Some(BufReader::new(port));
        }
        self.port
            .as_mut()
            .ok_or_else(|| TransportError::Connect("modem port unavailable".into()))
    }

    /// Issue one command and collect response lines up to OK/ERROR
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, TransportError> {
        let port = self.port()?;
        let writer = port.get_mut();
        writer
            .write_all(format!("{}\r", cmd).as_bytes())
            .map_err(|e| TransportError::Send(e.to_string()))?;
        writer.flush().map_err(|e| TransportError::Send(e.to_string()))?;

        let mut lines = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = port.read_line(&mut line).map_err(|e| match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                    TransportError::Send(format!("modem silent waiting for {} response", cmd))
                }
                _ => TransportError::Send(e.to_string()),
            })?;
            if n == 0 {
                return Err(TransportError::Send(format!("modem closed during {}", cmd)));
            }
            let text = line.trim();
            if text.is_empty() || text == cmd {
                continue;
            }
            debug!("modem <- {}", text);
            match text {
                "OK" => return Ok(lines),
                "ERROR" => return Err(TransportError::Send(format!("{} rejected", cmd))),
                _ => lines.push(text.to_string()),
            }
        }
    }
}

/// `+SBDIX: <MO status>, <MOMSN>, ...`; returns (status, momsn)
fn parse_sbdix(lines: &[String]) -> Result<(u32, u32), TransportError> {
    let line = lines
        .iter()
        .find_map(|l| l.strip_prefix("+SBDIX:"))
        .ok_or_else(|| TransportError::Send("no +SBDIX response".into()))?;
    let mut parts = line.split(',').map(|p| p.trim().parse::<u32>());
    match (parts.next(), parts.next()) {
        (Some(Ok(status)), Some(Ok(momsn))) => Ok((status, momsn)),
        _ => Err(TransportError::Send(format!("malformed +SBDIX: {}", line))),
    }
}

impl<P: Read + Write> AlertTransmitter for SbdModem<P> {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.command("AT")?;
        // No hardware flow control on the three-wire link
        self.command("AT&K0")?;
        self.command(&format!("AT+SBDWT={}", text))?;
        let response = self.command("AT+SBDIX")?;

        let (status, momsn) = parse_sbdix(&response)?;
        if status <= 2 {
            self.last_momsn = Some(momsn);
            Ok(())
        } else {
            Err(TransportError::Send(format!("SBD session failed with MO status {}", status)))
        }
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.port = None;
        self.port().map(|_| ())
    }

    fn on_succeeded(&mut self) {
        info!("SBD message delivered (momsn {:?})", self.last_momsn);
    }
}
