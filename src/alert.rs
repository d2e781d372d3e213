use crate::config::TrackerConfig;
use crate::error::TransportError;
use crate::samples::GpsFix;
use log::{error, info, warn};

/// Outbound emergency message channel
pub trait AlertTransmitter {
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Tear down and re-establish the link before a retry
    fn reconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn on_started(&mut self) {
        info!("alert transmission started");
    }

    fn on_failed(&mut self, err: &TransportError) {
        warn!("alert transmission failed: {}", err);
    }

    fn on_succeeded(&mut self) {
        info!("alert transmission succeeded");
    }
}

/// `<destination>,<longitude>,<latitude>,<device_id>`, coordinates left empty without a fix
pub fn alert_payload(destination: &str, fix: Option<&GpsFix>, device_id: &str) -> String {
    match fix {
        Some(fix) => format!("{},{},{},{}", destination, fix.longitude, fix.latitude, device_id),
        None => format!("{},,,{}", destination, device_id),
    }
}

/// Builds the emergency alert and pushes it through a transmitter
#[derive(Debug, Clone)]
pub struct CrashResponder {
    destination: String,
    device_id: String,
    max_attempts: u32,
}

impl CrashResponder {
    pub fn new(destination: &str, device_id: &str, max_attempts: u32) -> Self {
        Self {
            destination: destination.to_string(),
            device_id: device_id.to_string(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(&config.alert_destination, &config.device_id, config.alert_max_attempts)
    }

    /// Send the alert, reconnecting and resending the same payload on
    /// failure. Returns the number of attempts used.
    pub fn respond<T: AlertTransmitter + ?Sized>(
        &self,
        transmitter: &mut T,
        fix: Option<&GpsFix>,
    ) -> Result<u32, TransportError> {
        let payload = alert_payload(&self.destination, fix, &self.device_id);
        info!("attempting to send alert {:?}", payload);

        let mut last_err = TransportError::Send("no attempt made".into());
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                if let Err(e) = transmitter.reconnect() {
                    error!("alert attempt {}/{}: reconnect failed: {}", attempt, self.max_attempts, e);
                    transmitter.on_failed(&e);
                    last_err = e;
                    continue;
                }
            }

            transmitter.on_started();
            match transmitter.send(&payload) {
                Ok(()) => {
                    transmitter.on_succeeded();
                    info!("alert delivered on attempt {}", attempt);
                    return Ok(attempt);
                }
                Err(e) => {
                    error!("alert attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    transmitter.on_failed(&e);
                    last_err = e;
                }
            }
        }

        error!("giving up on alert {:?} after {} attempts", payload, self.max_attempts);
        Err(last_err)
    }
}

/// Transmitter that only records alerts in the log, for bench runs
#[derive(Debug, Default)]
pub struct LogTransmitter {
    pub sent: Vec<String>,
}

impl AlertTransmitter for LogTransmitter {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        warn!("ALERT (not transmitted): {}", text);
        self.sent.push(text.to_string());
        Ok(())
    }
}
