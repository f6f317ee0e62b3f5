//! Logging of network events to an external sink.
//!
//! Messages carry an RFC 3164 facility and severity. The [`Logger`] filters them against a
//! per-facility severity threshold and hands the rest to an installed [`Sink`], which may forward
//! them to a console, a syslog server or both depending on the requested [`Destinations`]. Without
//! a sink logging does nothing.
//!
//! [`Logger`]: struct.Logger.html
//! [`Sink`]: trait.Sink.html
//! [`Destinations`]: struct.Destinations.html
use core::fmt;

use bitflags::bitflags;

/// The source of a message.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Facility {
    Kern = 0,
    Dtls = 1,
    Ecc = 2,
    Daemon = 3,
    Auth = 4,
    Syslog = 5,
    Lpr = 6,
    News = 7,
    Tftp = 8,
    Uuid = 9,
    Coap = 10,
    Ftp = 11,
    Ntp = 12,
    Http = 13,
    Snmp = 14,
    Rtcc = 15,
    Cbor = 16,
    Udp = 17,
    Tcp = 18,
    Dhcp = 19,
    Dns = 20,
    Lldp = 21,
    Link = 22,
}

/// The severity of a message, most severe first.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

bitflags! {
    /// Where a message should be delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Destinations: u8 {
        /// The local console.
        const CONSOLE  = 1 << 0;
        /// A syslog server on the network.
        const ETHERNET = 1 << 1;
    }
}

/// Number of facilities.
const FACILITIES: usize = Facility::Link as usize + 1;

/// The largest priority value allowed by RFC 3164.
pub const MAX_PRIVAL: u8 = 191;

/// The default threshold of each facility, messages less severe are dropped.
const THRESHOLDS: [Severity; FACILITIES] = [
    Severity::Info,   // Kern
    Severity::Notice, // Dtls
    Severity::Notice, // Ecc
    Severity::Info,   // Daemon
    Severity::Notice, // Auth
    Severity::Notice, // Syslog
    Severity::Info,   // Lpr
    Severity::Notice, // News
    Severity::Info,   // Tftp
    Severity::Notice, // Uuid
    Severity::Notice, // Coap
    Severity::Notice, // Ftp
    Severity::Info,   // Ntp
    Severity::Notice, // Http
    Severity::Notice, // Snmp
    Severity::Notice, // Rtcc
    Severity::Info,   // Cbor
    Severity::Notice, // Udp
    Severity::Notice, // Tcp
    Severity::Info,   // Dhcp
    Severity::Notice, // Dns
    Severity::Info,   // Lldp
    Severity::Notice, // Link
];

/// The RFC 3164 priority value of a message.
pub fn prival(facility: Facility, severity: Severity) -> u8 {
    ((facility as u8) << 3) | severity as u8
}

/// A receiver of log messages.
pub trait Sink {
    /// Deliver one message that passed the filter.
    fn log(
        &mut self,
        message: fmt::Arguments,
        facility: Facility,
        severity: Severity,
        destinations: Destinations,
    );
}

/// Filters messages and forwards them to an optional sink.
pub struct Logger<'a> {
    sink: Option<&'a mut dyn Sink>,
    destinations: Destinations,
    thresholds: [Severity; FACILITIES],
}

impl<'a> Logger<'a> {
    /// A logger without sink, every message is dropped.
    pub fn disabled() -> Self {
        Logger {
            sink: None,
            destinations: Destinations::all(),
            thresholds: THRESHOLDS,
        }
    }

    /// A logger delivering to `sink`.
    pub fn new(sink: &'a mut dyn Sink) -> Self {
        Logger {
            sink: Some(sink),
            .. Logger::disabled()
        }
    }

    /// Replace the sink.
    pub fn set_sink(&mut self, sink: Option<&'a mut dyn Sink>) {
        self.sink = sink;
    }

    /// Change where messages are sent.
    pub fn set_destinations(&mut self, destinations: Destinations) {
        self.destinations = destinations;
    }

    /// Change the least severe level that is still logged for a facility.
    pub fn set_threshold(&mut self, facility: Facility, severity: Severity) {
        self.thresholds[facility as usize] = severity;
    }

    /// Whether a message would be delivered.
    pub fn enabled(&self, facility: Facility, severity: Severity) -> bool {
        self.sink.is_some()
            && severity <= self.thresholds[facility as usize]
            && prival(facility, severity) <= MAX_PRIVAL
    }

    /// Log a message to the configured destinations.
    pub fn log(&mut self, facility: Facility, severity: Severity, message: fmt::Arguments) {
        if !self.enabled(facility, severity) {
            return;
        }

        let destinations = self.destinations;
        if let Some(sink) = self.sink.as_mut() {
            sink.log(message, facility, severity, destinations);
        }
    }
}

impl Default for Logger<'_> {
    fn default() -> Self {
        Logger::disabled()
    }
}

impl fmt::Debug for Logger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sink", &self.sink.is_some())
            .field("destinations", &self.destinations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::{String, ToString};
    use std::vec::Vec;

    #[derive(Default)]
    struct Record(Vec<(String, u8, Destinations)>);

    impl Sink for Record {
        fn log(&mut self, message: fmt::Arguments, facility: Facility, severity: Severity, dest: Destinations) {
            self.0.push((message.to_string(), prival(facility, severity), dest));
        }
    }

    #[test]
    fn thresholds() {
        let mut record = Record::default();
        let mut logger = Logger::new(&mut record);
        logger.log(Facility::Kern, Severity::Info, format_args!("RX ARPV4 Packet"));
        logger.log(Facility::Kern, Severity::Debug, format_args!("dropped"));
        logger.log(Facility::Udp, Severity::Info, format_args!("dropped"));
        logger.log(Facility::Udp, Severity::Notice, format_args!("port {}", 7));
        logger.set_threshold(Facility::Kern, Severity::Debug);
        logger.set_destinations(Destinations::CONSOLE);
        logger.log(Facility::Kern, Severity::Debug, format_args!("discarded"));
        drop(logger);

        assert_eq!(record.0, [
            (String::from("RX ARPV4 Packet"), 6, Destinations::all()),
            (String::from("port 7"), 17 * 8 + 5, Destinations::all()),
            (String::from("discarded"), 7, Destinations::CONSOLE),
        ]);
    }

    #[test]
    fn prival_limit() {
        assert_eq!(prival(Facility::Link, Severity::Debug), 183);
        assert!(prival(Facility::Link, Severity::Debug) <= MAX_PRIVAL);
        assert!(!Logger::disabled().enabled(Facility::Kern, Severity::Emergency));
    }
}
