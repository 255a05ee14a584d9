use std::env;

use fugit::MillisDurationU32;
use inquire::Select;
use ngmo2_psu::{
    acquisition::Outcome,
    config::DeviceConfig,
    parameter::{Parameter, Scope},
    psu::Ngmo2,
    transport::StreamTransport,
    types::{Channel, Quantity},
    validate::ParamValue,
};
use serialport::SerialPort;
use tracing_subscriber::EnvFilter;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 115200;
// Fetching a full pulse record over the bridge takes a while.
const SERIAL_TIMEOUT_MS: u64 = 500;
const OUTPUT_VOLTAGE: f64 = 5.0;
const CURRENT_LIMIT: f64 = 0.1;
const SAMPLE_LENGTH: i64 = 100;
const SAMPLE_INTERVAL: f64 = 0.0001;
// ASCII sample arrays of a few thousand points.
const RESPONSE_BUFFER: usize = 65536;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig::load().expect("Invalid ngmo2.toml or NGMO2_* environment");

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select the port of the GPIB bridge:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {} (resource {})", port_name, config.resource);

    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let transport: StreamTransport<PortWrapper, RESPONSE_BUFFER> =
        StreamTransport::new(PortWrapper(port))
            .with_poll_interval(MillisDurationU32::millis(config.poll_interval_ms));

    // Reads back every parameter, which takes a moment.
    let mut psu = Ngmo2::new(transport, config).expect("Failed to connect");
    println!("Connected to: {}", psu.identify().unwrap());

    let channel = Channel::A;
    let scope = Scope::from(channel);
    for (parameter, value) in [
        (Parameter::Voltage, ParamValue::from(OUTPUT_VOLTAGE)),
        (Parameter::CurrentLimit, ParamValue::from(CURRENT_LIMIT)),
        (Parameter::SampleSource, ParamValue::from("CURR")),
        (Parameter::SampleLength, ParamValue::from(SAMPLE_LENGTH)),
        (Parameter::SampleInterval, ParamValue::from(SAMPLE_INTERVAL)),
    ] {
        let dispatch = psu.read_write(scope, parameter, Some(value)).unwrap();
        println!("{parameter}: {:?}", dispatch);
    }

    psu.on(channel).unwrap();
    println!(
        "Measured output voltage: {:.3}V",
        psu.measure(channel, Quantity::Voltage).unwrap()
    );

    println!("\n--- Pulse Acquisition ---");
    let report = psu.start_sample(channel).unwrap();
    match report.outcome {
        Outcome::DataReady { kind, points } => {
            println!("{points} {kind:?} samples");
            let samples = psu.samples(channel);
            for (t, value) in samples.seconds().iter().zip(samples.values()) {
                println!("{t:.6}s\t{value}");
            }
        }
        Outcome::TimedOut => println!("No trigger within the trigger timeout"),
        Outcome::Unknown { event } => println!("Acquisition ended with event register {event}"),
    }
    if report.overflow {
        println!("Measurement range overflowed, samples are clipped");
    }

    psu.off(channel).unwrap();
}
