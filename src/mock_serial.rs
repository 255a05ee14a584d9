//! We use this mocking module in unit tests to emulate a serial GPIB bridge.

/// Our mock type used to emulate a byte stream to the instrument.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 256>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum MockSerialError {
    /// No data available before the port's read timeout.
    #[error("Read timed out")]
    Timeout,
    /// Simulated buffer overflow
    #[error("Mock buffer full")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("Simulated serial error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        // A real port blocks until its timeout when the instrument stays silent.
        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::Timeout);
        }

        let available = &self.read_buffer[self.read_position..];
        let count = core::cmp::min(buf.len(), available.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.read_position += count;
        Ok(count)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Append a response the instrument will send, after any still unread data.
    pub fn queue_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::{StreamTransport, Transport};
    use embedded_io::{Read, Write};

    #[test]
    fn test_queued_data_is_read_in_order() {
        let mut mock = MockSerial::new();
        mock.queue_read_data(b"first\n").unwrap();
        mock.queue_read_data(b"second\n").unwrap();

        let mut buffer = [0u8; 13];
        assert_eq!(mock.read(&mut buffer).unwrap(), 13);
        assert_eq!(&buffer, b"first\nsecond\n");
        assert!(matches!(mock.read(&mut buffer), Err(MockSerialError::Timeout)));
    }

    #[test]
    fn test_errors_are_embedded_io_errors() {
        fn kind_of(error: &impl embedded_io::Error) -> embedded_io::ErrorKind {
            error.kind()
        }
        assert_eq!(kind_of(&MockSerialError::Timeout), embedded_io::ErrorKind::TimedOut);
        assert_eq!(MockSerialError::SimulatedError.to_string(), "Simulated serial error");

        let error: Error<MockSerialError> = Error::Bus(MockSerialError::BufferOverflow);
        assert_eq!(error.to_string(), "Bus communication error");
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let result = mock.write(&[0u8; 300]);
        assert!(matches!(result, Err(MockSerialError::BufferOverflow)));
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_write_error_reaches_transport() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        let mut transport: StreamTransport<MockSerial> = StreamTransport::new(mock);
        assert!(matches!(
            transport.write("*CLS"),
            Err(Error::Bus(MockSerialError::SimulatedError))
        ));
    }

    #[test]
    fn test_read_error_reaches_transport() {
        let mut mock = MockSerial::new();
        mock.queue_read_data(b"0\n").unwrap();
        mock.set_read_error(true);
        let mut transport: StreamTransport<MockSerial> = StreamTransport::new(mock);
        assert!(matches!(
            transport.query("*STB?"),
            Err(Error::Bus(MockSerialError::SimulatedError))
        ));
    }
}
