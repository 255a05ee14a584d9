//! IEEE 488.2 common commands.

use crate::command::{CommandChannel, Dispatch};
use crate::error::{Error, Result};
use crate::status::{StandardEvent, StatusByte};
use crate::transport::Transport;
use crate::validate::{Domain, PRESET, ParamValue, REGISTER_8};

/// Common command registers whose last device-confirmed value is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommonRegister {
    /// `*ESE`, the standard event enable mask.
    EventEnable,
    /// `*SRE`, the service request enable mask.
    ServiceRequestEnable,
    /// `*RCL`, last recalled setup slot.
    Recall,
    /// `*SAV`, last saved setup slot.
    Save,
}

impl CommonRegister {
    const fn command(self) -> &'static str {
        match self {
            CommonRegister::EventEnable => "*ESE",
            CommonRegister::ServiceRequestEnable => "*SRE",
            CommonRegister::Recall => "*RCL",
            CommonRegister::Save => "*SAV",
        }
    }

    const fn domain(self) -> Domain {
        match self {
            CommonRegister::EventEnable | CommonRegister::ServiceRequestEnable => REGISTER_8,
            CommonRegister::Recall | CommonRegister::Save => PRESET,
        }
    }
}

/// Access to the common commands, holding the cache of their registers.
#[derive(Debug, Default)]
pub struct CommonCommands {
    registers: crate::parameter::ParameterCache<CommonRegister>,
}

impl CommonCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last device-confirmed response for `register`.
    pub fn cached(&self, register: CommonRegister) -> Option<&str> {
        self.registers.get(&register)
    }

    fn read_write<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        register: CommonRegister,
        value: Option<ParamValue>,
    ) -> Result<Dispatch, T::Error> {
        let command = register.command();
        bus.read_write(
            &format!("{command}?"),
            command,
            &register.domain(),
            value.as_ref(),
            &mut self.registers,
            register,
        )
    }

    /// `*CLS`, clear all event registers and the error queue.
    pub fn cls<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<(), T::Error> {
        bus.send("*CLS")
    }

    /// `*ESE`, query or set the standard event enable mask.
    pub fn ese<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        value: Option<u8>,
    ) -> Result<Dispatch, T::Error> {
        self.read_write(bus, CommonRegister::EventEnable, value.map(ParamValue::from))
    }

    /// `*ESR?`, read and clear the standard event register.
    pub fn esr<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
    ) -> Result<StandardEvent, T::Error> {
        let response = bus.read("*ESR?")?;
        parse_byte(&response).map(StandardEvent::from)
    }

    /// `*IDN?`, the identification string.
    pub fn idn<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<String, T::Error> {
        bus.read("*IDN?")
    }

    /// `*OPC?`, blocks on the device side until pending operations complete.
    pub fn operation_complete<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
    ) -> Result<bool, T::Error> {
        let response = bus.read("*OPC?")?;
        Ok(response.trim() == "1")
    }

    /// `*OPC`, set the operation complete bit once pending operations complete.
    pub fn set_operation_complete<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
    ) -> Result<(), T::Error> {
        bus.send("*OPC")
    }

    /// `*RCL`, recall a saved setup (0 to 9).
    pub fn rcl<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        slot: Option<u8>,
    ) -> Result<Dispatch, T::Error> {
        self.read_write(bus, CommonRegister::Recall, slot.map(ParamValue::from))
    }

    /// `*RST` followed by `*CLS`.
    pub fn rst<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<(), T::Error> {
        bus.send("*RST")?;
        self.cls(bus)
    }

    /// `*SAV`, save the current setup (0 to 9).
    pub fn sav<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        slot: Option<u8>,
    ) -> Result<Dispatch, T::Error> {
        self.read_write(bus, CommonRegister::Save, slot.map(ParamValue::from))
    }

    /// `*SRE`, query or set the service request enable mask.
    pub fn sre<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        value: Option<u8>,
    ) -> Result<Dispatch, T::Error> {
        self.read_write(
            bus,
            CommonRegister::ServiceRequestEnable,
            value.map(ParamValue::from),
        )
    }

    /// `*STB?`, the status byte.
    pub fn stb<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
    ) -> Result<StatusByte, T::Error> {
        let response = bus.read("*STB?")?;
        parse_byte(&response).map(StatusByte::from)
    }

    /// `*TRG`, bus trigger.
    pub fn trg<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<(), T::Error> {
        bus.send("*TRG")
    }

    /// `*WAI`, hold off further commands until pending operations complete.
    pub fn wait<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<(), T::Error> {
        bus.send("*WAI")
    }

    /// `*TST?`, run the self test. Zero means passed.
    pub fn tst<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<i32, T::Error> {
        let response = bus.read("*TST?")?;
        response
            .trim()
            .trim_start_matches('+')
            .parse()
            .map_err(|_| Error::invalid(response.as_str()))
    }
}

fn parse_byte<I: embedded_io::Error>(response: &str) -> Result<u8, I> {
    response
        .trim()
        .trim_start_matches('+')
        .parse()
        .map_err(|_| Error::invalid(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_bus::MockBus;

    fn setup() -> (CommandChannel<MockBus>, CommonCommands) {
        (
            CommandChannel::new(MockBus::with_ngmo2_defaults()),
            CommonCommands::new(),
        )
    }

    #[test]
    fn rst_is_followed_by_cls() {
        let (mut bus, mut common) = setup();
        common.rst(&mut bus).unwrap();
        assert_eq!(bus.transport().writes(), vec!["*RST", "*CLS"]);
    }

    #[test]
    fn sre_read_modify_write() {
        let (mut bus, mut common) = setup();
        assert_eq!(
            common.sre(&mut bus, None).unwrap(),
            Dispatch::Read("0".into())
        );
        assert_eq!(common.cached(CommonRegister::ServiceRequestEnable), None);

        let dispatch = common.sre(&mut bus, Some(1)).unwrap();
        assert_eq!(dispatch, Dispatch::Updated("1".into()));
        assert_eq!(common.cached(CommonRegister::ServiceRequestEnable), Some("1"));
        assert_eq!(bus.transport().writes(), vec!["*SRE 1"]);
    }

    #[test]
    fn preset_slots_are_validated() {
        let (mut bus, mut common) = setup();
        let dispatch = common.sav(&mut bus, Some(10)).unwrap();
        assert_eq!(dispatch.rejection().unwrap().kind(), "ValueError");
        assert!(bus.transport().writes().is_empty());

        common.rcl(&mut bus, Some(3)).unwrap();
        assert_eq!(bus.transport().writes(), vec!["*RCL 3"]);
        assert_eq!(common.cached(CommonRegister::Recall), Some("3"));
    }

    #[test]
    fn status_byte_and_event_register() {
        let (mut bus, mut common) = setup();
        bus.transport_mut().respond("*STB?", "+68");
        bus.transport_mut().respond("*ESR?", "32");

        let status = common.stb(&mut bus).unwrap();
        assert!(status.request_service());
        assert!(status.error_queue_not_empty());
        assert!(common.esr(&mut bus).unwrap().command_error());
    }

    #[test]
    fn identification_and_self_test() {
        let (mut bus, mut common) = setup();
        bus.transport_mut()
            .respond("*IDN?", "Rohde&Schwarz,NGMO2,123456,1.0");
        bus.transport_mut().respond("*TST?", "0");
        bus.transport_mut().respond("*OPC?", "1");

        assert!(common.idn(&mut bus).unwrap().contains("NGMO2"));
        assert_eq!(common.tst(&mut bus).unwrap(), 0);
        assert!(common.operation_complete(&mut bus).unwrap());
    }

    #[test]
    fn garbage_status_byte_is_invalid_response() {
        let (mut bus, mut common) = setup();
        bus.transport_mut().respond("*STB?", "busy");
        assert!(matches!(
            common.stb(&mut bus),
            Err(Error::InvalidResponse(_))
        ));
    }
}
