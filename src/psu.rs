use strum::IntoEnumIterator;

use crate::{
    acquisition::{AcquisitionController, AcquisitionReport, AcquisitionState, SampleBuffer},
    command::{CommandChannel, Dispatch},
    common::CommonCommands,
    config::DeviceConfig,
    error::{Error, Result},
    parameter::{Parameter, ParameterCache, Scope},
    status::{RegisterGroup, StandardEvent, StatusByte, StatusRegisters},
    transport::Transport,
    types::{Channel, Quantity, Relay, State, Statistic, TriggerTarget},
    validate::ParamValue,
};

#[derive(Debug)]
struct ChannelState {
    settings: ParameterCache<Parameter>,
    acquisition: AcquisitionController,
}

impl ChannelState {
    fn new(channel: Channel) -> Self {
        Self {
            settings: ParameterCache::new(),
            acquisition: AcquisitionController::new(channel),
        }
    }
}

/// You can create a Ngmo2 using any bus which implements [`Transport`].
///
/// "set" writes a parameter and caches the device's echo, "get" reads a parameter without
/// caching it, and "measure" reads a live value from the instrument.
///
/// Every parameter of every component is read on construction. From then on the cached values
/// only change when the device confirms them, see [`Self::cached`].
pub struct Ngmo2<T: Transport> {
    bus: CommandChannel<T>,
    device: ParameterCache<Parameter>,
    channels: [ChannelState; 2],
    relays: [ParameterCache<Parameter>; 4],
    status: StatusRegisters,
    common: CommonCommands,
    config: DeviceConfig,
}

impl<T: Transport> Ngmo2<T> {
    /// Connect over `transport`, read all parameters and select the configured data format.
    pub fn new(transport: T, config: DeviceConfig) -> Result<Self, T::Error> {
        let mut psu = Self {
            bus: CommandChannel::new(transport),
            device: ParameterCache::new(),
            channels: [ChannelState::new(Channel::A), ChannelState::new(Channel::B)],
            relays: Default::default(),
            status: StatusRegisters::new(),
            common: CommonCommands::new(),
            config,
        };
        psu.synchronize()?;
        let data_format = psu.config.data_format.clone();
        psu.set(Scope::Device, Parameter::DataFormat, data_format)?;
        Ok(psu)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Re-read every parameter of every component from the device.
    pub fn synchronize(&mut self) -> Result<(), T::Error> {
        for scope in scopes() {
            for parameter in Parameter::of_kind(scope.kind()) {
                self.refresh(scope, parameter)?;
            }
        }
        Ok(())
    }

    fn check_scope(scope: Scope, parameter: Parameter) -> Result<(), T::Error> {
        if parameter.scope_kind() != scope.kind() {
            return Err(Error::ScopeMismatch { parameter, scope });
        }
        Ok(())
    }

    fn cache_mut(
        &mut self,
        scope: Scope,
    ) -> (&mut CommandChannel<T>, &mut ParameterCache<Parameter>) {
        let cache = match scope {
            Scope::Device => &mut self.device,
            Scope::Channel(channel) => &mut self.channels[channel.index()].settings,
            Scope::Relay(relay) => &mut self.relays[relay.index()],
        };
        (&mut self.bus, cache)
    }

    /// Query `parameter`, or write `value` to it and cache the device's echo.
    pub fn read_write(
        &mut self,
        scope: Scope,
        parameter: Parameter,
        value: Option<ParamValue>,
    ) -> Result<Dispatch, T::Error> {
        Self::check_scope(scope, parameter)?;
        let spec = parameter.spec();
        let (bus, cache) = self.cache_mut(scope);
        bus.read_write(
            &spec.query.render(scope),
            &spec.write.render(scope),
            &spec.domain,
            value.as_ref(),
            cache,
            parameter,
        )
    }

    /// Read `parameter` from the device without touching the cache.
    pub fn get(&mut self, scope: Scope, parameter: Parameter) -> Result<String, T::Error> {
        match self.read_write(scope, parameter, None)? {
            Dispatch::Read(response) => Ok(response),
            other => Err(Error::invalid(format!("{other:?}"))),
        }
    }

    /// Write `value` to `parameter`.
    ///
    /// A rejected value is logged and returned as [`Dispatch::Rejected`]. Nothing is sent.
    pub fn set(
        &mut self,
        scope: Scope,
        parameter: Parameter,
        value: impl Into<ParamValue>,
    ) -> Result<Dispatch, T::Error> {
        self.read_write(scope, parameter, Some(value.into()))
    }

    /// Last device-confirmed value of `parameter`.
    pub fn cached(&self, scope: Scope, parameter: Parameter) -> Option<&str> {
        let cache = match scope {
            Scope::Device => &self.device,
            Scope::Channel(channel) => &self.channels[channel.index()].settings,
            Scope::Relay(relay) => &self.relays[relay.index()],
        };
        cache.get(&parameter)
    }

    /// Read `parameter` from the device and cache it.
    pub fn refresh(&mut self, scope: Scope, parameter: Parameter) -> Result<String, T::Error> {
        Self::check_scope(scope, parameter)?;
        let query = parameter.query_token(scope);
        let (bus, cache) = self.cache_mut(scope);
        bus.sync(&query, cache, parameter)
    }

    /// Enable the output of `channel`.
    pub fn on(&mut self, channel: Channel) -> Result<Dispatch, T::Error> {
        self.set(channel.into(), Parameter::Output, State::On)
    }

    /// Disable the output of `channel`.
    pub fn off(&mut self, channel: Channel) -> Result<Dispatch, T::Error> {
        self.set(channel.into(), Parameter::Output, State::Off)
    }

    /// Switch both outputs at the same instant.
    ///
    /// Channel B follows channel A while output coupling is on.
    pub fn set_all(&mut self, state: State) -> Result<Dispatch, T::Error> {
        self.bus.send(":CONF:A:COMM:OUTP:ONOF ON")?;
        let dispatch = self.set(Channel::A.into(), Parameter::Output, state);
        self.bus.send(":CONF:A:COMM:OUTP:ONOF OFF")?;
        let dispatch = dispatch?;
        self.refresh(Channel::B.into(), Parameter::Output)?;
        Ok(dispatch)
    }

    pub fn all_on(&mut self) -> Result<Dispatch, T::Error> {
        self.set_all(State::On)
    }

    pub fn all_off(&mut self) -> Result<Dispatch, T::Error> {
        self.set_all(State::Off)
    }

    pub fn set_display(&mut self, state: State) -> Result<Dispatch, T::Error> {
        self.set(Scope::Device, Parameter::DisplayEnabled, state)
    }

    pub fn set_relay(&mut self, relay: Relay, state: State) -> Result<Dispatch, T::Error> {
        self.set(relay.into(), Parameter::RelayState, state)
    }

    /// Arm a pulse measurement without triggering it.
    pub fn arm(&mut self, target: TriggerTarget) -> Result<(), T::Error> {
        self.bus.send(target.arm_token())
    }

    /// Arm and soft trigger a pulse measurement.
    pub fn trigger(&mut self, target: TriggerTarget) -> Result<(), T::Error> {
        self.bus.send(target.trigger_token())
    }

    /// State of the pulse measurement on `channel`, as reported by the device.
    pub fn pulse_state(&mut self, channel: Channel) -> Result<String, T::Error> {
        self.bus
            .read(&format!(":SENS:{}:PULS:MEAS:STAR?", channel.token()))
    }

    /// Return the measured output voltage (volts) or current (amps).
    pub fn measure(&mut self, channel: Channel, quantity: Quantity) -> Result<f64, T::Error> {
        let response = self
            .bus
            .read(&format!(":MEAS:{}:{}?", channel.token(), quantity.token()))?;
        parse_number(&response)
    }

    /// Return the output power in watts.
    pub fn power(&mut self, channel: Channel) -> Result<f64, T::Error> {
        let voltage = self.measure(channel, Quantity::Voltage)?;
        let current = self.measure(channel, Quantity::Current)?;
        Ok(voltage * current)
    }

    /// Return a statistic of `quantity` over the measurement interval.
    ///
    /// Switches the sense function first if it is not measuring `quantity`.
    pub fn statistic(
        &mut self,
        channel: Channel,
        quantity: Quantity,
        statistic: Statistic,
    ) -> Result<f64, T::Error> {
        let scope = Scope::from(channel);
        let sensing = self
            .cached(scope, Parameter::Sense)
            .is_some_and(|sense| {
                sense
                    .trim()
                    .to_ascii_uppercase()
                    .starts_with(quantity.token())
            });
        if !sensing {
            self.set(scope, Parameter::Sense, quantity.token())?;
        }
        let response = self
            .bus
            .read(&format!(":MEAS:{}:{}?", channel.token(), statistic.token()))?;
        parse_number(&response)
    }

    /// Enable/disable the open sense wire protection.
    pub fn set_open_sense_protection(
        &mut self,
        channel: Channel,
        state: State,
    ) -> Result<(), T::Error> {
        self.bus
            .send(&format!(":OUTP:{}:OPEN:{}", channel.token(), state.token()))
    }

    pub fn open_sense_protection(&mut self, channel: Channel) -> Result<State, T::Error> {
        let response = self
            .bus
            .read(&format!(":OUTP:{}:OPEN?", channel.token()))?;
        State::from_response(&response).ok_or(Error::InvalidResponse(response))
    }

    /// Run a pulse acquisition on `channel` using its cached sample settings.
    pub fn start_sample(&mut self, channel: Channel) -> Result<AcquisitionReport, T::Error> {
        let timeout = self.config.notification_timeout();
        let Self {
            bus,
            channels,
            status,
            common,
            ..
        } = self;
        let state = &mut channels[channel.index()];
        state
            .acquisition
            .run(bus, common, status, &state.settings, timeout)
    }

    /// Samples of the last successful acquisition on `channel`.
    pub fn samples(&self, channel: Channel) -> &SampleBuffer {
        self.channels[channel.index()].acquisition.samples()
    }

    pub fn acquisition_state(&self, channel: Channel) -> AcquisitionState {
        self.channels[channel.index()].acquisition.state()
    }

    pub fn read_event(&mut self, group: RegisterGroup) -> Result<u16, T::Error> {
        self.status.read_event(&mut self.bus, group)
    }

    pub fn read_condition(&mut self, group: RegisterGroup) -> Result<u16, T::Error> {
        self.status.read_condition(&mut self.bus, group)
    }

    pub fn enable(&mut self, group: RegisterGroup) -> Result<u16, T::Error> {
        self.status.enable(&mut self.bus, group)
    }

    pub fn set_enable(&mut self, group: RegisterGroup, value: u16) -> Result<Dispatch, T::Error> {
        self.status.set_enable(&mut self.bus, group, value)
    }

    pub fn preset_status(&mut self) -> Result<(), T::Error> {
        self.status.preset(&mut self.bus)
    }

    pub fn clear_error_queue(&mut self) -> Result<(), T::Error> {
        self.status.clear_error_queue(&mut self.bus)
    }

    pub fn error_queue(&mut self) -> Result<String, T::Error> {
        self.status.error_queue(&mut self.bus)
    }

    pub fn identify(&mut self) -> Result<String, T::Error> {
        self.common.idn(&mut self.bus)
    }

    pub fn clear_status(&mut self) -> Result<(), T::Error> {
        self.common.cls(&mut self.bus)
    }

    /// Reset the instrument and re-read every parameter.
    pub fn reset(&mut self) -> Result<(), T::Error> {
        self.common.rst(&mut self.bus)?;
        self.synchronize()
    }

    /// Save the current setup to `slot` (0 to 9).
    pub fn save(&mut self, slot: u8) -> Result<Dispatch, T::Error> {
        self.common.sav(&mut self.bus, Some(slot))
    }

    /// Recall the setup in `slot` (0 to 9) and re-read every parameter.
    pub fn recall(&mut self, slot: u8) -> Result<Dispatch, T::Error> {
        let dispatch = self.common.rcl(&mut self.bus, Some(slot))?;
        if !dispatch.is_rejected() {
            self.synchronize()?;
        }
        Ok(dispatch)
    }

    pub fn status_byte(&mut self) -> Result<StatusByte, T::Error> {
        self.common.stb(&mut self.bus)
    }

    pub fn standard_event(&mut self) -> Result<StandardEvent, T::Error> {
        self.common.esr(&mut self.bus)
    }

    pub fn set_event_enable(&mut self, mask: u8) -> Result<Dispatch, T::Error> {
        self.common.ese(&mut self.bus, Some(mask))
    }

    pub fn set_service_request_enable(&mut self, mask: u8) -> Result<Dispatch, T::Error> {
        self.common.sre(&mut self.bus, Some(mask))
    }

    /// Block until all pending operations have completed.
    pub fn operation_complete(&mut self) -> Result<bool, T::Error> {
        self.common.operation_complete(&mut self.bus)
    }

    pub fn set_operation_complete(&mut self) -> Result<(), T::Error> {
        self.common.set_operation_complete(&mut self.bus)
    }

    pub fn bus_trigger(&mut self) -> Result<(), T::Error> {
        self.common.trg(&mut self.bus)
    }

    pub fn wait(&mut self) -> Result<(), T::Error> {
        self.common.wait(&mut self.bus)
    }

    /// Run the instrument self test. Zero means passed.
    pub fn self_test(&mut self) -> Result<i32, T::Error> {
        self.common.tst(&mut self.bus)
    }

    /// Send a raw command.
    pub fn write(&mut self, command: &str) -> Result<(), T::Error> {
        self.bus.send(command)
    }

    /// Send a raw query.
    pub fn query(&mut self, command: &str) -> Result<String, T::Error> {
        self.bus.read(command)
    }

    /// Read a response in one of the binary data formats.
    pub fn read_raw(&mut self) -> Result<Vec<u8>, T::Error> {
        self.bus.transport_mut().read_raw()
    }

    /// Disconnect, returning the bus.
    pub fn into_transport(self) -> T {
        self.bus.into_inner()
    }
}

/// Every component of the instrument.
fn scopes() -> impl Iterator<Item = Scope> {
    core::iter::once(Scope::Device)
        .chain(Channel::iter().map(Scope::from))
        .chain(Relay::ALL.into_iter().map(Scope::from))
}

fn parse_number<I: embedded_io::Error>(response: &str) -> Result<f64, I> {
    response.trim().parse().map_err(|_| Error::invalid(response))
}
