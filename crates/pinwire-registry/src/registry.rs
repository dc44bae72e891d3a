use bytes::{BufMut, BytesMut};
use pinwire_codec::command::{
    sysex_name, CAPABILITY_PIN_END, CAPABILITY_QUERY, CAPABILITY_RESPONSE, PIN_STATE_QUERY,
    PIN_STATE_RESPONSE, SYSTEM_VARIABLE,
};
use pinwire_codec::Message;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::feature::{CapabilityWriter, FeatureContext, FeatureHandler};
use crate::outbox::Outbox;
use crate::pins::{encode_pin_state, PinMode, PinTable};
use crate::sysvar::{SystemVariable, SYSVAR_AVAILABLE, SYSVAR_MAX_SYSEX, SYSVAR_RECEIVE_BUFFER};

/// Board-level system variable hook, consulted before the handlers.
pub type SystemVariableHook = Box<dyn FnMut(&mut SystemVariable) -> bool>;

/// Ordered feature handlers plus the pin table they share.
///
/// The single dispatch point for pin modes, capability and pin-state
/// queries, system variables and sysex commands. Dispatch never fails:
/// input nobody claims is answered with a diagnostic in the outbox.
pub struct CapabilityRegistry {
    features: Vec<Box<dyn FeatureHandler>>,
    pins: PinTable,
    outbox: Outbox,
    hook: Option<SystemVariableHook>,
    config: RegistryConfig,
}

impl CapabilityRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config; every pin starts as
    /// an output.
    pub fn with_config(config: RegistryConfig) -> Self {
        let pins = PinTable::new(config.total_pins, PinMode::Output);
        Self::with_pins(config, pins)
    }

    /// Create an empty registry over an existing pin table.
    pub fn with_pins(config: RegistryConfig, pins: PinTable) -> Self {
        Self {
            features: Vec::new(),
            pins,
            outbox: Outbox::new(),
            hook: None,
            config,
        }
    }

    /// Append a handler. Its position is its dispatch priority.
    pub fn register_feature(&mut self, feature: Box<dyn FeatureHandler>) -> Result<()> {
        if self.features.len() >= self.config.max_features {
            return Err(RegistryError::TooManyFeatures {
                max: self.config.max_features,
            });
        }
        info!(
            feature = feature.name(),
            position = self.features.len(),
            "registered feature"
        );
        self.features.push(feature);
        Ok(())
    }

    /// Register a concrete handler.
    pub fn register<F: FeatureHandler + 'static>(&mut self, feature: F) -> Result<()> {
        self.register_feature(Box::new(feature))
    }

    /// Handler names in registration (dispatch) order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    /// Install the board-level system variable hook.
    pub fn set_system_variable_hook(
        &mut self,
        hook: impl FnMut(&mut SystemVariable) -> bool + 'static,
    ) {
        self.hook = Some(Box::new(hook));
    }

    /// Offer a mode assignment to every handler.
    ///
    /// Returns whether any handler claimed it. A claimed mode is recorded in
    /// the pin table. An unclaimed mode other than `Ignore` produces exactly
    /// one diagnostic.
    pub fn on_set_pin_mode(&mut self, pin: u8, mode: PinMode) -> bool {
        let mut ctx = FeatureContext::new(&mut self.pins, &mut self.outbox);
        let mut claimed = false;
        for feature in self.features.iter_mut() {
            if feature.handle_pin_mode(pin, mode, &mut ctx) {
                debug!(feature = feature.name(), pin, %mode, "pin mode claimed");
                claimed = true;
            }
        }

        if claimed {
            if self.pins.set_mode(pin, mode).is_err() {
                debug!(pin, "claimed mode for pin outside the pin table");
            }
        } else if mode != PinMode::Ignore {
            self.outbox.diagnostic("Unknown pin mode");
        }
        claimed
    }

    /// Queue a CAPABILITY_RESPONSE.
    ///
    /// Every pin's list is terminated by 127; pins in `Ignore` mode list
    /// nothing else.
    pub fn on_capability_query(&mut self) {
        let mut body = BytesMut::new();
        for (pin, state) in self.pins.iter() {
            if state.mode != PinMode::Ignore {
                let mut caps = CapabilityWriter::new(&mut body);
                for feature in self.features.iter_mut() {
                    feature.handle_capability(pin, &mut caps);
                }
            }
            body.put_u8(CAPABILITY_PIN_END);
        }
        self.outbox.sysex(CAPABILITY_RESPONSE, body.freeze());
    }

    /// Queue a PIN_STATE_RESPONSE for `pin`; `false` if the pin does not
    /// exist.
    pub fn on_pin_state_query(&mut self, pin: u8) -> bool {
        let Some(state) = self.pins.get(pin).copied() else {
            return false;
        };
        let mut body = vec![pin, state.mode.code()];
        body.extend(encode_pin_state(state.state));
        self.outbox.sysex(PIN_STATE_RESPONSE, body);
        true
    }

    /// Answer a SYSTEM_VARIABLE request.
    ///
    /// Ids 0-2 are answered here; other ids go to the board hook and then to
    /// each handler until one answers. A well-formed request always gets a
    /// response; a short one gets a diagnostic instead.
    pub fn on_system_variable(&mut self, args: &[u8]) {
        let mut query = match SystemVariable::decode_request(args) {
            Ok(query) => query,
            Err(_) => {
                self.outbox
                    .diagnostic("Not enough bytes in SYSTEM_VARIABLE message");
                return;
            }
        };

        let answered = self.answer_builtin(&mut query)
            || self.hook.as_mut().is_some_and(|hook| hook(&mut query))
            || {
                let mut ctx = FeatureContext::new(&mut self.pins, &mut self.outbox);
                self.features
                    .iter_mut()
                    .any(|feature| feature.handle_system_variable(&mut query, &mut ctx))
            };
        if !answered {
            debug!(id = query.id, pin = query.pin, "unanswered system variable");
        }

        self.outbox.sysex(SYSTEM_VARIABLE, query.encode());
    }

    fn answer_builtin(&self, query: &mut SystemVariable) -> bool {
        let value = match query.id {
            SYSVAR_AVAILABLE => 1,
            SYSVAR_MAX_SYSEX => self.config.max_sysex_size,
            SYSVAR_RECEIVE_BUFFER => self.config.receive_buffer_size,
            _ => return false,
        };
        query.answer_int(i32::try_from(value).unwrap_or(i32::MAX));
        true
    }

    /// Dispatch a sysex command.
    ///
    /// Capability, pin-state and system variable queries are answered here;
    /// anything else goes to each handler in order until one claims it.
    /// Returns whether the command was handled; unhandled commands produce a
    /// diagnostic naming the command and argument length.
    pub fn on_sysex(&mut self, command: u8, args: &[u8]) -> bool {
        let handled = match command {
            CAPABILITY_QUERY => {
                self.on_capability_query();
                true
            }
            PIN_STATE_QUERY => match args.first() {
                Some(&pin) => self.on_pin_state_query(pin),
                None => false,
            },
            SYSTEM_VARIABLE => {
                self.on_system_variable(args);
                true
            }
            _ => self.dispatch_sysex(command, args),
        };

        if !handled {
            self.outbox.diagnostic(format!(
                "Unhandled sysex command: 0x{command:x} (len: {})",
                args.len()
            ));
        }
        handled
    }

    fn dispatch_sysex(&mut self, command: u8, args: &[u8]) -> bool {
        let mut ctx = FeatureContext::new(&mut self.pins, &mut self.outbox);
        for feature in self.features.iter_mut() {
            if feature.handle_sysex(command, args, &mut ctx) {
                debug!(
                    feature = feature.name(),
                    command = sysex_name(command),
                    len = args.len(),
                    "sysex claimed"
                );
                return true;
            }
        }
        false
    }

    /// Offer a fixed-format message to each handler until one claims it.
    pub fn on_message(&mut self, command: u8, data: &[u8]) -> bool {
        let mut ctx = FeatureContext::new(&mut self.pins, &mut self.outbox);
        let claimed = self
            .features
            .iter_mut()
            .any(|feature| feature.handle_message(command, data, &mut ctx));
        if !claimed {
            self.outbox
                .diagnostic(format!("Unhandled message: 0x{command:x}"));
        }
        claimed
    }

    /// Restore default pin modes, then reset every handler in order.
    pub fn reset(&mut self) {
        self.pins.reset();
        let mut ctx = FeatureContext::new(&mut self.pins, &mut self.outbox);
        for feature in self.features.iter_mut() {
            feature.reset(&mut ctx);
        }
        debug!(features = self.features.len(), "registry reset");
    }

    /// Give every handler its per-loop report call.
    pub fn report(&mut self, elapsed: bool) {
        let mut ctx = FeatureContext::new(&mut self.pins, &mut self.outbox);
        for feature in self.features.iter_mut() {
            feature.report(elapsed, &mut ctx);
        }
    }

    pub fn pins(&self) -> &PinTable {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut PinTable {
        &mut self.pins
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    /// Remove and return every queued outbound message.
    pub fn take_outbound(&mut self) -> Vec<Message> {
        self.outbox.take()
    }

    /// Current registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
