use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::aggregator::DEFAULT_QUIET_PERIOD;
use crate::session::{SessionOptions, DEFAULT_COMMAND_TIMEOUT, DEFAULT_PORT};

/// Which command classes wait for the controller to acknowledge.
///
/// Queries always wait for a reply and are not part of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AckFlags {
    pub power: bool,
    pub color: bool,
    pub pattern: bool,
    pub custom_pattern: bool,
}

impl Default for AckFlags {
    fn default() -> Self {
        AckFlags::from_mask(0x0f)
    }
}

impl AckFlags {
    /// Bit 0 power, bit 1 color, bit 2 pattern, bit 3 custom pattern.
    pub fn from_mask(mask: u8) -> Self {
        AckFlags {
            power: mask & 0x01 > 0,
            color: mask & 0x02 > 0,
            pattern: mask & 0x04 > 0,
            custom_pattern: mask & 0x08 > 0,
        }
    }

    pub fn mask(&self) -> u8 {
        (self.power as u8)
            | (self.color as u8) << 1
            | (self.pattern as u8) << 2
            | (self.custom_pattern as u8) << 3
    }

    /// Translation of the deprecated single `wait_for_reply` switch.
    pub fn from_wait_for_reply(wait_for_reply: bool) -> Self {
        if wait_for_reply {
            AckFlags::from_mask(0x0f)
        } else {
            AckFlags::from_mask(0)
        }
    }
}

/// Options of a [`Control`](crate::control_interface::Control).
///
/// Durations are (de)serialized as milliseconds, `null` disables a timeout.
/// A deserialized option set may carry the deprecated `wait_for_reply`
/// boolean, which then replaces `ack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawControlOptions")]
pub struct ControlOptions {
    pub port: u16,
    pub log_all_received: bool,
    /// Set the mask byte in partial color updates instead of resending the
    /// last known values. Switched on by [`query_state`] for controllers
    /// which need it.
    ///
    /// [`query_state`]: crate::control_interface::Control::query_state
    pub apply_masks: bool,
    /// Send the wider color frame which carries a cold white channel.
    pub cold_white_support: bool,
    #[serde(with = "millis_opt")]
    pub connect_timeout: Option<Duration>,
    #[serde(with = "millis_opt")]
    pub command_timeout: Option<Duration>,
    #[serde(with = "millis")]
    pub reply_quiet_period: Duration,
    pub ack: AckFlags,
}

impl Default for ControlOptions {
    fn default() -> Self {
        ControlOptions {
            port: DEFAULT_PORT,
            log_all_received: false,
            apply_masks: false,
            cold_white_support: false,
            connect_timeout: None,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            reply_quiet_period: DEFAULT_QUIET_PERIOD,
            ack: AckFlags::default(),
        }
    }
}

impl ControlOptions {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ack(mut self, ack: AckFlags) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_wait_for_reply(mut self, wait_for_reply: bool) -> Self {
        self.ack = AckFlags::from_wait_for_reply(wait_for_reply);
        self
    }

    pub fn with_apply_masks(mut self, apply_masks: bool) -> Self {
        self.apply_masks = apply_masks;
        self
    }

    pub fn with_cold_white_support(mut self, cold_white_support: bool) -> Self {
        self.cold_white_support = cold_white_support;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_command_timeout(mut self, command_timeout: Option<Duration>) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn with_reply_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.reply_quiet_period = quiet_period;
        self
    }

    pub fn with_log_all_received(mut self, log_all_received: bool) -> Self {
        self.log_all_received = log_all_received;
        self
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            port: self.port,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            reply_quiet_period: self.reply_quiet_period,
            log_all_received: self.log_all_received,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawControlOptions {
    port: u16,
    log_all_received: bool,
    apply_masks: bool,
    cold_white_support: bool,
    #[serde(with = "millis_opt")]
    connect_timeout: Option<Duration>,
    #[serde(with = "millis_opt")]
    command_timeout: Option<Duration>,
    #[serde(with = "millis")]
    reply_quiet_period: Duration,
    ack: AckFlags,
    wait_for_reply: Option<bool>,
}

impl Default for RawControlOptions {
    fn default() -> Self {
        let defaults = ControlOptions::default();
        RawControlOptions {
            port: defaults.port,
            log_all_received: defaults.log_all_received,
            apply_masks: defaults.apply_masks,
            cold_white_support: defaults.cold_white_support,
            connect_timeout: defaults.connect_timeout,
            command_timeout: defaults.command_timeout,
            reply_quiet_period: defaults.reply_quiet_period,
            ack: defaults.ack,
            wait_for_reply: None,
        }
    }
}

impl From<RawControlOptions> for ControlOptions {
    fn from(raw: RawControlOptions) -> Self {
        ControlOptions {
            port: raw.port,
            log_all_received: raw.log_all_received,
            apply_masks: raw.apply_masks,
            cold_white_support: raw.cold_white_support,
            connect_timeout: raw.connect_timeout,
            command_timeout: raw.command_timeout,
            reply_quiet_period: raw.reply_quiet_period,
            ack: raw
                .wait_for_reply
                .map(AckFlags::from_wait_for_reply)
                .unwrap_or(raw.ack),
        }
    }
}

/// Options of a [`ControlAddressable`](crate::control_interface::addressable::ControlAddressable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressableOptions {
    pub port: u16,
    pub log_all_received: bool,
    #[serde(with = "millis_opt")]
    pub connect_timeout: Option<Duration>,
    #[serde(with = "millis_opt")]
    pub command_timeout: Option<Duration>,
    #[serde(with = "millis")]
    pub reply_quiet_period: Duration,
}

impl Default for AddressableOptions {
    fn default() -> Self {
        AddressableOptions {
            port: DEFAULT_PORT,
            log_all_received: false,
            connect_timeout: None,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            reply_quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

impl AddressableOptions {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            port: self.port,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            reply_quiet_period: self.reply_quiet_period,
            log_all_received: self.log_all_received,
        }
    }
}

impl From<&ControlOptions> for AddressableOptions {
    fn from(options: &ControlOptions) -> Self {
        AddressableOptions {
            port: options.port,
            log_all_received: options.log_all_received,
            connect_timeout: options.connect_timeout,
            command_timeout: options.command_timeout,
            reply_quiet_period: options.reply_quiet_period,
        }
    }
}

/// Options of an [`EffectInterface`](crate::effect::EffectInterface).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOptions {
    pub port: u16,
    #[serde(with = "millis_opt")]
    pub connect_timeout: Option<Duration>,
    /// Upper bound for an acknowledgement, `None` waits forever.
    #[serde(with = "millis_opt")]
    pub command_timeout: Option<Duration>,
    /// Wait for the controller to answer every color frame.
    pub color_ack: bool,
    pub apply_masks: bool,
    pub cold_white_support: bool,
}

impl Default for EffectOptions {
    fn default() -> Self {
        EffectOptions::from(&ControlOptions::default())
    }
}

impl From<&ControlOptions> for EffectOptions {
    fn from(options: &ControlOptions) -> Self {
        EffectOptions {
            port: options.port,
            connect_timeout: options.connect_timeout,
            command_timeout: options.command_timeout,
            color_ack: options.ack.color,
            apply_masks: options.apply_masks,
            cold_white_support: options.cold_white_support,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
