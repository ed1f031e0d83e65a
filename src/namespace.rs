use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::EntityKind;

/// Protocol namespaces understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    SystemAll,
    SystemAbility,
    Toggle,
    ToggleX,
    Light,
    DiffuserLight,
    DiffuserSpray,
    DiffuserSensor,
    ThermostatMode,
    SensorLatest,
    SensorLatestX,
    Mp3,
}

/// What to do when a payload item names a channel with no registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    Ignore,
    LogOnly,
    CreateDefault(EntityKind),
}

impl Namespace {
    pub const ALL: [Namespace; 12] = [
        Namespace::SystemAll,
        Namespace::SystemAbility,
        Namespace::Toggle,
        Namespace::ToggleX,
        Namespace::Light,
        Namespace::DiffuserLight,
        Namespace::DiffuserSpray,
        Namespace::DiffuserSensor,
        Namespace::ThermostatMode,
        Namespace::SensorLatest,
        Namespace::SensorLatestX,
        Namespace::Mp3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Namespace::SystemAll => "Appliance.System.All",
            Namespace::SystemAbility => "Appliance.System.Ability",
            Namespace::Toggle => "Appliance.Control.Toggle",
            Namespace::ToggleX => "Appliance.Control.ToggleX",
            Namespace::Light => "Appliance.Control.Light",
            Namespace::DiffuserLight => "Appliance.Control.Diffuser.Light",
            Namespace::DiffuserSpray => "Appliance.Control.Diffuser.Spray",
            Namespace::DiffuserSensor => "Appliance.Control.Diffuser.Sensor",
            Namespace::ThermostatMode => "Appliance.Control.Thermostat.Mode",
            Namespace::SensorLatest => "Appliance.Control.Sensor.Latest",
            Namespace::SensorLatestX => "Appliance.Control.Sensor.LatestX",
            Namespace::Mp3 => "Appliance.Control.Mp3",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.name() == name)
    }

    /// Key wrapping the namespace's data inside a payload.
    pub fn key(&self) -> &'static str {
        match self {
            Namespace::SystemAll => "all",
            Namespace::SystemAbility => "ability",
            Namespace::Toggle => "toggle",
            Namespace::ToggleX => "togglex",
            Namespace::Light | Namespace::DiffuserLight => "light",
            Namespace::DiffuserSpray => "spray",
            Namespace::DiffuserSensor => "sensor",
            Namespace::ThermostatMode => "mode",
            Namespace::SensorLatest | Namespace::SensorLatestX => "latest",
            Namespace::Mp3 => "mp3",
        }
    }

    pub fn create_policy(&self) -> CreatePolicy {
        match self {
            Namespace::ToggleX => CreatePolicy::CreateDefault(EntityKind::Switch),
            Namespace::DiffuserLight => CreatePolicy::CreateDefault(EntityKind::DiffuserLight),
            Namespace::DiffuserSpray => CreatePolicy::CreateDefault(EntityKind::DiffuserSpray),
            Namespace::SystemAll | Namespace::SystemAbility => CreatePolicy::Ignore,
            _ => CreatePolicy::LogOnly,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    GetAck,
    Set,
    SetAck,
    Push,
    Error,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::GetAck => "GETACK",
            Method::Set => "SET",
            Method::SetAck => "SETACK",
            Method::Push => "PUSH",
            Method::Error => "ERROR",
        }
    }

    /// The method a device answers with when it accepts this request.
    pub fn ack(&self) -> Option<Method> {
        match self {
            Method::Get => Some(Method::GetAck),
            Method::Set => Some(Method::SetAck),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
