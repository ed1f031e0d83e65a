use std::fmt;

use serde_json::Value;

/// Scale between thermostat protocol temperatures and degrees Celsius.
pub const MTS_TEMP_SCALE: f64 = 10.0;

pub const DIFFUSER_SPRAY_MODE_ECO: i64 = 0;
pub const DIFFUSER_SPRAY_MODE_FULL: i64 = 1;
pub const DIFFUSER_SPRAY_MODE_OFF: i64 = 2;

pub const SPRAY_OPTION_OFF: &str = "off";
pub const SPRAY_OPTION_ECO: &str = "eco";
pub const SPRAY_OPTION_CONTINUOUS: &str = "continuous";

pub const DIFFUSER_LIGHT_MODE_COLOR: i64 = 1;
/// Indexed by the diffuser light `mode` field.
pub const DIFFUSER_LIGHT_MODE_LIST: &[&str] = &["Rainbow", "Color", "Temperature"];

pub const PRESET_CUSTOM: &str = "custom";
pub const PRESET_COMFORT: &str = "comfort";
pub const PRESET_SLEEP: &str = "sleep";
pub const PRESET_AWAY: &str = "away";
pub const PRESET_AUTO: &str = "auto";

/// Device-local index of a capability instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Int(i64),
    Str(String),
}

impl Channel {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Channel::Int),
            Value::String(s) => Some(Channel::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Channel::Int(i) => Value::from(*i),
            Channel::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl From<i64> for Channel {
    fn from(i: i64) -> Self {
        Channel::Int(i)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Channel::Str(s.to_string())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Int(i) => write!(f, "{i}"),
            Channel::Str(s) => f.write_str(s),
        }
    }
}

/// Identity of an entity inside its device. At least one part is set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    channel: Option<Channel>,
    entitykey: Option<String>,
}

impl EntityId {
    pub fn channel(channel: impl Into<Channel>) -> Self {
        Self {
            channel: Some(channel.into()),
            entitykey: None,
        }
    }

    pub fn key(entitykey: impl Into<String>) -> Self {
        Self {
            channel: None,
            entitykey: Some(entitykey.into()),
        }
    }

    pub fn with_key(channel: impl Into<Channel>, entitykey: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            entitykey: Some(entitykey.into()),
        }
    }

    pub fn get_channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    pub fn get_entitykey(&self) -> Option<&str> {
        self.entitykey.as_deref()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.channel, &self.entitykey) {
            (Some(c), Some(k)) => write!(f, "{c}_{k}"),
            (Some(c), None) => write!(f, "{c}"),
            (None, Some(k)) => f.write_str(k),
            (None, None) => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Switch,
    Light,
    DiffuserLight,
    DiffuserSpray,
    Climate,
    Sensor,
    BinarySensor,
    StateSensor,
    MediaPlayer,
}

/// Static lookup from a raw thermostat mode to a named preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetMap(pub &'static [(i64, &'static str)]);

impl PresetMap {
    pub fn preset(&self, mode: i64) -> Option<&'static str> {
        self.0.iter().find(|(m, _)| *m == mode).map(|(_, p)| *p)
    }

    pub fn mode(&self, preset: &str) -> Option<i64> {
        self.0.iter().find(|(_, p)| *p == preset).map(|(m, _)| *m)
    }
}

pub const MTS100_PRESETS: PresetMap = PresetMap(&[
    (0, PRESET_CUSTOM),
    (1, PRESET_COMFORT),
    (2, PRESET_SLEEP),
    (3, PRESET_AUTO),
    (4, PRESET_AWAY),
]);

pub const MTS200_PRESETS: PresetMap = PresetMap(&[
    (0, PRESET_COMFORT),
    (1, PRESET_SLEEP),
    (2, PRESET_AWAY),
    (3, PRESET_AUTO),
    (4, PRESET_CUSTOM),
]);

/// Thermostat.Mode is only carried by the MTS200.
pub const THERMOSTAT_MODE_PRESETS: PresetMap = MTS200_PRESETS;

/// Optional climate sub-sensors, or-ed into a mask.
pub const CLIMATE_SENSOR_NONE: u8 = 0;
pub const CLIMATE_SENSOR_OUTPUT_POWER_STATE: u8 = 1;
pub const CLIMATE_SENSOR_MODE_STATE: u8 = 2;

pub const MODE_STATE_OFF: &str = "off";
pub const MODE_STATE_HEATING: &str = "heating";
pub const MODE_STATE_IDLE: &str = "idle";

pub const MP3_SONG_MIN: i64 = 1;
pub const MP3_SONG_MAX: i64 = 11;
pub const MP3_VOLUME_MAX: i64 = 16;

pub const MEDIA_STATE_PLAYING: &str = "playing";
pub const MEDIA_STATE_IDLE: &str = "idle";

const MP3_SONG_TITLES: &[&str] = &[
    "Cicada Chirping",
    "Rain Sound",
    "Ripple Sound",
    "Birdsong",
    "Lullaby",
    "Fan Sound",
    "Crystal Ball",
    "Music Box",
    "White Noise",
    "Thunder",
    "Ocean Wave",
];

pub fn mp3_song_title(song: i64) -> Option<&'static str> {
    let index = usize::try_from(song - MP3_SONG_MIN).ok()?;
    MP3_SONG_TITLES.get(index).copied()
}

/// Next track, wrapping from the last song to the first.
pub fn mp3_next_song(song: Option<i64>) -> i64 {
    match song {
        Some(s) if s < MP3_SONG_MAX => s + 1,
        _ => MP3_SONG_MIN,
    }
}

pub fn mp3_previous_song(song: Option<i64>) -> i64 {
    match song {
        None => MP3_SONG_MIN,
        Some(s) if s <= MP3_SONG_MIN => MP3_SONG_MAX,
        Some(s) => s - 1,
    }
}

/// Volume level in `0.0..=1.0` to the device's volume steps.
pub fn mp3_volume(level: f64) -> i64 {
    ((level * MP3_VOLUME_MAX as f64).round() as i64).clamp(0, MP3_VOLUME_MAX)
}

pub fn spray_option(mode: i64) -> Option<&'static str> {
    match mode {
        DIFFUSER_SPRAY_MODE_OFF => Some(SPRAY_OPTION_OFF),
        DIFFUSER_SPRAY_MODE_ECO => Some(SPRAY_OPTION_ECO),
        DIFFUSER_SPRAY_MODE_FULL => Some(SPRAY_OPTION_CONTINUOUS),
        _ => None,
    }
}

pub fn spray_mode(option: &str) -> Option<i64> {
    match option {
        SPRAY_OPTION_OFF => Some(DIFFUSER_SPRAY_MODE_OFF),
        SPRAY_OPTION_ECO => Some(DIFFUSER_SPRAY_MODE_ECO),
        SPRAY_OPTION_CONTINUOUS => Some(DIFFUSER_SPRAY_MODE_FULL),
        _ => None,
    }
}

/// Device scale for sensor keys carried by Sensor.Latest(X).
pub fn sensor_scale(key: &str) -> f64 {
    match key {
        "humi" => 10.0,
        "temp" => 100.0,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId::channel(0).to_string(), "0");
        assert_eq!(EntityId::key("humidity").to_string(), "humidity");
        assert_eq!(EntityId::with_key(1, "temperature").to_string(), "1_temperature");
        assert_eq!(EntityId::channel("abc").to_string(), "abc");
    }

    #[test]
    fn channel_from_json() {
        assert_eq!(Channel::from_value(&json!(2)), Some(Channel::Int(2)));
        assert_eq!(Channel::from_value(&json!("sub1")), Some(Channel::from("sub1")));
        assert_eq!(Channel::from_value(&json!(null)), None);
        assert_eq!(Channel::Int(3).to_value(), json!(3));
    }

    #[test]
    fn preset_lookup() {
        assert_eq!(MTS100_PRESETS.preset(0), Some(PRESET_CUSTOM));
        assert_eq!(MTS100_PRESETS.preset(1), Some(PRESET_COMFORT));
        assert_eq!(MTS100_PRESETS.preset(9), None);
        assert_eq!(MTS200_PRESETS.mode(PRESET_CUSTOM), Some(4));
        assert_eq!(MTS200_PRESETS.mode("boost"), None);
    }

    #[test]
    fn spray_options_invert() {
        for mode in [DIFFUSER_SPRAY_MODE_ECO, DIFFUSER_SPRAY_MODE_FULL, DIFFUSER_SPRAY_MODE_OFF] {
            let option = spray_option(mode).unwrap();
            assert_eq!(spray_mode(option), Some(mode));
        }
        assert_eq!(spray_option(7), None);
    }

    #[test]
    fn mp3_tracks_wrap_around() {
        assert_eq!(mp3_next_song(None), MP3_SONG_MIN);
        assert_eq!(mp3_next_song(Some(MP3_SONG_MAX)), MP3_SONG_MIN);
        assert_eq!(mp3_previous_song(Some(MP3_SONG_MIN)), MP3_SONG_MAX);
        assert_eq!(mp3_previous_song(Some(5)), 4);
        assert_eq!(mp3_song_title(9), Some("White Noise"));
        assert_eq!(mp3_song_title(0), None);
        assert_eq!(mp3_song_title(12), None);
    }

    #[test]
    fn mp3_volume_is_clamped() {
        assert_eq!(mp3_volume(0.5), 8);
        assert_eq!(mp3_volume(1.7), MP3_VOLUME_MAX);
        assert_eq!(mp3_volume(-0.2), 0);
    }
}
