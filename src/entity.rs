use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::namespace::Namespace;
use crate::types::*;
use crate::{Error, Result};

/// Called with the entity every time its reconciled state changes.
pub type FlushHook = Arc<dyn Fn(&Entity) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct NumericState {
    pub device_value: Option<f64>,
    pub native_value: Option<f64>,
    pub device_scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeState {
    pub mode: Option<i64>,
    pub preset: Option<&'static str>,
    pub presets: PresetMap,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightState {
    pub luminance: Option<i64>,
    pub rgb: Option<i64>,
    pub temperature: Option<i64>,
    pub effect: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimateState {
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub current_humidity: Option<f64>,
    pub heating: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mp3State {
    pub muted: Option<bool>,
    pub track: Option<i64>,
    pub title: Option<&'static str>,
    /// `0.0..=1.0`
    pub volume: Option<f64>,
}

/// A device sub-feature built from independent state components.
///
/// Cached state only changes through the `update_*` methods (or `parse`),
/// which compare against the cached value and flush on change.
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    namespace: Option<Namespace>,
    available: bool,
    numeric: Option<NumericState>,
    is_on: Option<Option<bool>>,
    state: Option<Option<String>>,
    mode: Option<ModeState>,
    light: Option<LightState>,
    climate: Option<ClimateState>,
    mp3: Option<Mp3State>,
    extra_attributes: Map<String, Value>,
    namespaces: BTreeSet<Namespace>,
    flush_hook: Option<FlushHook>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("available", &self.available)
            .field("numeric", &self.numeric)
            .field("is_on", &self.is_on)
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("light", &self.light)
            .field("climate", &self.climate)
            .field("mp3", &self.mp3)
            .field("extra_attributes", &self.extra_attributes)
            .finish()
    }
}

impl Entity {
    fn bare(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            namespace: None,
            available: false,
            numeric: None,
            is_on: None,
            state: None,
            mode: None,
            light: None,
            climate: None,
            mp3: None,
            extra_attributes: Map::new(),
            namespaces: BTreeSet::new(),
            flush_hook: None,
        }
    }

    /// Default entity for a kind, as created on demand by the dispatcher.
    pub fn of_kind(kind: EntityKind, id: EntityId, namespace: Namespace) -> Self {
        match kind {
            EntityKind::Switch => Self::switch(id, namespace),
            EntityKind::Light => Self::light(id, namespace),
            EntityKind::DiffuserLight => Self::diffuser_light(id),
            EntityKind::DiffuserSpray => Self::diffuser_spray(id),
            EntityKind::Climate => Self::climate(id, THERMOSTAT_MODE_PRESETS),
            EntityKind::Sensor => Self::sensor(id, 1.0),
            EntityKind::BinarySensor => Self::binary_sensor(id),
            EntityKind::StateSensor => Self::state_sensor(id),
            EntityKind::MediaPlayer => Self::media_player(id),
        }
    }

    pub fn switch(id: EntityId, namespace: Namespace) -> Self {
        let mut entity = Self::bare(id, EntityKind::Switch);
        entity.namespace = Some(namespace);
        entity.is_on = Some(None);
        entity
    }

    pub fn light(id: EntityId, namespace: Namespace) -> Self {
        let mut entity = Self::bare(id, EntityKind::Light);
        entity.namespace = Some(namespace);
        entity.is_on = Some(None);
        entity.light = Some(LightState::default());
        entity
    }

    pub fn diffuser_light(id: EntityId) -> Self {
        let mut entity = Self::light(id, Namespace::DiffuserLight);
        entity.kind = EntityKind::DiffuserLight;
        entity
    }

    pub fn diffuser_spray(id: EntityId) -> Self {
        let mut entity = Self::bare(id, EntityKind::DiffuserSpray);
        entity.namespace = Some(Namespace::DiffuserSpray);
        entity.state = Some(None);
        entity
    }

    pub fn climate(id: EntityId, presets: PresetMap) -> Self {
        let mut entity = Self::bare(id, EntityKind::Climate);
        entity.namespace = Some(Namespace::ThermostatMode);
        entity.is_on = Some(None);
        entity.mode = Some(ModeState {
            mode: None,
            preset: None,
            presets,
        });
        entity.climate = Some(ClimateState::default());
        entity
    }

    pub fn sensor(id: EntityId, device_scale: f64) -> Self {
        let mut entity = Self::bare(id, EntityKind::Sensor);
        entity.numeric = Some(NumericState {
            device_value: None,
            native_value: None,
            device_scale,
        });
        entity
    }

    /// Read-only on/off state fed by another entity.
    pub fn binary_sensor(id: EntityId) -> Self {
        let mut entity = Self::bare(id, EntityKind::BinarySensor);
        entity.is_on = Some(None);
        entity
    }

    /// Read-only enumerated state with attributes.
    pub fn state_sensor(id: EntityId) -> Self {
        let mut entity = Self::bare(id, EntityKind::StateSensor);
        entity.state = Some(None);
        entity
    }

    pub fn media_player(id: EntityId) -> Self {
        let mut entity = Self::bare(id, EntityKind::MediaPlayer);
        entity.namespace = Some(Namespace::Mp3);
        entity.state = Some(None);
        entity.mp3 = Some(Mp3State::default());
        entity
    }

    pub(crate) fn set_flush_hook(&mut self, hook: Option<FlushHook>) {
        self.flush_hook = hook;
    }

    pub(crate) fn namespaces_mut(&mut self) -> &mut BTreeSet<Namespace> {
        &mut self.namespaces
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Namespace used to command this entity, if it accepts commands.
    pub fn namespace(&self) -> Option<Namespace> {
        self.namespace
    }

    pub fn namespaces(&self) -> &BTreeSet<Namespace> {
        &self.namespaces
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn is_on(&self) -> Option<bool> {
        self.is_on.flatten()
    }

    pub fn device_value(&self) -> Option<f64> {
        self.numeric.as_ref().and_then(|n| n.device_value)
    }

    pub fn native_value(&self) -> Option<f64> {
        self.numeric.as_ref().and_then(|n| n.native_value)
    }

    pub fn device_scale(&self) -> Option<f64> {
        self.numeric.as_ref().map(|n| n.device_scale)
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.as_deref())
    }

    pub fn mode(&self) -> Option<i64> {
        self.mode.as_ref().and_then(|m| m.mode)
    }

    pub fn preset(&self) -> Option<&'static str> {
        self.mode.as_ref().and_then(|m| m.preset)
    }

    pub fn presets(&self) -> Option<PresetMap> {
        self.mode.as_ref().map(|m| m.presets)
    }

    pub fn light_state(&self) -> Option<&LightState> {
        self.light.as_ref()
    }

    pub fn climate_state(&self) -> Option<&ClimateState> {
        self.climate.as_ref()
    }

    pub fn mp3_state(&self) -> Option<&Mp3State> {
        self.mp3.as_ref()
    }

    pub fn extra_attributes(&self) -> &Map<String, Value> {
        &self.extra_attributes
    }

    // -- Reconciler --

    pub fn update_onoff(&mut self, onoff: bool) -> bool {
        if self.is_on.is_none() {
            return false;
        }
        let changed = self.apply_onoff(onoff);
        self.commit(changed)
    }

    pub fn update_device_value(&mut self, device_value: f64) -> bool {
        if self.numeric.is_none() {
            return false;
        }
        let changed = self.apply_device_value(device_value);
        self.commit(changed)
    }

    /// Updates at the native layer; the device value is derived back from it.
    pub fn update_native_value(&mut self, native_value: f64) -> bool {
        let Some(numeric) = self.numeric.as_mut() else {
            return false;
        };
        let changed = numeric.native_value != Some(native_value);
        if changed {
            numeric.native_value = Some(native_value);
            numeric.device_value = Some(native_value * numeric.device_scale);
        }
        self.commit(changed)
    }

    pub fn update_state(&mut self, state: &str) -> bool {
        let Some(current) = self.state.as_mut() else {
            return false;
        };
        let changed = current.as_deref() != Some(state);
        if changed {
            *current = Some(state.to_string());
        }
        self.commit(changed)
    }

    pub fn update_mode(&mut self, mode: i64) -> bool {
        if self.mode.is_none() {
            return false;
        }
        let changed = self.apply_mode(mode);
        self.commit(changed)
    }

    /// An empty map carries no value, so it never revives an unavailable entity.
    pub fn update_extra_attributes(&mut self, attributes: Map<String, Value>) -> bool {
        if attributes.is_empty() && !self.available {
            return false;
        }
        let changed = self.apply_extra_attributes(attributes);
        self.commit(changed)
    }

    pub fn update_state_with_attributes(&mut self, state: &str, attributes: Map<String, Value>) -> bool {
        let Some(current) = self.state.as_mut() else {
            return false;
        };
        let mut changed = current.as_deref() != Some(state);
        if changed {
            *current = Some(state.to_string());
        }
        changed |= self.apply_extra_attributes(attributes);
        self.commit(changed)
    }

    pub fn update_device_value_with_attributes(
        &mut self,
        device_value: f64,
        attributes: Map<String, Value>,
    ) -> bool {
        if self.numeric.is_none() {
            return false;
        }
        let changed =
            self.apply_device_value(device_value) | self.apply_extra_attributes(attributes);
        self.commit(changed)
    }

    /// Syncs humidity reported by a separate sensor into a climate entity.
    pub fn update_current_humidity(&mut self, humidity: f64) -> bool {
        let Some(climate) = self.climate.as_mut() else {
            return false;
        };
        let changed = set_if_changed(&mut climate.current_humidity, Some(humidity));
        self.commit(changed)
    }

    /// Clears every cached field. Flushes only on the available -> unavailable edge.
    pub fn set_unavailable(&mut self) -> bool {
        if let Some(numeric) = self.numeric.as_mut() {
            numeric.device_value = None;
            numeric.native_value = None;
        }
        if let Some(is_on) = self.is_on.as_mut() {
            *is_on = None;
        }
        if let Some(state) = self.state.as_mut() {
            *state = None;
        }
        if let Some(mode) = self.mode.as_mut() {
            mode.mode = None;
            mode.preset = None;
        }
        if let Some(light) = self.light.as_mut() {
            *light = LightState::default();
        }
        if let Some(climate) = self.climate.as_mut() {
            *climate = ClimateState::default();
        }
        if let Some(mp3) = self.mp3.as_mut() {
            *mp3 = Mp3State::default();
        }
        self.extra_attributes.clear();
        if self.available {
            self.available = false;
            self.flush();
            true
        } else {
            false
        }
    }

    /// Applies one payload item routed by `namespace` as a single reconciliation.
    pub fn parse(&mut self, namespace: Namespace, item: &Value) -> Result<bool> {
        match (self.kind, namespace) {
            (_, Namespace::Toggle | Namespace::ToggleX) if self.is_on.is_some() => {
                let onoff = get_onoff(item, "onoff")
                    .ok_or_else(|| Error::payload(namespace, "missing onoff"))?;
                Ok(self.update_onoff(onoff))
            }
            (EntityKind::Light | EntityKind::DiffuserLight, _) => self.parse_light(namespace, item),
            (EntityKind::DiffuserSpray, _) => {
                let mode = get_i64(item, "mode")
                    .ok_or_else(|| Error::payload(namespace, "missing spray mode"))?;
                let option = spray_option(mode)
                    .ok_or_else(|| Error::payload(namespace, format!("unknown spray mode {mode}")))?;
                Ok(self.update_state(option))
            }
            (EntityKind::Climate, Namespace::ThermostatMode) => self.parse_thermostat_mode(item),
            (EntityKind::Sensor, Namespace::ThermostatMode) => match get_f64(item, "currentTemp") {
                Some(value) => Ok(self.update_device_value(value)),
                None => Ok(false),
            },
            (EntityKind::MediaPlayer, Namespace::Mp3) => Ok(self.parse_mp3(item)),
            (EntityKind::Sensor, _) => {
                let value = get_f64(item, "value")
                    .ok_or_else(|| Error::payload(namespace, "missing value"))?;
                Ok(self.update_device_value(value))
            }
            (kind, ns) => Err(Error::Unsupported(format!("{kind:?} cannot parse {ns}"))),
        }
    }

    /// An unknown diffuser mode clears the effect; the rest of the item is
    /// still reconciled before the mode is reported as an error.
    fn parse_light(&mut self, namespace: Namespace, item: &Value) -> Result<bool> {
        let mode = match self.kind {
            EntityKind::DiffuserLight => get_i64(item, "mode"),
            _ => None,
        };
        let effect = mode.map(|mode| {
            if mode == DIFFUSER_LIGHT_MODE_COLOR {
                return Ok(None);
            }
            usize::try_from(mode)
                .ok()
                .and_then(|i| DIFFUSER_LIGHT_MODE_LIST.get(i).copied())
                .map(Some)
                .ok_or_else(|| Error::payload(namespace, format!("unknown light mode {mode}")))
        });

        let mut touched = false;
        let mut changed = false;
        if let Some(onoff) = get_onoff(item, "onoff") {
            touched = true;
            changed |= self.apply_onoff(onoff);
        }
        let light = self.light.get_or_insert_with(LightState::default);
        for (key, field) in [
            ("luminance", &mut light.luminance),
            ("rgb", &mut light.rgb),
            ("temperature", &mut light.temperature),
        ] {
            if let Some(value) = get_i64(item, key) {
                touched = true;
                changed |= set_if_changed(field, Some(value));
            }
        }
        if let Some(effect) = &effect {
            touched = true;
            let value = effect.as_ref().ok().copied().flatten();
            changed |= set_if_changed(&mut light.effect, value);
        }
        if !touched {
            return Ok(false);
        }
        let changed = self.commit(changed);
        match effect {
            Some(Err(e)) => Err(e),
            _ => Ok(changed),
        }
    }

    /// `{"channel": 0, "lmTime": 1630691532, "song": 9, "mute": 1, "volume": 11}`
    fn parse_mp3(&mut self, item: &Value) -> bool {
        let mut touched = false;
        let mut changed = false;
        let muted = get_onoff(item, "mute");
        if let Some(mp3) = self.mp3.as_mut() {
            if let Some(muted) = muted {
                touched = true;
                changed |= set_if_changed(&mut mp3.muted, Some(muted));
            }
            if let Some(song) = get_i64(item, "song") {
                touched = true;
                changed |= set_if_changed(&mut mp3.track, Some(song));
                changed |= set_if_changed(&mut mp3.title, mp3_song_title(song));
            }
            if let Some(volume) = get_f64(item, "volume") {
                touched = true;
                let level = (volume / MP3_VOLUME_MAX as f64).clamp(0.0, 1.0);
                changed |= set_if_changed(&mut mp3.volume, Some(level));
            }
        }
        if let Some(muted) = muted
            && let Some(state) = self.state.as_mut()
        {
            let value = if muted { MEDIA_STATE_IDLE } else { MEDIA_STATE_PLAYING };
            changed |= set_if_changed(state, Some(value.to_string()));
        }
        if !touched {
            return false;
        }
        self.commit(changed)
    }

    fn parse_thermostat_mode(&mut self, item: &Value) -> Result<bool> {
        let ns = Namespace::ThermostatMode;
        let onoff =
            get_onoff(item, "onoff").ok_or_else(|| Error::payload(ns, "missing onoff"))?;
        let mode = get_i64(item, "mode").ok_or_else(|| Error::payload(ns, "missing mode"))?;

        let mut changed = self.apply_onoff(onoff) | self.apply_mode(mode);

        let mut attributes = Map::new();
        if let Some(v) = item.get("warning") {
            attributes.insert("warning".to_string(), v.clone());
        }
        changed |= self.apply_extra_attributes(attributes);

        let climate = self.climate.get_or_insert_with(ClimateState::default);
        for (key, field) in [
            ("min", &mut climate.min_temperature),
            ("max", &mut climate.max_temperature),
        ] {
            if let Some(t) = get_f64(item, key) {
                changed |= set_if_changed(field, Some(t / MTS_TEMP_SCALE));
            }
        }
        if let Some(t) = get_f64(item, "currentTemp") {
            changed |= set_if_changed(&mut climate.current_temperature, Some(t / MTS_TEMP_SCALE));
        }
        if let Some(t) = get_f64(item, "targetTemp") {
            changed |= set_if_changed(&mut climate.target_temperature, Some(t / MTS_TEMP_SCALE));
        }
        if let Some(state) = get_onoff(item, "state") {
            changed |= set_if_changed(&mut climate.heating, Some(state && onoff));
        }
        Ok(self.commit(changed))
    }

    fn apply_onoff(&mut self, onoff: bool) -> bool {
        match self.is_on.as_mut() {
            Some(is_on) => set_if_changed(is_on, Some(onoff)),
            None => false,
        }
    }

    fn apply_device_value(&mut self, device_value: f64) -> bool {
        let Some(numeric) = self.numeric.as_mut() else {
            return false;
        };
        if numeric.device_value == Some(device_value) {
            return false;
        }
        numeric.device_value = Some(device_value);
        numeric.native_value = Some(device_value / numeric.device_scale);
        true
    }

    fn apply_mode(&mut self, mode: i64) -> bool {
        let Some(state) = self.mode.as_mut() else {
            return false;
        };
        if state.mode == Some(mode) {
            return false;
        }
        state.mode = Some(mode);
        state.preset = state.presets.preset(mode);
        true
    }

    fn apply_extra_attributes(&mut self, attributes: Map<String, Value>) -> bool {
        if self.extra_attributes == attributes {
            return false;
        }
        self.extra_attributes = attributes;
        true
    }

    /// A value reaching an unavailable entity is itself a change.
    fn commit(&mut self, changed: bool) -> bool {
        let changed = changed || !self.available;
        self.available = true;
        if changed {
            self.flush();
        }
        changed
    }

    fn flush(&self) {
        trace!(entity = %self.id, available = self.available, "flush");
        if let Some(hook) = &self.flush_hook {
            hook(self);
        }
    }
}

fn set_if_changed<T: PartialEq>(field: &mut Option<T>, value: Option<T>) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

pub(crate) fn get_i64(item: &Value, key: &str) -> Option<i64> {
    item.get(key).and_then(|v| v.as_i64())
}

pub(crate) fn get_f64(item: &Value, key: &str) -> Option<f64> {
    item.get(key).and_then(|v| v.as_f64())
}

pub(crate) fn get_onoff(item: &Value, key: &str) -> Option<bool> {
    match item.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording(entity: &mut Entity) -> Arc<Mutex<Vec<String>>> {
        let flushes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));
        let flushes_clone = flushes.clone();
        entity.set_flush_hook(Some(Arc::new(move |e: &Entity| {
            flushes_clone.lock().unwrap().push(e.id().to_string());
        })));
        flushes
    }

    #[test]
    fn toggle_scenario() {
        let mut switch = Entity::switch(EntityId::channel(0), Namespace::ToggleX);
        let flushes = recording(&mut switch);
        assert!(!switch.available());

        assert!(switch.parse(Namespace::ToggleX, &json!({"channel": 0, "onoff": 1})).unwrap());
        assert!(switch.available());
        assert_eq!(switch.is_on(), Some(true));
        assert_eq!(flushes.lock().unwrap().len(), 1);

        assert!(!switch.parse(Namespace::ToggleX, &json!({"channel": 0, "onoff": 1})).unwrap());
        assert_eq!(flushes.lock().unwrap().len(), 1);

        assert!(switch.parse(Namespace::ToggleX, &json!({"channel": 0, "onoff": 0})).unwrap());
        assert_eq!(switch.is_on(), Some(false));
        assert_eq!(flushes.lock().unwrap().len(), 2);
    }

    #[test]
    fn flush_only_when_value_differs() {
        let mut sensor = Entity::sensor(EntityId::key("power"), 1.0);
        let flushes = recording(&mut sensor);
        let values = [3.0, 3.0, 4.0, 4.0, 4.0, 3.0];
        let expected = [true, false, true, false, false, true];
        for (v, want) in values.iter().zip(expected) {
            assert_eq!(sensor.update_device_value(*v), want);
        }
        assert_eq!(flushes.lock().unwrap().len(), 3);
    }

    #[test]
    fn extra_attributes_take_part_in_equality() {
        let mut sensor = Entity::sensor(EntityId::with_key(0, "sensor_presence"), 1.0);
        let flushes = recording(&mut sensor);
        let attrs = |d: i64| json!({"distance": d}).as_object().unwrap().clone();

        assert!(sensor.update_device_value_with_attributes(2.0, attrs(760)));
        assert!(!sensor.update_device_value_with_attributes(2.0, attrs(760)));
        assert!(sensor.update_device_value_with_attributes(2.0, attrs(800)));
        assert_eq!(flushes.lock().unwrap().len(), 2);
        assert_eq!(sensor.extra_attributes()["distance"], 800);
    }

    #[test]
    fn unavailable_is_edge_triggered() {
        let mut switch = Entity::switch(EntityId::channel(1), Namespace::ToggleX);
        let flushes = recording(&mut switch);
        switch.update_onoff(true);
        assert!(switch.set_unavailable());
        assert!(!switch.set_unavailable());
        assert_eq!(switch.is_on(), None);
        assert_eq!(flushes.lock().unwrap().len(), 2);
    }

    #[test]
    fn unavailable_clears_numeric_cache() {
        let mut sensor = Entity::sensor(EntityId::key("temperature"), 10.0);
        sensor.update_device_value(42.0);
        assert_eq!(sensor.native_value(), Some(4.2));

        let flushes = recording(&mut sensor);
        sensor.set_unavailable();
        assert_eq!(sensor.device_value(), None);
        assert_eq!(sensor.native_value(), None);
        assert_eq!(flushes.lock().unwrap().len(), 1);
    }

    #[test]
    fn scale_relation_holds() {
        let mut sensor = Entity::sensor(EntityId::key("humidity"), 10.0);
        for v in [596.0, 0.0, -15.0, 1000.0] {
            sensor.update_device_value(v);
            assert_eq!(sensor.native_value(), Some(v / 10.0));
        }
        sensor.update_native_value(21.5);
        assert_eq!(sensor.device_value(), Some(215.0));
    }

    #[test]
    fn mode_maps_to_preset() {
        let presets = PresetMap(&[(0, "custom"), (1, "comfort")]);
        let mut climate = Entity::climate(EntityId::channel(0), presets);
        climate.update_mode(1);
        assert_eq!(climate.preset(), Some("comfort"));
        climate.update_mode(9);
        assert_eq!(climate.mode(), Some(9));
        assert_eq!(climate.preset(), None);
    }

    #[test]
    fn thermostat_item_flushes_once() {
        let mut climate = Entity::climate(EntityId::channel(0), MTS200_PRESETS);
        let flushes = recording(&mut climate);
        let item = json!({
            "channel": 0, "onoff": 1, "mode": 2, "state": 1,
            "currentTemp": 195, "targetTemp": 210, "min": 50, "max": 350
        });
        assert!(climate.parse(Namespace::ThermostatMode, &item).unwrap());
        assert_eq!(flushes.lock().unwrap().len(), 1);
        assert_eq!(climate.preset(), Some(PRESET_AWAY));
        let state = climate.climate_state().unwrap();
        assert_eq!(state.target_temperature, Some(21.0));
        assert_eq!(state.heating, Some(true));
        assert_eq!(state.min_temperature, Some(5.0));
        assert_eq!(state.max_temperature, Some(35.0));
        assert!(climate.extra_attributes().get("max").is_none());

        assert!(!climate.parse(Namespace::ThermostatMode, &item).unwrap());
        assert_eq!(flushes.lock().unwrap().len(), 1);
    }

    #[test]
    fn malformed_item_is_an_error() {
        let mut switch = Entity::switch(EntityId::channel(0), Namespace::ToggleX);
        let err = switch.parse(Namespace::ToggleX, &json!({"channel": 0})).unwrap_err();
        assert!(matches!(err, Error::Payload { .. }));
        assert!(!switch.available());
    }

    #[test]
    fn diffuser_light_effect_from_mode() {
        let mut light = Entity::diffuser_light(EntityId::channel(0));
        let item = json!({"channel": 0, "onoff": 1, "mode": 0, "luminance": 100, "rgb": 4129023});
        assert!(light.parse(Namespace::DiffuserLight, &item).unwrap());
        assert_eq!(light.light_state().unwrap().effect, Some("Rainbow"));
        assert_eq!(light.light_state().unwrap().rgb, Some(4129023));

        light.parse(Namespace::DiffuserLight, &json!({"channel": 0, "mode": 1})).unwrap();
        assert_eq!(light.light_state().unwrap().effect, None);
    }

    #[test]
    fn spray_mode_becomes_option() {
        let mut spray = Entity::diffuser_spray(EntityId::channel(0));
        spray.parse(Namespace::DiffuserSpray, &json!({"channel": 0, "mode": 2})).unwrap();
        assert_eq!(spray.state(), Some(SPRAY_OPTION_OFF));
        assert!(spray.parse(Namespace::DiffuserSpray, &json!({"channel": 0, "mode": 42})).is_err());
        assert_eq!(spray.state(), Some(SPRAY_OPTION_OFF));
    }

    #[test]
    fn unknown_diffuser_mode_keeps_the_rest_of_the_item() {
        let mut light = Entity::diffuser_light(EntityId::channel(0));
        light
            .parse(Namespace::DiffuserLight, &json!({"channel": 0, "onoff": 0, "mode": 0, "luminance": 10}))
            .unwrap();
        let flushes = recording(&mut light);

        let item = json!({"channel": 0, "onoff": 1, "mode": 7, "luminance": 90});
        let err = light.parse(Namespace::DiffuserLight, &item).unwrap_err();
        assert!(matches!(err, Error::Payload { .. }));
        assert_eq!(light.is_on(), Some(true));
        let state = light.light_state().unwrap();
        assert_eq!(state.luminance, Some(90));
        assert_eq!(state.effect, None);
        assert_eq!(flushes.lock().unwrap().len(), 1);

        let negative = json!({"channel": 0, "onoff": 1, "mode": -1, "luminance": 90});
        assert!(light.parse(Namespace::DiffuserLight, &negative).is_err());
        assert_eq!(flushes.lock().unwrap().len(), 1);
    }

    #[test]
    fn updates_without_a_matching_component_are_ignored() {
        let mut sensor = Entity::sensor(EntityId::key("power"), 1.0);
        let flushes = recording(&mut sensor);
        assert!(!sensor.update_onoff(true));
        assert!(!sensor.update_mode(1));
        assert!(!sensor.update_extra_attributes(Map::new()));
        assert!(!sensor.available());

        let mut switch = Entity::switch(EntityId::channel(0), Namespace::ToggleX);
        let switch_flushes = recording(&mut switch);
        assert!(!switch.update_device_value(3.0));
        assert!(!switch.update_mode(1));
        assert!(!switch.update_device_value_with_attributes(3.0, Map::new()));
        assert!(!switch.available());

        assert!(flushes.lock().unwrap().is_empty());
        assert!(switch_flushes.lock().unwrap().is_empty());
    }

    #[test]
    fn thermostat_sensor_skips_items_without_temperature() {
        let mut sensor = Entity::sensor(EntityId::with_key(0, "temperature"), MTS_TEMP_SCALE);
        let flushes = recording(&mut sensor);
        let item = json!({"channel": 0, "onoff": 1, "mode": 0});
        assert!(!sensor.parse(Namespace::ThermostatMode, &item).unwrap());
        assert!(!sensor.available());
        assert!(flushes.lock().unwrap().is_empty());
    }

    #[test]
    fn climate_of_kind_uses_thermostat_presets() {
        let mut climate =
            Entity::of_kind(EntityKind::Climate, EntityId::channel(0), Namespace::ThermostatMode);
        climate.update_mode(2);
        assert_eq!(climate.preset(), Some(PRESET_AWAY));
        assert_eq!(climate.presets(), Some(THERMOSTAT_MODE_PRESETS));
    }

    #[test]
    fn mp3_item_reconciles_player() {
        let mut player = Entity::media_player(EntityId::with_key(0, "mp3"));
        let flushes = recording(&mut player);
        let item = json!({"channel": 0, "lmTime": 1630691532, "song": 9, "mute": 0, "volume": 8});
        assert!(player.parse(Namespace::Mp3, &item).unwrap());
        let mp3 = player.mp3_state().unwrap();
        assert_eq!(mp3.track, Some(9));
        assert_eq!(mp3.title, Some("White Noise"));
        assert_eq!(mp3.volume, Some(0.5));
        assert_eq!(mp3.muted, Some(false));
        assert_eq!(player.state(), Some(MEDIA_STATE_PLAYING));
        assert_eq!(flushes.lock().unwrap().len(), 1);

        assert!(!player.parse(Namespace::Mp3, &item).unwrap());
        assert!(player.parse(Namespace::Mp3, &json!({"channel": 0, "mute": 1})).unwrap());
        assert_eq!(player.state(), Some(MEDIA_STATE_IDLE));
        assert_eq!(player.mp3_state().unwrap().track, Some(9));
        assert_eq!(flushes.lock().unwrap().len(), 2);
    }

    #[test]
    fn state_sensor_tracks_state_and_attributes() {
        let mut sensor = Entity::state_sensor(EntityId::with_key(0, "mode_state"));
        let attrs = json!({"preset": "comfort"}).as_object().unwrap().clone();
        assert!(sensor.update_state_with_attributes(MODE_STATE_HEATING, attrs.clone()));
        assert!(!sensor.update_state_with_attributes(MODE_STATE_HEATING, attrs));
        assert_eq!(sensor.state(), Some(MODE_STATE_HEATING));
        assert_eq!(sensor.extra_attributes()["preset"], "comfort");
    }
}
