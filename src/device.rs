use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::dispatch::{payload_items, split_items, Dispatcher, HandlerKind, Lookup};
use crate::entity::{get_f64, Entity, FlushHook};
use crate::logger::{LogThrottle, DEFAULT_LOG_SUPPRESSION};
use crate::namespace::{CreatePolicy, Method, Namespace};
use crate::protocol::{
    get_payload, mode_payload, mp3_payload, onoff_payload, spray_payload, Header, Message,
};
use crate::transport::{is_ack, Transport};
use crate::types::*;
use crate::{Error, Result};

/// Digest subtrees and the namespace whose handler parses them.
const DIGEST_ROUTES: &[(&str, Namespace)] = &[
    ("/light", Namespace::Light),
    ("/toggle", Namespace::Toggle),
    ("/togglex", Namespace::ToggleX),
    ("/diffuser/light", Namespace::DiffuserLight),
    ("/diffuser/spray", Namespace::DiffuserSpray),
    ("/thermostat/mode", Namespace::ThermostatMode),
];

const SENSOR_VALUE_EXCLUDED: &[&str] = &["timestamp", "timestampMs"];

/// What a device advertises about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub uuid: String,
    pub ability: BTreeSet<Namespace>,
    pub digest: Value,
}

impl Descriptor {
    pub fn new(uuid: impl Into<String>, ability: impl IntoIterator<Item = Namespace>, digest: Value) -> Self {
        Self {
            uuid: uuid.into(),
            ability: ability.into_iter().collect(),
            digest,
        }
    }

    /// Builds from `Appliance.System.All` and `Appliance.System.Ability`
    /// payloads. Namespaces outside the registry are dropped.
    pub fn from_payloads(all: &Value, ability: &Value) -> Result<Self> {
        let uuid = all
            .pointer("/all/system/hardware/uuid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::payload(Namespace::SystemAll, "missing hardware uuid"))?;
        let ability = match ability.get("ability") {
            Some(Value::Object(map)) => map.keys().filter_map(|k| Namespace::from_name(k)).collect(),
            _ => return Err(Error::payload(Namespace::SystemAbility, "missing ability map")),
        };
        let digest = all
            .pointer("/all/digest")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(Self {
            uuid: uuid.to_string(),
            ability,
            digest,
        })
    }
}

pub struct DeviceBuilder {
    descriptor: Descriptor,
    flush_hook: Option<FlushHook>,
    log_suppression: Duration,
    climate_sensors: u8,
}

impl DeviceBuilder {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            flush_hook: None,
            log_suppression: DEFAULT_LOG_SUPPRESSION,
            climate_sensors: CLIMATE_SENSOR_NONE,
        }
    }

    pub fn on_flush(mut self, f: impl Fn(&Entity) + Send + Sync + 'static) -> Self {
        self.flush_hook = Some(Arc::new(f));
        self
    }

    pub fn log_suppression(mut self, window: Duration) -> Self {
        self.log_suppression = window;
        self
    }

    /// Which derived climate sensors to create, as a mask of
    /// `CLIMATE_SENSOR_OUTPUT_POWER_STATE` and `CLIMATE_SENSOR_MODE_STATE`.
    pub fn climate_sensors(mut self, mask: u8) -> Self {
        self.climate_sensors = mask;
        self
    }

    pub fn build(self) -> Device {
        let mut device = Device {
            dispatcher: Dispatcher::new(self.descriptor.ability.clone()),
            descriptor: self.descriptor,
            entities: BTreeMap::new(),
            flush_hook: self.flush_hook,
            throttle: LogThrottle::new(self.log_suppression),
            climate_sensors: self.climate_sensors,
        };
        device.init_digest();
        device
    }
}

/// A device's entity registry and namespace dispatcher.
///
/// All reconciliation goes through `&mut self`, so each inbound message is
/// processed to completion before the next one.
pub struct Device {
    descriptor: Descriptor,
    entities: BTreeMap<EntityId, Entity>,
    dispatcher: Dispatcher,
    flush_hook: Option<FlushHook>,
    throttle: LogThrottle,
    climate_sensors: u8,
}

impl Device {
    pub fn builder(descriptor: Descriptor) -> DeviceBuilder {
        DeviceBuilder::new(descriptor)
    }

    pub fn uuid(&self) -> &str {
        &self.descriptor.uuid
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    // -- Registry --

    /// Adds an entity; its id must be unique within the device.
    pub fn add_entity(&mut self, mut entity: Entity) -> Result<&mut Entity> {
        let id = entity.id().clone();
        if self.entities.contains_key(&id) {
            return Err(Error::Unsupported(format!("entity {id} already exists")));
        }
        entity.set_flush_hook(self.flush_hook.clone());
        trace!(entity = %id, kind = ?entity.kind(), "adding entity");
        Ok(self.entities.entry(id).or_insert(entity))
    }

    /// Registers an existing entity for `namespace` payloads.
    pub fn register(&mut self, namespace: Namespace, id: &EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !self.dispatcher.register(namespace, id) {
            return false;
        }
        entity.namespaces_mut().insert(namespace);
        true
    }

    /// Deregisters the entity from every namespace and drops it.
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let mut entity = self.entities.remove(id)?;
        for namespace in std::mem::take(entity.namespaces_mut()) {
            self.dispatcher.unregister(namespace, id);
        }
        entity.set_flush_hook(None);
        Some(entity)
    }

    pub fn shutdown(&mut self) {
        let ids: Vec<EntityId> = self.entities.keys().cloned().collect();
        for id in &ids {
            self.remove_entity(id);
        }
        debug!(uuid = %self.descriptor.uuid, count = ids.len(), "device shut down");
    }

    /// Marks every entity unavailable (e.g. after losing the device).
    pub fn set_unavailable(&mut self) {
        for entity in self.entities.values_mut() {
            entity.set_unavailable();
        }
    }

    fn add_and_register(&mut self, entity: Entity, namespace: Namespace) {
        let id = entity.id().clone();
        if let Err(e) = self.add_entity(entity) {
            debug!(entity = %id, error = %e, "entity not added");
        }
        self.register(namespace, &id);
    }

    fn ensure_sensor(&mut self, id: &EntityId, device_scale: f64) -> &mut Entity {
        let hook = self.flush_hook.clone();
        self.entities.entry(id.clone()).or_insert_with(|| {
            debug!(entity = %id, "creating sensor on demand");
            let mut entity = Entity::sensor(id.clone(), device_scale);
            entity.set_flush_hook(hook);
            entity
        })
    }

    // -- Digest --

    fn init_digest(&mut self) {
        let digest = self.descriptor.digest.clone();

        for (channel, _) in list_items(Namespace::Light, digest.get("light")) {
            let entity = Entity::light(EntityId::channel(channel), Namespace::Light);
            self.add_and_register(entity, Namespace::Light);
        }

        if let Some(toggle) = digest.get("toggle")
            && toggle.is_object()
        {
            let id = EntityId::channel(0);
            self.add_and_register(Entity::switch(id, Namespace::Toggle), Namespace::Toggle);
        }

        for (channel, _) in list_items(Namespace::ToggleX, digest.get("togglex")) {
            let id = EntityId::channel(channel);
            if self.entities.contains_key(&id) {
                // lights switched through togglex
                self.register(Namespace::ToggleX, &id);
            } else {
                self.add_and_register(Entity::switch(id, Namespace::ToggleX), Namespace::ToggleX);
            }
        }

        for (channel, _) in list_items(Namespace::DiffuserLight, digest.pointer("/diffuser/light")) {
            let entity = Entity::diffuser_light(EntityId::channel(channel));
            self.add_and_register(entity, Namespace::DiffuserLight);
        }

        for (channel, _) in list_items(Namespace::DiffuserSpray, digest.pointer("/diffuser/spray")) {
            let entity = Entity::diffuser_spray(default_id(EntityKind::DiffuserSpray, channel));
            self.add_and_register(entity, Namespace::DiffuserSpray);
        }

        for (channel, _) in list_items(Namespace::ThermostatMode, digest.pointer("/thermostat/mode")) {
            let climate = Entity::climate(EntityId::channel(channel.clone()), THERMOSTAT_MODE_PRESETS);
            self.add_and_register(climate, Namespace::ThermostatMode);
            let sensor = Entity::sensor(EntityId::with_key(channel.clone(), "temperature"), MTS_TEMP_SCALE);
            self.add_and_register(sensor, Namespace::ThermostatMode);
            self.add_climate_sensors(channel);
        }

        if self.descriptor.ability.contains(&Namespace::Mp3) {
            let player = Entity::media_player(EntityId::with_key(0, "mp3"));
            self.add_and_register(player, Namespace::Mp3);
        }

        self.dispatcher
            .register_parser(Namespace::DiffuserSensor, parse_diffuser_sensor);
        self.dispatcher
            .register_parser(Namespace::SensorLatest, parse_sensor_latest);
        self.dispatcher
            .register_parser(Namespace::SensorLatestX, parse_sensor_latestx);

        debug!(
            uuid = %self.descriptor.uuid,
            entities = self.entities.len(),
            "initialized from digest"
        );
        self.parse_digest(&digest);
    }

    /// Derived sensors are fed by `sync_climate_sensors`, never by the dispatcher.
    fn add_climate_sensors(&mut self, channel: Channel) {
        let mut sensors = Vec::new();
        if self.climate_sensors & CLIMATE_SENSOR_OUTPUT_POWER_STATE != 0 {
            sensors.push(Entity::binary_sensor(EntityId::with_key(channel.clone(), "output_power_state")));
        }
        if self.climate_sensors & CLIMATE_SENSOR_MODE_STATE != 0 {
            sensors.push(Entity::state_sensor(EntityId::with_key(channel, "mode_state")));
        }
        for sensor in sensors {
            if let Err(e) = self.add_entity(sensor) {
                debug!(error = %e, "climate sensor not added");
            }
        }
    }

    /// Mirrors a climate's reconciled state into its derived sensors.
    fn sync_climate_sensors(&mut self, channel: &Channel) {
        if self.climate_sensors == CLIMATE_SENSOR_NONE {
            return;
        }
        let Some(climate) = self
            .entities
            .get(&EntityId::channel(channel.clone()))
            .filter(|e| e.kind() == EntityKind::Climate && e.available())
        else {
            return;
        };
        let state = climate.climate_state();
        let heating = state.and_then(|s| s.heating);
        let mode_state = match (climate.is_on(), heating) {
            (Some(false), _) => MODE_STATE_OFF,
            (_, Some(true)) => MODE_STATE_HEATING,
            _ => MODE_STATE_IDLE,
        };
        let mut attributes = Map::new();
        if let Some(preset) = climate.preset() {
            attributes.insert("preset".to_string(), Value::from(preset));
        }
        if let Some(target) = state.and_then(|s| s.target_temperature) {
            attributes.insert("target_temperature".to_string(), Value::from(target));
        }

        if let Some(heating) = heating
            && let Some(sensor) = self
                .entities
                .get_mut(&EntityId::with_key(channel.clone(), "output_power_state"))
        {
            sensor.update_onoff(heating);
        }
        if let Some(sensor) = self.entities.get_mut(&EntityId::with_key(channel.clone(), "mode_state")) {
            sensor.update_state_with_attributes(mode_state, attributes);
        }
    }

    /// Routes each known digest subtree to its namespace handler.
    pub fn parse_digest(&mut self, digest: &Value) {
        for (pointer, namespace) in DIGEST_ROUTES {
            let Some(data) = digest.pointer(pointer) else {
                continue;
            };
            match split_items(*namespace, data) {
                Ok(items) => {
                    for (channel, item) in items {
                        self.dispatch_item(*namespace, channel, item);
                    }
                }
                Err(e) => self.warn_payload(*namespace, &e),
            }
        }
    }

    // -- Inbound --

    pub fn handle_message(&mut self, message: &Message) {
        match message.header.method {
            Method::Push | Method::GetAck => self.dispatch(&message.header, &message.payload),
            Method::Error => {
                warn!(namespace = %message.header.namespace, payload = %message.payload, "device replied with error");
            }
            method => {
                trace!(namespace = %message.header.namespace, %method, "ignoring message");
            }
        }
    }

    pub fn dispatch(&mut self, header: &Header, payload: &Value) {
        match header.known_namespace() {
            Some(Namespace::SystemAll) => match payload.pointer("/all/digest") {
                Some(digest) => {
                    let digest = digest.clone();
                    self.parse_digest(&digest);
                    self.descriptor.digest = digest;
                }
                None => self.warn_payload(
                    Namespace::SystemAll,
                    &Error::payload(Namespace::SystemAll, "missing digest"),
                ),
            },
            Some(Namespace::SystemAbility) => {}
            Some(namespace) => self.dispatch_namespace(namespace, header, payload),
            None => self.parse_undefined(&header.namespace, payload),
        }
    }

    fn dispatch_namespace(&mut self, namespace: Namespace, header: &Header, payload: &Value) {
        let custom = match self.dispatcher.handler(namespace).map(|h| &h.kind) {
            Some(HandlerKind::Custom(parser)) => Some(*parser),
            _ => None,
        };
        if let Some(parser) = custom {
            if let Err(e) = parser(self, header, payload) {
                self.warn_payload(namespace, &e);
            }
            return;
        }

        match payload_items(namespace, payload) {
            Ok(items) => {
                for (channel, item) in items {
                    self.dispatch_item(namespace, channel, item);
                }
            }
            Err(e) => self.warn_payload(namespace, &e),
        }
    }

    fn dispatch_item(&mut self, namespace: Namespace, channel: Option<Channel>, item: &Value) {
        let Some(channel) = channel else {
            self.warn_payload(namespace, &Error::payload(namespace, "item without channel"));
            return;
        };
        match self.dispatcher.lookup(namespace, &channel) {
            Lookup::Found(ids) => {
                for id in &ids {
                    self.parse_entity(namespace, id, item);
                }
                if namespace == Namespace::ThermostatMode {
                    self.sync_climate_sensors(&channel);
                }
            }
            Lookup::NotFound(CreatePolicy::CreateDefault(kind)) => {
                let id = default_id(kind, channel);
                if !self.entities.contains_key(&id) {
                    debug!(%namespace, entity = %id, ?kind, "creating entity on demand");
                    self.add_and_register(Entity::of_kind(kind, id.clone(), namespace), namespace);
                } else {
                    self.register(namespace, &id);
                }
                self.parse_entity(namespace, &id, item);
            }
            Lookup::NotFound(CreatePolicy::LogOnly) => self.parse_undefined(namespace.name(), item),
            Lookup::NotFound(CreatePolicy::Ignore) => {}
        }
    }

    fn parse_entity(&mut self, namespace: Namespace, id: &EntityId, item: &Value) {
        let result = match self.entities.get_mut(id) {
            Some(entity) => entity.parse(namespace, item),
            None => return,
        };
        if let Err(e) = result {
            self.warn_payload(namespace, &e);
        }
    }

    fn parse_undefined(&mut self, namespace: &str, payload: &Value) {
        if self.throttle.should_log(&format!("undefined:{namespace}")) {
            warn!(%namespace, %payload, "handler undefined for payload");
        }
    }

    fn warn_payload(&mut self, namespace: Namespace, error: &Error) {
        if self.throttle.should_log(&format!("{namespace}:{error}")) {
            warn!(%namespace, %error, "skipping malformed payload");
        }
    }

    // -- Commands --

    /// Sends a GET for `namespace` and dispatches the reply.
    ///
    /// A transport timeout or HTTP failure marks every entity unavailable.
    pub async fn poll<T: Transport + ?Sized>(&mut self, transport: &T, namespace: Namespace) -> Result<()> {
        let response = match transport.request(namespace, Method::Get, get_payload(namespace)).await {
            Ok(r) => r,
            Err(e @ (Error::Timeout | Error::Http(_))) => {
                debug!(%namespace, error = %e, "device unreachable");
                self.set_unavailable();
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if !is_ack(Method::Get, &response) {
            return Err(Error::NotAcknowledged(namespace));
        }
        self.handle_message(&response);
        Ok(())
    }

    pub async fn request_onoff<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        onoff: bool,
    ) -> Result<()> {
        let entity = self.find_entity(id)?;
        if matches!(
            entity.kind(),
            EntityKind::Sensor
                | EntityKind::BinarySensor
                | EntityKind::StateSensor
                | EntityKind::DiffuserSpray
                | EntityKind::MediaPlayer
        ) {
            return Err(Error::Unsupported(format!("{id} is not a toggle")));
        }
        let namespace = if entity.kind() == EntityKind::Light && entity.namespaces().contains(&Namespace::ToggleX) {
            Namespace::ToggleX
        } else {
            entity
                .namespace()
                .ok_or_else(|| Error::Unsupported(format!("{id} has no onoff command")))?
        };
        let channel = entity_channel(id)?;
        let payload = onoff_payload(namespace, &channel, onoff);
        self.request_ack(transport, namespace, payload).await?;
        if let Some(entity) = self.entities.get_mut(id) {
            entity.update_onoff(onoff);
        }
        if namespace == Namespace::ThermostatMode {
            self.sync_climate_sensors(&channel);
        }
        Ok(())
    }

    pub async fn request_mode<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        mode: i64,
    ) -> Result<()> {
        let entity = self.find_entity(id)?;
        if entity.kind() != EntityKind::Climate {
            return Err(Error::Unsupported(format!("{id} has no thermostat mode")));
        }
        let channel = entity_channel(id)?;
        self.request_ack(transport, Namespace::ThermostatMode, mode_payload(&channel, mode))
            .await?;
        if let Some(entity) = self.entities.get_mut(id) {
            entity.update_mode(mode);
        }
        self.sync_climate_sensors(&channel);
        Ok(())
    }

    pub async fn request_preset<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        preset: &str,
    ) -> Result<()> {
        let mode = self
            .find_entity(id)?
            .presets()
            .and_then(|p| p.mode(preset))
            .ok_or_else(|| Error::Unsupported(format!("preset {preset} on {id}")))?;
        self.request_mode(transport, id, mode).await
    }

    pub async fn request_spray<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        option: &str,
    ) -> Result<()> {
        let entity = self.find_entity(id)?;
        if entity.kind() != EntityKind::DiffuserSpray {
            return Err(Error::Unsupported(format!("{id} is not a spray")));
        }
        let mode = spray_mode(option)
            .ok_or_else(|| Error::Unsupported(format!("spray option {option}")))?;
        let channel = entity_channel(id)?;
        self.request_ack(transport, Namespace::DiffuserSpray, spray_payload(&channel, mode))
            .await?;
        if let Some(entity) = self.entities.get_mut(id) {
            entity.update_state(option);
        }
        Ok(())
    }

    pub async fn request_mute<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        mute: bool,
    ) -> Result<()> {
        self.request_mp3(transport, id, "mute", Value::from(i64::from(mute)))
            .await
    }

    /// `level` is in `0.0..=1.0`.
    pub async fn request_volume_level<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        level: f64,
    ) -> Result<()> {
        self.request_mp3(transport, id, "volume", Value::from(mp3_volume(level)))
            .await
    }

    pub async fn request_next_track<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
    ) -> Result<()> {
        let track = self.find_entity(id)?.mp3_state().and_then(|m| m.track);
        self.request_mp3(transport, id, "song", Value::from(mp3_next_song(track)))
            .await
    }

    pub async fn request_previous_track<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
    ) -> Result<()> {
        let track = self.find_entity(id)?.mp3_state().and_then(|m| m.track);
        self.request_mp3(transport, id, "song", Value::from(mp3_previous_song(track)))
            .await
    }

    /// The acknowledged field is reconciled as if the device had pushed it.
    async fn request_mp3<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        id: &EntityId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let entity = self.find_entity(id)?;
        if entity.kind() != EntityKind::MediaPlayer {
            return Err(Error::Unsupported(format!("{id} is not a media player")));
        }
        let channel = entity_channel(id)?;
        let payload = mp3_payload(&channel, key, value);
        self.request_ack(transport, Namespace::Mp3, payload.clone()).await?;
        if let Some(entity) = self.entities.get_mut(id) {
            entity.parse(Namespace::Mp3, &payload["mp3"])?;
        }
        Ok(())
    }

    fn find_entity(&self, id: &EntityId) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    async fn request_ack<T: Transport + ?Sized>(
        &self,
        transport: &T,
        namespace: Namespace,
        payload: Value,
    ) -> Result<()> {
        let response = transport.request(namespace, Method::Set, payload).await?;
        if is_ack(Method::Set, &response) {
            Ok(())
        } else {
            debug!(%namespace, method = %response.header.method, "command rejected");
            Err(Error::NotAcknowledged(namespace))
        }
    }
}

/// Spray selects share their channel with the diffuser light.
fn default_id(kind: EntityKind, channel: Channel) -> EntityId {
    match kind {
        EntityKind::DiffuserSpray => EntityId::with_key(channel, "spray"),
        _ => EntityId::channel(channel),
    }
}

fn entity_channel(id: &EntityId) -> Result<Channel> {
    id.get_channel()
        .cloned()
        .ok_or_else(|| Error::Unsupported(format!("{id} has no channel")))
}

fn list_items(namespace: Namespace, data: Option<&Value>) -> Vec<(Channel, &Value)> {
    match data.map(|d| split_items(namespace, d)) {
        Some(Ok(items)) => items
            .into_iter()
            .filter_map(|(channel, item)| channel.map(|c| (c, item)))
            .collect(),
        _ => Vec::new(),
    }
}

/// `{"humidity": {"value": 0}, "temperature": {"value": 0}}`, values in tenths.
fn parse_diffuser_sensor(device: &mut Device, _header: &Header, payload: &Value) -> Result<()> {
    let namespace = Namespace::DiffuserSensor;
    for key in ["humidity", "temperature"] {
        let Some(sensor) = payload.get(key) else {
            continue;
        };
        match get_f64(sensor, "value") {
            Some(value) => {
                device
                    .ensure_sensor(&EntityId::key(key), 10.0)
                    .update_device_value(value);
            }
            None => device.warn_payload(namespace, &Error::payload(namespace, format!("{key} without value"))),
        }
    }
    Ok(())
}

/// `{"latest": [{"channel": 0, "value": [{"humi": 596, "timestamp": 1718302844}]}]}`
fn parse_sensor_latest(device: &mut Device, _header: &Header, payload: &Value) -> Result<()> {
    let namespace = Namespace::SensorLatest;
    let latest = payload
        .get("latest")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::payload(namespace, "missing latest list"))?;

    for p_channel in latest {
        let Some(channel) = p_channel.get("channel").and_then(Channel::from_value) else {
            device.warn_payload(namespace, &Error::payload(namespace, "item without channel"));
            continue;
        };
        let Some(values) = p_channel.get("value").and_then(|v| v.as_array()) else {
            device.warn_payload(namespace, &Error::payload(namespace, "item without value list"));
            continue;
        };
        for p_value in values.iter().filter_map(|v| v.as_object()) {
            for (key, value) in p_value {
                if SENSOR_VALUE_EXCLUDED.contains(&key.as_str()) {
                    continue;
                }
                let Some(value) = value.as_f64() else {
                    device.warn_payload(namespace, &Error::payload(namespace, format!("{key} is not numeric")));
                    continue;
                };
                let id = EntityId::with_key(channel.clone(), format!("sensor_{key}"));
                let sensor = device.ensure_sensor(&id, sensor_scale(key));
                sensor.update_device_value(value);
                let native = sensor.native_value();

                if key == "humi"
                    && let Some(humidity) = native
                    && let Some(climate) = device.entities.get_mut(&EntityId::channel(channel.clone()))
                    && climate.kind() == EntityKind::Climate
                {
                    climate.update_current_humidity(humidity);
                }
            }
        }
    }
    Ok(())
}

/// `{"latest": [{"channel": 0, "data": {"light": [{"value": 24, "timestamp": 1725907912}]}}]}`
fn parse_sensor_latestx(device: &mut Device, _header: &Header, payload: &Value) -> Result<()> {
    let namespace = Namespace::SensorLatestX;
    let latest = payload
        .get("latest")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::payload(namespace, "missing latest list"))?;

    for p_channel in latest {
        let channel = p_channel.get("channel").and_then(Channel::from_value);
        let data = p_channel.get("data").and_then(|v| v.as_object());
        let (Some(channel), Some(data)) = (channel, data) else {
            device.warn_payload(namespace, &Error::payload(namespace, "item without channel or data"));
            continue;
        };
        for (key, samples) in data {
            let Some(sample) = samples.as_array().and_then(|s| s.first()) else {
                continue;
            };
            let Some(value) = get_f64(sample, "value") else {
                device.warn_payload(namespace, &Error::payload(namespace, format!("{key} without value")));
                continue;
            };
            let attributes: Map<String, Value> = sample
                .as_object()
                .map(|m| {
                    m.iter()
                        .filter(|(k, _)| k.as_str() != "value" && !SENSOR_VALUE_EXCLUDED.contains(&k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();
            let id = EntityId::with_key(channel.clone(), format!("sensor_{key}"));
            device
                .ensure_sensor(&id, sensor_scale(key))
                .update_device_value_with_attributes(value, attributes);
        }
    }
    Ok(())
}
