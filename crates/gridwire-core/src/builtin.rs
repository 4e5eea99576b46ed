//! Built-in gameplay components and the stock template set.

use crate::Guid;
use crate::component::{TileComponent, TileContext};
use crate::event::{Event, EventKind};
use crate::port::WireSide;
use crate::property::{
    ComponentKind, ComponentRef, Decal, PortMetadata, PortType, PropertyDescriptor, PropertyError,
    PropertyKind, PropertyValue, SignalKind,
};
use crate::tileset::{TileSet, TileSetError, TileTemplate};
use gridwire_index::{Cell, Layer};
use tracing::debug;

pub const SWITCH: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0001);
pub const DOOR: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0002);
pub const GATE: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0003);
pub const BUTTON: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0004);
pub const TRIPWIRE: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0005);
pub const COUNTER: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0006);
pub const TIMER: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0007);
pub const SEQUENCER: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0008);
pub const DISPLAY: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_0009);
pub const SIGN: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_000a);
pub const DECORATION: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_000b);
pub const SPEAKER: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_000c);
pub const MARKER: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_000d);
pub const GEM: Guid = Guid::from_u128(0x6777_0001_0000_4000_8000_0000_0000_000e);

/// Every stock template, in registration order.
#[must_use]
pub fn templates() -> Vec<TileTemplate> {
    vec![
        TileTemplate::new(SWITCH, "switch", Layer::Static).with(Switch::boxed),
        TileTemplate::new(DOOR, "door", Layer::Static).with(Door::boxed),
        TileTemplate::new(GATE, "gate", Layer::Wall).with(Door::boxed),
        TileTemplate::new(BUTTON, "button", Layer::Floor).with(Button::boxed),
        TileTemplate::new(TRIPWIRE, "tripwire", Layer::InvisibleWall).with(Button::boxed),
        TileTemplate::new(COUNTER, "counter", Layer::Logic).with(Counter::boxed),
        TileTemplate::new(TIMER, "timer", Layer::Logic).with(Timer::boxed),
        TileTemplate::new(SEQUENCER, "sequencer", Layer::Logic).with(Sequencer::boxed),
        TileTemplate::new(DISPLAY, "display", Layer::Static).with(Display::boxed),
        TileTemplate::new(SIGN, "sign", Layer::Static).with(Sign::boxed),
        TileTemplate::new(DECORATION, "decoration", Layer::Floor).with(Decoration::boxed),
        TileTemplate::new(SPEAKER, "speaker", Layer::Logic).with(Speaker::boxed),
        TileTemplate::new(MARKER, "marker", Layer::InvisibleFloor).with(Marker::boxed),
        TileTemplate::new(GEM, "gem", Layer::Dynamic).with(Collectible::boxed),
    ]
}

/// Validated set holding [`templates`].
pub fn tileset() -> Result<TileSet, TileSetError> {
    TileSet::new(templates())
}

fn unknown(name: &str) -> PropertyError {
    PropertyError::UnknownProperty(name.to_string())
}

fn take_int(name: &str, value: PropertyValue) -> Result<i32, PropertyError> {
    match value {
        PropertyValue::Int(v) => Ok(v),
        other => Err(PropertyError::mismatch(name, PropertyKind::Int, &other)),
    }
}

fn take_bool(name: &str, value: PropertyValue) -> Result<bool, PropertyError> {
    match value {
        PropertyValue::Bool(v) => Ok(v),
        other => Err(PropertyError::mismatch(name, PropertyKind::Bool, &other)),
    }
}

/// Latching on/off source.
#[derive(Debug, Default)]
pub struct Switch {
    is_on: bool,
}

impl Switch {
    pub const KIND: ComponentKind = ComponentKind("switch");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port(
            "toggle",
            "Toggle",
            PortMetadata::input(PortType::Signal).triggers(SignalKind::Toggle),
        ),
        PropertyDescriptor::port(
            "on",
            "Turn On",
            PortMetadata::input(PortType::Signal).triggers(SignalKind::On),
        ),
        PropertyDescriptor::port(
            "off",
            "Turn Off",
            PortMetadata::input(PortType::Signal).triggers(SignalKind::Off),
        ),
        PropertyDescriptor::port("power", "Power", PortMetadata::output(PortType::Power)),
        PropertyDescriptor::new("isOn", "Is On", PropertyKind::Bool),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.is_on
    }
}

impl TileComponent for Switch {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "isOn" => Some(PropertyValue::Bool(self.is_on)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "isOn" => self.is_on = take_bool(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        let next = match event.kind {
            EventKind::Start => {
                cx.set_powered("power", self.is_on);
                return;
            }
            EventKind::Interact => !self.is_on,
            EventKind::Signal { kind, .. } => match kind {
                SignalKind::Pulse | SignalKind::Toggle => !self.is_on,
                SignalKind::On => true,
                SignalKind::Off | SignalKind::Reset => false,
            },
            _ => return,
        };
        event.handled = true;
        if next != self.is_on {
            self.is_on = next;
            cx.set_powered("power", next);
        }
    }
}

/// Opens while its power input is live.
#[derive(Debug, Default)]
pub struct Door {
    is_open: bool,
}

impl Door {
    pub const KIND: ComponentKind = ComponentKind("door");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("power", "Power", PortMetadata::input(PortType::Power)),
        PropertyDescriptor::new("isOpen", "Is Open", PropertyKind::Bool),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Door {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "isOpen" => Some(PropertyValue::Bool(self.is_open)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "isOpen" => self.is_open = take_bool(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        match event.kind {
            EventKind::PowerChanged { .. } => {
                self.is_open = cx.has_power("power");
                event.handled = true;
            }
            EventKind::Start if cx.wire_count("power") > 0 => {
                self.is_open = cx.has_power("power");
            }
            _ => {}
        }
    }
}

/// Emits a signal when interacted with or stepped on.
#[derive(Debug, Default)]
pub struct Button {
    presses: i32,
}

impl Button {
    pub const KIND: ComponentKind = ComponentKind("button");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("pressed", "Pressed", PortMetadata::output(PortType::Signal)),
        PropertyDescriptor::new("presses", "Presses", PropertyKind::Int).transient(),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Button {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "presses" => Some(PropertyValue::Int(self.presses)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "presses" => self.presses = take_int(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        if matches!(event.kind, EventKind::Interact | EventKind::Enter) {
            self.presses = self.presses.saturating_add(1);
            cx.send_signal("pressed");
            event.handled = true;
        }
    }
}

/// Counts incoming signals and publishes the running total.
#[derive(Debug)]
pub struct Counter {
    count: i32,
    target: i32,
    decay_ticks: i32,
    idle: i32,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            count: 0,
            target: 3,
            decay_ticks: 0,
            idle: 0,
        }
    }
}

impl Counter {
    pub const KIND: ComponentKind = ComponentKind("counter");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("increment", "Increment", PortMetadata::input(PortType::Signal)),
        PropertyDescriptor::port(
            "reset",
            "Reset",
            PortMetadata::input(PortType::Signal).triggers(SignalKind::Reset),
        ),
        PropertyDescriptor::port("value", "Value", PortMetadata::output(PortType::Number)),
        PropertyDescriptor::port("reached", "Target Reached", PortMetadata::output(PortType::Power)),
        PropertyDescriptor::new("count", "Count", PropertyKind::Int),
        PropertyDescriptor::new("target", "Target", PropertyKind::Int),
        PropertyDescriptor::new("decayTicks", "Decay Ticks", PropertyKind::Int),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }

    fn publish(&self, cx: &mut TileContext<'_>) {
        cx.send_value("value", self.count, false);
        cx.set_powered("reached", self.target > 0 && self.count >= self.target);
    }
}

impl TileComponent for Counter {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "count" => Some(PropertyValue::Int(self.count)),
            "target" => Some(PropertyValue::Int(self.target)),
            "decayTicks" => Some(PropertyValue::Int(self.decay_ticks)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "count" => self.count = take_int(name, value)?,
            "target" => self.target = take_int(name, value)?,
            "decayTicks" => self.decay_ticks = take_int(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn wants_ticks(&self) -> bool {
        true
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        match event.kind {
            EventKind::Start => self.publish(cx),
            EventKind::Signal { input, kind } => {
                if input == "reset" || kind == SignalKind::Reset {
                    self.count = 0;
                } else {
                    self.count = self.count.saturating_add(1);
                }
                self.idle = 0;
                event.handled = true;
                self.publish(cx);
            }
            EventKind::Tick(_) if self.decay_ticks > 0 && self.count > 0 => {
                self.idle += 1;
                if self.idle >= self.decay_ticks {
                    self.idle = 0;
                    self.count -= 1;
                    self.publish(cx);
                }
            }
            _ => {}
        }
    }
}

/// Fires a signal every `interval` ticks while enabled.
#[derive(Debug)]
pub struct Timer {
    interval: i32,
    phase: i32,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            interval: 5,
            phase: 0,
        }
    }
}

impl Timer {
    pub const KIND: ComponentKind = ComponentKind("timer");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("enable", "Enable", PortMetadata::input(PortType::Power)),
        PropertyDescriptor::port("elapsed", "Elapsed", PortMetadata::output(PortType::Signal)),
        PropertyDescriptor::new("interval", "Interval", PropertyKind::Int),
        PropertyDescriptor::new("phase", "Phase", PropertyKind::Int).transient(),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Timer {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "interval" => Some(PropertyValue::Int(self.interval)),
            "phase" => Some(PropertyValue::Int(self.phase)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "interval" => self.interval = take_int(name, value)?,
            "phase" => self.phase = take_int(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn wants_ticks(&self) -> bool {
        true
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        if !matches!(event.kind, EventKind::Tick(_)) || self.interval <= 0 {
            return;
        }
        // An unwired enable input means always running.
        if cx.wire_count("enable") > 0 && !cx.has_power("enable") {
            return;
        }
        self.phase += 1;
        if self.phase >= self.interval {
            self.phase = 0;
            cx.send_signal("elapsed");
        }
    }
}

/// Steps through states; each outgoing wire's first option is a bitmask of
/// the states that power it.
#[derive(Debug)]
pub struct Sequencer {
    state: i32,
    state_count: i32,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self {
            state: 0,
            state_count: 4,
        }
    }
}

impl Sequencer {
    pub const KIND: ComponentKind = ComponentKind("sequencer");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("advance", "Advance", PortMetadata::input(PortType::Signal)),
        PropertyDescriptor::port(
            "reset",
            "Reset",
            PortMetadata::input(PortType::Signal).triggers(SignalKind::Reset),
        ),
        PropertyDescriptor::port("power", "Power", PortMetadata::output(PortType::Power)),
        PropertyDescriptor::new("state", "State", PropertyKind::Int),
        PropertyDescriptor::new("stateCount", "State Count", PropertyKind::Int),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }

    /// Wires without a mask respond to the state matching their position.
    fn apply(&self, cx: &mut TileContext<'_>) {
        for index in 0..cx.wire_count("power") {
            let fallback = u32::try_from(index)
                .ok()
                .and_then(|shift| 1i32.checked_shl(shift))
                .unwrap_or(0);
            let mask = cx
                .wire_option("power", index, WireSide::From, 0)
                .unwrap_or(fallback);
            let live = u32::try_from(self.state)
                .ok()
                .and_then(|shift| 1i32.checked_shl(shift))
                .is_some_and(|bit| mask & bit != 0);
            cx.set_wire_powered("power", index, live);
        }
    }
}

impl TileComponent for Sequencer {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "state" => Some(PropertyValue::Int(self.state)),
            "stateCount" => Some(PropertyValue::Int(self.state_count)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "state" => self.state = take_int(name, value)?,
            "stateCount" => self.state_count = take_int(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        match event.kind {
            EventKind::Start => self.apply(cx),
            EventKind::Signal { input, kind } => {
                if input == "reset" || kind == SignalKind::Reset {
                    self.state = 0;
                } else {
                    self.state = (self.state + 1).rem_euclid(self.state_count.max(1));
                }
                event.handled = true;
                self.apply(cx);
            }
            _ => {}
        }
    }
}

/// Shows incoming numbers; transient values are shown but not committed.
#[derive(Debug, Default)]
pub struct Display {
    committed: i32,
    shown: i32,
}

impl Display {
    pub const KIND: ComponentKind = ComponentKind("display");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("value", "Value", PortMetadata::input(PortType::Number)),
        PropertyDescriptor::new("committed", "Committed", PropertyKind::Int),
        PropertyDescriptor::new("shown", "Shown", PropertyKind::Int).transient(),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Display {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "committed" => Some(PropertyValue::Int(self.committed)),
            "shown" => Some(PropertyValue::Int(self.shown)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "committed" => {
                self.committed = take_int(name, value)?;
                self.shown = self.committed;
            }
            "shown" => self.shown = take_int(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, _cx: &mut TileContext<'_>) {
        if let EventKind::ValueChanged {
            value, transient, ..
        } = event.kind
        {
            self.shown = value;
            if !transient {
                self.committed = value;
            }
            event.handled = true;
        }
    }
}

/// Static text panel.
#[derive(Debug, Default)]
pub struct Sign {
    text: String,
    lines: Vec<String>,
    background: Option<Guid>,
    decal: Decal,
}

impl Sign {
    pub const KIND: ComponentKind = ComponentKind("sign");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::new("text", "Text", PropertyKind::String),
        PropertyDescriptor::new("lines", "Lines", PropertyKind::StringArray),
        PropertyDescriptor::new("background", "Background", PropertyKind::BackgroundRef),
        PropertyDescriptor::new("decal", "Decal", PropertyKind::Decal),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Sign {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        Some(match name {
            "text" => PropertyValue::String(self.text.clone()),
            "lines" => PropertyValue::StringArray(self.lines.clone()),
            "background" => PropertyValue::BackgroundRef(self.background),
            "decal" => PropertyValue::Decal(self.decal),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match (name, value) {
            ("text", PropertyValue::String(v)) => self.text = v,
            ("lines", PropertyValue::StringArray(v)) => self.lines = v,
            ("background", PropertyValue::BackgroundRef(v)) => self.background = v,
            ("decal", PropertyValue::Decal(v)) => self.decal = v,
            (name, value) => return Err(mismatch_or_unknown(Self::DESCRIPTORS, name, &value)),
        }
        Ok(())
    }
}

/// Floor dressing with no behaviour.
#[derive(Debug, Default)]
pub struct Decoration {
    decals: Vec<Decal>,
    tint: Vec<i32>,
    variant: Guid,
}

impl Decoration {
    pub const KIND: ComponentKind = ComponentKind("decoration");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::new("decals", "Decals", PropertyKind::DecalArray),
        PropertyDescriptor::new("tint", "Tint", PropertyKind::IntArray),
        PropertyDescriptor::new("variant", "Variant", PropertyKind::Uuid),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Decoration {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        Some(match name {
            "decals" => PropertyValue::DecalArray(self.decals.clone()),
            "tint" => PropertyValue::IntArray(self.tint.clone()),
            "variant" => PropertyValue::Uuid(self.variant),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match (name, value) {
            ("decals", PropertyValue::DecalArray(v)) => self.decals = v,
            ("tint", PropertyValue::IntArray(v)) => self.tint = v,
            ("variant", PropertyValue::Uuid(v)) => self.variant = v,
            (name, value) => return Err(mismatch_or_unknown(Self::DESCRIPTORS, name, &value)),
        }
        Ok(())
    }
}

/// Sound emitter; playback itself happens outside the simulation.
#[derive(Debug, Default)]
pub struct Speaker {
    sound: Option<Guid>,
    playlist: Vec<Guid>,
    plays: i32,
}

impl Speaker {
    pub const KIND: ComponentKind = ComponentKind("speaker");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("play", "Play", PortMetadata::input(PortType::Signal)),
        PropertyDescriptor::new("sound", "Sound", PropertyKind::SoundRef),
        PropertyDescriptor::new("playlist", "Playlist", PropertyKind::SoundArray),
        PropertyDescriptor::new("plays", "Plays", PropertyKind::Int).transient(),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Speaker {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        Some(match name {
            "sound" => PropertyValue::SoundRef(self.sound),
            "playlist" => PropertyValue::SoundArray(self.playlist.clone()),
            "plays" => PropertyValue::Int(self.plays),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match (name, value) {
            ("sound", PropertyValue::SoundRef(v)) => self.sound = v,
            ("playlist", PropertyValue::SoundArray(v)) => self.playlist = v,
            ("plays", PropertyValue::Int(v)) => self.plays = v,
            (name, value) => return Err(mismatch_or_unknown(Self::DESCRIPTORS, name, &value)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        if let EventKind::Signal { .. } = event.kind {
            self.plays = self.plays.saturating_add(1);
            let sound = self.sound.or_else(|| {
                let len = self.playlist.len();
                let turn = usize::try_from(self.plays - 1).unwrap_or(0);
                (len > 0).then(|| self.playlist[turn % len])
            });
            debug!(tile = ?cx.tile(), ?sound, "speaker triggered");
            event.handled = true;
        }
    }
}

/// Invisible editor anchor pointing at other tiles.
#[derive(Debug)]
pub struct Marker {
    target: Cell,
    spawns: Option<Guid>,
    door: Option<ComponentRef>,
}

impl Default for Marker {
    fn default() -> Self {
        Self {
            target: Cell::grid(0, 0),
            spawns: None,
            door: None,
        }
    }
}

impl Marker {
    pub const KIND: ComponentKind = ComponentKind("marker");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::new("target", "Target", PropertyKind::Cell),
        PropertyDescriptor::new("spawns", "Spawns", PropertyKind::TileRef),
        PropertyDescriptor::component_ref("door", "Door", Door::KIND),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Marker {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        Some(match name {
            "target" => PropertyValue::Cell(self.target),
            "spawns" => PropertyValue::TileRef(self.spawns),
            "door" => PropertyValue::ComponentRef(self.door),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match (name, value) {
            ("target", PropertyValue::Cell(v)) => self.target = v,
            ("spawns", PropertyValue::TileRef(v)) => self.spawns = v,
            ("door", PropertyValue::ComponentRef(v)) => self.door = v,
            (name, value) => return Err(mismatch_or_unknown(Self::DESCRIPTORS, name, &value)),
        }
        Ok(())
    }
}

/// Puzzle-wide tally kept in shared data by [`Collectible`].
#[derive(Debug, Default)]
pub struct CollectibleTally {
    pub points: i32,
    pub collected: usize,
}

/// Pickup that adds its points to the puzzle-wide tally on entry.
#[derive(Debug)]
pub struct Collectible {
    points: i32,
    collected: bool,
}

impl Default for Collectible {
    fn default() -> Self {
        Self {
            points: 1,
            collected: false,
        }
    }
}

impl Collectible {
    pub const KIND: ComponentKind = ComponentKind("collectible");

    const DESCRIPTORS: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::port("total", "Total", PortMetadata::output(PortType::Number)),
        PropertyDescriptor::new("points", "Points", PropertyKind::Int),
        PropertyDescriptor::new("collected", "Collected", PropertyKind::Bool),
    ];

    #[must_use]
    pub fn boxed() -> Box<dyn TileComponent> {
        Box::<Self>::default()
    }
}

impl TileComponent for Collectible {
    fn kind(&self) -> ComponentKind {
        Self::KIND
    }

    fn descriptors(&self) -> &'static [PropertyDescriptor] {
        Self::DESCRIPTORS
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "points" => Some(PropertyValue::Int(self.points)),
            "collected" => Some(PropertyValue::Bool(self.collected)),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match name {
            "points" => self.points = take_int(name, value)?,
            "collected" => self.collected = take_bool(name, value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    fn on_event(&mut self, event: &mut Event, cx: &mut TileContext<'_>) {
        if event.kind != EventKind::Enter || self.collected {
            return;
        }
        self.collected = true;
        event.handled = true;
        let Some(tally) = cx.shared::<CollectibleTally>(Self::KIND) else {
            return;
        };
        tally.points = tally.points.saturating_add(self.points);
        tally.collected += 1;
        let total = tally.points;
        cx.send_value("total", total, false);
    }
}

fn mismatch_or_unknown(
    descriptors: &[PropertyDescriptor],
    name: &str,
    value: &PropertyValue,
) -> PropertyError {
    match descriptors.iter().find(|d| d.name == name) {
        Some(descriptor) => PropertyError::mismatch(name, descriptor.kind, value),
        None => unknown(name),
    }
}
