//! Tile property model.
//!
//! Every component type publishes a static table of [`PropertyDescriptor`]s.
//! Discovery concatenates those tables in component order, which keeps the
//! enumeration order stable across save/load cycles; the document codec
//! depends on that order when it stamps wire-table indices onto ports.

use crate::component::TileComponent;
use crate::{Guid, PortId, TileId};
use gridwire_index::Cell;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of value kinds a property can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PropertyKind {
    /// Terminates a property list in the binary format.
    Unknown = 0,
    Int = 1,
    Bool = 2,
    String = 3,
    Uuid = 4,
    StringArray = 5,
    Decal = 6,
    DecalArray = 7,
    TileRef = 8,
    BackgroundRef = 9,
    IntArray = 10,
    Port = 11,
    SoundRef = 12,
    Cell = 13,
    ComponentRef = 14,
    SoundArray = 15,
}

impl PropertyKind {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::Int,
            2 => Self::Bool,
            3 => Self::String,
            4 => Self::Uuid,
            5 => Self::StringArray,
            6 => Self::Decal,
            7 => Self::DecalArray,
            8 => Self::TileRef,
            9 => Self::BackgroundRef,
            10 => Self::IntArray,
            11 => Self::Port,
            12 => Self::SoundRef,
            13 => Self::Cell,
            14 => Self::ComponentRef,
            15 => Self::SoundArray,
            _ => return None,
        })
    }
}

/// Stable tag naming a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKind(pub &'static str);

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Decal reference plus orientation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Decal {
    pub id: Guid,
    pub flags: u8,
}

impl Decal {
    pub const FLIP_X: u8 = 0b0001;
    pub const FLIP_Y: u8 = 0b0010;
    /// Two bits of quarter-turn rotation.
    pub const ROTATION_MASK: u8 = 0b1100;

    #[must_use]
    pub const fn new(id: Guid, flags: u8) -> Self {
        Self { id, flags }
    }

    #[must_use]
    pub const fn rotation(&self) -> u8 {
        (self.flags & Self::ROTATION_MASK) >> 2
    }
}

/// Reference to a component attached to another tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub tile: TileId,
    pub kind: ComponentKind,
}

/// Typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    Bool(bool),
    String(String),
    Uuid(Guid),
    StringArray(Vec<String>),
    Decal(Decal),
    DecalArray(Vec<Decal>),
    TileRef(Option<Guid>),
    BackgroundRef(Option<Guid>),
    IntArray(Vec<i32>),
    Port(PortId),
    SoundRef(Option<Guid>),
    Cell(Cell),
    ComponentRef(Option<ComponentRef>),
    SoundArray(Vec<Guid>),
}

impl PropertyValue {
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Int(_) => PropertyKind::Int,
            Self::Bool(_) => PropertyKind::Bool,
            Self::String(_) => PropertyKind::String,
            Self::Uuid(_) => PropertyKind::Uuid,
            Self::StringArray(_) => PropertyKind::StringArray,
            Self::Decal(_) => PropertyKind::Decal,
            Self::DecalArray(_) => PropertyKind::DecalArray,
            Self::TileRef(_) => PropertyKind::TileRef,
            Self::BackgroundRef(_) => PropertyKind::BackgroundRef,
            Self::IntArray(_) => PropertyKind::IntArray,
            Self::Port(_) => PropertyKind::Port,
            Self::SoundRef(_) => PropertyKind::SoundRef,
            Self::Cell(_) => PropertyKind::Cell,
            Self::ComponentRef(_) => PropertyKind::ComponentRef,
            Self::SoundArray(_) => PropertyKind::SoundArray,
        }
    }

    /// Empty value of `kind`; `None` for kinds that carry no plain value.
    #[must_use]
    pub fn default_for(kind: PropertyKind) -> Option<Self> {
        Some(match kind {
            PropertyKind::Int => Self::Int(0),
            PropertyKind::Bool => Self::Bool(false),
            PropertyKind::String => Self::String(String::new()),
            PropertyKind::Uuid => Self::Uuid(Guid::NIL),
            PropertyKind::StringArray => Self::StringArray(Vec::new()),
            PropertyKind::Decal => Self::Decal(Decal::default()),
            PropertyKind::DecalArray => Self::DecalArray(Vec::new()),
            PropertyKind::TileRef => Self::TileRef(None),
            PropertyKind::BackgroundRef => Self::BackgroundRef(None),
            PropertyKind::IntArray => Self::IntArray(Vec::new()),
            PropertyKind::SoundRef => Self::SoundRef(None),
            PropertyKind::Cell => Self::Cell(Cell::grid(0, 0)),
            PropertyKind::ComponentRef => Self::ComponentRef(None),
            PropertyKind::SoundArray => Self::SoundArray(Vec::new()),
            PropertyKind::Port | PropertyKind::Unknown => return None,
        })
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

/// Errors raised by typed property access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertyError {
    #[error("unknown property `{0}`")]
    UnknownProperty(String),
    #[error("property `{name}` expects {expected:?}, got {found:?}")]
    TypeMismatch {
        name: String,
        expected: PropertyKind,
        found: PropertyKind,
    },
    #[error("property `{0}` is read-only")]
    ReadOnly(String),
    #[error("unknown tile")]
    UnknownTile,
}

impl PropertyError {
    /// Mismatch error for `name` given the offending value.
    #[must_use]
    pub fn mismatch(name: &str, expected: PropertyKind, value: &PropertyValue) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected,
            found: value.kind(),
        }
    }
}

/// Value type carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Power,
    Signal,
    Number,
}

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortFlow {
    Input,
    Output,
}

/// Flavour of a one-shot signal as seen by the receiving tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignalKind {
    #[default]
    Pulse,
    Toggle,
    On,
    Off,
    Reset,
}

/// Port declaration attached to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortMetadata {
    pub port_type: PortType,
    pub flow: PortFlow,
    /// Legacy ports still load but are not offered for new connections.
    pub legacy: bool,
    /// Signal kind raised on this input when it is triggered.
    pub signal: Option<SignalKind>,
}

impl PortMetadata {
    #[must_use]
    pub const fn input(port_type: PortType) -> Self {
        Self {
            port_type,
            flow: PortFlow::Input,
            legacy: false,
            signal: None,
        }
    }

    #[must_use]
    pub const fn output(port_type: PortType) -> Self {
        Self {
            port_type,
            flow: PortFlow::Output,
            legacy: false,
            signal: None,
        }
    }

    #[must_use]
    pub const fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    #[must_use]
    pub const fn triggers(mut self, kind: SignalKind) -> Self {
        self.signal = Some(kind);
        self
    }
}

/// Static description of one property declared by a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub kind: PropertyKind,
    pub port: Option<PortMetadata>,
    pub serialized: bool,
    /// Component type a `ComponentRef` property points at.
    pub target: Option<ComponentKind>,
}

impl PropertyDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, display_name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            display_name,
            kind,
            port: None,
            serialized: true,
            target: None,
        }
    }

    #[must_use]
    pub const fn port(
        name: &'static str,
        display_name: &'static str,
        metadata: PortMetadata,
    ) -> Self {
        Self {
            name,
            display_name,
            kind: PropertyKind::Port,
            port: Some(metadata),
            serialized: true,
            target: None,
        }
    }

    #[must_use]
    pub const fn component_ref(
        name: &'static str,
        display_name: &'static str,
        target: ComponentKind,
    ) -> Self {
        Self {
            name,
            display_name,
            kind: PropertyKind::ComponentRef,
            port: None,
            serialized: true,
            target: Some(target),
        }
    }

    /// Editable at runtime but never written to documents.
    #[must_use]
    pub const fn transient(mut self) -> Self {
        self.serialized = false;
        self
    }
}

/// A discovered property bound to the component that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileProperty {
    pub name: &'static str,
    pub display_name: &'static str,
    pub kind: PropertyKind,
    /// Position of the owning component within the tile.
    pub component: usize,
    pub owner: ComponentKind,
    pub port: Option<PortMetadata>,
    pub serialized: bool,
    pub target: Option<ComponentKind>,
}

impl TileProperty {
    #[must_use]
    pub fn is_port(&self) -> bool {
        self.port.is_some()
    }
}

/// Enumerate the properties of `components` in declaration order.
#[must_use]
pub fn discover_properties(components: &[Box<dyn TileComponent>]) -> Vec<TileProperty> {
    components
        .iter()
        .enumerate()
        .flat_map(|(index, component)| {
            let owner = component.kind();
            component
                .descriptors()
                .iter()
                .map(move |descriptor| TileProperty {
                    name: descriptor.name,
                    display_name: descriptor.display_name,
                    kind: if descriptor.port.is_some() {
                        PropertyKind::Port
                    } else {
                        descriptor.kind
                    },
                    component: index,
                    owner,
                    port: descriptor.port,
                    serialized: descriptor.serialized,
                    target: descriptor.target,
                })
        })
        .collect()
}

/// Output-port group that may appear at most once per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputGroup {
    PowerOrSignal,
    Number,
}

impl fmt::Display for OutputGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerOrSignal => f.write_str("power/signal"),
            Self::Number => f.write_str("number"),
        }
    }
}

/// Returns the first output group declared twice, if any.
#[must_use]
pub fn duplicate_output(properties: &[TileProperty]) -> Option<(OutputGroup, &'static str)> {
    let mut power_or_signal = false;
    let mut number = false;
    for property in properties {
        let Some(port) = property.port else {
            continue;
        };
        if port.flow != PortFlow::Output {
            continue;
        }
        let seen = match port.port_type {
            PortType::Number => &mut number,
            PortType::Power | PortType::Signal => &mut power_or_signal,
        };
        if *seen {
            let group = match port.port_type {
                PortType::Number => OutputGroup::Number,
                _ => OutputGroup::PowerOrSignal,
            };
            return Some((group, property.name));
        }
        *seen = true;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_property(name: &'static str, metadata: PortMetadata) -> TileProperty {
        TileProperty {
            name,
            display_name: name,
            kind: PropertyKind::Port,
            component: 0,
            owner: ComponentKind("test"),
            port: Some(metadata),
            serialized: true,
            target: None,
        }
    }

    #[test]
    fn kind_codes_round_trip() {
        for code in 0..=15u8 {
            let kind = PropertyKind::from_code(code).expect("known code");
            assert_eq!(kind.code(), code);
        }
        assert!(PropertyKind::from_code(16).is_none());
    }

    #[test]
    fn one_output_of_each_group_is_allowed() {
        let props = vec![
            port_property("power", PortMetadata::output(PortType::Power)),
            port_property("value", PortMetadata::output(PortType::Number)),
            port_property("in", PortMetadata::input(PortType::Power)),
            port_property("in2", PortMetadata::input(PortType::Power)),
        ];
        assert_eq!(duplicate_output(&props), None);
    }

    #[test]
    fn power_and_signal_outputs_share_a_group() {
        let props = vec![
            port_property("power", PortMetadata::output(PortType::Power)),
            port_property("pulse", PortMetadata::output(PortType::Signal)),
        ];
        assert_eq!(
            duplicate_output(&props),
            Some((OutputGroup::PowerOrSignal, "pulse"))
        );
    }

    #[test]
    fn defaults_cover_every_value_kind() {
        for code in 1..=15u8 {
            let kind = PropertyKind::from_code(code).expect("kind");
            match PropertyValue::default_for(kind) {
                Some(value) => assert_eq!(value.kind(), kind),
                None => assert_eq!(kind, PropertyKind::Port),
            }
        }
    }

    #[test]
    fn decal_rotation_reads_two_bits() {
        let decal = Decal::new(Guid::NIL, Decal::FLIP_X | (3 << 2));
        assert_eq!(decal.rotation(), 3);
    }
}
