//! Tile templates and the validated set they are instantiated from.

use crate::Guid;
use crate::component::TileComponent;
use crate::property::{OutputGroup, TileProperty, discover_properties, duplicate_output};
use gridwire_index::Layer;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Builds a fresh component instance for a new tile.
pub type ComponentFactory = fn() -> Box<dyn TileComponent>;

/// Errors raised while assembling a [`TileSet`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TileSetError {
    #[error("template `{template}` declares a second {group} output `{property}`")]
    DuplicateOutput {
        template: String,
        group: OutputGroup,
        property: &'static str,
    },
    #[error("template `{template}` declares property `{property}` twice")]
    DuplicateProperty {
        template: String,
        property: &'static str,
    },
    #[error("template id {0} is registered twice")]
    DuplicateTemplate(Guid),
}

/// Named prototype a placed tile is created from.
#[derive(Clone)]
pub struct TileTemplate {
    id: Guid,
    name: String,
    layer: Layer,
    factories: Vec<ComponentFactory>,
    properties: Arc<[TileProperty]>,
}

impl fmt::Debug for TileTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileTemplate")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("layer", &self.layer)
            .field("components", &self.factories.len())
            .finish()
    }
}

impl TileTemplate {
    #[must_use]
    pub fn new(id: Guid, name: impl Into<String>, layer: Layer) -> Self {
        Self {
            id,
            name: name.into(),
            layer,
            factories: Vec::new(),
            properties: Arc::from(Vec::new()),
        }
    }

    /// Attach another component type; components keep insertion order.
    #[must_use]
    pub fn with(mut self, factory: ComponentFactory) -> Self {
        self.factories.push(factory);
        self.properties = Arc::from(discover_properties(&self.instantiate()));
        self
    }

    #[must_use]
    pub fn id(&self) -> Guid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Discovered properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &Arc<[TileProperty]> {
        &self.properties
    }

    /// Fresh component instances for a new tile.
    #[must_use]
    pub fn instantiate(&self) -> Vec<Box<dyn TileComponent>> {
        self.factories.iter().map(|factory| factory()).collect()
    }

    fn validate(&self) -> Result<(), TileSetError> {
        if let Some((group, property)) = duplicate_output(&self.properties) {
            return Err(TileSetError::DuplicateOutput {
                template: self.name.clone(),
                group,
                property,
            });
        }
        for (index, property) in self.properties.iter().enumerate() {
            if self.properties[..index]
                .iter()
                .any(|earlier| earlier.name == property.name)
            {
                return Err(TileSetError::DuplicateProperty {
                    template: self.name.clone(),
                    property: property.name,
                });
            }
        }
        Ok(())
    }
}

/// Validated collection of templates keyed by id.
#[derive(Debug, Default)]
pub struct TileSet {
    templates: Vec<TileTemplate>,
    by_id: HashMap<Guid, usize>,
}

impl TileSet {
    /// Validate every template; any configuration error aborts the whole set.
    pub fn new(templates: Vec<TileTemplate>) -> Result<Self, TileSetError> {
        let mut by_id = HashMap::with_capacity(templates.len());
        for (index, template) in templates.iter().enumerate() {
            if let Err(err) = template.validate() {
                error!(template = template.name(), %err, "tile set rejected");
                return Err(err);
            }
            if by_id.insert(template.id, index).is_some() {
                error!(id = %template.id, "tile set rejected duplicate template id");
                return Err(TileSetError::DuplicateTemplate(template.id));
            }
        }
        debug!(templates = templates.len(), "tile set initialised");
        Ok(Self { templates, by_id })
    }

    #[must_use]
    pub fn template(&self, id: Guid) -> Option<&TileTemplate> {
        self.by_id.get(&id).map(|index| &self.templates[*index])
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&TileTemplate> {
        self.templates.iter().find(|template| template.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileTemplate> {
        self.templates.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
