//! Template System - Enforceable Contracts
//!
//! A template is the single aggregate describing one certificate layout.
//! Saves are whole-object replaces gated by all-or-nothing validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use crate::layout::Orientation;

/// The certificate classes the platform issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CertificateType {
    Completion,
    Lor,
    Offer,
}

impl CertificateType {
    pub const ALL: [CertificateType; 3] = [
        CertificateType::Completion,
        CertificateType::Lor,
        CertificateType::Offer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Completion => "completion",
            CertificateType::Lor => "lor",
            CertificateType::Offer => "offer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completion" => Some(CertificateType::Completion),
            "lor" => Some(CertificateType::Lor),
            "offer" => Some(CertificateType::Offer),
            _ => None,
        }
    }
}

impl std::fmt::Display for CertificateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Light,
    Normal,
    Medium,
    Bold,
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Default for Alignment {
    fn default() -> Self {
        Self::Left
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    #[serde(default = "default_font_family")]
    pub family: String,
    #[serde(default = "default_font_size")]
    pub size: f64,
    #[serde(default)]
    pub weight: FontWeight,
    #[serde(default)]
    pub style: FontStyle,
}

fn default_font_family() -> String {
    "Georgia".to_string()
}

fn default_font_size() -> f64 {
    16.0
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: default_font_family(),
            size: default_font_size(),
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
        }
    }
}

/// Text fill - a flat color or a two-stop gradient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "fill", rename_all = "lowercase")]
pub enum ColorFill {
    Solid {
        color: String,
    },
    #[serde(rename_all = "camelCase")]
    Gradient {
        start: String,
        end: String,
        angle_degrees: f64,
    },
}

impl Default for ColorFill {
    fn default() -> Self {
        ColorFill::Solid {
            color: "#1a1a1a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Logo,
    Signature,
}

/// Stable handle for an element within one template.
///
/// Handles are counter-allocated by the arena and never reused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    #[serde(rename_all = "camelCase")]
    Text {
        id: ElementId,
        /// Raw markup: `{token}` placeholders plus `**`/`*`/`__` styling.
        text: String,
        position: Position,
        font: FontSpec,
        color: ColorFill,
        alignment: Alignment,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        id: ElementId,
        kind: ImageKind,
        image_ref: String,
        position: Position,
        size: Size,
    },
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Text { id, .. } | Element::Image { id, .. } => *id,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Element::Text { position, .. } | Element::Image { position, .. } => *position,
        }
    }

    /// Blank elements don't count toward template savability.
    pub fn has_content(&self) -> bool {
        match self {
            Element::Text { text, .. } => !text.trim().is_empty(),
            Element::Image { image_ref, .. } => !image_ref.is_empty(),
        }
    }
}

/// Growable element collection with stable counter-allocated handles.
///
/// Iteration order is insertion order; the index map gives O(1) lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ArenaState", into = "ArenaState")]
pub struct ElementArena {
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
    next_id: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArenaState {
    elements: Vec<Element>,
    next_id: u64,
}

impl From<ArenaState> for ElementArena {
    fn from(state: ArenaState) -> Self {
        let index = state
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id(), i))
            .collect();
        Self {
            elements: state.elements,
            index,
            next_id: state.next_id,
        }
    }
}

impl From<ElementArena> for ArenaState {
    fn from(arena: ElementArena) -> Self {
        Self {
            elements: arena.elements,
            next_id: arena.next_id,
        }
    }
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert_text(
        &mut self,
        text: impl Into<String>,
        position: Position,
        font: FontSpec,
        color: ColorFill,
        alignment: Alignment,
    ) -> ElementId {
        let id = self.allocate();
        self.elements.push(Element::Text {
            id,
            text: text.into(),
            position,
            font,
            color,
            alignment,
        });
        self.index.insert(id, self.elements.len() - 1);
        id
    }

    pub fn insert_image(
        &mut self,
        kind: ImageKind,
        image_ref: impl Into<String>,
        position: Position,
        size: Size,
    ) -> ElementId {
        let id = self.allocate();
        self.elements.push(Element::Image {
            id,
            kind,
            image_ref: image_ref.into(),
            position,
            size,
        });
        self.index.insert(id, self.elements.len() - 1);
        id
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.index.get(&id).map(|&i| &self.elements[i])
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        let i = *self.index.get(&id)?;
        Some(&mut self.elements[i])
    }

    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let i = self.index.remove(&id)?;
        let removed = self.elements.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    #[serde(default = "default_background_color")]
    pub color: String,
    #[serde(default)]
    pub image_ref: Option<String>,
}

fn default_background_color() -> String {
    "#ffffff".to_string()
}

impl Default for Background {
    fn default() -> Self {
        Self {
            color: default_background_color(),
            image_ref: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub certificate_type: CertificateType,
    /// A fresh draft may not have picked an orientation yet; saving one fails.
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub background: Background,
    #[serde(default = "default_border_color")]
    pub border_color: String,
    #[serde(default)]
    pub elements: ElementArena,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_schema_version")]
    pub engine_min_version: String,
}

fn default_border_color() -> String {
    "#c9a227".to_string()
}

fn default_schema_version() -> String {
    crate::MIN_TEMPLATE_VERSION.to_string()
}

impl Template {
    /// Blank draft for the given certificate type.
    pub fn new(certificate_type: CertificateType) -> Self {
        Self {
            certificate_type,
            orientation: None,
            background: Background::default(),
            border_color: default_border_color(),
            elements: ElementArena::new(),
            schema_version: default_schema_version(),
            engine_min_version: default_schema_version(),
        }
    }

    /// Canvas size fixed by the orientation, if one has been chosen.
    pub fn canvas(&self) -> Option<[f64; 2]> {
        self.orientation.map(crate::layout::canvas_dimensions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateValidationError {
    #[error("template has no orientation")]
    MissingOrientation,
    #[error("template has no elements")]
    NoElements,
    #[error("template has no non-blank content")]
    NoContent,
}

/// Savability check: orientation chosen, at least one element, at least
/// one element with non-blank content. All-or-nothing.
pub fn validate_template(template: &Template) -> Result<(), TemplateValidationError> {
    if template.orientation.is_none() {
        return Err(TemplateValidationError::MissingOrientation);
    }
    if template.elements.is_empty() {
        return Err(TemplateValidationError::NoElements);
    }
    if !template.elements.iter().any(Element::has_content) {
        return Err(TemplateValidationError::NoContent);
    }
    Ok(())
}

/// Template store - one template per certificate type.
///
/// Saves are validated whole-object replaces; concurrent saves to the same
/// type are last-writer-wins.
pub struct TemplateStore {
    templates: RwLock<HashMap<CertificateType, Template>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Load one JSON document per certificate type from `dir`.
    /// Missing files are fine; malformed files are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let store = Self::new();
        if dir.exists() {
            let mut templates = store.templates.write().unwrap();
            for cert_type in CertificateType::ALL {
                let path = dir.join(format!("{}.json", cert_type.as_str()));
                if !path.exists() {
                    continue;
                }
                let content = fs::read_to_string(&path)?;
                match serde_json::from_str::<Template>(&content) {
                    Ok(template) => {
                        templates.insert(cert_type, template);
                    }
                    Err(e) => {
                        warn!(certificate_type = %cert_type, error = %e, "skipping malformed template file");
                    }
                }
            }
        }
        Ok(store)
    }

    /// Write every stored template back out, one file per type.
    pub fn persist_to_dir(&self, dir: &Path) -> Result<(), std::io::Error> {
        fs::create_dir_all(dir)?;
        let templates = self.templates.read().unwrap();
        for (cert_type, template) in templates.iter() {
            let path = dir.join(format!("{}.json", cert_type.as_str()));
            let json = serde_json::to_string_pretty(template)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// Snapshot of the stored template, if any.
    pub fn get(&self, certificate_type: CertificateType) -> Option<Template> {
        self.templates
            .read()
            .unwrap()
            .get(&certificate_type)
            .cloned()
    }

    /// Validated whole-object replace. Nothing is written on failure.
    pub fn save(
        &self,
        certificate_type: CertificateType,
        mut template: Template,
    ) -> Result<(), TemplateValidationError> {
        template.certificate_type = certificate_type;
        if let Err(e) = validate_template(&template) {
            warn!(certificate_type = %certificate_type, error = %e, "template save rejected");
            return Err(e);
        }
        self.templates
            .write()
            .unwrap()
            .insert(certificate_type, template);
        info!(certificate_type = %certificate_type, "template saved");
        Ok(())
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}
