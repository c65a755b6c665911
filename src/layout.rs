//! Layout Engine - Canvas Bounds and Clamped Mutation
//!
//! Pure functions over the template aggregate. Pointer/drag handling is a
//! presentation concern and never reaches this module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::templates::{Element, ElementId, Template};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// A4 at 96 dpi.
pub const PORTRAIT_CANVAS: [f64; 2] = [794.0, 1123.0];
pub const LANDSCAPE_CANVAS: [f64; 2] = [1123.0, 794.0];

/// Images below this size degenerate into unclickable slivers in the editor.
pub const MIN_IMAGE_WIDTH: f64 = 30.0;
pub const MIN_IMAGE_HEIGHT: f64 = 10.0;

/// Constant per orientation across all calls.
pub fn canvas_dimensions(orientation: Orientation) -> [f64; 2] {
    match orientation {
        Orientation::Portrait => PORTRAIT_CANVAS,
        Orientation::Landscape => LANDSCAPE_CANVAS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("no element with id {0}")]
    UnknownElement(ElementId),

    #[error("template has no orientation, canvas bounds are undefined")]
    MissingOrientation,

    #[error("element {0} is a text element and has no size to resize")]
    NotResizable(ElementId),
}

/// Move an element, clamping the position into canvas bounds.
/// Passing an already-legal position is a no-op in effect.
pub fn move_element(
    template: &mut Template,
    id: ElementId,
    x: f64,
    y: f64,
) -> Result<(), LayoutError> {
    let [canvas_w, canvas_h] = template.canvas().ok_or(LayoutError::MissingOrientation)?;
    let element = template
        .elements
        .get_mut(id)
        .ok_or(LayoutError::UnknownElement(id))?;

    let position = match element {
        Element::Text { position, .. } | Element::Image { position, .. } => position,
    };
    position.x = x.clamp(0.0, canvas_w);
    position.y = y.clamp(0.0, canvas_h);
    Ok(())
}

/// Resize an image element, clamping into canvas bounds and enforcing the
/// minimum image size. Text elements carry no size and cannot be resized.
pub fn resize_element(
    template: &mut Template,
    id: ElementId,
    width: f64,
    height: f64,
) -> Result<(), LayoutError> {
    let [canvas_w, canvas_h] = template.canvas().ok_or(LayoutError::MissingOrientation)?;
    let element = template
        .elements
        .get_mut(id)
        .ok_or(LayoutError::UnknownElement(id))?;

    match element {
        Element::Text { .. } => Err(LayoutError::NotResizable(id)),
        Element::Image { size, .. } => {
            size.width = width.clamp(MIN_IMAGE_WIDTH, canvas_w);
            size.height = height.clamp(MIN_IMAGE_HEIGHT, canvas_h);
            Ok(())
        }
    }
}
