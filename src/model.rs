//! Data models for the 3D packing domain.
//!
//! This module defines the fundamental data structures from the spec's data
//! model (§3): `Block`, `Container`, and the `Corner`/`Shape` aliases used
//! throughout the oracle and annealer. All structures implement the traits
//! from the `types` module for OOP compliance.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::error::ValidationError;
use crate::types::{Axis, BoundingBox, Dimensional, Positioned, Vec3, Weighted, EPSILON_GENERAL, INF};

/// A block's (depth, width, height) extent. Axis order matches `Vec3`:
/// x = depth (back→front), y = width (left→right), z = height (bottom→top).
pub type Shape = Vec3;

/// A block's back-left-bottom vertex coordinates.
pub type Corner = Vec3;

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{name} must be positive and finite, got: {value}"
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "weight must be non-negative and finite, got: {value}"
        )));
    }
    Ok(())
}

fn validate_shape(shape: (f64, f64, f64)) -> Result<(), ValidationError> {
    validate_dimension(shape.0, "depth")?;
    validate_dimension(shape.1, "width")?;
    validate_dimension(shape.2, "height")?;
    Ok(())
}

/// A rectangular cuboid to be packed (spec §3 "Block").
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Block {
    pub name: String,
    #[schema(value_type = [f64; 3], example = json!([30.0, 40.0, 20.0]))]
    pub shape: (f64, f64, f64),
    pub weight: f64,
    pub color: Option<String>,
    pub stackable: bool,
    pub right_side_up: bool,
}

impl Block {
    /// Creates a new block, validating shape and weight.
    pub fn new(
        name: impl Into<String>,
        shape: (f64, f64, f64),
        weight: f64,
        color: Option<String>,
        stackable: bool,
        right_side_up: bool,
    ) -> Result<Self, ValidationError> {
        validate_shape(shape)?;
        validate_weight_value(weight)?;
        Ok(Self {
            name: name.into(),
            shape,
            weight,
            color,
            stackable,
            right_side_up,
        })
    }

    #[inline]
    pub fn shape_vec3(&self) -> Shape {
        Vec3::from_tuple(self.shape)
    }

    pub fn volume(&self) -> f64 {
        self.shape_vec3().volume()
    }

    pub fn base_area(&self) -> f64 {
        self.shape_vec3().base_area()
    }

    /// Axes this block may legally be rotated about (I4): a `right_side_up`
    /// block is restricted to the vertical axis (`Bottom`, which swaps
    /// depth/width and leaves height untouched).
    pub fn rotatable_axes(&self) -> &'static [Axis] {
        if self.right_side_up {
            &[Axis::Bottom]
        } else {
            &Axis::ALL
        }
    }

    /// Rotates the block in place about `axis`, swapping the two shape
    /// entries opposite it. Applying the same axis twice restores the
    /// original shape.
    pub fn rotate(&mut self, axis: Axis) {
        self.shape = self.shape_vec3().rotated(axis).as_tuple();
    }
}

impl Dimensional for Block {
    fn dimensions(&self) -> Vec3 {
        self.shape_vec3()
    }
}

impl Weighted for Block {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Sort key that orders blocks (¬stackable first, then descending volume),
/// the seeding rule used both for the MILP's per-container order (§4.4's
/// closing line) and for SP3D's initial permutation (§4.6).
#[inline]
pub fn seed_rank(block: &Block) -> (u8, f64) {
    (if block.stackable { 1 } else { 0 }, -block.volume())
}

/// A block together with the corner the oracle settled it into.
///
/// `corner` is the unpacked sentinel `(INF, INF, INF)` when the block could
/// not be placed.
#[derive(Clone, Debug)]
pub struct PlacedBlock {
    pub block: Block,
    pub corner: Corner,
}

impl PlacedBlock {
    pub fn new(block: Block, corner: Corner) -> Self {
        Self { block, corner }
    }

    #[inline]
    pub fn is_unpacked(&self) -> bool {
        self.corner.x >= INF
    }

    #[inline]
    pub fn top_z(&self) -> f64 {
        self.corner.z + self.block.shape.2
    }

    #[inline]
    pub fn front_x(&self) -> f64 {
        self.corner.x + self.block.shape.0
    }

    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.corner, self.block.shape_vec3())
    }
}

impl Positioned for PlacedBlock {
    fn position(&self) -> Vec3 {
        self.corner
    }
}

impl Dimensional for PlacedBlock {
    fn dimensions(&self) -> Vec3 {
        self.block.shape_vec3()
    }
}

impl Weighted for PlacedBlock {
    fn weight(&self) -> f64 {
        self.block.weight
    }
}

/// A rectangular cuboid container with a weight capacity (spec §3 "Container").
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Container {
    pub name: String,
    #[schema(value_type = [f64; 3], example = json!([220.0, 240.0, 260.0]))]
    pub shape: (f64, f64, f64),
    pub weight_capacity: f64,
}

impl Container {
    pub fn new(
        name: impl Into<String>,
        shape: (f64, f64, f64),
        weight_capacity: f64,
    ) -> Result<Self, ValidationError> {
        validate_shape(shape)?;
        validate_weight_value(weight_capacity)?;
        Ok(Self {
            name: name.into(),
            shape,
            weight_capacity,
        })
    }

    #[inline]
    pub fn shape_vec3(&self) -> Shape {
        Vec3::from_tuple(self.shape)
    }

    pub fn volume(&self) -> f64 {
        self.shape_vec3().volume()
    }

    pub fn base_area(&self) -> f64 {
        self.shape_vec3().base_area()
    }

    /// Whether `block` could possibly fit (ignoring placement), by raw
    /// dimension and weight capacity, with the global tolerance.
    pub fn can_fit(&self, block: &Block) -> bool {
        block.weight <= self.weight_capacity + EPSILON_GENERAL
            && block.shape.0 <= self.shape.0 + EPSILON_GENERAL
            && block.shape.1 <= self.shape.1 + EPSILON_GENERAL
            && block.shape.2 <= self.shape.2 + EPSILON_GENERAL
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Vec3 {
        self.shape_vec3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(name: &str, side: f64) -> Block {
        Block::new(name, (side, side, side), 1.0, None, true, false).unwrap()
    }

    #[test]
    fn rejects_non_positive_dimension() {
        assert!(Block::new("b", (-1.0, 1.0, 1.0), 1.0, None, true, false).is_err());
        assert!(Block::new("b", (0.0, 1.0, 1.0), 1.0, None, true, false).is_err());
    }

    #[test]
    fn rejects_negative_weight() {
        assert!(Block::new("b", (1.0, 1.0, 1.0), -1.0, None, true, false).is_err());
    }

    #[test]
    fn right_side_up_restricts_rotation_to_vertical_axis() {
        let block = Block::new("b", (1.0, 2.0, 3.0), 1.0, None, true, true).unwrap();
        assert_eq!(block.rotatable_axes(), &[Axis::Bottom]);
    }

    #[test]
    fn non_right_side_up_allows_all_axes() {
        let block = Block::new("b", (1.0, 2.0, 3.0), 1.0, None, true, false).unwrap();
        assert_eq!(block.rotatable_axes(), &Axis::ALL);
    }

    #[test]
    fn rotate_twice_about_same_axis_restores_shape() {
        let mut block = Block::new("b", (1.0, 2.0, 3.0), 1.0, None, true, false).unwrap();
        let original = block.shape;
        block.rotate(Axis::Bottom);
        assert_ne!(block.shape, original);
        block.rotate(Axis::Bottom);
        assert_eq!(block.shape, original);
    }

    #[test]
    fn unpacked_placed_block_detects_sentinel() {
        let placed = PlacedBlock::new(cube("b", 10.0), Corner::new(INF, INF, INF));
        assert!(placed.is_unpacked());
        let placed = PlacedBlock::new(cube("b", 10.0), Corner::zero());
        assert!(!placed.is_unpacked());
    }

    #[test]
    fn container_can_fit_checks_dims_and_weight() {
        let container = Container::new("c", (100.0, 100.0, 100.0), 500.0).unwrap();
        let small = cube("small", 50.0);
        let heavy = Block::new("heavy", (10.0, 10.0, 10.0), 1000.0, None, true, false).unwrap();
        assert!(container.can_fit(&small));
        assert!(!container.can_fit(&heavy));
    }
}
