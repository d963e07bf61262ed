//! Vehicle records and grid cells
//!
//! Vehicles live in an arena keyed by [`VehicleId`]. Cells store the id of
//! the vehicle covering them, never a copy of the record, so one record is
//! shared by all `length` cells of its body.

use std::collections::HashMap;

use super::params::{CURRENT_SPEED, LANE, LENGTH, X_POSITION};
use super::types::VehicleId;

/// Display colour, irrelevant to the simulation itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A vehicle waiting to enter the road: everything but its id and position
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSpec {
    pub length: usize,
    pub attributes: HashMap<String, f64>,
    pub color: Color,
}

impl VehicleSpec {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
            attributes: HashMap::new(),
            color: Color::default(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// A vehicle on the CA road
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub lane: usize,
    /// Index of the frontmost occupied cell
    pub head_position: usize,
    /// Number of cells occupied; shrinks while the vehicle exits
    pub length: usize,
    /// Cells per tick
    pub current_speed: usize,
    pub attributes: HashMap<String, f64>,
    pub color: Color,
}

impl Vehicle {
    pub fn from_spec(id: VehicleId, spec: VehicleSpec) -> Self {
        Self {
            id,
            lane: 0,
            head_position: 0,
            length: spec.length.max(1),
            current_speed: 0,
            attributes: spec.attributes,
            color: spec.color,
        }
    }

    /// Position of the rear-most cell, if the body fits behind the head
    pub fn tail_position(&self) -> Option<usize> {
        (self.head_position + 1).checked_sub(self.length)
    }

    /// Read an intrinsic quantity or generated attribute by protocol key
    pub fn attribute(&self, key: &str) -> Option<f64> {
        match key {
            X_POSITION => Some(self.head_position as f64),
            CURRENT_SPEED => Some(self.current_speed as f64),
            LENGTH => Some(self.length as f64),
            LANE => Some(self.lane as f64),
            _ => self.attributes.get(key).copied(),
        }
    }
}

/// One slot of the lane x position grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub occupied: bool,
    pub is_head: bool,
    pub vehicle: Option<VehicleId>,
}

impl Cell {
    pub fn is_free(&self) -> bool {
        !self.occupied
    }

    pub(crate) fn clear(&mut self) {
        *self = Cell::default();
    }

    pub(crate) fn occupy(&mut self, vehicle: VehicleId, is_head: bool) {
        self.occupied = true;
        self.is_head = is_head;
        self.vehicle = Some(vehicle);
    }
}
