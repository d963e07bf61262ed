//! Cellular-Automaton Traffic Simulation Library
//!
//! A multi-lane CA road engine with pluggable car-following and
//! lane-changing strategies. Runs headless; rendering is left to the caller.

pub mod simulation;
