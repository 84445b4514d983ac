//! Spectral deconvolution and calibration engine for X-ray fluorescence data.
//!
//! Data flows from a raw spectrum through optional [`search`], a
//! [`fitting::FittingSet`] ordered by [`ordering`], the greedy solver, and
//! finally [`calibration`] into comparable concentrations.

pub mod calibration;
pub mod catalog;
pub mod common;
pub mod config;
pub mod curve;
pub mod domain;
pub mod fitting;
pub mod numerics;
pub mod ordering;
pub mod search;
