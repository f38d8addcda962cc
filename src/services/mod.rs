// src/services/mod.rs

pub mod authoring;
pub mod grading;
pub mod identity;
