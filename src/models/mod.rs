// src/models/mod.rs

pub mod comment;
