// src/lib.rs

//! Circulars: client and new-circular checker for a school circular API.

pub mod checker;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
