//! Logic Module - analysis engines
//!
//! - `entropy` - Shannon entropy
//! - `pe/` - bounds-checked PE header, section and import parsing
//! - `features/` - fixed feature layout and extraction
//! - `model/` - scaler/classifier artifacts and inference
//! - `reputation/` - external reputation lookup state machine
//! - `upload` - scoped temporary storage for uploaded files

pub mod entropy;
pub mod pe;
pub mod features;
pub mod model;
pub mod reputation;
pub mod upload;
