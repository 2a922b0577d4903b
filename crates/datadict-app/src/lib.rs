// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod export;
pub mod input;
pub mod model;
pub mod state;

pub use export::*;
pub use input::*;
pub use model::*;
pub use state::*;
