// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Tricull Infra
//!
//! Concrete implementations of the core graphics contracts: a CPU
//! [`SoftwareDevice`] that needs no GPU, and a headless wgpu device behind
//! the `wgpu-backend` feature.

pub mod graphics;

pub use graphics::software::SoftwareDevice;
#[cfg(feature = "wgpu-backend")]
pub use graphics::wgpu::{WgpuDevice, WgpuGraphicsContext};

/// Initializes `env_logger` from `RUST_LOG`, defaulting to `info` with
/// `wgpu_hal` limited to errors.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    use env_logger::{Builder, Env};

    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .try_init();
}
