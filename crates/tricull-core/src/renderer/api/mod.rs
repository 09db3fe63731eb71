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

//! Backend-agnostic rendering API.
//!
//! - **[`buffer`]** and **[`texture`]**: GPU handles and their descriptors.
//! - **[`resource`]**: owning handles that release their resource on drop.
//! - **[`command`]**: recorded passes and draw primitives.
//! - **[`scene`]**: meshes, objects and cameras handed to lanes.
//! - **[`util`]**: usage flags.

pub mod buffer;
pub mod command;
pub mod resource;
pub mod scene;
pub mod texture;
pub mod util;

pub use self::buffer::*;
pub use self::command::*;
pub use self::resource::*;
pub use self::scene::*;
pub use self::texture::*;
pub use self::util::*;
