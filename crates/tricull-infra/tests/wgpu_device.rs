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

//! Smoke tests against a real adapter. Run with `--ignored` on a machine with a GPU.

#![cfg(feature = "wgpu-backend")]

use tricull_core::renderer::{BufferDescriptor, BufferUsage, GraphicsDevice};
use tricull_infra::WgpuDevice;

#[test]
#[ignore = "requires a GPU adapter"]
fn buffer_readback_round_trips_through_staging() {
    tricull_infra::init_logging();
    let device = WgpuDevice::new_headless().expect("no adapter available");
    let words = [10u32, 20, 30, 40];
    let source = device
        .create_buffer_with_data(
            &BufferDescriptor::new("source", 0, BufferUsage::STORAGE | BufferUsage::COPY_SRC),
            bytemuck::cast_slice(&words),
        )
        .unwrap();
    let staging = device
        .create_buffer(&BufferDescriptor::new(
            "staging",
            16,
            BufferUsage::MAP_READ | BufferUsage::COPY_DST,
        ))
        .unwrap();

    let mut encoder = device.create_command_encoder(Some("copy"));
    encoder.copy_buffer_to_buffer(source, 0, staging, 0, 16);
    let submission = device.submit_command_buffer(encoder.finish()).unwrap();
    let readback = device.request_readback(staging, 0, 16).unwrap();

    let bytes = loop {
        device.poll_device_blocking();
        if let Some(result) = device.try_take_readback(readback) {
            break result.unwrap();
        }
    };
    assert!(device.is_submission_complete(submission));
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&bytes), words.to_vec());
}
