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

use std::sync::Arc;
use tricull_core::{
    math::{Extent2D, LinearRgba, Mat4, Vec3, FRAC_PI_2},
    packing::{pack_indexed, pack_unpacked_batch, pack_unpacked_single, PerObjectAttributes},
    renderer::{
        BufferDescriptor, BufferId, BufferUsage, Camera, DrawCommand, GraphicsDevice,
        HistogramPassDescriptor, IdPassDescriptor, Mesh, ObjectSource, RenderTarget,
        ResourceError, TextureDescriptor, TextureFormat, TextureUsage, ViewUniforms,
    },
};
use tricull_infra::SoftwareDevice;

const SIZE: u32 = 32;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Looking down -Z from z = 2 with a 90 degree FOV, the unit quad at z = 0
// covers exactly the middle 8x8 pixels of a 32x32 target.
fn view() -> ViewUniforms {
    let eye = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y).unwrap();
    let camera = Camera::new(eye, FRAC_PI_2, 1.0, 0.1, 100.0);
    ViewUniforms::new(camera.view_projection(), Mat4::IDENTITY)
}

fn centred_quad() -> Mesh {
    Mesh::new(
        vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ],
        vec![Vec3::Z; 4],
        vec![0, 1, 2, 0, 2, 3],
    )
}

fn target(device: &SoftwareDevice, format: TextureFormat) -> RenderTarget {
    let extent = Extent2D::new(SIZE, SIZE);
    let texture = |format| {
        device
            .create_texture(&TextureDescriptor {
                label: None,
                size: extent,
                format,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
            })
            .unwrap()
    };
    RenderTarget {
        color: texture(format),
        depth: Some(texture(TextureFormat::Depth32Float)),
        extent,
    }
}

fn upload<T: bytemuck::Pod>(device: &SoftwareDevice, data: &[T]) -> BufferId {
    device
        .create_buffer_with_data(
            &BufferDescriptor::new("test data", 0, BufferUsage::STORAGE | BufferUsage::VERTEX),
            bytemuck::cast_slice(data),
        )
        .unwrap()
}

fn pixel(texels: &[u32], x: u32, y: u32) -> u32 {
    texels[(y * SIZE + x) as usize]
}

/// Clears a colour target, records `commands` into it and returns its texels.
fn render(device: &SoftwareDevice, commands: &[DrawCommand]) -> Vec<u32> {
    let target = target(device, TextureFormat::Rgba8Unorm);
    let mut encoder = device.create_command_encoder(Some("draw"));
    encoder.clear_target(&target, LinearRgba::BLACK);
    for command in commands {
        encoder.draw(&target, &view(), command);
    }
    device.submit_command_buffer(encoder.finish()).unwrap();
    device.read_texture(target.color).unwrap()
}

#[test]
fn id_pass_and_histogram_count_covered_pixels() {
    init();
    let device = SoftwareDevice::with_latency(0);
    let quad = centred_quad();
    let off_screen = Mesh::triangle(
        Vec3::new(50.0, 50.0, 0.0),
        Vec3::new(51.0, 50.0, 0.0),
        Vec3::new(50.0, 51.0, 0.0),
    );
    let batch = pack_unpacked_batch(&[&quad, &off_screen]).unwrap();
    assert_eq!(batch.triangle_count(), 3);

    let objects = [
        PerObjectAttributes::new(Mat4::IDENTITY, LinearRgba::WHITE),
        PerObjectAttributes::new(Mat4::IDENTITY, LinearRgba::WHITE),
    ];
    let attributes = upload(&device, &batch.attributes);
    let objects = upload(&device, &objects);
    let histogram = device
        .create_buffer(&BufferDescriptor::new(
            "histogram",
            u64::from(batch.triangle_count()) * 4,
            BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
        ))
        .unwrap();
    let ids = target(&device, TextureFormat::R32Uint);

    let mut encoder = device.create_command_encoder(Some("ids"));
    encoder.clear_buffer(histogram);
    encoder.render_triangle_ids(&IdPassDescriptor {
        target: ids,
        attributes,
        objects,
        vertex_count: batch.triangle_count() * 3,
        view: view(),
    });
    encoder.accumulate_histogram(&HistogramPassDescriptor {
        ids: ids.color,
        extent: ids.extent,
        histogram,
        triangle_count: batch.triangle_count(),
    });
    let submission = device.submit_command_buffer(encoder.finish()).unwrap();
    assert!(device.is_submission_complete(submission));

    let texels = device.read_texture(ids.color).unwrap();
    assert_eq!(pixel(&texels, 0, 0), 0, "background stays zero");
    // Triangle 0 covers the lower right half, triangle 1 the upper left.
    assert_eq!(pixel(&texels, 18, 18), 1);
    assert_eq!(pixel(&texels, 13, 13), 2);

    let counts: Vec<u32> = bytemuck::pod_collect_to_vec(&device.read_buffer(histogram).unwrap());
    assert_eq!(counts.len(), 3);
    assert!(counts[0] > 0 && counts[1] > 0);
    // Pixel centres on the shared diagonal may round either way.
    assert!((56..=64).contains(&(counts[0] + counts[1])), "{counts:?}");
    assert_eq!(counts[2], 0, "off-screen triangle covers nothing");
}

#[test]
fn histogram_accumulates_until_cleared() {
    init();
    let device = SoftwareDevice::with_latency(0);
    let batch = pack_unpacked_batch(&[&centred_quad()]).unwrap();
    let attributes = upload(&device, &batch.attributes);
    let objects = upload(
        &device,
        &[PerObjectAttributes::new(Mat4::IDENTITY, LinearRgba::WHITE)],
    );
    let histogram = device
        .create_buffer(&BufferDescriptor::new("histogram", 8, BufferUsage::STORAGE))
        .unwrap();
    let ids = target(&device, TextureFormat::R32Uint);

    let mut totals = Vec::new();
    for _ in 0..2 {
        let mut encoder = device.create_command_encoder(None);
        encoder.render_triangle_ids(&IdPassDescriptor {
            target: ids,
            attributes,
            objects,
            vertex_count: 6,
            view: view(),
        });
        encoder.accumulate_histogram(&HistogramPassDescriptor {
            ids: ids.color,
            extent: ids.extent,
            histogram,
            triangle_count: 2,
        });
        device.submit_command_buffer(encoder.finish()).unwrap();
        let counts: Vec<u32> =
            bytemuck::pod_collect_to_vec(&device.read_buffer(histogram).unwrap());
        totals.push(counts[0] + counts[1]);
    }

    assert!(totals[0] > 0);
    assert_eq!(totals[1], 2 * totals[0]);
}

#[test]
fn every_draw_primitive_produces_the_same_picture() {
    init();
    let device = SoftwareDevice::with_latency(0);
    let quad = centred_quad();
    let indexed = pack_indexed(&quad).unwrap();
    let unpacked = pack_unpacked_single(&quad).unwrap();

    let vertex_buffer = upload(&device, &indexed.attributes);
    let index_buffer = upload(&device, &indexed.indices);
    let unpacked_buffer = upload(&device, &unpacked);
    let objects = upload(
        &device,
        &[PerObjectAttributes::new(Mat4::IDENTITY, LinearRgba::GREEN)],
    );
    let all_ids = upload(&device, &[0u32, 1]);

    let reference = render(
        &device,
        &[DrawCommand::Mesh {
            vertex_buffer,
            index_buffer,
            index_count: indexed.index_count(),
            transform: Mat4::IDENTITY,
            color: LinearRgba::GREEN,
        }],
    );
    assert_eq!(pixel(&reference, 16, 16), LinearRgba::GREEN.to_rgba8());
    assert_eq!(pixel(&reference, 2, 2), LinearRgba::BLACK.to_rgba8());

    let others = [
        DrawCommand::MeshInstanced {
            vertex_buffer,
            index_buffer,
            index_count: indexed.index_count(),
            objects,
            first_instance: 0,
            instance_count: 1,
        },
        DrawCommand::IndexedProcedural {
            indices: index_buffer,
            attributes: vertex_buffer,
            index_count: indexed.index_count(),
            objects,
            object_index: 0,
        },
        DrawCommand::UnpackedProcedural {
            attributes: unpacked_buffer,
            vertex_count: 6,
            objects,
            object_source: ObjectSource::Instance(0),
        },
        DrawCommand::UnpackedProcedural {
            attributes: unpacked_buffer,
            vertex_count: 6,
            objects,
            object_source: ObjectSource::ModelId,
        },
        DrawCommand::VisibleProcedural {
            attributes: unpacked_buffer,
            visible_ids: all_ids,
            triangle_count: 2,
            objects,
        },
    ];
    for command in &others {
        assert_eq!(render(&device, &[*command]), reference, "{command:?}");
    }
}

#[test]
fn visible_draw_only_shades_listed_triangles() {
    init();
    let device = SoftwareDevice::with_latency(0);
    let unpacked = pack_unpacked_single(&centred_quad()).unwrap();
    let attributes = upload(&device, &unpacked);
    let objects = upload(
        &device,
        &[PerObjectAttributes::new(Mat4::IDENTITY, LinearRgba::RED)],
    );
    // The second entry is past the end of the attribute buffer and is skipped.
    let visible_ids = upload(&device, &[1u32, 7]);

    let texels = render(
        &device,
        &[DrawCommand::VisibleProcedural {
            attributes,
            visible_ids,
            triangle_count: 2,
            objects,
        }],
    );
    assert_eq!(pixel(&texels, 13, 13), LinearRgba::RED.to_rgba8());
    assert_eq!(pixel(&texels, 18, 18), LinearRgba::BLACK.to_rgba8());
}

#[test]
fn staged_copy_reaches_the_host_after_polling() {
    init();
    let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::new());
    let words = [3u32, 1, 4, 1, 5, 9];
    let source = device
        .create_buffer_with_data(
            &BufferDescriptor::new("source", 0, BufferUsage::STORAGE | BufferUsage::COPY_SRC),
            bytemuck::cast_slice(&words),
        )
        .unwrap();
    let staging = device
        .create_buffer(&BufferDescriptor::new(
            "staging",
            8,
            BufferUsage::MAP_READ | BufferUsage::COPY_DST,
        ))
        .unwrap();

    let mut encoder = device.create_command_encoder(Some("chunk"));
    encoder.copy_buffer_to_buffer(source, 8, staging, 0, 8);
    device.submit_command_buffer(encoder.finish()).unwrap();
    let readback = device.request_readback(staging, 0, 8).unwrap();

    assert!(device.try_take_readback(readback).is_none());
    device.poll();
    let bytes = device.try_take_readback(readback).unwrap().unwrap();
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&bytes), vec![4, 1]);
    assert!(
        matches!(device.try_take_readback(readback), Some(Err(ResourceError::NotFound))),
        "result is consumed"
    );
}
