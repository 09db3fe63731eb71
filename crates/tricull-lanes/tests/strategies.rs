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
    lane::{DrawLane, FrameContext, LaneError},
    math::{Extent2D, LinearRgba, Mat4, Vec3, FRAC_PI_3},
    renderer::{
        BufferId, Camera, CommandBufferId, CommandEncoder, DrawCommand, GraphicsDevice,
        HistogramPassDescriptor, IdPassDescriptor, Mesh, ObjectSource, RenderTarget, SceneObject,
        TextureDescriptor, TextureFormat, TextureId, TextureUsage, ViewUniforms,
    },
};
use tricull_infra::SoftwareDevice;
use tricull_lanes::{
    render_lane::DirectMeshLane,
    visibility_lane::{DrawMode, VisibilitySettings},
    DrawStrategy,
};

/// Keeps the draws a lane records instead of executing them.
#[derive(Default)]
struct DrawRecorder {
    draws: Vec<DrawCommand>,
}

impl CommandEncoder for DrawRecorder {
    fn clear_buffer(&mut self, _buffer: BufferId) {}

    fn clear_target(&mut self, _target: &RenderTarget, _color: LinearRgba) {}

    fn render_triangle_ids(&mut self, _descriptor: &IdPassDescriptor) {}

    fn accumulate_histogram(&mut self, _descriptor: &HistogramPassDescriptor) {}

    fn copy_buffer_to_buffer(
        &mut self,
        _source: BufferId,
        _source_offset: u64,
        _destination: BufferId,
        _destination_offset: u64,
        _size: u64,
    ) {
    }

    fn draw(&mut self, _target: &RenderTarget, _view: &ViewUniforms, command: &DrawCommand) {
        self.draws.push(*command);
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(0)
    }
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera() -> Camera {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, Vec3::Y).unwrap();
    Camera::new(view, FRAC_PI_3, 1.0, 0.1, 100.0)
}

fn device() -> Arc<dyn GraphicsDevice> {
    Arc::new(SoftwareDevice::new())
}

fn full_buffer() -> VisibilitySettings {
    VisibilitySettings {
        draw_mode: DrawMode::FullBuffer,
        id_target_width: 32,
        id_target_height: 32,
        ..Default::default()
    }
}

/// Three cubes sharing one mesh (two colours) and a lone triangle: 37 triangles.
fn scene() -> Vec<SceneObject> {
    let cube = Arc::new(Mesh::cube(0.25));
    let triangle = Arc::new(Mesh::triangle(Vec3::ZERO, Vec3::X, Vec3::Y));
    vec![
        SceneObject::new(
            Arc::clone(&cube),
            Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)),
            LinearRgba::RED,
        ),
        SceneObject::new(Arc::clone(&cube), Mat4::IDENTITY, LinearRgba::RED),
        SceneObject::new(
            cube,
            Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            LinearRgba::BLUE,
        ),
        SceneObject::new(triangle, Mat4::IDENTITY, LinearRgba::GREEN),
    ]
}

fn record(lane: &mut dyn DrawLane) -> Result<Vec<DrawCommand>, LaneError> {
    let mut recorder = DrawRecorder::default();
    let camera = camera();
    lane.render(&mut FrameContext {
        encoder: &mut recorder,
        camera: &camera,
        root: Mat4::IDENTITY,
        target: RenderTarget {
            color: TextureId(0),
            depth: None,
            extent: Extent2D::new(32, 32),
        },
    })?;
    Ok(recorder.draws)
}

#[test]
fn every_strategy_draws_every_triangle() {
    init();
    let device = device();
    let objects = scene();

    for mut strategy in DrawStrategy::all(full_buffer()) {
        strategy.prepare(&device, &objects).unwrap();
        strategy.set_active(true).unwrap();
        let draws = record(&mut strategy).unwrap();
        let triangles: u64 = draws.iter().map(DrawCommand::triangle_count).sum();
        assert_eq!(triangles, 37, "{}", strategy.strategy_name());
        strategy.dispose();
    }
}

#[test]
fn strategies_differ_in_draw_count_and_primitive() {
    init();
    let device = device();
    let objects = scene();

    let mut shapes = Vec::new();
    for mut strategy in DrawStrategy::all(full_buffer()) {
        strategy.prepare(&device, &objects).unwrap();
        strategy.set_active(true).unwrap();
        let draws = record(&mut strategy).unwrap();
        shapes.push((strategy.strategy_name(), draws));
    }

    let count = |name: &str| shapes.iter().find(|(n, _)| *n == name).unwrap().1.len();
    assert_eq!(count("Instanced"), 2);
    assert_eq!(count("DirectMesh"), 4);
    assert_eq!(count("PropertyBlock"), 4);
    assert_eq!(count("IndexedProcedural"), 4);
    assert_eq!(count("UnpackedProcedural"), 4);
    assert_eq!(count("VisibilityCulled"), 1);

    for (name, draws) in &shapes {
        let expected = match *name {
            "Instanced" => draws
                .iter()
                .all(|d| matches!(d, DrawCommand::MeshInstanced { .. })),
            "DirectMesh" | "PropertyBlock" => {
                draws.iter().all(|d| matches!(d, DrawCommand::Mesh { .. }))
            }
            "IndexedProcedural" => draws
                .iter()
                .all(|d| matches!(d, DrawCommand::IndexedProcedural { .. })),
            "UnpackedProcedural" => draws.iter().all(|d| {
                matches!(
                    d,
                    DrawCommand::UnpackedProcedural {
                        object_source: ObjectSource::Instance(_),
                        ..
                    }
                )
            }),
            "VisibilityCulled" => matches!(
                draws[0],
                DrawCommand::UnpackedProcedural {
                    object_source: ObjectSource::ModelId,
                    vertex_count: 111,
                    ..
                }
            ),
            other => panic!("unexpected strategy {other}"),
        };
        assert!(expected, "{name} recorded {draws:?}");
    }
}

#[test]
fn instanced_batches_cover_contiguous_record_ranges() {
    init();
    let device = device();
    let mut strategy = DrawStrategy::all(full_buffer()).remove(0);
    strategy.prepare(&device, &scene()).unwrap();

    let ranges: Vec<_> = record(&mut strategy)
        .unwrap()
        .into_iter()
        .filter_map(|d| match d {
            DrawCommand::MeshInstanced {
                first_instance,
                instance_count,
                ..
            } => Some((first_instance, instance_count)),
            _ => None,
        })
        .collect();
    assert_eq!(ranges, vec![(0, 3), (3, 1)]);
}

#[test]
fn direct_mesh_shares_materials_by_colour() {
    init();
    let device = device();
    let mut lane = DirectMeshLane::new();
    lane.prepare(&device, &scene()).unwrap();
    assert_eq!(lane.material_count(), 3);

    let colours: Vec<_> = record(&mut lane)
        .unwrap()
        .into_iter()
        .filter_map(|d| match d {
            DrawCommand::Mesh { color, .. } => Some(color),
            _ => None,
        })
        .collect();
    assert_eq!(
        colours,
        vec![
            LinearRgba::RED,
            LinearRgba::RED,
            LinearRgba::BLUE,
            LinearRgba::GREEN
        ]
    );
}

#[test]
fn rendering_before_prepare_is_not_ready() {
    init();
    for mut strategy in DrawStrategy::all(full_buffer()) {
        let name = strategy.strategy_name();
        match record(&mut strategy) {
            Err(LaneError::NotReady { strategy }) => assert_eq!(strategy, name),
            other => panic!("{name}: expected NotReady, got {other:?}"),
        }
    }
}

#[test]
fn dispose_twice_is_harmless_for_every_strategy() {
    init();
    let software = SoftwareDevice::new();
    let device: Arc<dyn GraphicsDevice> = Arc::new(software.clone());

    for mut strategy in DrawStrategy::all(full_buffer()) {
        strategy.prepare(&device, &scene()).unwrap();
        strategy.set_active(true).unwrap();
        assert!(software.buffer_count() > 0);
        strategy.dispose();
        strategy.dispose();
        assert_eq!(software.buffer_count(), 0, "{}", strategy.strategy_name());
        assert_eq!(software.texture_count(), 0);
    }
}

#[test]
fn all_strategies_render_the_same_picture() {
    init();
    let software = SoftwareDevice::with_latency(0);
    let device: Arc<dyn GraphicsDevice> = Arc::new(software);
    let camera = camera();
    let extent = Extent2D::new(48, 48);
    let objects = scene();

    let mut pictures = Vec::new();
    for mut strategy in DrawStrategy::all(full_buffer()) {
        strategy.prepare(&device, &objects).unwrap();
        strategy.set_active(true).unwrap();

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
        let target = RenderTarget {
            color: texture(TextureFormat::Rgba8Unorm),
            depth: Some(texture(TextureFormat::Depth32Float)),
            extent,
        };
        let mut encoder = device.create_command_encoder(Some("frame"));
        encoder.clear_target(&target, LinearRgba::BLACK);
        strategy
            .render(&mut FrameContext {
                encoder: encoder.as_mut(),
                camera: &camera,
                root: Mat4::IDENTITY,
                target,
            })
            .unwrap();
        device.submit_command_buffer(encoder.finish()).unwrap();
        pictures.push((
            strategy.strategy_name(),
            device.read_texture(target.color).unwrap(),
        ));
        strategy.dispose();
    }

    let (_, reference) = &pictures[0];
    assert!(reference.contains(&LinearRgba::RED.to_rgba8()));
    assert!(reference.contains(&LinearRgba::BLUE.to_rgba8()));
    for (name, picture) in &pictures[1..] {
        assert!(picture == reference, "{name} differs from Instanced");
    }
}
