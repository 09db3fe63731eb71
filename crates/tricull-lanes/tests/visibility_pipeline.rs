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
    lane::{DrawLane, FrameContext, LaneError, StepOutcome},
    math::{Extent2D, LinearRgba, Mat4, Vec3, FRAC_PI_3},
    packing::GeometryError,
    renderer::{
        Camera, GraphicsDevice, Mesh, RenderTarget, SceneObject, TextureDescriptor, TextureFormat,
        TextureUsage,
    },
};
use tricull_infra::SoftwareDevice;
use tricull_lanes::visibility_lane::{DrawMode, VisibilityCulledLane, VisibilitySettings};

const MAX_STEPS_PER_CYCLE: usize = 64;
const TARGET: u32 = 32;

struct Harness {
    software: SoftwareDevice,
    device: Arc<dyn GraphicsDevice>,
    camera: Camera,
}

impl Harness {
    fn new() -> Self {
        Self::with_device(SoftwareDevice::new())
    }

    fn with_device(software: SoftwareDevice) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let device: Arc<dyn GraphicsDevice> = Arc::new(software.clone());
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y).unwrap();
        Self {
            software,
            device,
            camera: Camera::new(view, FRAC_PI_3, 1.0, 0.1, 100.0),
        }
    }

    /// Steps until a cycle publishes, returning the outcome and the steps it took.
    fn run_cycle(&self, lane: &mut VisibilityCulledLane) -> (StepOutcome, usize) {
        self.run_cycle_within(lane, MAX_STEPS_PER_CYCLE)
    }

    fn run_cycle_within(&self, lane: &mut VisibilityCulledLane, max_steps: usize) -> (StepOutcome, usize) {
        for steps in 1..=max_steps {
            let outcome = lane.step(&self.camera, Mat4::IDENTITY).unwrap();
            if matches!(outcome, StepOutcome::Published { .. }) {
                return (outcome, steps);
            }
            assert_eq!(outcome, StepOutcome::Yielded);
        }
        panic!("no publish within {max_steps} steps");
    }

    fn target(&self) -> RenderTarget {
        let extent = Extent2D::new(TARGET, TARGET);
        let texture = |format| {
            self.device
                .create_texture(&TextureDescriptor {
                    label: None,
                    size: extent,
                    format,
                    usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
                })
                .unwrap()
        };
        RenderTarget {
            color: texture(TextureFormat::Rgba8Unorm),
            depth: Some(texture(TextureFormat::Depth32Float)),
            extent,
        }
    }

    /// Clears a fresh target, lets the lane draw into it and returns the centre pixel.
    fn render_centre(&self, lane: &mut VisibilityCulledLane) -> u32 {
        let target = self.target();
        let mut encoder = self.device.create_command_encoder(Some("frame"));
        encoder.clear_target(&target, LinearRgba::BLACK);
        lane.render(&mut FrameContext {
            encoder: encoder.as_mut(),
            camera: &self.camera,
            root: Mat4::IDENTITY,
            target,
        })
        .unwrap();
        self.device.submit_command_buffer(encoder.finish()).unwrap();
        let texels = self.device.read_texture(target.color).unwrap();
        texels[(TARGET / 2 * TARGET + TARGET / 2) as usize]
    }
}

fn settings() -> VisibilitySettings {
    VisibilitySettings {
        id_target_width: 64,
        id_target_height: 64,
        readback_chunk_bytes: 4,
        scan_chunk_fraction: 0.5,
        ..Default::default()
    }
}

fn quad() -> Arc<Mesh> {
    Arc::new(Mesh::new(
        vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ],
        vec![Vec3::Z; 4],
        vec![0, 1, 2, 0, 2, 3],
    ))
}

fn triangle_at(centre: Vec3) -> Arc<Mesh> {
    Arc::new(Mesh::triangle(
        centre + Vec3::new(-0.5, -0.5, 0.0),
        centre + Vec3::new(0.5, -0.5, 0.0),
        centre + Vec3::new(0.0, 0.5, 0.0),
    ))
}

fn object(mesh: Arc<Mesh>) -> SceneObject {
    SceneObject::new(mesh, Mat4::IDENTITY, LinearRgba::GREEN)
}

/// The quad in front of the camera (triangles 0 and 1), one triangle behind
/// the camera (2) and one far off to the side (3).
fn mixed_scene() -> Vec<SceneObject> {
    vec![
        object(quad()),
        object(triangle_at(Vec3::new(0.0, 0.0, 10.0))),
        object(triangle_at(Vec3::new(100.0, 0.0, 0.0))),
    ]
}

fn prepared(harness: &Harness, settings: VisibilitySettings, scene: &[SceneObject]) -> VisibilityCulledLane {
    let mut lane = VisibilityCulledLane::new(settings);
    lane.prepare(&harness.device, scene).unwrap();
    lane.set_active(true).unwrap();
    lane
}

#[test]
fn cycle_publishes_only_triangles_in_view() {
    let harness = Harness::new();
    let mut lane = prepared(&harness, settings(), &mixed_scene());
    assert_eq!(lane.triangle_count(), 4);

    let (outcome, steps) = harness.run_cycle(&mut lane);
    assert_eq!(
        outcome,
        StepOutcome::Published {
            visible: 2,
            truncated: false
        }
    );
    assert_eq!(lane.published_triangle_ids(), &[0, 1]);
    // 16 histogram bytes in 4-byte chunks plus a two-step scan.
    assert!(steps >= 6, "cycle finished in {steps} steps");

    let stats = lane.stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.last_visible_count, 2);
    assert_eq!(stats.last_cycle_steps as usize, steps);
    assert_eq!(lane.phase_name(), "RenderIds");
}

#[test]
fn main_pass_draws_nothing_until_a_set_is_published() {
    let harness = Harness::new();
    let mut lane = prepared(&harness, settings(), &mixed_scene());

    assert_eq!(harness.render_centre(&mut lane), LinearRgba::BLACK.to_rgba8());
    harness.run_cycle(&mut lane);
    assert_eq!(harness.render_centre(&mut lane), LinearRgba::GREEN.to_rgba8());
}

#[test]
fn first_triangle_of_the_batch_can_be_visible() {
    let harness = Harness::new();
    let scene = vec![
        object(triangle_at(Vec3::ZERO)),
        object(triangle_at(Vec3::new(0.0, 0.0, 10.0))),
    ];
    let mut lane = prepared(&harness, settings(), &scene);

    harness.run_cycle(&mut lane);
    assert_eq!(lane.published_triangle_ids(), &[0]);
}

#[test]
fn geometry_behind_the_camera_never_becomes_visible() {
    let harness = Harness::new();
    let scene = vec![
        object(triangle_at(Vec3::new(0.0, 0.0, 10.0))),
        object(triangle_at(Vec3::new(0.0, 0.0, 4.0))),
        object(triangle_at(Vec3::new(100.0, 0.0, 0.0))),
    ];
    let mut lane = prepared(&harness, settings(), &scene);

    for _ in 0..100 {
        let (outcome, _) = harness.run_cycle(&mut lane);
        assert_eq!(
            outcome,
            StepOutcome::Published {
                visible: 0,
                truncated: false
            }
        );
    }
    assert!(lane.published_triangle_ids().is_empty());
    assert_eq!(lane.stats().cycles_completed, 100);
    assert_eq!(harness.render_centre(&mut lane), LinearRgba::BLACK.to_rgba8());
}

#[test]
fn capacity_overflow_keeps_lowest_ids_and_reports_truncation() {
    let harness = Harness::new();
    let settings = VisibilitySettings {
        visible_capacity: 1,
        ..settings()
    };
    let mut lane = prepared(&harness, settings, &mixed_scene());

    let (outcome, _) = harness.run_cycle(&mut lane);
    assert_eq!(
        outcome,
        StepOutcome::Published {
            visible: 1,
            truncated: true
        }
    );
    assert_eq!(lane.published_triangle_ids(), &[0]);
    assert_eq!(lane.stats().truncated_cycles, 1);
}

#[test]
fn deactivating_mid_readback_cancels_the_transfer_and_keeps_the_last_set() {
    let harness = Harness::new();
    let mut lane = prepared(&harness, settings(), &mixed_scene());
    harness.run_cycle(&mut lane);

    let mut steps = 0;
    while lane.phase_name() != "Readback" {
        lane.step(&harness.camera, Mat4::IDENTITY).unwrap();
        steps += 1;
        assert!(steps < MAX_STEPS_PER_CYCLE, "never reached the readback phase");
    }
    assert_eq!(harness.software.pending_readback_count(), 1);

    lane.set_active(false).unwrap();
    assert!(!lane.is_active());
    assert_eq!(harness.software.pending_readback_count(), 0);
    assert_eq!(lane.phase_name(), "RenderIds");
    assert_eq!(lane.published_triangle_ids(), &[0, 1]);
    assert_eq!(
        lane.step(&harness.camera, Mat4::IDENTITY).unwrap(),
        StepOutcome::Idle
    );
    assert_eq!(harness.render_centre(&mut lane), LinearRgba::GREEN.to_rgba8());

    lane.set_active(true).unwrap();
    harness.run_cycle(&mut lane);
    assert_eq!(lane.stats().cycles_completed, 2);
}

#[test]
fn camera_movement_changes_the_next_published_set() {
    let harness = Harness::new();
    let mut lane = prepared(&harness, settings(), &mixed_scene());
    harness.run_cycle(&mut lane);
    assert_eq!(lane.published_triangle_ids(), &[0, 1]);

    // Turn around: only the triangle at z = 10 is now in front.
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, 10.0), Vec3::Y)
        .unwrap();
    let behind = Camera::new(view, FRAC_PI_3, 1.0, 0.1, 100.0);
    let mut published = None;
    for _ in 0..MAX_STEPS_PER_CYCLE {
        if let StepOutcome::Published { .. } = lane.step(&behind, Mat4::IDENTITY).unwrap() {
            published = Some(lane.published_triangle_ids().to_vec());
            break;
        }
    }
    assert_eq!(published, Some(vec![2]));
}

#[test]
fn preparing_again_while_active_restarts_with_the_new_batch() {
    let harness = Harness::new();
    let mut lane = prepared(&harness, settings(), &mixed_scene());
    harness.run_cycle(&mut lane);

    let scene = vec![object(triangle_at(Vec3::new(0.0, 0.0, 10.0))), object(quad())];
    lane.prepare(&harness.device, &scene).unwrap();
    assert!(lane.is_active());
    assert_eq!(lane.triangle_count(), 3);
    assert_eq!(lane.offsets().map(|o| o.offsets().to_vec()), Some(vec![0, 3]));
    assert!(lane.published_triangle_ids().is_empty());

    harness.run_cycle(&mut lane);
    assert_eq!(lane.published_triangle_ids(), &[1, 2]);
}

#[test]
fn dispose_releases_every_resource_and_is_idempotent() {
    let harness = Harness::new();
    let mut lane = prepared(&harness, settings(), &mixed_scene());
    harness.run_cycle(&mut lane);
    assert!(harness.software.buffer_count() > 0);
    assert!(lane.id_target().is_some());

    lane.dispose();
    assert_eq!(harness.software.buffer_count(), 0);
    assert_eq!(harness.software.texture_count(), 0);
    assert_eq!(harness.software.pending_readback_count(), 0);
    assert!(!lane.is_active());

    lane.dispose();
    assert_eq!(harness.software.buffer_count(), 0);
}

#[test]
fn lane_refuses_to_run_before_prepare() {
    let harness = Harness::new();
    let mut lane = VisibilityCulledLane::new(settings());

    assert!(matches!(
        lane.set_active(true),
        Err(LaneError::NotReady { .. })
    ));
    assert_eq!(
        lane.step(&harness.camera, Mat4::IDENTITY).unwrap(),
        StepOutcome::Idle
    );

    let target = harness.target();
    let mut encoder = harness.device.create_command_encoder(None);
    let result = lane.render(&mut FrameContext {
        encoder: encoder.as_mut(),
        camera: &harness.camera,
        root: Mat4::IDENTITY,
        target,
    });
    assert!(matches!(result, Err(LaneError::NotReady { .. })));
}

#[test]
fn prepare_rejects_bad_settings_and_empty_scenes() {
    let harness = Harness::new();
    let mut lane = VisibilityCulledLane::new(VisibilitySettings {
        fov_inflation: 3.0,
        ..settings()
    });
    assert!(matches!(
        lane.prepare(&harness.device, &mixed_scene()),
        Err(LaneError::InvalidSettings(_))
    ));

    let mut lane = VisibilityCulledLane::new(settings());
    assert!(matches!(
        lane.prepare(&harness.device, &[]),
        Err(LaneError::Geometry(GeometryError::EmptyBatch))
    ));
}

#[test]
fn full_buffer_mode_draws_without_waiting_for_a_cycle() {
    let harness = Harness::new();
    let settings = VisibilitySettings {
        draw_mode: DrawMode::FullBuffer,
        ..settings()
    };
    let mut lane = prepared(&harness, settings, &mixed_scene());
    assert_eq!(harness.render_centre(&mut lane), LinearRgba::GREEN.to_rgba8());
}

#[test]
fn unchanged_view_publishes_the_same_set_every_cycle() {
    let harness = Harness::with_device(SoftwareDevice::with_latency(3));
    let mut scene = Vec::new();
    for row in 0..6 {
        for column in 0..6 {
            let centre = Vec3::new(-1.5 + 0.6 * column as f32, -1.5 + 0.6 * row as f32, 0.0);
            let corners = [(-0.25, -0.25), (0.25, -0.25), (0.25, 0.25), (-0.25, 0.25)];
            let positions = corners
                .iter()
                .map(|&(x, y)| centre + Vec3::new(x, y, 0.0))
                .collect();
            let mesh = Mesh::new(positions, vec![Vec3::Z; 4], vec![0, 1, 2, 0, 2, 3]);
            scene.push(object(Arc::new(mesh)));
        }
    }
    scene.push(object(triangle_at(Vec3::new(0.0, 0.0, 10.0))));

    let settings = VisibilitySettings {
        readback_chunk_bytes: 32,
        scan_chunk_fraction: 0.1,
        ..settings()
    };
    let mut lane = prepared(&harness, settings, &scene);
    assert_eq!(lane.triangle_count(), 73);

    let expected: Vec<u32> = (0..72).collect();
    for _ in 0..3 {
        let (outcome, _) = harness.run_cycle_within(&mut lane, 1024);
        assert_eq!(
            outcome,
            StepOutcome::Published {
                visible: 72,
                truncated: false
            }
        );
        assert_eq!(lane.published_triangle_ids(), expected.as_slice());
    }
    assert_eq!(lane.stats().cycles_completed, 3);

    lane.dispose();
    assert_eq!(harness.software.buffer_count(), 0);
    assert_eq!(harness.software.texture_count(), 0);
}
