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

//! Pipelines and bind group layouts for every command the backend records.

use std::borrow::Cow;
use std::collections::HashMap;

const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
const TRIANGLE_ID_WGSL: &str = include_str!("shaders/triangle_id.wgsl");
const HISTOGRAM_WGSL: &str = include_str!("shaders/histogram.wgsl");
const MESH_WGSL: &str = include_str!("shaders/mesh.wgsl");
const PROCEDURAL_WGSL: &str = include_str!("shaders/procedural.wgsl");

/// Format of shaded colour targets.
pub(crate) const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Format of every depth attachment.
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Format of the triangle ID target.
pub(crate) const ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;
/// Edge of the histogram workgroup.
pub(crate) const HISTOGRAM_WORKGROUP: u32 = 8;

/// The shading pipelines, one per vertex fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DrawKind {
    Mesh,
    IndexedProcedural,
    UnpackedInstance,
    UnpackedModelId,
    VisibleProcedural,
}

impl DrawKind {
    const ALL: [DrawKind; 5] = [
        DrawKind::Mesh,
        DrawKind::IndexedProcedural,
        DrawKind::UnpackedInstance,
        DrawKind::UnpackedModelId,
        DrawKind::VisibleProcedural,
    ];

    fn entry_point(self) -> &'static str {
        match self {
            DrawKind::Mesh => "vs_main",
            DrawKind::IndexedProcedural => "vs_indexed",
            DrawKind::UnpackedInstance => "vs_unpacked_instance",
            DrawKind::UnpackedModelId => "vs_unpacked_model",
            DrawKind::VisibleProcedural => "vs_visible",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Pipelines {
    pub id_layout: wgpu::BindGroupLayout,
    pub id_pipeline: wgpu::RenderPipeline,
    pub histogram_layout: wgpu::BindGroupLayout,
    pub histogram_pipeline: wgpu::ComputePipeline,
    pub mesh_layout: wgpu::BindGroupLayout,
    pub procedural_layout: wgpu::BindGroupLayout,
    draws: HashMap<(DrawKind, bool), wgpu::RenderPipeline>,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn depth_state(enabled: bool) -> Option<wgpu::DepthStencilState> {
    enabled.then(|| wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    })
}

fn shader(device: &wgpu::Device, label: &str, source: Cow<'static, str>) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source),
    })
}

const MESH_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 16,
        shader_location: 1,
    },
];

impl Pipelines {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let vertex = wgpu::ShaderStages::VERTEX;
        let compute = wgpu::ShaderStages::COMPUTE;

        let id_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("triangle_id_layout"),
            entries: &[
                uniform_entry(0, vertex),
                storage_entry(1, vertex, true),
                storage_entry(2, vertex, true),
            ],
        });
        let histogram_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("histogram_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: compute,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Uint,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                storage_entry(1, compute, false),
                uniform_entry(2, compute),
            ],
        });
        let mesh_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh_layout"),
            entries: &[uniform_entry(0, vertex), storage_entry(1, vertex, true)],
        });
        let procedural_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("procedural_layout"),
            entries: &[
                uniform_entry(0, vertex),
                storage_entry(1, vertex, true),
                storage_entry(2, vertex, true),
                storage_entry(3, vertex, true),
            ],
        });

        let id_module = shader(device, "triangle_id", Cow::Borrowed(TRIANGLE_ID_WGSL));
        let id_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("triangle_id_pipeline_layout"),
            bind_group_layouts: &[&id_layout],
            push_constant_ranges: &[],
        });
        let id_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("triangle_id_pipeline"),
            layout: Some(&id_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &id_module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &id_module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ID_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: depth_state(true),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let histogram_module = shader(device, "histogram", Cow::Borrowed(HISTOGRAM_WGSL));
        let histogram_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("histogram_pipeline_layout"),
                bind_group_layouts: &[&histogram_layout],
                push_constant_ranges: &[],
            });
        let histogram_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("histogram_pipeline"),
            layout: Some(&histogram_pipeline_layout),
            module: &histogram_module,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let mesh_module = shader(
            device,
            "mesh",
            Cow::Owned(format!("{COMMON_WGSL}\n{MESH_WGSL}")),
        );
        let procedural_module = shader(
            device,
            "procedural",
            Cow::Owned(format!("{COMMON_WGSL}\n{PROCEDURAL_WGSL}")),
        );
        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pipeline_layout"),
            bind_group_layouts: &[&mesh_layout],
            push_constant_ranges: &[],
        });
        let procedural_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("procedural_pipeline_layout"),
                bind_group_layouts: &[&procedural_layout],
                push_constant_ranges: &[],
            });

        let mesh_buffers = [wgpu::VertexBufferLayout {
            array_stride: 32,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_VERTEX_ATTRIBUTES,
        }];

        let mut draws = HashMap::new();
        for kind in DrawKind::ALL {
            let is_mesh = kind == DrawKind::Mesh;
            let module = if is_mesh { &mesh_module } else { &procedural_module };
            let layout = if is_mesh {
                &mesh_pipeline_layout
            } else {
                &procedural_pipeline_layout
            };
            let buffers: &[wgpu::VertexBufferLayout] = if is_mesh { &mesh_buffers } else { &[] };
            for with_depth in [false, true] {
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(kind.entry_point()),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some(kind.entry_point()),
                        compilation_options: Default::default(),
                        buffers,
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: COLOR_FORMAT,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: depth_state(with_depth),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });
                draws.insert((kind, with_depth), pipeline);
            }
        }
        log::info!("Created {} shading pipelines", draws.len());

        Self {
            id_layout,
            id_pipeline,
            histogram_layout,
            histogram_pipeline,
            mesh_layout,
            procedural_layout,
            draws,
        }
    }

    pub(crate) fn draw(&self, kind: DrawKind, with_depth: bool) -> Option<&wgpu::RenderPipeline> {
        self.draws.get(&(kind, with_depth))
    }
}
