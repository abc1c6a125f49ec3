use std::collections::hash_map::Entry;
use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use texdecode::PixelFormat;

use crate::compile::{compile_decode_shader, compile_vertex_shader};

/// Format of the decode render target; matches the CPU pixel layout.
pub(crate) const DECODED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Linked decode program for one pixel format.
pub(crate) struct DecodeProgram {
    pub pipeline: wgpu::RenderPipeline,
}

/// Session-owned cache holding at most one decode program per format.
///
/// The bind group layout (packed texel storage buffer at binding 0, decode
/// parameters at binding 1) and the vertex stage are shared by every program.
pub(crate) struct ProgramCache {
    pub layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    vertex_module: wgpu::ShaderModule,
    programs: HashMap<PixelFormat, DecodeProgram>,
}

impl ProgramCache {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("decode layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("decode pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let vertex_module = compile_vertex_shader(device)?;

        Ok(Self {
            layout,
            pipeline_layout,
            vertex_module,
            programs: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Returns the program for `format`, compiling and linking it on first use.
    ///
    /// Compile or link failures are returned as errors and nothing is cached.
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        format: PixelFormat,
    ) -> Result<&DecodeProgram> {
        match self.programs.entry(format) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let fragment_module = compile_decode_shader(device, format)
                    .with_context(|| format!("failed to build {format} decode program"))?;
                let pipeline = link_decode_pipeline(
                    device,
                    &self.pipeline_layout,
                    &self.vertex_module,
                    &fragment_module,
                )
                .with_context(|| format!("failed to link {format} decode program"))?;
                tracing::info!(%format, "compiled GPU decode program");
                Ok(entry.insert(DecodeProgram { pipeline }))
            }
        }
    }
}

fn link_decode_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
) -> Result<wgpu::RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("decode pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: DECODED_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("{err}"));
    }
    Ok(pipeline)
}
