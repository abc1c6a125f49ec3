use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use texdecode::{DecodedPixelBuffer, Dimensions, PackedTexelBuffer};

use super::pipeline::{DecodeProgram, ProgramCache, DECODED_FORMAT};
use super::timer::GpuTimer;
use super::{read_buffer, GpuContext};

/// Mirrors the std140 `DecodeParams` block of the decode shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DecodeParams {
    dim: [u32; 2],
    _padding: [u32; 2],
}

/// Per-dimension GPU resources of the decode pass.
struct DecodeTarget {
    dims: Dimensions,
    encoded: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_row_bytes: u32,
}

impl DecodeTarget {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, dims: Dimensions) -> Self {
        let encoded = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("packed texels"),
            size: dims.texel_count() as u64 * 2,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("decode params"),
            size: std::mem::size_of::<DecodeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("decode bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: encoded.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("decoded texture"),
            size: wgpu::Extent3d {
                width: dims.width(),
                height: dims.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DECODED_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_row_bytes = padded_row_bytes(dims.width());
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("decoded readback"),
            size: u64::from(padded_row_bytes) * u64::from(dims.height()),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            dims,
            encoded,
            params,
            bind_group,
            texture,
            view,
            readback,
            padded_row_bytes,
        }
    }

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: &DecodeProgram,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites<'_>>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("decode pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes,
        });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..4, 0..1);
    }
}

/// Runs the fragment-shader decode of the packed image into a texture.
pub(crate) struct GpuDecoder {
    target: DecodeTarget,
    timer: GpuTimer,
}

impl GpuDecoder {
    pub fn new(ctx: &GpuContext, programs: &ProgramCache, dims: Dimensions) -> Self {
        Self {
            target: DecodeTarget::new(&ctx.device, &programs.layout, dims),
            timer: GpuTimer::new(&ctx.device, &ctx.queue, ctx.timestamps),
        }
    }

    pub fn uses_device_timestamps(&self) -> bool {
        self.timer.uses_device_timestamps()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    /// Copies the packed image into the storage buffer.
    pub fn upload(&self, ctx: &GpuContext, packed: &PackedTexelBuffer) {
        debug_assert_eq!(packed.dimensions(), self.target.dims);
        ctx.queue.write_buffer(&self.target.encoded, 0, packed.as_bytes());
    }

    /// Draws one decode pass and returns its device time in nanoseconds.
    pub fn decode(&mut self, ctx: &GpuContext, program: &DecodeProgram) -> Result<u64> {
        let dims = self.target.dims;
        let params = DecodeParams {
            dim: [dims.width(), dims.height()],
            _padding: [0; 2],
        };
        ctx.queue
            .write_buffer(&self.target.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("decode encoder"),
            });
        self.target.encode(&mut encoder, program, self.timer.begin());
        self.timer.resolve(&mut encoder);
        ctx.queue.submit(Some(encoder.finish()));

        self.timer.result_ns(&ctx.device)
    }

    /// Copies the decoded texture back to host memory.
    pub fn read_back(&self, ctx: &GpuContext) -> Result<DecodedPixelBuffer> {
        let dims = self.target.dims;
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("decoded readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.target.padded_row_bytes),
                    rows_per_image: Some(dims.height()),
                },
            },
            wgpu::Extent3d {
                width: dims.width(),
                height: dims.height(),
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let padded = read_buffer(&ctx.device, &self.target.readback)?;
        let bytes = strip_row_padding(
            &padded,
            dims.width() as usize * 4,
            self.target.padded_row_bytes as usize,
        );
        DecodedPixelBuffer::from_rgba_bytes(dims, &bytes)
            .ok_or_else(|| anyhow!("readback returned {} bytes for {dims:?}", bytes.len()))
    }
}

/// Result of comparing the GPU frame with the CPU frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VerifyOutcome {
    pub mismatches: usize,
    /// `(x, y, cpu, gpu)` of the first differing pixel in row-major order.
    pub first: Option<(u32, u32, [u8; 4], [u8; 4])>,
}

impl VerifyOutcome {
    pub fn is_match(&self) -> bool {
        self.mismatches == 0
    }
}

pub(crate) fn verify(cpu: &DecodedPixelBuffer, gpu: &DecodedPixelBuffer) -> VerifyOutcome {
    assert_eq!(
        cpu.dimensions(),
        gpu.dimensions(),
        "verified frames must have equal dimensions"
    );
    let width = cpu.dimensions().width();
    let mut outcome = VerifyOutcome {
        mismatches: 0,
        first: None,
    };
    for (index, (a, b)) in cpu.pixels().iter().zip(gpu.pixels()).enumerate() {
        if a == b {
            continue;
        }
        outcome.mismatches += 1;
        if outcome.first.is_none() {
            let x = index as u32 % width;
            let y = index as u32 / width;
            outcome.first = Some((x, y, cpu.rgba(x, y), gpu.rgba(x, y)));
        }
    }
    outcome
}

fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn strip_row_padding(padded: &[u8], row_bytes: usize, padded_row_bytes: usize) -> Vec<u8> {
    if row_bytes == padded_row_bytes {
        return padded.to_vec();
    }
    padded
        .chunks_exact(padded_row_bytes)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use texdecode::{CpuStrategy, PatternGenerator, PixelFormat};

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(padded_row_bytes(64), 256);
        assert_eq!(padded_row_bytes(4), 256);
        assert_eq!(padded_row_bytes(68), 512);
        assert_eq!(padded_row_bytes(256), 1024);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let padded = [1u8, 2, 9, 9, 3, 4, 9, 9];
        assert_eq!(strip_row_padding(&padded, 2, 4), vec![1, 2, 3, 4]);
        assert_eq!(strip_row_padding(&padded, 4, 4), padded.to_vec());
    }

    #[test]
    fn verify_reports_first_mismatch_and_count() {
        let dims = Dimensions::new(8, 4).unwrap();
        let cpu = DecodedPixelBuffer::new(dims);
        let mut gpu = cpu.clone();
        assert!(verify(&cpu, &gpu).is_match());

        gpu.pixels_mut()[10] = u32::from_ne_bytes([1, 2, 3, 255]);
        gpu.pixels_mut()[20] = u32::from_ne_bytes([4, 5, 6, 255]);
        let outcome = verify(&cpu, &gpu);
        assert_eq!(outcome.mismatches, 2);
        assert_eq!(outcome.first, Some((2, 1, [0, 0, 0, 0], [1, 2, 3, 255])));
    }

    // Run with `cargo test -p renderer -- --ignored` on a machine with a GPU.
    #[test]
    #[ignore = "requires a GPU adapter"]
    fn gpu_decode_matches_cpu() {
        let dims = Dimensions::new(64, 32).unwrap();
        let ctx = GpuContext::new_headless(dims).expect("headless GPU context");

        let mut programs = ProgramCache::new(&ctx.device).expect("program cache");
        let mut decoder = GpuDecoder::new(&ctx, &programs, dims);
        let mut packed = PackedTexelBuffer::new(dims, PixelFormat::Rgb565);
        PatternGenerator::default().refresh(&mut packed, Instant::now());
        packed.set_texel(5, 7, 0x8410);
        decoder.upload(&ctx, &packed);

        let program = programs
            .get_or_compile(&ctx.device, PixelFormat::Rgb565)
            .expect("decode program");
        decoder.decode(&ctx, program).expect("decode pass");
        assert_eq!(programs.len(), 1);

        let gpu = decoder.read_back(&ctx).expect("readback");
        let mut cpu = DecodedPixelBuffer::new(dims);
        CpuStrategy::Reference.decode(&packed, &mut cpu);
        let outcome = verify(&cpu, &gpu);
        assert!(outcome.is_match(), "{outcome:?}");
        assert_eq!(gpu.rgba(5, 7), [132, 130, 132, 255]);
    }
}
