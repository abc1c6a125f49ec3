use std::borrow::Cow;

use anyhow::{anyhow, Result};
use texdecode::PixelFormat;
use wgpu::naga::ShaderStage;

/// Compiles GLSL inside a validation error scope so a bad program surfaces
/// as an error instead of reaching the uncaptured-error handler.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &'static str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("failed to compile {label}: {err}"));
    }
    Ok(module)
}

/// Compiles the four-vertex triangle strip covering the render target.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(
        device,
        "fullscreen strip vertex",
        VERTEX_SHADER_GLSL,
        ShaderStage::Vertex,
    )
}

/// Compiles the fragment program that decodes `format` texels.
pub(crate) fn compile_decode_shader(
    device: &wgpu::Device,
    format: PixelFormat,
) -> Result<wgpu::ShaderModule> {
    let label = format!("{format} decode fragment");
    compile_glsl(device, &label, decode_shader_source(format), ShaderStage::Fragment)
}

/// Compiles the sampler blit used to show the decoded texture on screen.
pub(crate) fn compile_present_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(
        device,
        "present fragment",
        PRESENT_SHADER_GLSL,
        ShaderStage::Fragment,
    )
}

pub(crate) fn decode_shader_source(format: PixelFormat) -> &'static str {
    match format {
        PixelFormat::Rgb565 => RGB565_DECODE_GLSL,
    }
}

/// Covers clip space with a strip of two triangles.
///
/// `v_uv` has its origin at the top-left so the present pass samples texture
/// row 0 at the top of the window.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[4] = vec2[4](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(-1.0, 1.0),
    vec2(1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Decodes one big-endian RGB565 texel per fragment.
///
/// The packed image is bound as 8-byte runs of four texels. Words are read
/// little-endian by the device, so each 16-bit lane is byte-swapped before
/// the channels are extracted.
const RGB565_DECODE_GLSL: &str = r"#version 450
layout(location = 0) out vec4 outColor;

layout(std430, set = 0, binding = 0) readonly buffer EncodedTexels {
    uvec2 runs[];
} encoded;

layout(std140, set = 0, binding = 1) uniform DecodeParams {
    uvec2 dim;
} params;

uint bswap16(uint v) {
    return ((v & 0xFFu) << 8u) | ((v >> 8u) & 0xFFu);
}

void main() {
    uvec2 loc = uvec2(gl_FragCoord.xy);
    uint srcloc = ((params.dim.x * loc.y) >> 2u) + (loc.x >> 2u);
    uvec2 run = encoded.runs[srcloc];

    uint lane = loc.x & 3u;
    uint word = lane < 2u ? run.x : run.y;
    uint texel = bswap16((word >> ((lane & 1u) * 16u)) & 0xFFFFu);

    uint r5 = (texel >> 11u) & 0x1Fu;
    uint g6 = (texel >> 5u) & 0x3Fu;
    uint b5 = texel & 0x1Fu;
    uint r = (r5 << 3u) | (r5 >> 2u);
    uint g = (g6 << 2u) | (g6 >> 4u);
    uint b = (b5 << 3u) | (b5 >> 2u);

    outColor = vec4(float(r), float(g), float(b), 255.0) / 255.0;
}
";

const PRESENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D decoded_texture;
layout(set = 0, binding = 1) uniform sampler decoded_sampler;

void main() {
    outColor = texture(sampler2D(decoded_texture, decoded_sampler), v_uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use texdecode::{decode_texel, CpuStrategy, DecodedPixelBuffer, Dimensions, PackedTexelBuffer};
    use wgpu::naga;

    /// Host replica of the fragment shader's fetch: run index, lane select,
    /// little-endian word read and byte swap.
    fn shader_fetch(bytes: &[u8], width: u32, x: u32, y: u32) -> u16 {
        let srcloc = (((width * y) >> 2) + (x >> 2)) as usize;
        let run = &bytes[srcloc * 8..srcloc * 8 + 8];
        let lane = x & 3;
        let word_offset = if lane < 2 { 0 } else { 4 };
        let word = u32::from_le_bytes([
            run[word_offset],
            run[word_offset + 1],
            run[word_offset + 2],
            run[word_offset + 3],
        ]);
        let raw = ((word >> ((lane & 1) * 16)) & 0xFFFF) as u16;
        raw.swap_bytes()
    }

    fn parse(source: &str, stage: ShaderStage) -> naga::Module {
        let mut frontend = naga::front::glsl::Frontend::default();
        let module = frontend
            .parse(&naga::front::glsl::Options::from(stage), source)
            .expect("glsl parses");
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .expect("module validates");
        module
    }

    #[test]
    fn run_mapping_reads_the_same_texel_as_row_major_addressing() {
        for (w, h) in [(4, 4), (8, 4), (12, 8), (16, 16)] {
            let dims = Dimensions::new(w, h).unwrap();
            let mut packed = PackedTexelBuffer::new(dims, PixelFormat::Rgb565);
            for y in 0..h {
                for x in 0..w {
                    packed.set_texel(x, y, ((y * w + x) as u16).wrapping_mul(0x9E37));
                }
            }
            let mut cpu = DecodedPixelBuffer::new(dims);
            CpuStrategy::Reference.decode(&packed, &mut cpu);

            for y in 0..h {
                for x in 0..w {
                    let fetched = shader_fetch(packed.as_bytes(), w, x, y);
                    assert_eq!(fetched, packed.texel(x, y), "({x}, {y}) in {w}x{h}");
                    assert_eq!(decode_texel(fetched), cpu.rgba(x, y));
                }
            }
        }
    }

    #[test]
    fn decode_shader_is_valid_glsl() {
        let module = parse(decode_shader_source(PixelFormat::Rgb565), ShaderStage::Fragment);
        assert_eq!(module.entry_points.len(), 1);
    }

    #[test]
    fn vertex_and_present_shaders_are_valid_glsl() {
        parse(VERTEX_SHADER_GLSL, ShaderStage::Vertex);
        parse(PRESENT_SHADER_GLSL, ShaderStage::Fragment);
    }
}
