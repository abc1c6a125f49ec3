//! GPU half of the benchmark.
//!
//! - `context` owns the wgpu instance/device and, when windowed, the surface.
//! - `pipeline` compiles decode programs once per pixel format and keeps them
//!   in a session-owned [`ProgramCache`].
//! - `decoder` binds the packed image as a storage buffer, draws the decode
//!   pass into an `Rgba8Unorm` texture and reads it back for verification.
//! - `timer` brackets the decode pass with timestamp queries.
//! - `present` blits the decoded texture to the swapchain.

mod context;
mod decoder;
mod pipeline;
mod present;
mod timer;

use anyhow::{anyhow, Result};

pub(crate) use context::GpuContext;
pub(crate) use decoder::{verify, GpuDecoder, VerifyOutcome};
pub(crate) use pipeline::ProgramCache;
pub(crate) use present::PresentPipeline;

/// Blocks until every submitted command buffer has retired.
pub(crate) fn wait_idle(device: &wgpu::Device) -> Result<()> {
    device
        .poll(wgpu::PollType::Wait)
        .map(|_| ())
        .map_err(|err| anyhow!("failed to wait for GPU: {err}"))
}

/// Maps a `MAP_READ` buffer, copies its contents out and unmaps it.
pub(crate) fn read_buffer(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>> {
    let slice = buffer.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    wait_idle(device)?;
    rx.recv()
        .map_err(|_| anyhow!("buffer map callback was dropped"))?
        .map_err(|err| anyhow!("failed to map readback buffer: {err}"))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}
