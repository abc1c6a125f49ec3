use std::time::Instant;

use anyhow::Result;

use super::read_buffer;

const QUERY_BYTES: u64 = 2 * std::mem::size_of::<u64>() as u64;

struct TimestampQueries {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    staging: wgpu::Buffer,
    period_ns: f32,
}

/// Elapsed device time of one bracketed render pass.
///
/// Uses a two-entry timestamp query set when the device has
/// `TIMESTAMP_QUERY`; otherwise times submit-to-idle on the host.
pub(crate) struct GpuTimer {
    queries: Option<TimestampQueries>,
    host_start: Option<Instant>,
}

impl GpuTimer {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, timestamps: bool) -> Self {
        if !timestamps {
            tracing::warn!(
                "adapter lacks TIMESTAMP_QUERY; GPU time falls back to host submit-to-idle measurement"
            );
            return Self {
                queries: None,
                host_start: None,
            };
        }

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("decode timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: 2,
        });
        let resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("decode timestamp resolve"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("decode timestamp staging"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            queries: Some(TimestampQueries {
                query_set,
                resolve,
                staging,
                period_ns: queue.get_timestamp_period(),
            }),
            host_start: None,
        }
    }

    pub(crate) fn uses_device_timestamps(&self) -> bool {
        self.queries.is_some()
    }

    /// Opens the bracket; returns the pass writes for the device path.
    pub(crate) fn begin(&mut self) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        match &self.queries {
            Some(queries) => Some(wgpu::RenderPassTimestampWrites {
                query_set: &queries.query_set,
                beginning_of_pass_write_index: Some(0),
                end_of_pass_write_index: Some(1),
            }),
            None => {
                self.host_start = Some(Instant::now());
                None
            }
        }
    }

    /// Records the query resolve into the encoder that holds the pass.
    pub(crate) fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        if let Some(queries) = &self.queries {
            encoder.resolve_query_set(&queries.query_set, 0..2, &queries.resolve, 0);
            encoder.copy_buffer_to_buffer(&queries.resolve, 0, &queries.staging, 0, QUERY_BYTES);
        }
    }

    /// Blocks until the bracketed work retired and returns its duration.
    pub(crate) fn result_ns(&mut self, device: &wgpu::Device) -> Result<u64> {
        match &self.queries {
            Some(queries) => {
                let bytes = read_buffer(device, &queries.staging)?;
                let [begin, end]: [u64; 2] =
                    bytemuck::pod_read_unaligned(&bytes[..QUERY_BYTES as usize]);
                Ok(ticks_to_ns(begin, end, queries.period_ns))
            }
            None => {
                super::wait_idle(device)?;
                let elapsed = self
                    .host_start
                    .take()
                    .map(|start| start.elapsed().as_nanos())
                    .unwrap_or(0);
                Ok(u64::try_from(elapsed).unwrap_or(u64::MAX))
            }
        }
    }
}

fn ticks_to_ns(begin: u64, end: u64, period_ns: f32) -> u64 {
    (end.saturating_sub(begin) as f64 * f64::from(period_ns)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_scale_by_period() {
        assert_eq!(ticks_to_ns(100, 1100, 1.0), 1000);
        assert_eq!(ticks_to_ns(0, 1000, 83.333), 83_333);
    }

    #[test]
    fn reversed_timestamps_clamp_to_zero() {
        assert_eq!(ticks_to_ns(500, 100, 1.0), 0);
    }
}
