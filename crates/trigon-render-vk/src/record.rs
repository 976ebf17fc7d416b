// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::debug;

use crate::driver::{Driver, RenderPassBegin};
use crate::error::{ChainError, ChainResult, Resource};

/// Vertices of the hard-coded triangle; positions live in the vertex shader.
pub const TRIANGLE_VERTICES: u32 = 3;

#[derive(Clone, Copy, Debug)]
pub struct DrawTarget {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear: [f32; 4],
}

/// Record the fixed triangle draw into `buffers[i]` against
/// `framebuffers[i]`. Each buffer is recorded exactly once.
pub fn record_triangle(
    driver: &mut dyn Driver,
    target: &DrawTarget,
    buffers: &[vk::CommandBuffer],
    framebuffers: &[vk::Framebuffer],
) -> ChainResult<()> {
    if buffers.len() != framebuffers.len() {
        return Err(ChainError::ResourceCreation {
            resource: Resource::CommandRecording,
            result: vk::Result::ERROR_INITIALIZATION_FAILED,
        });
    }

    for (&cmd, &framebuffer) in buffers.iter().zip(framebuffers) {
        driver
            .begin_command_buffer(cmd)
            .map_err(ChainError::creation(Resource::CommandRecording))?;

        driver.cmd_begin_render_pass(
            cmd,
            &RenderPassBegin {
                render_pass: target.render_pass,
                framebuffer,
                extent: target.extent,
                clear: target.clear,
            },
        );
        driver.cmd_bind_pipeline(cmd, target.pipeline);
        driver.cmd_draw(cmd, TRIANGLE_VERTICES, 1, 0, 0);
        driver.cmd_end_render_pass(cmd);

        driver
            .end_command_buffer(cmd)
            .map_err(ChainError::creation(Resource::CommandRecording))?;
    }
    debug!("recorded {} command buffer(s)", buffers.len());
    Ok(())
}
