//! Screenshot readback (`SPEC_FULL.md` §4.F, §2.1): a transfer-src
//! transition plus a staged download, completing through a callback rather
//! than blocking the caller. On the software backend the "staged download"
//! is just a synchronous copy out of the image's backing `Vec<u8>` — a
//! hardware backend would map a staging buffer after a fence wait instead,
//! without changing this module's public shape.

use std::path::PathBuf;

use ember_rhi::resource::Image;
use ember_rhi::tracked::Handle;
use ember_rhi::{ImageLayout, PipelineStage, RhiContext, Transition};

use crate::error::Result;

/// One pending screenshot: the raw RGBA8 bytes are handed to `callback`
/// once the readback completes, matching §7's "screenshot failure is
/// reported via its completion callback" (success is reported the same
/// way, as `Ok`).
pub struct ScreenshotRequest {
    callback: Box<dyn FnOnce(Result<Vec<u8>>) + Send>,
}

impl ScreenshotRequest {
    pub fn new(callback: impl FnOnce(Result<Vec<u8>>) + Send + 'static) -> Self {
        Self { callback: Box::new(callback) }
    }

    /// Convenience constructor that writes the readback straight to disk,
    /// the format chosen by `path`'s extension via the `image` crate
    /// (`SPEC_FULL.md` §6 "Persisted state").
    #[must_use]
    pub fn to_file(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        let path = path.into();
        Self::new(move |result| match result {
            Ok(rgba8) => match image::RgbaImage::from_raw(width, height, rgba8) {
                Some(buffer) => {
                    if let Err(error) = buffer.save(&path) {
                        log::error!("failed to save screenshot to {}: {error}", path.display());
                    }
                }
                None => log::error!("screenshot readback size did not match {width}x{height}"),
            },
            Err(error) => log::error!("screenshot readback failed: {error}"),
        })
    }

    pub fn complete(self, result: Result<Vec<u8>>) {
        (self.callback)(result);
    }
}

/// Transitions `source` to `TransferSrc` and copies its bytes out. Callers
/// pass a presentation-ready (already tone-mapped) color target.
pub(crate) fn readback_rgba8(rhi: &mut RhiContext, source: &Handle<Image>) -> Vec<u8> {
    rhi.transition_image(
        source,
        Transition {
            target_layout: ImageLayout::TransferSrc,
            after_stage: PipelineStage::ColorOutput,
            before_stage: PipelineStage::Transfer,
            base_mip: 0,
            mip_count: 1,
        },
    );
    rhi.image(source).data().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_rhi::flags::{ImageType, ImageUsage, MemoryProperties};
    use ember_rhi::resource::ImageDesc;
    use ember_rhi::shader_resource::SamplerAttr;
    use ember_rhi::PixelFormat;

    #[test]
    fn readback_returns_the_image_bytes() {
        let mut rhi = RhiContext::new(2);
        rhi.begin_frame();
        let desc = ImageDesc {
            format: PixelFormat::R8G8B8A8Unorm,
            width: 2,
            height: 2,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_SRC,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        };
        let target = rhi.create_render_target(desc).unwrap();
        let expected_len = rhi.image(&target).data().len();
        let bytes = readback_rgba8(&mut rhi, &target);
        assert_eq!(bytes.len(), expected_len);
    }

    #[test]
    fn completion_callback_observes_the_result() {
        let observed = std::sync::Arc::new(std::sync::Mutex::new(None));
        let observed_clone = observed.clone();
        let request = ScreenshotRequest::new(move |result| {
            *observed_clone.lock().unwrap() = Some(result.is_ok());
        });
        request.complete(Ok(vec![1, 2, 3]));
        assert_eq!(*observed.lock().unwrap(), Some(true));
    }
}
