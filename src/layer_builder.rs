//! Builders for the composition layer structs an application hands to
//! EndFrame.

use std::marker::PhantomData;
use std::mem;

use openxr::sys;

#[derive(Copy, Clone)]
pub struct SwapchainSubImage {
    inner: sys::SwapchainSubImage,
}

impl SwapchainSubImage {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: sys::SwapchainSubImage {
                ..unsafe { mem::zeroed() }
            },
        }
    }
    #[inline]
    pub fn into_raw(self) -> sys::SwapchainSubImage {
        self.inner
    }
    #[inline]
    pub fn as_raw(&self) -> &sys::SwapchainSubImage {
        &self.inner
    }
    #[inline]
    pub fn swapchain(mut self, value: sys::Swapchain) -> Self {
        self.inner.swapchain = value;
        self
    }
    #[inline]
    pub fn image_rect(mut self, value: sys::Rect2Di) -> Self {
        self.inner.image_rect = value;
        self
    }
    #[inline]
    pub fn image_array_index(mut self, value: u32) -> Self {
        self.inner.image_array_index = value;
        self
    }
}

impl Default for SwapchainSubImage {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone)]
pub struct CompositionLayerProjectionView {
    inner: sys::CompositionLayerProjectionView,
}

impl CompositionLayerProjectionView {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: sys::CompositionLayerProjectionView {
                ty: sys::StructureType::COMPOSITION_LAYER_PROJECTION_VIEW,
                ..unsafe { mem::zeroed() }
            },
        }
    }
    #[inline]
    pub fn into_raw(self) -> sys::CompositionLayerProjectionView {
        self.inner
    }
    #[inline]
    pub fn as_raw(&self) -> &sys::CompositionLayerProjectionView {
        &self.inner
    }
    #[inline]
    pub fn pose(mut self, value: sys::Posef) -> Self {
        self.inner.pose = value;
        self
    }
    #[inline]
    pub fn fov(mut self, value: sys::Fovf) -> Self {
        self.inner.fov = value;
        self
    }
    #[inline]
    pub fn sub_image(mut self, value: SwapchainSubImage) -> Self {
        self.inner.sub_image = value.inner;
        self
    }
}

impl Default for CompositionLayerProjectionView {
    fn default() -> Self {
        Self::new()
    }
}

/// A layer that can be put in an `XrFrameEndInfo`.
///
/// # Safety
///
/// `header` must point at a struct that starts with the base header fields
/// and stays valid, along with anything it points to, while `self` lives.
pub unsafe trait CompositionLayer {
    fn header(&self) -> &sys::CompositionLayerBaseHeader;
}

pub struct CompositionLayerProjection {
    inner: sys::CompositionLayerProjection,
    views: Vec<sys::CompositionLayerProjectionView>,
}

impl CompositionLayerProjection {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: sys::CompositionLayerProjection {
                ty: sys::StructureType::COMPOSITION_LAYER_PROJECTION,
                ..unsafe { mem::zeroed() }
            },
            views: Vec::new(),
        }
    }
    #[inline]
    pub fn as_raw(&self) -> &sys::CompositionLayerProjection {
        &self.inner
    }
    #[inline]
    pub fn layer_flags(mut self, value: sys::CompositionLayerFlags) -> Self {
        self.inner.layer_flags = value;
        self
    }
    #[inline]
    pub fn space(mut self, value: sys::Space) -> Self {
        self.inner.space = value;
        self
    }
    #[inline]
    pub fn views(mut self, value: &[CompositionLayerProjectionView]) -> Self {
        self.views = value.iter().map(|view| view.inner).collect();
        self.inner.views = self.views.as_ptr();
        self.inner.view_count = value.len() as u32;
        self
    }
}

unsafe impl CompositionLayer for CompositionLayerProjection {
    fn header(&self) -> &sys::CompositionLayerBaseHeader {
        unsafe { &*(&self.inner as *const sys::CompositionLayerProjection).cast() }
    }
}

impl Default for CompositionLayerProjection {
    fn default() -> Self {
        Self::new()
    }
}

/// An `XrFrameEndInfo` borrowing the layers it lists.
pub struct FrameEndInfo<'a> {
    inner: sys::FrameEndInfo,
    layers: Vec<*const sys::CompositionLayerBaseHeader>,
    _layers: PhantomData<&'a dyn CompositionLayer>,
}

impl<'a> FrameEndInfo<'a> {
    #[inline]
    pub fn new(display_time: sys::Time) -> Self {
        Self {
            inner: sys::FrameEndInfo {
                ty: sys::StructureType::FRAME_END_INFO,
                next: std::ptr::null(),
                display_time,
                environment_blend_mode: sys::EnvironmentBlendMode::OPAQUE,
                layer_count: 0,
                layers: std::ptr::null(),
            },
            layers: Vec::new(),
            _layers: PhantomData,
        }
    }
    #[inline]
    pub fn layer(mut self, layer: &'a dyn CompositionLayer) -> Self {
        self.layers.push(layer.header());
        self.inner.layers = self.layers.as_ptr();
        self.inner.layer_count = self.layers.len() as u32;
        self
    }
    #[inline]
    pub fn as_raw(&self) -> &sys::FrameEndInfo {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_layer_points_at_its_views() {
        let swapchain = sys::Swapchain::from_raw(3);
        let rect = sys::Rect2Di {
            offset: sys::Offset2Di { x: 512, y: 0 },
            extent: sys::Extent2Di {
                width: 512,
                height: 1024,
            },
        };
        let view = CompositionLayerProjectionView::new()
            .sub_image(SwapchainSubImage::new().swapchain(swapchain).image_rect(rect));
        let layer = CompositionLayerProjection::new()
            .space(sys::Space::from_raw(9))
            .views(&[view, view]);

        let raw = layer.as_raw();
        assert_eq!(raw.ty, sys::StructureType::COMPOSITION_LAYER_PROJECTION);
        assert_eq!(raw.view_count, 2);
        let views = unsafe { std::slice::from_raw_parts(raw.views, 2) };
        assert_eq!(views[1].sub_image.swapchain, swapchain);
        assert_eq!(views[1].sub_image.image_rect.offset.x, 512);
        assert_eq!(layer.header().ty, sys::StructureType::COMPOSITION_LAYER_PROJECTION);
        assert_eq!(layer.header().space, sys::Space::from_raw(9));
    }

    #[test]
    fn frame_end_info_lists_layers() {
        let empty = FrameEndInfo::new(sys::Time::from_nanos(5));
        assert_eq!(empty.as_raw().layer_count, 0);
        assert!(empty.as_raw().layers.is_null());

        let layer = CompositionLayerProjection::new();
        let info = FrameEndInfo::new(sys::Time::from_nanos(5))
            .layer(&layer)
            .layer(&layer);
        assert_eq!(info.as_raw().layer_count, 2);
        assert_eq!(info.as_raw().display_time.as_nanos(), 5);
    }
}
