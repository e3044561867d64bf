//! Asset thumbnails and the thumbnail helper
//!
//! Rendering is the host's business and comes in through `ThumbnailRenderer`.
//! This module frames the packaged objects, crops the render to a square and
//! scales it down to the preferred size.

use assemblage_core::math::{compose, decompose, translation, try_inverse};
use assemblage_core::{
    Aabb, Context, CoreError, CoreResult, Document, ModalEvent, ModalOperator, ModalStatus, ObjectId, Preferences,
    Thumbnail, ThumbnailHelper, ViewState,
};
use glam::{DMat4, DQuat, DVec2, DVec3};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Nothing to frame in the view")]
    EmptyFrame,
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid thumbnail buffer")]
    InvalidBuffer,
}

impl From<ThumbnailError> for CoreError {
    fn from(err: ThumbnailError) -> Self {
        CoreError::ExternalDependency(format!("thumbnail: {}", err))
    }
}

/// Viewport render supplied by the host
pub trait ThumbnailRenderer {
    /// Render the region as seen from `view`
    fn render(&mut self, doc: &Document, view: &ViewState) -> Result<RgbaImage, ThumbnailError>;
}

/// Square crop in region pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareFrame {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl SquareFrame {
    fn scaled(&self, factor: f64) -> SquareFrame {
        SquareFrame {
            x: (self.x as f64 * factor).round() as u32,
            y: (self.y as f64 * factor).round() as u32,
            size: ((self.size as f64 * factor).round() as u32).max(1),
        }
    }
}

/// Smallest square around the projection of `points`, kept inside the region
pub fn square_frame(view: &ViewState, points: &[DVec3]) -> Option<SquareFrame> {
    let projected: Vec<DVec2> = points.iter().filter_map(|p| view.project(*p)).collect();
    let first = *projected.first()?;
    let (min, max) = projected
        .iter()
        .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    let (width, height) = (view.region_width as f64, view.region_height as f64);
    let side = (max - min).max_element().max(1.0).min(width.min(height));
    let center = (min + max) * 0.5;
    let x = (center.x - side * 0.5).clamp(0.0, width - side);
    let y = (center.y - side * 0.5).clamp(0.0, height - side);
    Some(SquareFrame {
        x: x.floor() as u32,
        y: y.floor() as u32,
        size: side.round() as u32,
    })
}

/// Crop `image` to `frame` and downscale to at most `target` pixels
pub fn crop_and_scale(image: &RgbaImage, frame: SquareFrame, target: u32) -> RgbaImage {
    let size = frame
        .size
        .min(image.width().saturating_sub(frame.x))
        .min(image.height().saturating_sub(frame.y))
        .max(1);
    let cropped = imageops::crop_imm(image, frame.x, frame.y, size, size).to_image();
    if target > 0 && size > target {
        imageops::resize(&cropped, target, target, FilterType::Lanczos3)
    } else {
        cropped
    }
}

pub fn to_thumbnail(image: RgbaImage) -> Thumbnail {
    Thumbnail {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    }
}

pub fn to_image(thumbnail: &Thumbnail) -> Result<RgbaImage, ThumbnailError> {
    RgbaImage::from_raw(thumbnail.width, thumbnail.height, thumbnail.pixels.clone())
        .ok_or(ThumbnailError::InvalidBuffer)
}

pub fn save_png(thumbnail: &Thumbnail, path: &Path) -> Result<(), ThumbnailError> {
    to_image(thumbnail)?.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Transform from the instanced collection's space to world for an instancer
pub fn instance_matrix(doc: &Document, instancer: ObjectId) -> CoreResult<DMat4> {
    let obj = doc.object(instancer)?;
    let col = obj
        .instance_collection
        .ok_or_else(|| CoreError::illegal_selection(format!("'{}' does not instance a collection", obj.name)))?;
    let offset = doc.collection(col)?.instance_offset;
    Ok(doc.world_matrix(instancer) * DMat4::from_translation(-offset))
}

/// World bounds of what an instancer shows
pub fn instance_bounds(doc: &Document, instancer: ObjectId) -> CoreResult<Option<Aabb>> {
    let matrix = instance_matrix(doc, instancer)?;
    let Some(col) = doc.object(instancer)?.instance_collection else {
        return Ok(None);
    };
    Ok(doc.world_bounds(&doc.all_objects(col)).map(|b| b.transformed(&matrix)))
}

/// Helper matrix relative to the anchor.
///
/// The anchor's scale is divided out first, so the helper rectangle keeps its
/// size in world space however the anchor is scaled.
pub fn helper_matrix(anchor_world: &DMat4, location_offset: DVec3, rotation: DQuat, size: f64) -> CoreResult<DMat4> {
    let (_, _, scale) = decompose(anchor_world);
    let inverse_scale = try_inverse(&DMat4::from_scale(scale), "anchor scale")?;
    Ok(inverse_scale * compose(location_offset, rotation, DVec3::splat(size)))
}

/// Helper framing `center` as seen from `view`, at `size` world units
pub fn capture_helper(
    anchor_world: &DMat4,
    view: &ViewState,
    center: DVec3,
    size: f64,
) -> CoreResult<ThumbnailHelper> {
    let (location, rotation, _) = decompose(anchor_world);
    let (_, view_rotation, _) = decompose(&view.view_to_world());
    let inverse = rotation.inverse();
    let helper_rotation = inverse * view_rotation;
    let location_offset = inverse * (center - location);
    Ok(ThumbnailHelper {
        matrix: helper_matrix(anchor_world, location_offset, helper_rotation, size)?,
        location_offset,
        rotation: helper_rotation,
    })
}

/// Orthographic view looking straight at the helper rectangle, along with
/// the rectangle's world matrix
pub fn helper_view(doc: &Document, anchor: ObjectId, size_px: u32) -> CoreResult<Option<(ViewState, DMat4)>> {
    let Some(helper) = doc.object(anchor)?.asset_thumbnail_helper else {
        return Ok(None);
    };
    let world = doc.world_matrix(anchor) * helper.matrix;
    let (location, rotation, scale) = decompose(&world);
    let side = scale.x.abs().max(scale.y.abs());
    let eye = compose(location + rotation * DVec3::new(0.0, 0.0, side * 2.0), rotation, DVec3::ONE);
    let view = ViewState {
        view_matrix: try_inverse(&eye, "thumbnail helper view")?,
        perspective: false,
        region_width: size_px,
        region_height: size_px,
        ortho_scale: side,
        ..ViewState::default()
    };
    Ok(Some((view, world)))
}

/// Render, frame and scale a preview for `anchor`.
///
/// An anchor with a thumbnail helper is framed by the helper rectangle,
/// otherwise by the bounds of `objects` in the current view.
pub fn render_thumbnail(
    doc: &Document,
    anchor: ObjectId,
    objects: &[ObjectId],
    renderer: &mut dyn ThumbnailRenderer,
    size: u32,
) -> Result<Thumbnail, ThumbnailError> {
    let helper = helper_view(doc, anchor, size).map_err(|e| ThumbnailError::Render(e.to_string()))?;
    let (view, points) = match helper {
        Some((view, world)) => {
            let corners = [
                DVec3::new(-0.5, -0.5, 0.0),
                DVec3::new(0.5, -0.5, 0.0),
                DVec3::new(-0.5, 0.5, 0.0),
                DVec3::new(0.5, 0.5, 0.0),
            ];
            (view, corners.map(|c| world.transform_point3(c)).to_vec())
        }
        None => {
            let bounds = doc.world_bounds(objects).ok_or(ThumbnailError::EmptyFrame)?;
            (doc.window.view.clone(), bounds.corners().to_vec())
        }
    };

    let rendered = renderer.render(doc, &view)?;
    let frame = square_frame(&view, &points).ok_or(ThumbnailError::EmptyFrame)?;
    let factor = rendered.width() as f64 / view.region_width.max(1) as f64;
    let image = crop_and_scale(&rendered, frame.scaled(factor), size);
    debug!(anchor = %anchor, frame = ?frame, width = image.width(), "Rendered thumbnail");
    Ok(to_thumbnail(image))
}

/// Interactive placement of the thumbnail helper on the active instancer.
///
/// Mouse moves pan the rectangle in the view plane, the wheel resizes it.
#[derive(Debug)]
pub struct ThumbnailHelperSession {
    anchor: Option<ObjectId>,
    initial: Option<ThumbnailHelper>,
    last_mouse: Option<DVec2>,
    offset: DVec3,
    rotation: DQuat,
    size: f64,
}

impl Default for ThumbnailHelperSession {
    fn default() -> Self {
        Self {
            anchor: None,
            initial: None,
            last_mouse: None,
            offset: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            size: 1.0,
        }
    }
}

fn active_instancer(doc: &Document) -> CoreResult<ObjectId> {
    match doc.active_object(doc.active_scene()) {
        Some(id) if doc.objects.get(&id).map(|o| o.is_instancer()).unwrap_or(false) => Ok(id),
        _ => Err(CoreError::illegal_selection("the active object does not instance an assembly")),
    }
}

impl ThumbnailHelperSession {
    pub fn size(&self) -> f64 {
        self.size
    }

    fn write(&self, doc: &mut Document) -> CoreResult<()> {
        let Some(anchor) = self.anchor else {
            return Ok(());
        };
        let world = doc.world_matrix(anchor);
        let helper = ThumbnailHelper {
            matrix: helper_matrix(&world, self.offset, self.rotation, self.size)?,
            location_offset: self.offset,
            rotation: self.rotation,
        };
        doc.object_mut(anchor)?.asset_thumbnail_helper = Some(helper);
        Ok(())
    }
}

impl ModalOperator for ThumbnailHelperSession {
    fn id(&self) -> &'static str {
        "assembly.thumbnail_helper"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_instancer(doc).map(|_| ())
    }

    fn invoke(&mut self, ctx: &mut Context<'_>, event: &ModalEvent) -> CoreResult<ModalStatus> {
        let anchor = active_instancer(ctx.doc)?;
        let world = ctx.doc.world_matrix(anchor);
        self.initial = ctx.doc.object(anchor)?.asset_thumbnail_helper;
        let bounds = instance_bounds(ctx.doc, anchor)?;
        let center = bounds.map(|b| b.center()).unwrap_or_else(|| translation(&world));
        self.size = bounds.map(|b| b.dimensions().max_element()).filter(|s| *s > 0.0).unwrap_or(1.0);
        let helper = capture_helper(&world, &ctx.doc.window.view, center, self.size)?;
        self.offset = helper.location_offset;
        self.rotation = helper.rotation;
        self.anchor = Some(anchor);
        if let ModalEvent::MouseMove { x, y, .. } = *event {
            self.last_mouse = Some(DVec2::new(x, y));
        }
        self.write(ctx.doc)?;
        Ok(ModalStatus::Running)
    }

    fn modal(&mut self, ctx: &mut Context<'_>, event: &ModalEvent) -> CoreResult<ModalStatus> {
        match *event {
            ModalEvent::MouseMove { x, y, .. } => {
                let mouse = DVec2::new(x, y);
                if let (Some(last), Some(anchor)) = (self.last_mouse, self.anchor) {
                    let view = &ctx.doc.window.view;
                    let delta = mouse - last;
                    let per_pixel = self.size / view.region_height.max(1) as f64;
                    let world_shift = (view.right() * delta.x - view.up() * delta.y) * per_pixel;
                    let (_, rotation, _) = decompose(&ctx.doc.world_matrix(anchor));
                    self.offset += rotation.inverse() * world_shift;
                    self.write(ctx.doc)?;
                }
                self.last_mouse = Some(mouse);
                Ok(ModalStatus::Running)
            }
            ModalEvent::Wheel { steps } => {
                self.size *= 0.9_f64.powi(steps);
                self.write(ctx.doc)?;
                Ok(ModalStatus::Running)
            }
            ModalEvent::Axis(_) => Ok(ModalStatus::Running),
            ModalEvent::Confirm => {
                info!(anchor = ?self.anchor, size = self.size, "Set thumbnail helper");
                Ok(ModalStatus::Finished)
            }
            ModalEvent::Cancel => {
                self.cancel(ctx)?;
                Ok(ModalStatus::Cancelled)
            }
        }
    }

    fn cancel(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        if let Some(anchor) = self.anchor {
            ctx.doc.object_mut(anchor)?.asset_thumbnail_helper = self.initial;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assemblage_core::{run_modal, InstanceType, ObjectKind};
    use image::Rgba;

    /// Gradient render with the view's region size
    pub(crate) struct GradientRenderer {
        pub calls: usize,
    }

    impl ThumbnailRenderer for GradientRenderer {
        fn render(&mut self, _doc: &Document, view: &ViewState) -> Result<RgbaImage, ThumbnailError> {
            self.calls += 1;
            Ok(RgbaImage::from_fn(view.region_width, view.region_height, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
            }))
        }
    }

    #[test]
    fn test_square_frame_is_square_and_inside() {
        let view = ViewState::default();
        let frame = square_frame(&view, &[DVec3::new(-1.0, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.5)]).unwrap();
        assert!(frame.size > 1);
        assert!(frame.x + frame.size <= view.region_width);
        assert!(frame.y + frame.size <= view.region_height);
        assert!(square_frame(&view, &[]).is_none());
    }

    #[test]
    fn test_crop_and_scale() {
        let image = RgbaImage::from_pixel(1000, 800, Rgba([10, 20, 30, 255]));
        let frame = SquareFrame { x: 100, y: 50, size: 600 };
        let out = crop_and_scale(&image, frame, 256);
        assert_eq!((out.width(), out.height()), (256, 256));

        let small = crop_and_scale(&image, SquareFrame { x: 0, y: 0, size: 100 }, 256);
        assert_eq!(small.width(), 100);
    }

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let thumb = to_thumbnail(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        save_png(&thumb, &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(to_thumbnail(loaded), thumb);
    }

    #[test]
    fn test_render_thumbnail_from_bounds() {
        let mut doc = Document::new();
        let col = doc.scene(doc.active_scene()).unwrap().current_collection();
        let cube = doc.add_cube(col, "Cube", DVec3::ZERO, 2.0).unwrap();
        let anchor = doc.new_object("Anchor", ObjectKind::Empty);
        let mut renderer = GradientRenderer { calls: 0 };

        let thumb = render_thumbnail(&doc, anchor, &[cube], &mut renderer, 64).unwrap();
        assert_eq!(renderer.calls, 1);
        assert_eq!((thumb.width, thumb.height), (64, 64));
        assert_eq!(thumb.pixels.len(), 64 * 64 * 4);
    }

    #[test]
    fn test_helper_ignores_anchor_scale() {
        let anchor = compose(DVec3::new(1.0, 2.0, 3.0), DQuat::from_rotation_z(0.4), DVec3::new(2.0, 2.0, 2.0));
        let view = ViewState::default();
        let helper = capture_helper(&anchor, &view, DVec3::new(1.0, 2.0, 4.0), 1.5).unwrap();
        let (location, rotation, scale) = decompose(&(anchor * helper.matrix));
        assert!(location.abs_diff_eq(DVec3::new(1.0, 2.0, 4.0), 1e-9));
        assert!(scale.abs_diff_eq(DVec3::splat(1.5), 1e-9));
        let (_, view_rotation, _) = decompose(&view.view_to_world());
        assert!(rotation.dot(view_rotation).abs() > 1.0 - 1e-9);
    }

    #[test]
    fn test_helper_session_cancel_and_confirm() {
        let mut doc = Document::new();
        let scene = doc.active_scene();
        let col = doc.scene(scene).unwrap().current_collection();
        let inner = doc.new_collection("_Chair");
        doc.add_cube(inner, "Seat", DVec3::ZERO, 1.0).unwrap();
        let inst = doc.add_object(col, "Chair", ObjectKind::Empty, DVec3::new(3.0, 0.0, 0.0)).unwrap();
        {
            let obj = doc.object_mut(inst).unwrap();
            obj.instance_type = InstanceType::Collection;
            obj.instance_collection = Some(inner);
        }
        doc.set_active(scene, Some(inst)).unwrap();
        let prefs = Preferences::default();
        let start = ModalEvent::MouseMove {
            x: 100.0,
            y: 100.0,
            ctrl: false,
            shift: false,
        };

        let mut session = ThumbnailHelperSession::default();
        run_modal(&mut session, &mut doc, &prefs, &[start, ModalEvent::Wheel { steps: 1 }, ModalEvent::Cancel]);
        assert!(doc.object(inst).unwrap().asset_thumbnail_helper.is_none());

        let mut session = ThumbnailHelperSession::default();
        let outcome = run_modal(&mut session, &mut doc, &prefs, &[start, ModalEvent::Wheel { steps: 1 }, ModalEvent::Confirm]);
        assert!(outcome.finished());
        let helper = doc.object(inst).unwrap().asset_thumbnail_helper.unwrap();
        let world = doc.world_matrix(inst) * helper.matrix;
        assert!(translation(&world).abs_diff_eq(DVec3::new(3.0, 0.0, 0.0), 1e-9));
        assert!((session.size() - 0.9).abs() < 1e-9);

        let (view, rect) = helper_view(&doc, inst, 128).unwrap().unwrap();
        assert_eq!(view.region_width, 128);
        let center = view.project(translation(&rect)).unwrap();
        assert!(center.abs_diff_eq(DVec2::new(64.0, 64.0), 1e-6));

        let mut renderer = GradientRenderer { calls: 0 };
        let thumb = render_thumbnail(&doc, inst, &[], &mut renderer, 128).unwrap();
        assert_eq!((thumb.width, thumb.height), (128, 128));
    }
}
