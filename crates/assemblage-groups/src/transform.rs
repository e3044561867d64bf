//! Interactive group rotation
//!
//! The session rotates the active group empty about one of its local axes,
//! following the mouse around the empty's projected origin.

use assemblage_core::math::translation;
use assemblage_core::{
    Context, CoreError, CoreResult, Document, ModalEvent, ModalOperator, ModalStatus, ObjectId, PoseAxis,
    Preferences,
};
use glam::{DMat4, DQuat, DVec2, DVec3};
use tracing::debug;

use crate::hierarchy::is_group_empty;

/// Angle increment used while snapping, in degrees
pub const SNAP_STEP_DEGREES: f64 = 5.0;

fn axis_vector(axis: PoseAxis) -> DVec3 {
    match axis {
        PoseAxis::X => DVec3::X,
        PoseAxis::Y => DVec3::Y,
        PoseAxis::Z => DVec3::Z,
    }
}

fn snap(angle: f64) -> f64 {
    let step = SNAP_STEP_DEGREES.to_radians();
    (angle / step).round() * step
}

fn active_group(doc: &Document) -> CoreResult<ObjectId> {
    let scene = doc.active_scene();
    match doc.active_object(scene) {
        Some(id) if is_group_empty(doc, id) => Ok(id),
        _ => Err(CoreError::illegal_selection("the active object is not a group empty")),
    }
}

#[derive(Debug)]
pub struct TransformGroupSession {
    axis: PoseAxis,
    empty: Option<ObjectId>,
    initial: DMat4,
    center: DVec2,
    start: f64,
    /// Mouse rotation since invoke, radians
    raw: f64,
    snapping: bool,
    /// Wheel offset in snap steps
    steps: i32,
    angle: f64,
}

impl TransformGroupSession {
    pub fn new(axis: PoseAxis) -> Self {
        Self {
            axis,
            empty: None,
            initial: DMat4::IDENTITY,
            center: DVec2::ZERO,
            start: 0.0,
            raw: 0.0,
            snapping: false,
            steps: 0,
            angle: 0.0,
        }
    }

    /// Current rotation relative to the initial matrix, radians
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn axis(&self) -> PoseAxis {
        self.axis
    }

    fn mouse_angle(&self, x: f64, y: f64) -> f64 {
        // region y grows downward
        (self.center.y - y).atan2(x - self.center.x)
    }

    fn apply(&mut self, doc: &mut Document) -> CoreResult<()> {
        let Some(empty) = self.empty else {
            return Ok(());
        };
        let local_axis = self.initial.transform_vector3(axis_vector(self.axis));
        let world_axis = doc.parent_world_matrix(empty).transform_vector3(local_axis);
        let facing = if world_axis.dot(doc.window.view.forward()) > 0.0 { -1.0 } else { 1.0 };
        let mut angle = self.raw * facing + self.steps as f64 * SNAP_STEP_DEGREES.to_radians();
        if self.snapping {
            angle = snap(angle);
        }
        self.angle = angle;
        let rotated = self.initial * DMat4::from_quat(DQuat::from_axis_angle(axis_vector(self.axis), angle));
        doc.set_local_matrix(empty, &rotated)
    }
}

impl ModalOperator for TransformGroupSession {
    fn id(&self) -> &'static str {
        "groups.transform_group"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_group(doc).map(|_| ())
    }

    fn invoke(&mut self, ctx: &mut Context<'_>, event: &ModalEvent) -> CoreResult<ModalStatus> {
        let empty = active_group(ctx.doc)?;
        let origin = translation(&ctx.doc.world_matrix(empty));
        self.center = ctx
            .doc
            .window
            .view
            .project(origin)
            .ok_or_else(|| CoreError::illegal_selection("the group origin is behind the view"))?;
        self.initial = ctx.doc.local_matrix(empty)?;
        self.empty = Some(empty);
        self.start = match event {
            ModalEvent::MouseMove { x, y, .. } => self.mouse_angle(*x, *y),
            _ => 0.0,
        };
        debug!(empty = %empty, axis = self.axis.as_str(), "Started group transform");
        Ok(ModalStatus::Running)
    }

    fn modal(&mut self, ctx: &mut Context<'_>, event: &ModalEvent) -> CoreResult<ModalStatus> {
        match *event {
            ModalEvent::MouseMove { x, y, ctrl, .. } => {
                self.raw = self.mouse_angle(x, y) - self.start;
                self.snapping = ctrl;
                self.apply(ctx.doc)?;
                Ok(ModalStatus::Running)
            }
            ModalEvent::Wheel { steps } => {
                self.steps += steps;
                self.apply(ctx.doc)?;
                Ok(ModalStatus::Running)
            }
            ModalEvent::Axis(axis) => {
                self.axis = axis;
                self.apply(ctx.doc)?;
                Ok(ModalStatus::Running)
            }
            ModalEvent::Confirm => {
                ctx.info(format!("Rotated group by {:.1}° about {}", self.angle.to_degrees(), self.axis.as_str()));
                Ok(ModalStatus::Finished)
            }
            ModalEvent::Cancel => {
                self.cancel(ctx)?;
                Ok(ModalStatus::Cancelled)
            }
        }
    }

    fn cancel(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        if let Some(empty) = self.empty {
            ctx.doc.set_local_matrix(empty, &self.initial)?;
            debug!(empty = %empty, "Restored group transform");
        }
        self.angle = 0.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{add_group, setup};
    use assemblage_core::math::approx_eq;
    use assemblage_core::{run_modal, OperatorStatus};
    use std::f64::consts::FRAC_PI_2;

    fn move_at(center: DVec2, degrees: f64, ctrl: bool) -> ModalEvent {
        let r = degrees.to_radians();
        ModalEvent::MouseMove {
            x: center.x + 100.0 * r.cos(),
            y: center.y - 100.0 * r.sin(),
            ctrl,
            shift: false,
        }
    }

    fn group_with_child() -> (Document, ObjectId, ObjectId, DVec2) {
        let (mut doc, scene, col) = setup();
        let g = add_group(&mut doc, col, "G", DVec3::ZERO);
        let c = doc.add_cube(col, "C", DVec3::X, 1.0).unwrap();
        doc.set_parent(c, Some(g), true).unwrap();
        doc.set_active(scene, Some(g)).unwrap();
        let center = doc.window.view.project(DVec3::ZERO).unwrap();
        (doc, g, c, center)
    }

    #[test]
    fn test_rotate_and_confirm() {
        let (mut doc, g, c, center) = group_with_child();
        let mut session = TransformGroupSession::new(PoseAxis::Z);
        let events = [move_at(center, 0.0, false), move_at(center, 90.0, false), ModalEvent::Confirm];

        let outcome = run_modal(&mut session, &mut doc, &Preferences::default(), &events);
        assert!(outcome.finished());
        assert!((session.angle() - FRAC_PI_2).abs() < 1e-9);
        let expected = DQuat::from_rotation_z(FRAC_PI_2);
        assert!(doc.object(g).unwrap().rotation.abs_diff_eq(expected, 1e-9));
        // the member follows its group
        assert!(translation(&doc.world_matrix(c)).abs_diff_eq(DVec3::Y, 1e-9));
    }

    #[test]
    fn test_snapping_and_wheel() {
        let (mut doc, _, _, center) = group_with_child();
        let mut session = TransformGroupSession::new(PoseAxis::Z);
        let events = [
            move_at(center, 0.0, false),
            move_at(center, 47.0, true),
            ModalEvent::Wheel { steps: 2 },
            ModalEvent::Confirm,
        ];
        run_modal(&mut session, &mut doc, &Preferences::default(), &events);
        assert!((session.angle().to_degrees() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_restores_initial_matrix() {
        let (mut doc, g, _, center) = group_with_child();
        let before = doc.local_matrix(g).unwrap();
        let mut session = TransformGroupSession::new(PoseAxis::Z);
        let events = [
            move_at(center, 0.0, false),
            move_at(center, 30.0, false),
            ModalEvent::Axis(PoseAxis::X),
            ModalEvent::Cancel,
        ];
        let outcome = run_modal(&mut session, &mut doc, &Preferences::default(), &events);
        assert_eq!(outcome.status, OperatorStatus::Cancelled);
        assert!(approx_eq(&doc.local_matrix(g).unwrap(), &before, 1e-12));

        // running out of events cancels as well
        let mut session = TransformGroupSession::new(PoseAxis::Z);
        run_modal(&mut session, &mut doc, &Preferences::default(), &[move_at(center, 0.0, false), move_at(center, 60.0, false)]);
        assert!(approx_eq(&doc.local_matrix(g).unwrap(), &before, 1e-12));
    }

    #[test]
    fn test_poll_requires_active_group() {
        let (mut doc, scene, col) = setup();
        let cube = doc.add_cube(col, "Cube", DVec3::ZERO, 1.0).unwrap();
        doc.set_active(scene, Some(cube)).unwrap();
        let session = TransformGroupSession::new(PoseAxis::Z);
        assert!(session.poll(&doc, &Preferences::default()).is_err());
    }
}
