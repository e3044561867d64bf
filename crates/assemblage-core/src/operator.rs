//! Operator dispatch
//!
//! Operators are polled, then executed against the document. A failed
//! execute leaves the document exactly as it was before the call and is
//! turned into a fading label plus a report; errors never reach the caller.

use std::fmt;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::pose::PoseAxis;
use crate::prefs::Preferences;
use crate::scene::SceneId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLevel::Info => write!(f, "INFO"),
            ReportLevel::Warning => write!(f, "WARNING"),
            ReportLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: ReportLevel,
    pub message: String,
}

/// What an operator sees while it runs
pub struct Context<'a> {
    pub doc: &'a mut Document,
    pub prefs: &'a Preferences,
    reports: Vec<Report>,
}

impl<'a> Context<'a> {
    pub fn new(doc: &'a mut Document, prefs: &'a Preferences) -> Self {
        Self {
            doc,
            prefs,
            reports: Vec::new(),
        }
    }

    pub fn scene(&self) -> SceneId {
        self.doc.active_scene()
    }

    pub fn report(&mut self, level: ReportLevel, message: impl Into<String>) {
        self.reports.push(Report {
            level,
            message: message.into(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.report(ReportLevel::Info, message);
    }

    /// Record a skipped branch or repaired state without failing the operator
    pub fn warn(&mut self, err: &CoreError) {
        warn!(kind = err.label(), "{}", err);
        self.report(ReportLevel::Warning, err.to_string());
    }

    pub fn take_reports(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.reports)
    }
}

pub trait Operator {
    /// Host identifier, e.g. `groups.create`
    fn id(&self) -> &'static str;

    fn poll(&self, doc: &Document, prefs: &Preferences) -> CoreResult<()>;

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()>;

    /// Whether the host records an undo step for this operator
    fn undoable(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStatus {
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorOutcome {
    pub status: OperatorStatus,
    /// Fading on-screen label naming the error kind
    pub label: Option<&'static str>,
    pub reports: Vec<Report>,
}

impl OperatorOutcome {
    pub fn finished(&self) -> bool {
        self.status == OperatorStatus::Finished
    }

    fn from_error(err: &CoreError, mut reports: Vec<Report>) -> Self {
        reports.push(Report {
            level: if err.is_warning() {
                ReportLevel::Warning
            } else {
                ReportLevel::Error
            },
            message: err.to_string(),
        });
        Self {
            status: OperatorStatus::Cancelled,
            label: Some(err.label()),
            reports,
        }
    }
}

/// Poll and execute an operator the way the host dispatcher does
pub fn run_operator(op: &mut dyn Operator, doc: &mut Document, prefs: &Preferences) -> OperatorOutcome {
    if let Err(err) = op.poll(doc, prefs) {
        debug!(operator = op.id(), kind = err.label(), "Poll failed");
        return OperatorOutcome::from_error(&err, Vec::new());
    }

    let snapshot = doc.clone();
    let mut ctx = Context::new(doc, prefs);
    let result = op.execute(&mut ctx);
    let reports = ctx.take_reports();
    match result {
        Ok(()) => {
            info!(operator = op.id(), undo = op.undoable(), "Operator finished");
            OperatorOutcome {
                status: OperatorStatus::Finished,
                label: None,
                reports,
            }
        }
        Err(err) => {
            warn!(operator = op.id(), kind = err.label(), "Operator aborted: {}", err);
            *doc = snapshot;
            OperatorOutcome::from_error(&err, reports)
        }
    }
}

/// Input fed to a modal operator between host events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModalEvent {
    /// Cursor position in region pixels
    MouseMove { x: f64, y: f64, ctrl: bool, shift: bool },
    Wheel { steps: i32 },
    Axis(PoseAxis),
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalStatus {
    Running,
    Finished,
    Cancelled,
}

/// Cooperative operator driven by host events.
///
/// `invoke` records whatever the operator must restore, `modal` applies one
/// event, `cancel` restores the recorded state.
pub trait ModalOperator {
    fn id(&self) -> &'static str;

    fn poll(&self, doc: &Document, prefs: &Preferences) -> CoreResult<()>;

    fn invoke(&mut self, ctx: &mut Context<'_>, event: &ModalEvent) -> CoreResult<ModalStatus>;

    fn modal(&mut self, ctx: &mut Context<'_>, event: &ModalEvent) -> CoreResult<ModalStatus>;

    fn cancel(&mut self, ctx: &mut Context<'_>) -> CoreResult<()>;
}

/// Drive a modal operator through a sequence of events.
///
/// The first event invokes the operator. Running out of events while the
/// operator still runs cancels it.
pub fn run_modal(
    op: &mut dyn ModalOperator,
    doc: &mut Document,
    prefs: &Preferences,
    events: &[ModalEvent],
) -> OperatorOutcome {
    if let Err(err) = op.poll(doc, prefs) {
        return OperatorOutcome::from_error(&err, Vec::new());
    }
    let Some((first, rest)) = events.split_first() else {
        return OperatorOutcome {
            status: OperatorStatus::Cancelled,
            label: None,
            reports: Vec::new(),
        };
    };

    let snapshot = doc.clone();
    let mut ctx = Context::new(doc, prefs);
    let result = drive_modal(op, &mut ctx, first, rest);
    let reports = ctx.take_reports();
    match result {
        Ok(ModalStatus::Finished) => {
            info!(operator = op.id(), "Modal operator finished");
            OperatorOutcome {
                status: OperatorStatus::Finished,
                label: None,
                reports,
            }
        }
        Ok(_) => {
            debug!(operator = op.id(), "Modal operator cancelled");
            OperatorOutcome {
                status: OperatorStatus::Cancelled,
                label: None,
                reports,
            }
        }
        Err(err) => {
            warn!(operator = op.id(), kind = err.label(), "Modal operator aborted: {}", err);
            *doc = snapshot;
            OperatorOutcome::from_error(&err, reports)
        }
    }
}

fn drive_modal(
    op: &mut dyn ModalOperator,
    ctx: &mut Context<'_>,
    first: &ModalEvent,
    rest: &[ModalEvent],
) -> CoreResult<ModalStatus> {
    let mut status = op.invoke(ctx, first)?;
    for event in rest {
        if status != ModalStatus::Running {
            break;
        }
        status = op.modal(ctx, event)?;
    }
    if status == ModalStatus::Running {
        op.cancel(ctx)?;
        status = ModalStatus::Cancelled;
    }
    Ok(status)
}
