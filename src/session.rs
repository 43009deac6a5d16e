//! Per-image annotation session.
//!
//! The session owns the live [`PointStore`] of the image being annotated
//! and keeps it in sync with the workspace: every applied report is
//! persisted as CSV and text report. When the process has no live store
//! (fresh start, dropped connection) the session is `Uninitialized` and
//! is rebuilt from the last persisted CSV on the next request.

use crate::error::{AnnotationError, Result};
use crate::format::{ExportProjection, OverlayRenderer};
use crate::geometry::{Patch, Region};
use crate::model::LabelCatalog;
use crate::reconcile::{ReconcileOutcome, ViewportReport, reconcile, reconcile_patch};
use crate::store::PointStore;
use crate::workspace::Workspace;

/// The image being annotated and its live points.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSession {
    pub image_name: String,
    pub store: PointStore,
}

/// Whether a live store exists.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Active(ImageSession),
}

impl SessionState {
    fn is_active_for(&self, image_name: &str) -> bool {
        matches!(self, SessionState::Active(s) if s.image_name == image_name)
    }
}

/// Annotation session bound to one workspace.
#[derive(Debug)]
pub struct AnnotationSession {
    workspace: Workspace,
    catalog: LabelCatalog,
    renderer: OverlayRenderer,
    state: SessionState,
}

impl AnnotationSession {
    pub fn new(workspace: Workspace, catalog: LabelCatalog) -> Self {
        Self {
            workspace,
            catalog,
            renderer: OverlayRenderer::new(),
            state: SessionState::Uninitialized,
        }
    }

    /// Use a custom renderer for annotated images.
    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The active image session, if any.
    pub fn active(&self) -> Option<&ImageSession> {
        match &self.state {
            SessionState::Active(session) => Some(session),
            SessionState::Uninitialized => None,
        }
    }

    fn active_mut(&mut self) -> Option<&mut ImageSession> {
        match &mut self.state {
            SessionState::Active(session) => Some(session),
            SessionState::Uninitialized => None,
        }
    }

    /// Store an uploaded image in the workspace (unless already present)
    /// and open it.
    pub fn upload(&mut self, image_name: &str, bytes: &[u8]) -> Result<&ImageSession> {
        if self.workspace.has_image(image_name) {
            log::info!("Image '{}' already in workspace, resuming", image_name);
        } else {
            self.workspace.store_image(image_name, bytes)?;
        }
        self.open_image(image_name).map(|session| &*session)
    }

    /// Make `image_name` the active image.
    ///
    /// A different image replaces the current session. Its points are
    /// recovered from the persisted CSV when one exists, otherwise the
    /// store starts empty. A recovered store is written back at once, so
    /// the CSV, text report and annotated PNG all match it. Reopening the
    /// active image keeps its live store.
    pub fn open_image(&mut self, image_name: &str) -> Result<&mut ImageSession> {
        if !self.state.is_active_for(image_name) {
            let recovered = self.workspace.has_annotations(image_name);
            let session = self.recover(image_name)?;
            self.state = SessionState::Active(session);
            if recovered {
                self.refresh_exports()?;
            }
            if let Err(e) = self.workspace.write_latest_session(image_name) {
                log::warn!("Failed to record latest session '{}': {}", image_name, e);
            }
        }
        self.active_mut()
            .ok_or_else(|| AnnotationError::missing(image_name))
    }

    /// Return the live session for `image_name`, recovering it from disk
    /// when the session is uninitialized.
    pub fn ensure_active(&mut self, image_name: &str) -> Result<&mut ImageSession> {
        if matches!(self.state, SessionState::Uninitialized) {
            log::info!("No live store, recovering '{}'", image_name);
        }
        self.open_image(image_name)
    }

    /// Reopen the image recorded by the latest-session marker.
    pub fn resume(&mut self) -> Result<Option<&ImageSession>> {
        let Some(image_name) = self.workspace.latest_session() else {
            return Ok(None);
        };
        if !self.workspace.has_image(&image_name) {
            log::warn!("Latest session image '{}' no longer exists", image_name);
            return Ok(None);
        }
        self.open_image(&image_name).map(|session| Some(&*session))
    }

    /// Reconcile a whole-image report against `image_name` and persist.
    ///
    /// `None` is a no-op and returns `Ok(None)`.
    pub fn apply_report(
        &mut self,
        image_name: &str,
        report: Option<&ViewportReport>,
    ) -> Result<Option<ReconcileOutcome>> {
        let Some(report) = report else {
            return Ok(None);
        };
        let session = self.ensure_active(image_name)?;
        let outcome = reconcile(&mut session.store, &Region::WholeImage, report)?;
        self.persist_active()?;
        Ok(Some(outcome))
    }

    /// Reconcile a report local to `patch` against `image_name` and persist.
    pub fn apply_patch_report(
        &mut self,
        image_name: &str,
        patch: &Patch,
        report: Option<&ViewportReport>,
    ) -> Result<Option<ReconcileOutcome>> {
        let Some(report) = report else {
            return Ok(None);
        };
        let session = self.ensure_active(image_name)?;
        let outcome = reconcile_patch(&mut session.store, patch, report)?;
        self.persist_active()?;
        Ok(Some(outcome))
    }

    /// Render the annotated image of the active session and write it to
    /// the workspace. Returns the PNG bytes.
    pub fn export_overlay(&self) -> Result<Option<Vec<u8>>> {
        let Some(session) = self.active() else {
            return Ok(None);
        };
        let image = self.workspace.open_image(&session.image_name)?;
        let png = self.renderer.render_png(&image, &session.store)?;
        self.workspace.write_overlay(&session.image_name, &png)?;
        Ok(Some(png))
    }

    /// Drop the live store.
    pub fn close(&mut self) -> Option<ImageSession> {
        match std::mem::take(&mut self.state) {
            SessionState::Active(session) => {
                log::info!("Closed session for '{}'", session.image_name);
                Some(session)
            }
            SessionState::Uninitialized => None,
        }
    }

    fn persist_active(&self) -> Result<Option<ExportProjection>> {
        match &self.state {
            SessionState::Active(session) => self
                .workspace
                .persist(&session.image_name, &session.store)
                .map(Some),
            SessionState::Uninitialized => Ok(None),
        }
    }

    /// Rewrite all exports of the active session. An annotated PNG that
    /// cannot be re-rendered is removed rather than left stale.
    fn refresh_exports(&self) -> Result<()> {
        self.persist_active()?;
        let Some(session) = self.active() else {
            return Ok(());
        };
        let name = &session.image_name;

        if self.workspace.has_image(name) {
            match self.export_overlay() {
                Ok(_) => return Ok(()),
                Err(e) => log::warn!("Failed to re-render overlay for '{}': {}", name, e),
            }
        }
        let stale = self.workspace.overlay_path(name);
        if stale.is_file() {
            std::fs::remove_file(&stale)?;
            log::info!("Removed stale overlay {:?}", stale);
        }
        Ok(())
    }

    fn recover(&self, image_name: &str) -> Result<ImageSession> {
        let store = if self.workspace.has_annotations(image_name) {
            let store = self.workspace.load_store(image_name, &self.catalog)?;
            log::info!("Recovered {} points for '{}'", store.len(), image_name);
            store
        } else {
            log::info!("Starting empty session for '{}'", image_name);
            PointStore::new(self.catalog.clone())
        };
        Ok(ImageSession {
            image_name: image_name.to_string(),
            store,
        })
    }
}
