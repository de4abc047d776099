//! # Deprecation
//!
//! A version is superseded once a newer version of the same app names it as
//! its previous version. A superseded version that has not finished yet is
//! deprecated as a whole and never advanced again.

use super::types::{Directive, Reconciler, ReconcilerError};
use crate::controller::events::LifecycleEvent;
use crate::crd::{AppVersion, Phase};
use kube::runtime::events::EventType;
use tracing::info;

const DEPRECATED_MESSAGE: &str = "superseded by a newer version";

impl Reconciler {
    /// True when another version of the same app declares `app` as its previous version
    ///
    /// # Errors
    ///
    /// Returns an error if the versions in the namespace cannot be listed.
    pub async fn is_superseded(&self, app: &AppVersion) -> Result<bool, ReconcilerError> {
        let versions = self.store.list_app_versions(app.namespace()).await?;
        Ok(versions.iter().any(|other| {
            other.name() != app.name()
                && other.spec.app_name == app.spec.app_name
                && other.previous_version() == app.spec.version
        }))
    }

    /// Deprecate every phase of a version that has not finished
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be written.
    pub async fn deprecate(&self, mut app: AppVersion) -> Result<Directive, ReconcilerError> {
        if app.is_end_time_set() || app.overall_state().is_deprecated() {
            return Ok(Directive::Stop);
        }

        app.status_mut().deprecate_remaining_phases(Phase::Deprecated);
        app.status_mut().current_phase = Phase::Deprecated.long_name().to_string();
        app.set_end_time();
        for phase in Phase::ORDERED {
            self.spans.close(&mut app, Some(phase), Err(DEPRECATED_MESSAGE));
        }
        self.spans.close(&mut app, None, Err(DEPRECATED_MESSAGE));
        self.persist(&mut app).await?;

        info!(
            "📦 App version {}/{} deprecated: {}",
            app.namespace(),
            app.name(),
            DEPRECATED_MESSAGE
        );
        let event =
            LifecycleEvent::for_app(EventType::Normal, &app, "Deprecated", "has been deprecated");
        self.events.publish(&app, event).await;
        self.metrics.increment_app_count(&app);
        Ok(Directive::Stop)
    }
}
