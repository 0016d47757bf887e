use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::store::GradingStore;
use crate::services::intake::GradingIntake;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn GradingStore>,
    intake: GradingIntake,
}

impl AppState {
    pub(crate) fn new(settings: Settings, store: Arc<dyn GradingStore>, intake: GradingIntake) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, intake }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &Arc<dyn GradingStore> {
        &self.inner.store
    }

    pub(crate) fn intake(&self) -> &GradingIntake {
        &self.inner.intake
    }
}
