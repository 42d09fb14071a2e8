use std::sync::Arc;

use crate::config::Config;
use crate::service::{
    Clock, audit::AuditSink, ledger::AttendanceLedger, notifier::Notifier,
    recorder::ExceptionRecorder, workflow::ClockWorkflow,
};
use crate::store::Store;
use crate::utils::site_cache::SiteCache;

/// Services shared by every worker, built once at startup.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ledger: AttendanceLedger,
    pub recorder: ExceptionRecorder,
    pub audit: AuditSink,
    pub notifier: Arc<Notifier>,
    pub workflow: ClockWorkflow,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let notifier = Arc::new(Notifier::new(config.notifier_buffer));
        let sites = SiteCache::new(store.clone(), config.site_cache_ttl());
        let workflow = ClockWorkflow::new(
            store.clone(),
            notifier.clone(),
            sites,
            config.workflow_settings(),
            clock.clone(),
        );
        Self {
            ledger: AttendanceLedger::new(store.clone()),
            recorder: ExceptionRecorder::new(store.clone()),
            audit: AuditSink::new(store.clone()),
            store,
            notifier,
            workflow,
            clock,
        }
    }
}
