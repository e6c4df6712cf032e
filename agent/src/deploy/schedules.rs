//! Schedule reconciliation

use std::collections::BTreeMap;

use tracing::info;

use crate::deploy::manifest::ScheduleDeclaration;
use crate::errors::AgentError;
use crate::models::application::ENV_LIVE;
use crate::models::schedule::{ScheduleData, ScheduleEntry, ScheduleSpec, CREATE_EVENT_JOB};
use crate::store::scheduler::ScheduleStore;

/// Replace every schedule of an application with the declared ones.
///
/// Existing entries are cancelled first, then one entry is registered per
/// cron expression. An empty declaration only cancels.
pub async fn reconcile_schedules(
    store: &dyn ScheduleStore,
    application_id: &str,
    declared: &BTreeMap<String, ScheduleDeclaration>,
) -> Result<Vec<ScheduleEntry>, AgentError> {
    let cancelled = store.cancel_by_application(application_id).await?;

    let mut created = Vec::with_capacity(declared.len());
    for (cron, declaration) in declared {
        let entry = store
            .create_schedule(ScheduleSpec {
                name: CREATE_EVENT_JOB.to_string(),
                data: ScheduleData {
                    application: application_id.to_string(),
                    environment: ENV_LIVE.to_string(),
                    events: declaration.events.clone(),
                },
                repeat_every: cron.clone(),
            })
            .await?;
        created.push(entry);
    }

    info!(
        "Schedules for {}: {} cancelled, {} registered",
        application_id,
        cancelled,
        created.len()
    );
    Ok(created)
}
