use std::fmt::Display;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Lifecycle status of a single service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    /// Supplied by the registry itself
    Builtin,
    /// Defined, nothing has been built
    Defined,
    /// A proxy exists, the real instance has not been built
    Virtual,
    /// The real instance has been built
    Real,
    /// The registry has shut down
    Shutdown,
}
impl Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ServiceStatus::Builtin => "builtin",
            ServiceStatus::Defined => "defined",
            ServiceStatus::Virtual => "virtual",
            ServiceStatus::Real => "real",
            ServiceStatus::Shutdown => "shutdown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceActivity {
    pub service_id: String,
    pub contract: &'static str,
    pub scope: String,
    pub markers: Vec<&'static str>,
    pub status: ServiceStatus,
}

/// Tracks the status of every service of a registry
#[derive(Debug, Default)]
pub struct ServiceActivityScoreboard {
    activity: RwLock<IndexMap<String, ServiceActivity>>,
}
impl ServiceActivityScoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activity of every service, sorted by id
    pub fn activity(&self) -> Vec<ServiceActivity> {
        let mut all: Vec<ServiceActivity> = self.activity.read().values().cloned().collect();
        all.sort_by_key(|activity| activity.service_id.to_lowercase());
        all
    }

    pub fn status(&self, service_id: &str) -> Option<ServiceStatus> {
        self.activity
            .read()
            .get(&service_id.to_lowercase())
            .map(|activity| activity.status)
    }

    pub(crate) fn define(&self, activity: ServiceActivity) {
        self.activity
            .write()
            .insert(activity.service_id.to_lowercase(), activity);
    }

    /// Status only moves forward, a proxy created after the real instance keeps it real
    pub(crate) fn set_status(&self, service_id: &str, status: ServiceStatus) {
        if let Some(activity) = self.activity.write().get_mut(&service_id.to_lowercase()) {
            let advance = matches!(
                (activity.status, status),
                (ServiceStatus::Defined, ServiceStatus::Virtual | ServiceStatus::Real)
                    | (ServiceStatus::Virtual, ServiceStatus::Real)
            );
            if advance {
                activity.status = status;
            }
        }
    }

    /// Marks every service built by the registry as shut down
    pub(crate) fn shutdown(&self) {
        for activity in self.activity.write().values_mut() {
            if activity.status != ServiceStatus::Builtin {
                activity.status = ServiceStatus::Shutdown;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(id: &str, status: ServiceStatus) -> ServiceActivity {
        ServiceActivity {
            service_id: id.into(),
            contract: "u32",
            scope: "singleton".into(),
            markers: vec![],
            status,
        }
    }

    #[test]
    fn status_only_advances() {
        let scoreboard = ServiceActivityScoreboard::new();
        scoreboard.define(activity("Greeter", ServiceStatus::Defined));

        scoreboard.set_status("greeter", ServiceStatus::Real);
        scoreboard.set_status("GREETER", ServiceStatus::Virtual);
        assert_eq!(scoreboard.status("Greeter"), Some(ServiceStatus::Real));
    }

    #[test]
    fn sorted_by_id_and_shut_down_together() {
        let scoreboard = ServiceActivityScoreboard::new();
        scoreboard.define(activity("Zeta", ServiceStatus::Defined));
        scoreboard.define(activity("alpha", ServiceStatus::Defined));
        scoreboard.define(activity("LoggerSource", ServiceStatus::Builtin));

        scoreboard.shutdown();
        let all = scoreboard.activity();
        let ids: Vec<&str> = all.iter().map(|a| a.service_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "LoggerSource", "Zeta"]);
        assert_eq!(all[0].status, ServiceStatus::Shutdown);
        assert_eq!(all[1].status, ServiceStatus::Builtin);
    }
}
