//! Injectable time and flow-id sources.

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::constants::FLOW_ID_PREFIX;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, truncated to whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait FlowIdGenerator: Send + Sync {
    fn new_flow_id(&self) -> String;
}

/// `F.` followed by 16 uppercase hex digits of a random UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomFlowIds;

impl FlowIdGenerator for RandomFlowIds {
    fn new_flow_id(&self) -> String {
        let uuid = Uuid::new_v4();
        let hex = uuid.simple().to_string().to_uppercase();
        format!("{}{}", FLOW_ID_PREFIX, &hex[..16])
    }
}

/// Always hands out the same id.
#[derive(Debug, Clone)]
pub struct FixedFlowId(pub String);

impl FlowIdGenerator for FixedFlowId {
    fn new_flow_id(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_flow_id_format() {
        let id = RandomFlowIds.new_flow_id();
        assert!(id.starts_with("F."));
        assert_eq!(id.len(), 18);
        assert!(id[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(id, RandomFlowIds.new_flow_id());
    }

    #[test]
    fn test_fixed_sources() {
        let clock = FixedClock::from_timestamp(1602103388).unwrap();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().timestamp(), 1602103388);
        assert_eq!(FixedFlowId("F.1234".to_string()).new_flow_id(), "F.1234");
        assert_eq!(SystemClock.now().timestamp_subsec_nanos(), 0);
    }
}
