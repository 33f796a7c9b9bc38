use anyhow::{ensure, Result};
use chrono::{Duration, NaiveTime};

/// Opening windows used to build the candidate booking times. Both ends of a
/// window are bookable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceHours {
    pub lunch_start: NaiveTime,
    pub lunch_end: NaiveTime,
    pub dinner_start: NaiveTime,
    pub dinner_end: NaiveTime,
    pub slot_increment_minutes: u32,
}

impl Default for ServiceHours {
    fn default() -> Self {
        Self {
            lunch_start: hm(12, 0),
            lunch_end: hm(14, 30),
            dinner_start: hm(19, 0),
            dinner_end: hm(22, 0),
            slot_increment_minutes: 30,
        }
    }
}

impl ServiceHours {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.slot_increment_minutes > 0,
            "slot increment must be at least one minute"
        );
        ensure!(
            self.lunch_start <= self.lunch_end,
            "lunch window starts after it ends"
        );
        ensure!(
            self.dinner_start <= self.dinner_end,
            "dinner window starts after it ends"
        );
        Ok(())
    }

    /// Every bookable time of day, lunch first, in ascending order within each
    /// window.
    pub fn candidate_slots(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(self.slot_increment_minutes.max(1)));
        let mut slots = Vec::new();
        for (start, end) in [
            (self.lunch_start, self.lunch_end),
            (self.dinner_start, self.dinner_end),
        ] {
            let mut current = start;
            while current <= end {
                if !slots.contains(&current) {
                    slots.push(current);
                }
                let (next, wrapped_secs) = current.overflowing_add_signed(step);
                if wrapped_secs != 0 {
                    break;
                }
                current = next;
            }
        }
        slots
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
