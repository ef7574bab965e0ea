// rams-generation-client/src/stages.rs

use chrono::{DateTime, Utc};

pub const STAGE_COUNT: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

pub const STAGES: [Stage; STAGE_COUNT] = [
    Stage {
        key: "init",
        label: "Initialising",
        description: "Reading the job description and project details",
    },
    Stage {
        key: "risks",
        label: "Risk assessment",
        description: "Identifying hazards and control measures",
    },
    Stage {
        key: "regs",
        label: "Regulations",
        description: "Checking BS 7671 and HSE requirements",
    },
    Stage {
        key: "build",
        label: "Method steps",
        description: "Drafting the step-by-step work method",
    },
    Stage {
        key: "check",
        label: "Review",
        description: "Validating steps, PPE and risk links",
    },
    Stage {
        key: "done",
        label: "Finishing",
        description: "Assembling the final document",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePosition {
    Complete,
    Active,
    Upcoming,
}

/// Maps backend progress (0-100) onto a stage index, with stage boundaries at
/// every 100 / (STAGE_COUNT - 1) percent. Out-of-range progress clamps rather
/// than indexing out of bounds.
pub fn stage_index(progress: u8) -> usize {
    let progress = progress.min(100) as usize;
    progress * (STAGE_COUNT - 1) / 100
}

pub fn stage_positions(progress: u8) -> [StagePosition; STAGE_COUNT] {
    let active = stage_index(progress);
    let mut positions = [StagePosition::Upcoming; STAGE_COUNT];
    for (index, position) in positions.iter_mut().enumerate() {
        *position = match index.cmp(&active) {
            std::cmp::Ordering::Less => StagePosition::Complete,
            std::cmp::Ordering::Equal => StagePosition::Active,
            std::cmp::Ordering::Greater => StagePosition::Upcoming,
        };
    }
    positions
}

/// Remaining-time guess assuming the run consumes the whole budget at a
/// uniform rate. A placeholder until observed generation times feed back in;
/// honest enough for a countdown hint.
pub fn remaining_estimate(total_budget_secs: u64, progress: u8) -> u64 {
    let progress = progress.min(100) as u64;
    total_budget_secs * (100 - progress) / 100
}

/// Whole seconds between two instants, floored at zero so a clock skewed
/// behind the stored start never reports a negative elapsed time.
pub fn elapsed_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(start).num_seconds().max(0) as u64
}
