//! Step reconciler
//!
//! Computes the changes needed to turn a material's stored step list into
//! a submitted one. Steps are keyed by ordinal: matching ordinals are
//! updated in place, new ordinals are created and stored ordinals that
//! were not submitted are deleted. Stored media survives unless a
//! replacement was uploaded for that ordinal; image and video slots are
//! independent.
//!
//! When the same ordinal is submitted twice the later entry wins and only
//! one row results.

use std::collections::{BTreeMap, HashMap};

use materia_common::db::Step;
use materia_common::{Error, Result};
use serde::Deserialize;

use crate::db::steps::NewStep;

/// One step as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmittedStep {
    pub ordinal: i64,
    pub description: String,
}

/// Freshly uploaded media for one ordinal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMedia {
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

/// Changes to apply, each list ordered by ordinal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPlan {
    pub to_create: Vec<NewStep>,
    pub to_update: Vec<Step>,
    pub to_delete: Vec<Step>,
}

/// Decode the `steps` field (JSON array of `{ordinal, description}`)
pub fn decode_submitted_steps(raw: &str) -> Result<Vec<SubmittedStep>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let steps: Vec<SubmittedStep> =
        serde_json::from_str(trimmed).map_err(|e| Error::format("steps", e.to_string()))?;

    for step in &steps {
        if step.ordinal < 1 {
            return Err(Error::format("steps", format!("ordinal {} must be positive", step.ordinal)));
        }
        if step.description.trim().is_empty() {
            return Err(Error::format(
                "steps",
                format!("step {} has an empty description", step.ordinal),
            ));
        }
    }
    Ok(steps)
}

enum Planned {
    Update(Step),
    Create(NewStep),
}

/// Diff stored steps against a submission
pub fn reconcile(
    existing: &[Step],
    submitted: &[SubmittedStep],
    media: &HashMap<i64, StepMedia>,
) -> StepPlan {
    let by_ordinal: BTreeMap<i64, &Step> = existing.iter().map(|s| (s.ordinal, s)).collect();
    let mut planned: BTreeMap<i64, Planned> = BTreeMap::new();

    for step in submitted {
        let uploaded = media.get(&step.ordinal);
        let new_image = uploaded.and_then(|m| m.image_url.clone());
        let new_video = uploaded.and_then(|m| m.video_url.clone());

        let entry = match by_ordinal.get(&step.ordinal) {
            Some(stored) => Planned::Update(Step {
                id: stored.id,
                ordinal: stored.ordinal,
                description: step.description.clone(),
                image_url: new_image.or_else(|| stored.image_url.clone()),
                video_url: new_video.or_else(|| stored.video_url.clone()),
            }),
            None => Planned::Create(NewStep {
                ordinal: step.ordinal,
                description: step.description.clone(),
                image_url: new_image,
                video_url: new_video,
            }),
        };
        // Last submission for an ordinal wins
        planned.insert(step.ordinal, entry);
    }

    let mut plan = StepPlan::default();
    for (_, entry) in planned {
        match entry {
            Planned::Update(step) => plan.to_update.push(step),
            Planned::Create(step) => plan.to_create.push(step),
        }
    }
    plan.to_delete = by_ordinal
        .into_iter()
        .filter(|(ordinal, _)| !submitted.iter().any(|s| s.ordinal == *ordinal))
        .map(|(_, step)| step.clone())
        .collect();

    plan
}
