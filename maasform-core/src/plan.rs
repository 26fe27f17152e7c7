//! Ordered effects computed from desired resources and recorded state

use std::fmt;

use crate::effect::Effect;

/// Nothing touches MAAS until the interpreter applies the plan
#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect counts per kind
    pub fn summary(&self) -> PlanSummary {
        self.effects
            .iter()
            .fold(PlanSummary::default(), |mut counts, effect| {
                let slot = match effect {
                    Effect::Create(_) => &mut counts.create,
                    Effect::Update { .. } => &mut counts.update,
                    Effect::Replace { .. } => &mut counts.replace,
                    Effect::Delete(_) => &mut counts.delete,
                };
                *slot += 1;
                counts
            })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::default() {
            return f.write_str("No changes.");
        }
        write!(
            f,
            "Plan: {} to create, {} to update, {} to replace, {} to delete",
            self.create, self.update, self.replace, self.delete
        )
    }
}
