/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use super::{CombinerChild, CombiningAlgorithm, Tally};
use crate::ast::{CombinerParameter, Decision, DecisionResult, Effect, IndeterminateKind};
use smol_str::SmolStr;

/// The XACML 3.0 `deny-overrides` and `permit-overrides` algorithms and
/// their `ordered-` variants, at rule or policy level.
///
/// The first child deciding the overriding effect wins immediately. Errors
/// are classified by which effects they could have hidden, so that an
/// Indeterminate is only returned when it could have changed the outcome.
/// Children are always evaluated in document order, which makes the
/// ordered variants identical to the unordered ones.
#[derive(Debug, Clone)]
pub struct Overrides {
    id: SmolStr,
    winner: Effect,
}

impl Overrides {
    /// An overrides algorithm in which `winner` takes precedence
    pub fn new(id: impl Into<SmolStr>, winner: Effect) -> Self {
        Self {
            id: id.into(),
            winner,
        }
    }
}

#[derive(Debug, Default)]
struct Errors {
    winner: bool,
    loser: bool,
    both: bool,
}

impl CombiningAlgorithm for Overrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        _parameters: &[CombinerParameter],
        children: &[&dyn CombinerChild],
    ) -> DecisionResult {
        let winner = Decision::from_effect(self.winner);
        let loser = Decision::from_effect(self.winner.opposite());
        let mut tally = Tally::new();
        let mut errors = Errors::default();
        let mut saw_loser = false;
        for child in children {
            match tally.record(child.evaluate()) {
                d if d == winner => return tally.finish(winner),
                d if d == loser => saw_loser = true,
                Decision::Indeterminate(IndeterminateKind::PermitOrDeny) => errors.both = true,
                Decision::Indeterminate(kind) if kind.could_be(self.winner) => {
                    errors.winner = true
                }
                Decision::Indeterminate(_) => errors.loser = true,
                _ => {}
            }
        }
        let decision = if errors.both || (errors.winner && (errors.loser || saw_loser)) {
            Decision::Indeterminate(IndeterminateKind::PermitOrDeny)
        } else if errors.winner {
            Decision::Indeterminate(IndeterminateKind::of(self.winner))
        } else if saw_loser {
            loser
        } else if errors.loser {
            Decision::Indeterminate(IndeterminateKind::of(self.winner.opposite()))
        } else {
            Decision::NotApplicable
        };
        tally.finish(decision)
    }
}
