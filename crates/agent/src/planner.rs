//! Agentic planner.
//!
//! A table from intent to action, expressed as one match: every intent
//! has exactly one primary rule, plus the follow-up triggers from the
//! conversation design (ask for a product type or an area when nothing
//! was extracted, reroute failed calculations that talk about the
//! catalogue, downgrade promotion inquiries that carry a price
//! superlative). Variant-specific behaviour is data, not subclasses.

use std::sync::Arc;

use kopibot_calculator::{CalcError, SafeCalculator};
use kopibot_config::{constants::intent as weights, constants::retrieval as consts, Vocabulary};
use kopibot_core::{Action, Intent, Slots};
use kopibot_retrieval::ProductRetriever;

use crate::composer::Composer;
use crate::intent::Classification;
use crate::memory::ContextSnapshot;
use kopibot_core::{Outlet, Product};

/// What the planner sees of the session.
#[derive(Debug, Clone, Default)]
pub struct PlannerContext {
    pub last_intent: Option<Intent>,
    pub last_shown_products: Vec<Product>,
    pub last_shown_outlets: Vec<Outlet>,
    pub saved_context: Option<ContextSnapshot>,
}

/// The planner's decision for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// One action normally; two when a multi-intent utterance splits.
    pub actions: Vec<Action>,
    /// Capture a context snapshot before executing (topic switch).
    pub save_context: bool,
}

pub struct Planner {
    vocabulary: Arc<Vocabulary>,
    calculator: Arc<SafeCalculator>,
    retriever: Arc<ProductRetriever>,
    composer: Arc<Composer>,
    default_k: usize,
}

impl Planner {
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        calculator: Arc<SafeCalculator>,
        retriever: Arc<ProductRetriever>,
        composer: Arc<Composer>,
        default_k: usize,
    ) -> Self {
        Self {
            vocabulary,
            calculator,
            retriever,
            composer,
            default_k,
        }
    }

    pub fn plan(
        &self,
        classification: &Classification,
        slots: &Slots,
        utterance: &str,
        context: &PlannerContext,
        today: chrono::Weekday,
    ) -> Plan {
        let intent = classification.intent;

        // Topic switch between the outlet and product families saves
        // the current context for later recall.
        let save_context = match (context.last_intent, intent) {
            (Some(last), now) => {
                (last.is_outlet_family() && now.is_product_family())
                    || (last.is_product_family() && now.is_outlet_family())
            }
            _ => false,
        };

        let mut actions = vec![self.primary_action(intent, slots, utterance, context, today)];

        if let Some(secondary) = self.secondary_action(classification, slots, utterance) {
            actions.push(secondary);
        }

        tracing::debug!(intent = %intent, actions = actions.len(), save_context, "plan ready");
        Plan {
            actions,
            save_context,
        }
    }

    fn primary_action(
        &self,
        intent: Intent,
        slots: &Slots,
        utterance: &str,
        context: &PlannerContext,
        today: chrono::Weekday,
    ) -> Action {
        match intent {
            Intent::Greeting => Action::ProvideAnswer(self.composer.welcome()),
            Intent::Farewell => Action::ProvideAnswer(self.composer.goodbye()),
            Intent::About => Action::ProvideAnswer(self.composer.about()),
            Intent::Malicious => Action::Reject(self.composer.refusal()),
            Intent::Unclear => Action::RequestClarification(self.composer.clarification()),

            Intent::ProductSearch => self.plan_product_search(slots, utterance),

            Intent::OutletSearch => {
                if !slots.has_outlet_filters() && slots.keywords.is_empty() && !slots.show_all {
                    Action::AskFollowup(self.composer.ask_outlet_area())
                } else {
                    Action::CallOutletSearch {
                        query: utterance.to_string(),
                        slots: effective_slots(slots),
                        k: consts::OUTLET_DISPLAY_CAP,
                    }
                }
            }

            Intent::Calculation => self.plan_calculation(slots, utterance),

            Intent::PromotionInquiry => {
                // A superlative price slot means a product question in
                // promotion clothing.
                if slots.superlative.is_some() {
                    self.plan_product_search(slots, utterance)
                } else {
                    let promos = self.retriever.promotions();
                    Action::ProvideAnswer(self.composer.promotions(&promos))
                }
            }

            Intent::ContextRecall => self.plan_context_recall(context, today),
        }
    }

    fn plan_product_search(&self, slots: &Slots, utterance: &str) -> Action {
        let has_signal = slots.has_product_filters()
            || slots.show_all
            || self.vocabulary.mentions_product_noun(&utterance.to_lowercase())
            || !slots.keywords.is_empty();
        if !has_signal {
            return Action::AskFollowup(self.composer.ask_product_type());
        }

        let k = if slots.show_all {
            usize::MAX
        } else {
            self.default_k
        };
        Action::CallProductSearch {
            query: utterance.to_string(),
            slots: effective_slots(slots),
            k,
        }
    }

    fn plan_calculation(&self, slots: &Slots, utterance: &str) -> Action {
        // Routing probe only; the tool performs the one real evaluation.
        match self.calculator.evaluate(utterance) {
            Err(CalcError::NotACalculation) => {
                // "2 cappuccino and 1 croissant" is catalogue talk.
                if self.vocabulary.mentions_product_noun(&utterance.to_lowercase()) {
                    self.plan_product_search(slots, utterance)
                } else {
                    Action::AskFollowup(self.composer.ask_calculation())
                }
            }
            // Successes run the tool; real calculation attempts with
            // real errors run it too, so the composer can render the
            // targeted help template.
            Ok(_) | Err(_) => Action::CallCalculator {
                original_query: utterance.to_string(),
            },
        }
    }

    fn plan_context_recall(&self, context: &PlannerContext, today: chrono::Weekday) -> Action {
        if !context.last_shown_products.is_empty() {
            return Action::ProvideAnswer(
                self.composer.recall_products(&context.last_shown_products),
            );
        }
        if !context.last_shown_outlets.is_empty() {
            return Action::ProvideAnswer(
                self.composer.recall_outlets(&context.last_shown_outlets, today),
            );
        }
        if let Some(saved) = &context.saved_context {
            if !saved.last_shown_products.is_empty() {
                return Action::ProvideAnswer(
                    self.composer.recall_products(&saved.last_shown_products),
                );
            }
            if !saved.last_shown_outlets.is_empty() {
                return Action::ProvideAnswer(
                    self.composer.recall_outlets(&saved.last_shown_outlets, today),
                );
            }
        }
        Action::RequestClarification(self.composer.recall_empty())
    }

    /// Multi-intent: a strong runner-up plus an unsure primary splits
    /// the turn into two tool actions whose replies are joined by the
    /// engine. Both sub-replies share one session-memory update.
    fn secondary_action(
        &self,
        classification: &Classification,
        slots: &Slots,
        utterance: &str,
    ) -> Option<Action> {
        let (runner_up, score) = classification.runner_up?;
        if score <= weights::MULTI_INTENT_SECONDARY
            || classification.confidence >= weights::MULTI_INTENT_PRIMARY_CAP
            || runner_up == classification.intent
        {
            return None;
        }

        match (classification.intent, runner_up) {
            (Intent::ProductSearch, Intent::Calculation)
            | (Intent::OutletSearch, Intent::Calculation) => {
                // Only worth a second action when the utterance really
                // evaluates; the tool redoes the single evaluation.
                match self.calculator.evaluate(utterance) {
                    Ok(_) => Some(Action::CallCalculator {
                        original_query: utterance.to_string(),
                    }),
                    Err(_) => None,
                }
            }
            (Intent::ProductSearch, Intent::OutletSearch) => Some(Action::CallOutletSearch {
                query: utterance.to_string(),
                slots: effective_slots(slots),
                k: consts::OUTLET_DISPLAY_CAP,
            }),
            (Intent::OutletSearch, Intent::ProductSearch)
            | (Intent::Calculation, Intent::ProductSearch) => Some(Action::CallProductSearch {
                query: utterance.to_string(),
                slots: effective_slots(slots),
                k: self.default_k,
            }),
            _ => None,
        }
    }
}

/// "Show all" suppresses filters for that turn only.
fn effective_slots(slots: &Slots) -> Slots {
    if slots.show_all {
        Slots {
            show_all: true,
            ..Slots::default()
        }
    } else {
        slots.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopibot_core::Superlative;
    use kopibot_retrieval::InMemoryProductIndex;

    fn planner() -> Planner {
        let index = Arc::new(InMemoryProductIndex::new(vec![]).unwrap());
        Planner::new(
            Arc::new(Vocabulary::default()),
            Arc::new(SafeCalculator::default()),
            Arc::new(ProductRetriever::new(index)),
            Arc::new(Composer::new("KopiGo Coffee")),
            15,
        )
    }

    fn classified(intent: Intent, confidence: f32) -> Classification {
        Classification {
            intent,
            confidence,
            runner_up: None,
        }
    }

    #[test]
    fn greeting_maps_to_static_answer() {
        let plan = planner().plan(
            &classified(Intent::Greeting, 0.9),
            &Slots::default(),
            "hello",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(plan.actions[0], Action::ProvideAnswer(_)));
    }

    #[test]
    fn malicious_maps_to_reject() {
        let plan = planner().plan(
            &classified(Intent::Malicious, 1.0),
            &Slots::default(),
            "drop table outlets",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::Reject(_)));
    }

    #[test]
    fn product_search_without_signal_asks_type() {
        // No slots, no product nouns, no residual keywords: ask what
        // kind of product the user wants.
        let plan = planner().plan(
            &classified(Intent::ProductSearch, 0.6),
            &Slots::default(),
            "the",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::AskFollowup(_)));
    }

    #[test]
    fn product_search_with_budget_slot_runs_the_tool() {
        // "under RM50" with no product noun still searches; the engine
        // appends a follow-up when the whole catalogue comes back.
        let mut slots = Slots::default();
        slots.budget = Some(kopibot_core::BudgetRange::below(50.0));
        let plan = planner().plan(
            &classified(Intent::ProductSearch, 0.6),
            &slots,
            "under RM50",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::CallProductSearch { .. }));
    }

    #[test]
    fn outlet_search_without_slots_asks_area() {
        let plan = planner().plan(
            &classified(Intent::OutletSearch, 0.7),
            &Slots::default(),
            "where",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::AskFollowup(_)));
    }

    #[test]
    fn calculation_probes_the_calculator() {
        let plan = planner().plan(
            &classified(Intent::Calculation, 0.95),
            &Slots::default(),
            "20% discount on RM79",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::CallCalculator { .. }));
    }

    #[test]
    fn failed_calculation_with_product_nouns_reroutes() {
        let mut slots = Slots::default();
        slots.keywords = vec!["cappuccino".to_string()];
        let plan = planner().plan(
            &classified(Intent::Calculation, 0.6),
            &slots,
            "2 cappuccino and 1 croissant mug",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::CallProductSearch { .. }));
    }

    #[test]
    fn promotion_with_superlative_downgrades_to_product_search() {
        let mut slots = Slots::default();
        slots.superlative = Some(Superlative::Cheapest);
        slots.keywords = vec!["mug".to_string()];
        let plan = planner().plan(
            &classified(Intent::PromotionInquiry, 0.8),
            &slots,
            "cheapest mug on offer",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::CallProductSearch { .. }));
    }

    #[test]
    fn context_recall_without_memory_requests_clarification() {
        let plan = planner().plan(
            &classified(Intent::ContextRecall, 0.7),
            &Slots::default(),
            "what did we look at earlier",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert!(matches!(plan.actions[0], Action::RequestClarification(_)));
    }

    #[test]
    fn topic_switch_saves_context() {
        let mut context = PlannerContext::default();
        context.last_intent = Some(Intent::OutletSearch);
        let mut slots = Slots::default();
        slots.keywords = vec!["tumbler".to_string()];

        let plan = planner().plan(
            &classified(Intent::ProductSearch, 0.9),
            &slots,
            "show me tumblers",
            &context,
            chrono::Weekday::Mon,
        );
        assert!(plan.save_context);
    }

    #[test]
    fn multi_intent_adds_second_action_below_cap() {
        let classification = Classification {
            intent: Intent::ProductSearch,
            confidence: 0.8,
            runner_up: Some((Intent::Calculation, 0.6)),
        };
        let mut slots = Slots::default();
        slots.keywords = vec!["tumbler".to_string()];
        let plan = planner().plan(
            &classification,
            &slots,
            "show tumblers and what is 2 + 3",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert_eq!(plan.actions.len(), 2);
        assert!(matches!(plan.actions[1], Action::CallCalculator { .. }));
    }

    #[test]
    fn confident_primary_suppresses_multi_intent() {
        let classification = Classification {
            intent: Intent::ProductSearch,
            confidence: 0.95,
            runner_up: Some((Intent::Calculation, 0.6)),
        };
        let mut slots = Slots::default();
        slots.keywords = vec!["tumbler".to_string()];
        let plan = planner().plan(
            &classification,
            &slots,
            "show tumblers 2 + 3",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        assert_eq!(plan.actions.len(), 1);
    }

    #[test]
    fn show_all_suppresses_filters_for_the_turn() {
        let mut slots = Slots::default();
        slots.show_all = true;
        slots.materials.insert(kopibot_core::Material::Ceramic);
        let plan = planner().plan(
            &classified(Intent::ProductSearch, 0.9),
            &slots,
            "show all products",
            &PlannerContext::default(),
            chrono::Weekday::Mon,
        );
        match &plan.actions[0] {
            Action::CallProductSearch { slots, k, .. } => {
                assert!(slots.materials.is_empty());
                assert!(slots.show_all);
                assert_eq!(*k, usize::MAX);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }
}
