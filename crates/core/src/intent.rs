//! Closed intent and action vocabularies.
//!
//! Both unions are closed by design: the planner is a total function over
//! `Intent`, and the composer pattern-matches exhaustively over the tool
//! results an `Action` can produce. New values require a planner update.

use serde::{Deserialize, Serialize};

use crate::slots::Slots;

/// The user's goal for a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    ProductSearch,
    OutletSearch,
    Calculation,
    PromotionInquiry,
    ContextRecall,
    About,
    Malicious,
    Unclear,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::ProductSearch => "product_search",
            Intent::OutletSearch => "outlet_search",
            Intent::Calculation => "calculation",
            Intent::PromotionInquiry => "promotion_inquiry",
            Intent::ContextRecall => "context_recall",
            Intent::About => "about",
            Intent::Malicious => "malicious",
            Intent::Unclear => "unclear",
        }
    }

    /// Product-family intents for topic-switch detection.
    pub fn is_product_family(&self) -> bool {
        matches!(self, Intent::ProductSearch | Intent::PromotionInquiry)
    }

    /// Outlet-family intents for topic-switch detection.
    pub fn is_outlet_family(&self) -> bool {
        matches!(self, Intent::OutletSearch)
    }

    /// Intents recorded as `last_intent` in session memory. Error-ish
    /// states never become conversational context.
    pub fn is_conversational(&self) -> bool {
        !matches!(self, Intent::Malicious | Intent::Unclear)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the planner decided to do for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Reply with prepared text; no tool involved.
    ProvideAnswer(String),
    CallProductSearch {
        query: String,
        slots: Slots,
        k: usize,
    },
    CallOutletSearch {
        query: String,
        slots: Slots,
        k: usize,
    },
    /// The calculator receives the raw utterance and extracts the
    /// expression itself; the planner only probes it for routing.
    CallCalculator {
        original_query: String,
    },
    AskFollowup(String),
    RequestClarification(String),
    Reject(String),
}

impl Action {
    /// Name of the tool this action dispatches to, if any.
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            Action::CallProductSearch { .. } => Some("product_search"),
            Action::CallOutletSearch { .. } => Some("outlet_search"),
            Action::CallCalculator { .. } => Some("calculator"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_are_disjoint() {
        for intent in [
            Intent::Greeting,
            Intent::Farewell,
            Intent::ProductSearch,
            Intent::OutletSearch,
            Intent::Calculation,
            Intent::PromotionInquiry,
            Intent::ContextRecall,
            Intent::About,
            Intent::Malicious,
            Intent::Unclear,
        ] {
            assert!(!(intent.is_product_family() && intent.is_outlet_family()));
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Intent::ProductSearch).unwrap(),
            "\"product_search\""
        );
    }
}
