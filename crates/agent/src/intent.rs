//! Intent classification.
//!
//! The classifier is an ordered predicate cascade, not a learned model:
//! every input has a defined intent and the output is a pure function of
//! the utterance and the recent intent history.
//!
//! Cascade order: malicious blocklist, garbage gate, context-aware
//! follow-up boost, pattern scoring, conflict resolution, threshold.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use kopibot_config::{constants::intent as weights, Vocabulary};
use kopibot_core::Intent;

/// What the classifier sees of the session.
#[derive(Debug, Clone, Default)]
pub struct SessionContextView {
    pub last_intent: Option<Intent>,
    pub turn_count: usize,
}

/// Full classification result. `classify` narrows this to the
/// `(Intent, confidence)` pair; the planner reads the runner-up for
/// multi-intent handling.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    pub runner_up: Option<(Intent, f32)>,
}

/// SQL/script/shell injection shapes. Matching any of these is an
/// immediate MALICIOUS verdict at full confidence.
static MALICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)drop\s+table",
        r"(?i)drop\s+database",
        r"(?i)union\s+select",
        r"(?i)insert\s+into",
        r"(?i)delete\s+from",
        r"(?i)\bor\s+1\s*=\s*1\b",
        r"(?i)<\s*script",
        r"(?i)javascript:",
        r"(?i)\bexec\s*\(",
        r"(?i)\bxp_\w+",
        r";\s*--",
        r"--\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PRONOUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:they|them|it|those|these)\b").unwrap());
static TIME_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:open|opens|opening|close|closes|closing|hours?|timing)\b").unwrap());
static PRODUCT_ATTR_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:price|cost|cheap|cheaper|cheapest|expensive|material|capacity|color|colour|size)\b")
        .unwrap()
});
static OPERATOR_PRESENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+*/×÷^=]|\d\s*-\s*\d|\d\s*%").unwrap());

static CALC_DISCOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?\s*%\s*discount\s+on\s+(?:rm\s*)?\d").unwrap());
static CALC_TOTAL_MULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"total\s+(?:price\s+)?for\s+\d+(?:\.\d+)?\s*[×x*]\s*rm\s*\d").unwrap());
static CALC_TAX_ON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\d+(?:\.\d+)?\s*%\s*)?(?:sst|gst|tax)\s+on\s+(?:rm\s*)?\d").unwrap());

/// Ordered pattern table for one intent.
struct IntentPatterns {
    intent: Intent,
    patterns: Vec<Regex>,
}

pub struct IntentClassifier {
    vocabulary: Arc<Vocabulary>,
    table: Vec<IntentPatterns>,
}

impl IntentClassifier {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        let rx = |p: &str| Regex::new(p).unwrap();

        let table = vec![
            IntentPatterns {
                intent: Intent::Greeting,
                patterns: vec![
                    rx(r"\b(?:hi|hello|hey|greetings)\b"),
                    rx(r"\bgood\s+(?:morning|afternoon|evening)\b"),
                    rx(r"\bhow\s+are\s+you\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::Farewell,
                patterns: vec![
                    rx(r"\b(?:bye|goodbye|farewell)\b"),
                    rx(r"\bthanks?(?:\s+you)?\b"),
                    rx(r"\bsee\s+you\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::ProductSearch,
                patterns: vec![
                    rx(r"\b(?:product|products|tumbler|tumblers|mug|mugs|cup|cups|bottle|bottles|flask|drinkware|merchandise)\b"),
                    rx(r"\b(?:cheapest|most\s+expensive|affordable|budget|premium)\b"),
                    rx(r"\b(?:under|below|above|over|between)\s+rm\s*\d+"),
                    rx(r"\b(?:stainless(?:\s+steel)?|ceramic|acrylic|glass|porcelain)\b"),
                    rx(r"\b(?:sundaze|aqua|corak|frozee|all-can|patah\s+hati)\b"),
                    rx(r"\b(?:buy|purchase)\b"),
                    rx(r"\bshow\s+(?:me\s+)?(?:all\s+)?products\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::OutletSearch,
                patterns: vec![
                    rx(r"\b(?:outlet|outlets|store|stores|branch|branches|location|locations|cafe)\b"),
                    rx(r"\bwhere\b"),
                    rx(r"\b(?:hours|timing|schedule)\b"),
                    rx(r"\b(?:open|opens|opening|close|closes|closing)\b"),
                    rx(r"\b(?:address|near|nearest|nearby)\b"),
                    rx(r"\b(?:kuala\s+lumpur|kl|klcc|petaling\s+jaya|pj|selangor|shah\s+alam|damansara|bangsar|ss2|ss15|sunway|pavilion|mid\s+valley|putrajaya)\b"),
                    rx(r"\b(?:drive-?thru|dine-?in|takeaway|delivery|wifi|24\s*(?:hours?|/7))\b"),
                    rx(r"\bhow\s+many\s+(?:outlets|stores|branches)\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::Calculation,
                patterns: vec![
                    rx(r"\d\s*[+*/×÷^]\s*\d"),
                    rx(r"\d\s+-\s+\d"),
                    rx(r"\b(?:calculate|compute|solve)\b.*\d"),
                    rx(r"\bwhat(?:\s+is|'s)\s+\d"),
                    rx(r"\d+\s*%\s*(?:of|discount|off)"),
                    rx(r"\b(?:plus|minus|times|divided\s+by|multiplied\s+by)\b"),
                    rx(r"(?:square\s+root|sqrt|√)"),
                    rx(r"\bto\s+the\s+power\s+of\b|\*\*|\^"),
                    rx(r"\b(?:sst|gst|tax)\b.*\d"),
                    rx(r"\b(?:split|average)\b.*\d"),
                    rx(r"\badd\s+up\b"),
                    rx(r"\btotal\s+for\b"),
                    rx(r"opens?\s+at\s+\d.*arrive"),
                    rx(r"\badd\s+\d+\s+minutes?\b"),
                    rx(r"\bhow\s+many\s+minutes?\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::PromotionInquiry,
                patterns: vec![
                    rx(r"\b(?:promotion|promotions|promo|promos)\b"),
                    rx(r"\b(?:sale|sales|deal|deals|offer|offers|special|specials)\b"),
                    rx(r"\bdiscounts?\b"),
                    rx(r"\bwhat'?s\s+new\b"),
                    rx(r"\bon\s+sale\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::ContextRecall,
                patterns: vec![
                    rx(r"\b(?:earlier|previous|previously|before)\b"),
                    rx(r"\bback\s+to\b"),
                    rx(r"\bwhat\s+did\s+(?:i|you|we)\b"),
                    rx(r"\b(?:again|remind\s+me)\b"),
                ],
            },
            IntentPatterns {
                intent: Intent::About,
                patterns: vec![
                    rx(r"\bwho\s+are\s+you\b"),
                    rx(r"\bwhat\s+can\s+you\s+do\b"),
                    rx(r"\babout\s+(?:you|yourself|the\s+(?:chain|company|brand|bot))\b"),
                    rx(r"\bhelp\b"),
                ],
            },
        ];

        Self { vocabulary, table }
    }

    /// Classify an utterance. Total: every input maps to some intent.
    pub fn classify(&self, utterance: &str, context: &SessionContextView) -> (Intent, f32) {
        let c = self.classify_detailed(utterance, context);
        (c.intent, c.confidence)
    }

    pub fn classify_detailed(
        &self,
        utterance: &str,
        context: &SessionContextView,
    ) -> Classification {
        let text = utterance.trim().to_lowercase();

        // Priority 0: injection shapes. Logged; never executed.
        if MALICIOUS_PATTERNS.iter().any(|p| p.is_match(&text)) {
            tracing::warn!("malicious input pattern detected");
            return Classification {
                intent: Intent::Malicious,
                confidence: 1.0,
                runner_up: None,
            };
        }

        // Garbage gate: mostly-symbol input or long repeat runs.
        if is_garbage(&text) {
            return Classification {
                intent: Intent::Unclear,
                confidence: 0.0,
                runner_up: None,
            };
        }

        // Out-of-domain topics, unless the utterance also talks about
        // the catalogue.
        if self.vocabulary.is_off_topic(&text)
            && !self.vocabulary.mentions_product_noun(&text)
            && !self.vocabulary.mentions_outlet_noun(&text)
        {
            return Classification {
                intent: Intent::Unclear,
                confidence: 0.8,
                runner_up: None,
            };
        }

        let mut scores: Vec<(Intent, f32)> = self
            .table
            .iter()
            .map(|entry| (entry.intent, self.score(&text, &entry.patterns)))
            .collect();

        // Context-aware follow-up boost: a pronoun plus a family keyword
        // keeps the user in the previous topic.
        if context.turn_count > 0 && PRONOUNS.is_match(&text) {
            match context.last_intent {
                Some(Intent::OutletSearch)
                    if !self.vocabulary.find_services(&text).is_empty()
                        || TIME_WORDS.is_match(&text) =>
                {
                    bump(&mut scores, Intent::OutletSearch, weights::CONTEXT_BOOST);
                }
                Some(Intent::ProductSearch)
                    if PRODUCT_ATTR_WORDS.is_match(&text)
                        || !self.vocabulary.find_materials(&text).is_empty() =>
                {
                    bump(&mut scores, Intent::ProductSearch, weights::CONTEXT_BOOST);
                }
                _ => {}
            }
        }

        self.resolve_conflicts(&text, &mut scores);

        // Deterministic argmax: table order breaks ties.
        let (mut best, mut best_score) = (Intent::Unclear, 0.0f32);
        let (mut second, mut second_score) = (Intent::Unclear, 0.0f32);
        for (intent, score) in &scores {
            if *score > best_score {
                second = best;
                second_score = best_score;
                best = *intent;
                best_score = *score;
            } else if *score > second_score {
                second = *intent;
                second_score = *score;
            }
        }

        if best_score < weights::UNCLEAR_THRESHOLD {
            return Classification {
                intent: Intent::Unclear,
                confidence: best_score,
                runner_up: None,
            };
        }

        Classification {
            intent: best,
            confidence: best_score.min(1.0),
            runner_up: (second_score > 0.0).then_some((second, second_score.min(1.0))),
        }
    }

    /// Each matching pattern adds a fixed score; a full-utterance match
    /// adds a bonus, partial matches scale with coverage.
    fn score(&self, text: &str, patterns: &[Regex]) -> f32 {
        let mut score = 0.0f32;
        let text_len = text.chars().count().max(1) as f32;

        for pattern in patterns {
            if let Some(found) = pattern.find(text) {
                score += weights::PATTERN_MATCH_SCORE;
                let match_len = found.as_str().chars().count() as f32;
                if (match_len / text_len) >= 0.99 {
                    score += weights::FULL_MATCH_BONUS;
                } else {
                    score += weights::PATTERN_MATCH_SCORE * (match_len / text_len);
                }
            }
        }

        score.min(1.0)
    }

    fn resolve_conflicts(&self, text: &str, scores: &mut Vec<(Intent, f32)>) {
        // Specific calculation shapes outrank PROMOTION_INQUIRY even
        // when the word "discount" appears.
        if CALC_DISCOUNT.is_match(text) || CALC_TOTAL_MULT.is_match(text) || CALC_TAX_ON.is_match(text)
        {
            set(scores, Intent::Calculation, 0.99);
        }

        // Outlet service keywords outrank generic product keywords.
        if !self.vocabulary.find_services(text).is_empty() {
            let product = get(scores, Intent::ProductSearch);
            let outlet = get(scores, Intent::OutletSearch);
            if outlet > 0.0 && product >= outlet {
                set(scores, Intent::OutletSearch, (product + 0.1).min(0.99));
            }
        }

        // Catalogue nouns with no operator are never calculations.
        let has_operator = OPERATOR_PRESENT.is_match(text);
        if !has_operator
            && (self.vocabulary.mentions_product_noun(text)
                || self.vocabulary.mentions_outlet_noun(text))
        {
            set(scores, Intent::Calculation, 0.0);
        }
    }
}

fn is_garbage(text: &str) -> bool {
    let non_space = text.chars().filter(|c| !c.is_whitespace()).count();
    if non_space == 0 {
        return true;
    }
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    if (alnum as f32 / non_space as f32) < weights::GARBAGE_ALNUM_RATIO {
        return true;
    }

    // Repeat runs are measured on the raw text: "aaaaa" is garbage,
    // "a a a a a" is merely odd.
    let mut run = 1usize;
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
            if run >= weights::GARBAGE_REPEAT_RUN {
                return true;
            }
        } else {
            run = 1;
            prev = Some(c);
        }
    }
    false
}

fn get(scores: &[(Intent, f32)], intent: Intent) -> f32 {
    scores
        .iter()
        .find(|(i, _)| *i == intent)
        .map(|(_, s)| *s)
        .unwrap_or(0.0)
}

fn set(scores: &mut Vec<(Intent, f32)>, intent: Intent, value: f32) {
    if let Some(entry) = scores.iter_mut().find(|(i, _)| *i == intent) {
        entry.1 = value;
    } else {
        scores.push((intent, value));
    }
}

fn bump(scores: &mut Vec<(Intent, f32)>, intent: Intent, delta: f32) {
    if let Some(entry) = scores.iter_mut().find(|(i, _)| *i == intent) {
        entry.1 = (entry.1 + delta).min(1.0);
    }
}
