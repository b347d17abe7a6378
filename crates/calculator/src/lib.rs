//! Safe natural-language arithmetic.
//!
//! `SafeCalculator::evaluate` accepts a free-form utterance and returns a
//! number (or a time delta) only when the utterance unambiguously denotes
//! arithmetic. Recognition is an ordered pattern cascade; the first
//! pattern that matches wins. Anything that survives to the final
//! fallback is evaluated by the restricted expression parser in
//! [`expr`], never by a general evaluator.
//!
//! Utterances that talk about catalogue items without an operator are
//! rejected with [`CalcError::NotACalculation`] so the planner can route
//! them to retrieval instead.

pub mod expr;
pub mod time;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Classified calculator failures; each maps to a distinct help template
/// in the response composer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("not a calculation")]
    NotACalculation,

    #[error("result is not a representable number")]
    InvalidResult,

    #[error("result out of range: {0}")]
    OutOfRange(String),
}

/// Structured result payload the composer renders from.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcDetail {
    Discount {
        percent: f64,
        base: f64,
        discount: f64,
        final_price: f64,
    },
    Total {
        quantity: f64,
        unit_price: f64,
        total: f64,
    },
    Sum {
        amounts: Vec<f64>,
        total: f64,
    },
    Split {
        amount: f64,
        people: f64,
        each: f64,
    },
    Average {
        values: Vec<f64>,
        result: f64,
    },
    Tax {
        label: String,
        rate: f64,
        base: f64,
        tax: f64,
        total: f64,
    },
    PercentOf {
        percent: f64,
        base: f64,
        result: f64,
    },
    Sqrt {
        operand: f64,
        result: f64,
    },
    Power {
        base: f64,
        exponent: f64,
        result: f64,
    },
    Arithmetic {
        result: f64,
    },
    WaitDuration {
        minutes: i64,
    },
    ClockTime {
        minutes: i64,
    },
}

/// A successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Numeric value; minutes for time results.
    pub value: f64,
    /// Normalised expression, echoed back to the user.
    pub normalized: String,
    /// Whether the utterance talked about currency.
    pub currency: bool,
    /// Whether this is a time-delta/clock result.
    pub time: bool,
    pub detail: CalcDetail,
}

macro_rules! rx {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pattern).unwrap());
    };
}

rx!(DIVIDE_BY_ZERO_WORDS, r"(?:divided?|division)\s+by\s+(?:zero|0)\b");
rx!(CURRENCY_TAG, r"\brm\s*\d|\brm\b|ringgit");

rx!(
    DISCOUNT,
    r"(\d+(?:\.\d+)?)\s*%\s*(?:discount|off)\s+on\s+(?:rm\s*)?(\d+(?:\.\d+)?)"
);

rx!(
    MULT_TOTAL,
    r"total\s+(?:price\s+)?for\s+(\d+(?:\.\d+)?)\s*[×x*]\s*rm\s*(\d+(?:\.\d+)?)"
);
rx!(MULT_PLAIN, r"(\d+(?:\.\d+)?)\s*[×*]\s*rm\s*(\d+(?:\.\d+)?)");
rx!(
    MULT_UNITS,
    r"(\d+(?:\.\d+)?)\s*units?\s+of\s+(?:rm\s*)?(\d+(?:\.\d+)?)"
);
rx!(
    MULT_ITEMS_AT,
    r"(\d+(?:\.\d+)?)\s*(?:items?|units?|mugs?|cups?|drinks?|tumblers?|things?)\s+at\s+rm\s*(\d+(?:\.\d+)?)(?:\s*each)?"
);
rx!(
    MULT_TOTAL_AT,
    r"total\s+(?:price\s+)?for\s+(\d+(?:\.\d+)?)\s*(?:items?|units?)?\s*at\s+rm\s*(\d+(?:\.\d+)?)(?:\s*each)?"
);
rx!(
    MULT_BUY_EACH,
    r"buy\s+(\d+(?:\.\d+)?)\s+(?:\w+\s+)?(?:drinks?|items?|cups?|mugs?|tumblers?|things?)\s+(?:for|at)\s+rm\s*(\d+(?:\.\d+)?)\s*each"
);
rx!(
    MULT_COST_EACH,
    r"(\d+(?:\.\d+)?)\s+(?:drinks?|items?|cups?|mugs?|tumblers?|things?)\s+(?:for|costing|cost)\s+rm\s*(\d+(?:\.\d+)?)\s*each"
);

rx!(SUM_TAIL, r"(?:add\s+up|sum(?:\s+up)?)\s+(.+)$");
rx!(NUMBER, r"\d+(?:\.\d+)?");

rx!(
    SPLIT,
    r"(?:split|divide)\s+rm\s*(\d+(?:\.\d+)?)\s+(?:among|between)\s+(\d+)\s+(?:people|persons?|friends?|pax)"
);

rx!(AVERAGE_TAIL, r"average\s+(?:price\s+)?of\s+(.+)$");

rx!(
    TAX_RATED,
    r"(\d+(?:\.\d+)?)\s*%\s*(sst|tax|gst|service\s+charge)\s+(?:on|to|for)\s+(?:rm\s*)?(\d+(?:\.\d+)?)"
);
rx!(
    TAX_AMOUNT_FIRST,
    r"rm\s*(\d+(?:\.\d+)?)\s+(?:plus|with)\s+(\d+(?:\.\d+)?)\s*%\s*(sst|tax|gst|service\s+charge)"
);
rx!(
    TAX_DEFAULT,
    r"(sst|tax|gst|service\s+charge)\s+(?:on|for)\s+(?:rm\s*)?(\d+(?:\.\d+)?)"
);
rx!(TAX_MENTION, r"\b(?:sst|gst|tax)\b");

rx!(
    PERCENT_OF,
    r"(\d+(?:\.\d+)?)\s*(?:%|percent)\s+of\s+(?:rm\s*)?(\d+(?:\.\d+)?)"
);

rx!(
    SQRT,
    r"(?:square\s+root\s+of|sqrt\s*\(?|√)\s*(\d+(?:\.\d+)?)"
);

rx!(
    POWER,
    r"(\d+(?:\.\d+)?)\s*(?:to\s+the\s+power\s+of|\*\*|\^)\s*(\d+(?:\.\d+)?)"
);

rx!(
    REVERSE_BUY,
    r"how\s+many\s+(?:\w+\s+)?(?:drinks?|items?|cups?|mugs?|things?).*?rm\s*(\d+(?:\.\d+)?).*?(?:each\s+)?costs?\s+rm\s*(\d+(?:\.\d+)?)"
);

rx!(
    SPEND_DAYS,
    r"spend\s+rm\s*(\d+(?:\.\d+)?)\s+(?:a\s+|per\s+)?day\s+for\s+(\d+)\s+days?"
);

// Time cascade.
rx!(
    WAIT_OPEN_FIRST,
    r"opens?\s+at\s+(\d{1,2}(?:[:.]\d{2})?\s*(?:am|pm)?)\s+and\s+.*?arrive\s+at\s+(\d{1,2}(?:[:.]\d{2})?\s*(?:am|pm)?)"
);
rx!(
    WAIT_ARRIVE_FIRST,
    r"arrive\s+at\s+(\d{1,2}(?:[:.]\d{2})?\s*(?:am|pm)?)\s+.*?opens?\s+at\s+(\d{1,2}(?:[:.]\d{2})?\s*(?:am|pm)?)"
);
rx!(
    ADD_MINUTES,
    r"add\s+(\d+)\s+minutes?\s+to\s+(\d{1,2}[:.]\d{2}\s*(?:am|pm)?)"
);
rx!(
    WAIT_FROM_NOW,
    r"wait\s+(\d+)\s+minutes?.*?current\s+time\s+is\s+(\d{1,2}[:.]\d{2}\s*(?:am|pm)?)"
);
rx!(
    HOURS_TO_MINUTES,
    r"how\s+many\s+minutes?\s+in\s+(\d+(?:\.\d+)?)\s+hours?"
);
rx!(
    MINUTES_TO_HOURS,
    r"(?:convert\s+)?(\d+(?:\.\d+)?)\s+minutes?\s+(?:to|in)\s+hours?"
);
rx!(
    WORK_WEEK,
    r"work\s+(\d+(?:\.\d+)?)\s+hours?\s+(?:a\s+|per\s+)?day.*week"
);
rx!(
    DRINK_MONTH,
    r"drink\s+(\d+(?:\.\d+)?)\s+(?:cups?|drinks?)\s+(?:a\s+|per\s+)?day.*month"
);

rx!(OPERATOR_CHARS, r"[+*/×÷=%]|\s-\s|\d-\d");
rx!(CURRENCY_STRIP, r"\brm\s*|\$\s*");
rx!(MINUS_OP, r"\d\s*-|\s-\s");
rx!(
    WORD_OPERATORS,
    r"\b(?:plus|minus|times|divided\s+by|multiplied\s+by|sqrt|square\s+root)\b"
);
rx!(
    COMMAND_WORDS,
    r"\b(?:calculate|compute|solve|find|what\s+is|whats|what's|equals?|the\s+result\s+of|how\s+much\s+is)\b"
);

/// In mixed amount/rate utterances, values at or above this are taken
/// as prices and smaller ones as percentages.
const PRICE_ASSUMPTION_MIN: f64 = 10.0;

const DEFAULT_CATALOGUE_NOUNS: &[&str] = &[
    "product", "products", "mug", "mugs", "tumbler", "tumblers", "cup", "cups", "outlet",
    "outlets", "store", "coffee", "latte", "cappuccino", "americano", "croissant",
    "drinkware", "bottle", "bottles", "flask",
];

/// The safe calculator. Stateless apart from its configuration, so
/// evaluation is a pure function of the utterance.
#[derive(Debug, Clone)]
pub struct SafeCalculator {
    sst_rate: f64,
    service_charge_rate: f64,
    catalogue_nouns: Vec<String>,
}

impl Default for SafeCalculator {
    fn default() -> Self {
        Self::new(0.06)
    }
}

impl SafeCalculator {
    pub fn new(sst_rate: f64) -> Self {
        Self {
            sst_rate,
            service_charge_rate: 0.10,
            catalogue_nouns: DEFAULT_CATALOGUE_NOUNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the catalogue-noun list used for the not-a-calculation
    /// rejection (wired from the vocabulary tables at startup).
    pub fn with_catalogue_nouns(mut self, nouns: Vec<String>) -> Self {
        if !nouns.is_empty() {
            self.catalogue_nouns = nouns;
        }
        self
    }

    /// Evaluate a free-form utterance.
    pub fn evaluate(&self, utterance: &str) -> Result<Evaluation, CalcError> {
        let lower = utterance.trim().to_lowercase();
        if lower.is_empty() {
            return Err(CalcError::NotACalculation);
        }
        let currency = CURRENCY_TAG.is_match(&lower);

        if DIVIDE_BY_ZERO_WORDS.is_match(&lower) {
            return Err(CalcError::DivisionByZero);
        }

        if let Some(result) = self.try_time(&lower) {
            return result;
        }
        if let Some(result) = self.try_discount(&lower, currency) {
            return result;
        }
        if let Some(result) = self.try_multiplication(&lower) {
            return result;
        }
        if let Some(result) = self.try_sum(&lower) {
            return result;
        }
        if let Some(result) = self.try_split(&lower) {
            return result;
        }
        if let Some(result) = self.try_average(&lower, currency) {
            return result;
        }
        if let Some(result) = self.try_tax(&lower) {
            return result;
        }
        if let Some(result) = self.try_percent_of(&lower, currency) {
            return result;
        }
        if let Some(result) = self.try_sqrt(&lower) {
            return result;
        }
        if let Some(result) = self.try_power(&lower) {
            return result;
        }
        if let Some(result) = self.try_reverse_purchase(&lower) {
            return result;
        }
        if let Some(result) = self.try_spending(&lower) {
            return result;
        }

        // Catalogue talk with no operator goes back to retrieval.
        let has_operator = OPERATOR_CHARS.is_match(&lower) || WORD_OPERATORS.is_match(&lower);
        if !has_operator && self.mentions_catalogue(&lower) {
            return Err(CalcError::NotACalculation);
        }

        self.try_pure_arithmetic(&lower, currency)
    }

    fn mentions_catalogue(&self, lower: &str) -> bool {
        self.catalogue_nouns
            .iter()
            .any(|noun| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == noun))
    }

    fn try_time(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        for (pattern, open_first) in [(&*WAIT_OPEN_FIRST, true), (&*WAIT_ARRIVE_FIRST, false)] {
            if let Some(caps) = pattern.captures(lower) {
                let (first, second) = (caps.get(1)?.as_str(), caps.get(2)?.as_str());
                let (open_str, arrive_str) = if open_first {
                    (first, second)
                } else {
                    (second, first)
                };
                let open = time::parse_clock(open_str)?;
                let arrive = time::parse_clock(arrive_str)?;
                let minutes = time::wait_minutes(open, arrive);
                return Some(Ok(Evaluation {
                    value: minutes as f64,
                    normalized: format!(
                        "{} - {}",
                        time::format_clock(open),
                        time::format_clock(arrive)
                    ),
                    currency: false,
                    time: true,
                    detail: CalcDetail::WaitDuration { minutes },
                }));
            }
        }

        if let Some(caps) = ADD_MINUTES.captures(lower) {
            let delta: i64 = caps.get(1)?.as_str().parse().ok()?;
            let base = time::parse_clock(caps.get(2)?.as_str())?;
            let minutes = time::add_minutes(base, delta);
            return Some(Ok(Evaluation {
                value: minutes as f64,
                normalized: format!("{} + {} minutes", time::format_clock(base), delta),
                currency: false,
                time: true,
                detail: CalcDetail::ClockTime { minutes },
            }));
        }

        if let Some(caps) = WAIT_FROM_NOW.captures(lower) {
            let delta: i64 = caps.get(1)?.as_str().parse().ok()?;
            let base = time::parse_clock(caps.get(2)?.as_str())?;
            let minutes = time::add_minutes(base, delta);
            return Some(Ok(Evaluation {
                value: minutes as f64,
                normalized: format!("{} + {} minutes", time::format_clock(base), delta),
                currency: false,
                time: true,
                detail: CalcDetail::ClockTime { minutes },
            }));
        }

        if let Some(caps) = HOURS_TO_MINUTES.captures(lower) {
            let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
            let result = hours * 60.0;
            return Some(Ok(Evaluation {
                value: result,
                normalized: format!("{} * 60", fmt_num(hours)),
                currency: false,
                time: false,
                detail: CalcDetail::Arithmetic { result },
            }));
        }

        if let Some(caps) = MINUTES_TO_HOURS.captures(lower) {
            let minutes: f64 = caps.get(1)?.as_str().parse().ok()?;
            let result = minutes / 60.0;
            return Some(Ok(Evaluation {
                value: result,
                normalized: format!("{} / 60", fmt_num(minutes)),
                currency: false,
                time: false,
                detail: CalcDetail::Arithmetic { result },
            }));
        }

        if let Some(caps) = WORK_WEEK.captures(lower) {
            let daily: f64 = caps.get(1)?.as_str().parse().ok()?;
            let result = daily * 7.0;
            return Some(Ok(Evaluation {
                value: result,
                normalized: format!("{} * 7", fmt_num(daily)),
                currency: false,
                time: false,
                detail: CalcDetail::Arithmetic { result },
            }));
        }

        if let Some(caps) = DRINK_MONTH.captures(lower) {
            let daily: f64 = caps.get(1)?.as_str().parse().ok()?;
            let result = daily * 30.0;
            return Some(Ok(Evaluation {
                value: result,
                normalized: format!("{} * 30", fmt_num(daily)),
                currency: false,
                time: false,
                detail: CalcDetail::Arithmetic { result },
            }));
        }

        None
    }

    fn try_discount(&self, lower: &str, currency: bool) -> Option<Result<Evaluation, CalcError>> {
        let caps = DISCOUNT.captures(lower)?;
        let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
        let base: f64 = caps.get(2)?.as_str().parse().ok()?;
        let discount = (percent / 100.0) * base;
        let final_price = base - discount;
        Some(Ok(Evaluation {
            value: final_price,
            normalized: format!("{} - ({}/100) * {}", fmt_num(base), fmt_num(percent), fmt_num(base)),
            currency,
            time: false,
            detail: CalcDetail::Discount {
                percent,
                base,
                discount,
                final_price,
            },
        }))
    }

    fn try_multiplication(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        for pattern in [
            &*MULT_TOTAL,
            &*MULT_PLAIN,
            &*MULT_UNITS,
            &*MULT_BUY_EACH,
            &*MULT_ITEMS_AT,
            &*MULT_TOTAL_AT,
            &*MULT_COST_EACH,
        ] {
            if let Some(caps) = pattern.captures(lower) {
                let quantity: f64 = caps.get(1)?.as_str().parse().ok()?;
                let unit_price: f64 = caps.get(2)?.as_str().parse().ok()?;
                let total = quantity * unit_price;
                return Some(Ok(Evaluation {
                    value: total,
                    normalized: format!("{} * {}", fmt_num(quantity), fmt_num(unit_price)),
                    currency: true,
                    time: false,
                    detail: CalcDetail::Total {
                        quantity,
                        unit_price,
                        total,
                    },
                }));
            }
        }
        None
    }

    fn try_sum(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let caps = SUM_TAIL.captures(lower)?;
        let tail = caps.get(1)?.as_str();
        let amounts: Vec<f64> = NUMBER
            .find_iter(tail)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if amounts.len() < 2 {
            return None;
        }
        let total: f64 = amounts.iter().sum();
        let normalized = amounts
            .iter()
            .map(|v| fmt_num(*v))
            .collect::<Vec<_>>()
            .join(" + ");
        Some(Ok(Evaluation {
            value: total,
            normalized,
            currency: CURRENCY_TAG.is_match(lower),
            time: false,
            detail: CalcDetail::Sum { amounts, total },
        }))
    }

    fn try_split(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let caps = SPLIT.captures(lower)?;
        let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
        let people: f64 = caps.get(2)?.as_str().parse().ok()?;
        if people == 0.0 {
            return Some(Err(CalcError::DivisionByZero));
        }
        let each = amount / people;
        Some(Ok(Evaluation {
            value: each,
            normalized: format!("{} / {}", fmt_num(amount), fmt_num(people)),
            currency: true,
            time: false,
            detail: CalcDetail::Split {
                amount,
                people,
                each,
            },
        }))
    }

    fn try_average(&self, lower: &str, currency: bool) -> Option<Result<Evaluation, CalcError>> {
        let caps = AVERAGE_TAIL.captures(lower)?;
        let tail = caps.get(1)?.as_str();
        let values: Vec<f64> = NUMBER
            .find_iter(tail)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if values.len() < 2 {
            return None;
        }
        let result = values.iter().sum::<f64>() / values.len() as f64;
        let joined = values
            .iter()
            .map(|v| fmt_num(*v))
            .collect::<Vec<_>>()
            .join(" + ");
        Some(Ok(Evaluation {
            value: result,
            normalized: format!("({}) / {}", joined, values.len()),
            currency,
            time: false,
            detail: CalcDetail::Average { values, result },
        }))
    }

    fn try_tax(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let (label, rate, base) = if let Some(caps) = TAX_RATED.captures(lower) {
            let rate: f64 = caps.get(1)?.as_str().parse::<f64>().ok()? / 100.0;
            let label = tax_label(caps.get(2)?.as_str());
            let base: f64 = caps.get(3)?.as_str().parse().ok()?;
            (label, rate, base)
        } else if let Some(caps) = TAX_AMOUNT_FIRST.captures(lower) {
            let base: f64 = caps.get(1)?.as_str().parse().ok()?;
            let rate: f64 = caps.get(2)?.as_str().parse::<f64>().ok()? / 100.0;
            let label = tax_label(caps.get(3)?.as_str());
            (label, rate, base)
        } else if let Some(caps) = TAX_DEFAULT.captures(lower) {
            let label = tax_label(caps.get(1)?.as_str());
            let rate = if label == "Service Charge" {
                self.service_charge_rate
            } else {
                self.sst_rate
            };
            let base: f64 = caps.get(2)?.as_str().parse().ok()?;
            (label, rate, base)
        } else if TAX_MENTION.is_match(lower) {
            // Loose form: the largest value at or above the threshold is
            // the price; a smaller value, if present, is the rate.
            let numbers: Vec<f64> = NUMBER
                .find_iter(lower)
                .filter_map(|m| m.as_str().parse().ok())
                .collect();
            let base = numbers
                .iter()
                .copied()
                .filter(|n| *n >= PRICE_ASSUMPTION_MIN)
                .fold(f64::NEG_INFINITY, f64::max);
            if !base.is_finite() {
                return None;
            }
            let rate = numbers
                .iter()
                .copied()
                .find(|n| *n > 0.0 && *n < PRICE_ASSUMPTION_MIN)
                .map(|p| p / 100.0)
                .unwrap_or(self.sst_rate);
            let label = if lower.contains("gst") {
                "GST".to_string()
            } else if lower.contains("sst") {
                "SST".to_string()
            } else {
                "Tax".to_string()
            };
            (label, rate, base)
        } else {
            return None;
        };

        let tax = base * rate;
        let total = base + tax;
        Some(Ok(Evaluation {
            value: total,
            normalized: format!("{} + {} * {}", fmt_num(base), fmt_num(base), fmt_num(rate)),
            currency: true,
            time: false,
            detail: CalcDetail::Tax {
                label,
                rate,
                base,
                tax,
                total,
            },
        }))
    }

    fn try_percent_of(&self, lower: &str, currency: bool) -> Option<Result<Evaluation, CalcError>> {
        // Tax wording is handled one step earlier with a breakdown.
        if lower.contains("sst") || lower.contains("gst") || lower.contains("tax") {
            return None;
        }
        let caps = PERCENT_OF.captures(lower)?;
        let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
        let base: f64 = caps.get(2)?.as_str().parse().ok()?;
        let result = (percent / 100.0) * base;
        Some(Ok(Evaluation {
            value: result,
            normalized: format!("({}/100) * {}", fmt_num(percent), fmt_num(base)),
            currency,
            time: false,
            detail: CalcDetail::PercentOf {
                percent,
                base,
                result,
            },
        }))
    }

    fn try_sqrt(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let caps = SQRT.captures(lower)?;
        let operand: f64 = caps.get(1)?.as_str().parse().ok()?;
        let result = operand.sqrt();
        if !result.is_finite() {
            return Some(Err(CalcError::InvalidResult));
        }
        Some(Ok(Evaluation {
            value: result,
            normalized: format!("sqrt({})", fmt_num(operand)),
            currency: false,
            time: false,
            detail: CalcDetail::Sqrt { operand, result },
        }))
    }

    fn try_power(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let caps = POWER.captures(lower)?;
        let base: f64 = caps.get(1)?.as_str().parse().ok()?;
        let exponent: f64 = caps.get(2)?.as_str().parse().ok()?;
        let result = base.powf(exponent);
        if !result.is_finite() {
            return Some(Err(CalcError::OutOfRange(format!(
                "{}^{} overflows",
                fmt_num(base),
                fmt_num(exponent)
            ))));
        }
        Some(Ok(Evaluation {
            value: result,
            normalized: format!("{}^{}", fmt_num(base), fmt_num(exponent)),
            currency: false,
            time: false,
            detail: CalcDetail::Power {
                base,
                exponent,
                result,
            },
        }))
    }

    fn try_reverse_purchase(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let caps = REVERSE_BUY.captures(lower)?;
        let total: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit: f64 = caps.get(2)?.as_str().parse().ok()?;
        if unit == 0.0 {
            return Some(Err(CalcError::DivisionByZero));
        }
        let result = (total / unit).floor();
        Some(Ok(Evaluation {
            value: result,
            normalized: format!("{} / {}", fmt_num(total), fmt_num(unit)),
            currency: false,
            time: false,
            detail: CalcDetail::Arithmetic { result },
        }))
    }

    fn try_spending(&self, lower: &str) -> Option<Result<Evaluation, CalcError>> {
        let caps = SPEND_DAYS.captures(lower)?;
        let daily: f64 = caps.get(1)?.as_str().parse().ok()?;
        let days: f64 = caps.get(2)?.as_str().parse().ok()?;
        let total = daily * days;
        Some(Ok(Evaluation {
            value: total,
            normalized: format!("{} * {}", fmt_num(daily), fmt_num(days)),
            currency: true,
            time: false,
            detail: CalcDetail::Total {
                quantity: days,
                unit_price: daily,
                total,
            },
        }))
    }

    fn try_pure_arithmetic(
        &self,
        lower: &str,
        currency: bool,
    ) -> Result<Evaluation, CalcError> {
        // Fixed surface-form replacements. Everything beyond these must
        // already be whitelisted; nothing is silently stripped.
        let mut text = lower.replace('×', "*").replace('÷', "/");
        text = COMMAND_WORDS.replace_all(&text, " ").to_string();
        text = CURRENCY_STRIP.replace_all(&text, "").to_string();
        text = text
            .replace("multiplied by", "*")
            .replace("divided by", "/")
            .replace(" plus ", " + ")
            .replace(" minus ", " - ")
            .replace(" times ", " * ");
        let text = text.trim().trim_end_matches(['?', '!', '.', '=']).trim();

        if text.is_empty() || !text.chars().any(|c| c.is_ascii_digit()) {
            return Err(CalcError::NotACalculation);
        }
        let has_operator = text.contains(['+', '*', '/']) || MINUS_OP.is_match(text);
        if !has_operator {
            return Err(CalcError::NotACalculation);
        }

        let allowed = |c: char| {
            c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.' | ',' | '%' | ' ')
        };
        if !text.chars().all(allowed) {
            return Err(CalcError::InvalidExpression(
                "only numbers and + - * / ( ) . % are allowed".to_string(),
            ));
        }

        let result = expr::evaluate(text)?;
        Ok(Evaluation {
            value: result,
            normalized: text.split_whitespace().collect::<Vec<_>>().join(" "),
            currency,
            time: false,
            detail: CalcDetail::Arithmetic { result },
        })
    }
}

fn tax_label(raw: &str) -> String {
    match raw {
        "sst" => "SST".to_string(),
        "gst" => "GST".to_string(),
        "service charge" => "Service Charge".to_string(),
        _ => "Tax".to_string(),
    }
}

/// Format a number without trailing zeros ("2" rather than "2.0", but
/// "39.5" stays as-is).
pub fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
