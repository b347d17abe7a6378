//! Response composition.
//!
//! Converts tagged tool results into reply text. Side-effect free and
//! deterministic given its inputs: the current weekday is an argument,
//! never read from the clock, and raw error text never reaches the
//! user; every error kind maps to a templated help message.

use chrono::Weekday;

use kopibot_calculator::{fmt_num, time, CalcDetail, CalcError, Evaluation};
use kopibot_config::constants::retrieval as consts;
use kopibot_core::{Outlet, Product, Slots, TimeQuery};
use kopibot_retrieval::{resolve_hours, HoursAnswer, OutletQueryResult};

/// Money rendering used in every reply: "RM 63.20".
pub fn rm(value: f64) -> String {
    format!("RM {:.2}", value)
}

pub struct Composer {
    chain_name: String,
}

impl Composer {
    pub fn new(chain_name: impl Into<String>) -> Self {
        Self {
            chain_name: chain_name.into(),
        }
    }

    // ---- canned replies -------------------------------------------------

    pub fn welcome(&self) -> String {
        format!(
            "Hello! I'm the {} assistant. I can help with our drinkware products, \
             outlet locations and hours, and quick price calculations. What would you like to know?",
            self.chain_name
        )
    }

    pub fn goodbye(&self) -> String {
        format!(
            "Thanks for stopping by {}. See you next time!",
            self.chain_name
        )
    }

    pub fn about(&self) -> String {
        format!(
            "{} is a Malaysian specialty coffee chain. I can look up our drinkware \
             catalogue, find outlets near you with their opening hours and services, \
             and work out prices, discounts, and SST for you.",
            self.chain_name
        )
    }

    pub fn refusal(&self) -> String {
        "For security reasons I can't process that request. I'm happy to help with \
         our products, outlet locations, or price calculations instead."
            .to_string()
    }

    pub fn clarification(&self) -> String {
        format!(
            "I'm not sure what you're after. I can help with:\n\
             • Products: \"show me tumblers\", \"cheapest ceramic mug\"\n\
             • Outlets: \"outlets in Petaling Jaya\", \"do they have drive-thru?\"\n\
             • Calculations: \"20% discount on RM79\", \"6% SST on RM55\"\n\
             What would you like to know about {}?",
            self.chain_name
        )
    }

    pub fn fallback(&self) -> String {
        "I'm having trouble right now. Please try again in a moment.".to_string()
    }

    pub fn ask_product_type(&self) -> String {
        "Sure! What kind of product are you after? We carry tumblers, cups, mugs, and \
         other drinkware. You can also filter, for example \"stainless steel tumblers \
         under RM80\"."
            .to_string()
    }

    pub fn ask_outlet_area(&self) -> String {
        "Which area should I look in? Try a city like Kuala Lumpur or Petaling Jaya, \
         a landmark like Mid Valley, or a service like drive-thru."
            .to_string()
    }

    pub fn ask_calculation(&self) -> String {
        "I can help with calculations! Try one of these:\n\
         • 2 + 3 * 4\n\
         • 15% of 120\n\
         • 20% discount on RM79\n\
         • 6% SST on RM55\n\
         • square root of 64"
            .to_string()
    }

    // ---- product replies ------------------------------------------------

    /// Render a product result set. `catalogue_size` lets a budget-only
    /// query that matched everything ask for narrowing.
    pub fn products(
        &self,
        query: &str,
        slots: &Slots,
        results: &[Product],
        summary: &str,
        catalogue_size: usize,
    ) -> String {
        if results.is_empty() {
            return format!(
                "No products matched \"{}\". Try a category like tumblers, cups, or mugs, \
                 a material like ceramic or stainless steel, or ask me to show all products.",
                query.trim()
            );
        }

        if results.len() == 1 {
            return self.single_product(&results[0]);
        }

        let mut lines = vec![summary.to_string(), String::new()];
        for (i, product) in results.iter().enumerate() {
            lines.push(self.product_entry(i + 1, product));
        }

        if slots.budget.is_some()
            && !slots.has_outlet_filters()
            && slots.materials.is_empty()
            && slots.collections.is_empty()
            && results.len() == catalogue_size
        {
            lines.push(
                "That covers our whole range. Tell me a product type (tumbler, cup, mug) \
                 to narrow things down."
                    .to_string(),
            );
        }

        lines.join("\n")
    }

    fn single_product(&self, product: &Product) -> String {
        let mut lines = vec![format!("**{}**", product.name)];
        lines.push(format!("Price: {}", self.price_line(product)));
        if let Some(capacity) = &product.capacity {
            lines.push(format!("Capacity: {}", capacity));
        }
        lines.push(format!("Material: {}", product.material.label()));
        if let Some(collection) = product.collection {
            lines.push(format!("Collection: {}", collection.label()));
        }
        if !product.colors.is_empty() {
            lines.push(format!("Colors: {}", truncated_list(&product.colors, 3)));
        }
        if !product.features.is_empty() {
            let labels: Vec<String> =
                product.features.iter().map(|f| f.label().to_string()).collect();
            lines.push(format!("Features: {}", truncated_list(&labels, 3)));
        }
        lines.push(format!(
            "A solid pick from {} — would you like anything else compared against it?",
            self.chain_name
        ));
        lines.join("\n")
    }

    fn product_entry(&self, index: usize, product: &Product) -> String {
        let mut entry = format!("{}. **{}** — {}", index, product.name, self.price_line(product));
        if let Some(capacity) = &product.capacity {
            entry.push_str(&format!("\n   Capacity: {} | Material: {}", capacity, product.material.label()));
        } else {
            entry.push_str(&format!("\n   Material: {}", product.material.label()));
        }
        if let Some(collection) = product.collection {
            entry.push_str(&format!(" | Collection: {}", collection.label()));
        }
        if !product.colors.is_empty() {
            entry.push_str(&format!("\n   Colors: {}", truncated_list(&product.colors, 3)));
        }
        if !product.features.is_empty() {
            let labels: Vec<String> =
                product.features.iter().map(|f| f.label().to_string()).collect();
            entry.push_str(&format!("\n   Features: {}", truncated_list(&labels, 3)));
        }
        entry
    }

    fn price_line(&self, product: &Product) -> String {
        if product.on_sale {
            if let Some(regular) = product.regular_price {
                return format!("{} (was {}) — ON SALE", product.price, rm(regular));
            }
            return format!("{} — ON SALE", product.price);
        }
        if let Some(promotion) = &product.promotion {
            return format!("{} ({})", product.price, promotion);
        }
        product.price.clone()
    }

    /// Promotion inquiry summary built from the catalogue, never invented.
    pub fn promotions(&self, items: &[Product]) -> String {
        if items.is_empty() {
            return format!(
                "No promotions are running right now. The {} catalogue is still worth a \
                 look — ask me for the cheapest tumbler or our latest collections!",
                self.chain_name
            );
        }
        let mut lines = vec![format!("Current {} promotions:", self.chain_name), String::new()];
        for (i, product) in items.iter().enumerate() {
            let note = product
                .promotion
                .clone()
                .unwrap_or_else(|| "on sale".to_string());
            lines.push(format!(
                "{}. **{}** — {} ({})",
                i + 1,
                product.name,
                self.price_line(product),
                note
            ));
        }
        lines.join("\n")
    }

    // ---- outlet replies -------------------------------------------------

    /// Render an outlet result set. `today` is passed in so composition
    /// stays deterministic.
    pub fn outlets(
        &self,
        query: &str,
        result: &OutletQueryResult,
        today: Weekday,
    ) -> String {
        if result.outlets.is_empty() {
            let filters = result.filters.describe();
            let applied = if filters.is_empty() {
                String::new()
            } else {
                format!(" ({})", filters)
            };
            return format!(
                "No outlets match{} for \"{}\". Try Kuala Lumpur, Petaling Jaya, or \
                 Selangor, a landmark like Mid Valley, or a service like dine-in or drive-thru.",
                applied,
                query.trim()
            );
        }

        // Time questions answer for the best match instead of listing.
        if let Some(time_query) = result.filters.time_query {
            return self.outlet_hours_reply(&result.outlets[0], time_query, today);
        }

        if result.outlets.len() == 1 {
            let outlet = &result.outlets[0];
            let mut lines = vec![format!("**{}**", outlet.name)];
            lines.push(format!("Address: {}", outlet.address));
            lines.push(format!("Hours: {}", hours_display(outlet, today)));
            lines.push(format!("Services: {}", services_display(outlet)));
            return lines.join("\n");
        }

        let place = result
            .filters
            .cities
            .first()
            .map(|c| title_case(c))
            .unwrap_or_default();
        let mut lines = if place.is_empty() {
            vec![format!("Found {} {} outlets:", result.total, self.chain_name)]
        } else {
            vec![format!(
                "Found {} {} outlets in {}:",
                result.total, self.chain_name, place
            )]
        };
        lines.push(String::new());

        let display = result.outlets.iter().take(consts::OUTLET_DISPLAY_CAP);
        for (i, outlet) in display.enumerate() {
            lines.push(format!(
                "{}. **{}**\n   {}\n   {} | {}",
                i + 1,
                outlet.name,
                outlet.address,
                hours_display(outlet, today),
                services_display(outlet)
            ));
        }

        if result.total > result.outlets.len().min(consts::OUTLET_DISPLAY_CAP) {
            let shown = result.outlets.len().min(consts::OUTLET_DISPLAY_CAP);
            lines.push(format!("... and {} more.", result.total - shown));
        }
        lines.push(format!("Total: {} outlets.", result.total));

        lines.join("\n")
    }

    fn outlet_hours_reply(&self, outlet: &Outlet, time_query: TimeQuery, today: Weekday) -> String {
        let hours = hours_display(outlet, today);
        match (time_query, resolve_hours(outlet, today)) {
            (TimeQuery::Opening, HoursAnswer::Parsed(day)) => format!(
                "**{}** opens at {} today.\nFull hours: {}\nAddress: {}",
                outlet.name,
                kopibot_core::outlet::format_clock(day.open),
                hours,
                outlet.address
            ),
            (TimeQuery::Closing, HoursAnswer::Parsed(day)) => format!(
                "**{}** closes at {} today.\nFull hours: {}\nAddress: {}",
                outlet.name,
                kopibot_core::outlet::format_clock(day.close),
                hours,
                outlet.address
            ),
            // Unparsed hours are reported verbatim, never fabricated.
            (_, HoursAnswer::Verbatim(raw)) => format!(
                "**{}** hours: {}\nAddress: {}",
                outlet.name, raw, outlet.address
            ),
            (_, HoursAnswer::Unavailable) => format!(
                "**{}** — hours not available.\nAddress: {}",
                outlet.name, outlet.address
            ),
            (TimeQuery::FullHours, HoursAnswer::Parsed(_)) => format!(
                "**{}** hours: {}\nAddress: {}\nServices: {}",
                outlet.name,
                hours,
                outlet.address,
                services_display(outlet)
            ),
        }
    }

    /// Context recall over the remembered entity lists.
    pub fn recall_products(&self, products: &[Product]) -> String {
        let mut lines = vec!["Here's what we were looking at:".to_string(), String::new()];
        for (i, product) in products.iter().enumerate() {
            lines.push(format!(
                "{}. **{}** — {}",
                i + 1,
                product.name,
                self.price_line(product)
            ));
        }
        lines.join("\n")
    }

    pub fn recall_outlets(&self, outlets: &[Outlet], today: Weekday) -> String {
        let mut lines = vec!["Here's what we were looking at:".to_string(), String::new()];
        for (i, outlet) in outlets.iter().enumerate() {
            lines.push(format!(
                "{}. **{}** — {} ({})",
                i + 1,
                outlet.name,
                outlet.address,
                hours_display(outlet, today)
            ));
        }
        lines.join("\n")
    }

    pub fn recall_empty(&self) -> String {
        "We haven't looked at anything yet this session. Ask me about products or \
         outlets and I'll keep track."
            .to_string()
    }

    // ---- calculator replies ---------------------------------------------

    pub fn calculation(&self, original_query: &str, outcome: &Result<Evaluation, CalcError>) -> String {
        match outcome {
            Ok(evaluation) => self.calculation_ok(evaluation),
            Err(kind) => self.calculation_err(original_query, kind),
        }
    }

    fn calculation_ok(&self, evaluation: &Evaluation) -> String {
        let money = |v: f64| {
            if evaluation.currency {
                rm(v)
            } else {
                format!("{:.2}", v)
            }
        };

        match &evaluation.detail {
            CalcDetail::Discount {
                percent,
                base,
                discount,
                final_price,
            } => format!(
                "Here's your discount calculation: {}% discount on {}\n\
                 • Discount amount: {}\n\
                 • Final price: {}",
                fmt_num(*percent),
                rm(*base),
                rm(*discount),
                rm(*final_price)
            ),
            CalcDetail::Total {
                quantity,
                unit_price,
                total,
            } => format!(
                "Here's your calculation: {} × {} = {}",
                fmt_num(*quantity),
                rm(*unit_price),
                rm(*total)
            ),
            CalcDetail::Sum { amounts, total } => {
                let parts: Vec<String> = amounts.iter().map(|a| rm(*a)).collect();
                format!("Here's your calculation: {} = {}", parts.join(" + "), rm(*total))
            }
            CalcDetail::Split {
                amount,
                people,
                each,
            } => format!(
                "Splitting {} among {} comes to {} each.",
                rm(*amount),
                fmt_num(*people),
                rm(*each)
            ),
            CalcDetail::Average { values, result } => format!(
                "The average of those {} values is {}.",
                values.len(),
                money(*result)
            ),
            CalcDetail::Tax {
                label,
                rate,
                base,
                tax,
                total,
            } => format!(
                "{} calculation: Subtotal: {} | {} ({}%): {} | Total: {}\n\
                 Malaysia's standard SST is 6% on goods and services.",
                label,
                rm(*base),
                label,
                fmt_num(rate * 100.0),
                rm(*tax),
                rm(*total)
            ),
            CalcDetail::PercentOf {
                percent,
                base,
                result,
            } => format!(
                "{}% of {} = {}",
                fmt_num(*percent),
                money(*base),
                money(*result)
            ),
            CalcDetail::Sqrt { operand, result } => {
                format!("√{} = {}", fmt_num(*operand), format_result(*result))
            }
            CalcDetail::Power {
                base,
                exponent,
                result,
            } => format!(
                "{}^{} = {}",
                fmt_num(*base),
                fmt_num(*exponent),
                format_result(*result)
            ),
            CalcDetail::Arithmetic { result } => format!(
                "{} = {}",
                evaluation.normalized,
                if evaluation.currency {
                    rm(*result)
                } else {
                    format_result(*result)
                }
            ),
            CalcDetail::WaitDuration { minutes } => {
                if *minutes == 0 {
                    "The outlet is already open — no need to wait!".to_string()
                } else {
                    format!("You need to wait {}.", time::format_duration(*minutes))
                }
            }
            CalcDetail::ClockTime { minutes } => {
                format!("The time will be {}.", time::format_clock(*minutes))
            }
        }
    }

    /// Targeted help per error kind; raw error text stays internal.
    fn calculation_err(&self, original_query: &str, kind: &CalcError) -> String {
        let lower = original_query.to_lowercase();
        match kind {
            CalcError::DivisionByZero => {
                "I can't divide by zero. Adjust the calculation and try again.".to_string()
            }
            CalcError::InvalidResult => {
                "That calculation doesn't produce a usable number. Please check the \
                 expression and try again."
                    .to_string()
            }
            CalcError::OutOfRange(_) => {
                "That result is too large for me to calculate. Try smaller numbers."
                    .to_string()
            }
            CalcError::InvalidExpression(_) => {
                if lower.contains('%') || lower.contains("percent") {
                    "I couldn't read that percentage. Try \"15% of 120\" or \"20% discount on RM79\"."
                        .to_string()
                } else if lower.contains("sqrt") || lower.contains("root") {
                    "I couldn't read that square root. Try \"square root of 64\" or \"sqrt(25)\"."
                        .to_string()
                } else if lower.contains("power") || lower.contains('^') {
                    "I couldn't read that power. Try \"2 to the power of 3\" or \"2^3\"."
                        .to_string()
                } else {
                    "I can only calculate expressions with numbers and + - * / ( ). \
                     For example: \"25 + 15\" or \"(100 - 20) * 3\"."
                        .to_string()
                }
            }
            CalcError::NotACalculation => self.ask_calculation(),
        }
    }
}

fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn truncated_list(items: &[String], max: usize) -> String {
    let shown: Vec<&str> = items.iter().take(max).map(String::as_str).collect();
    if items.len() > max {
        format!("{} (+{} more)", shown.join(", "), items.len() - max)
    } else {
        shown.join(", ")
    }
}

fn hours_display(outlet: &Outlet, today: Weekday) -> String {
    match resolve_hours(outlet, today) {
        HoursAnswer::Parsed(_) => kopibot_retrieval::hours_for_day(outlet, today)
            .unwrap_or_else(|| "Hours not available".to_string()),
        HoursAnswer::Verbatim(raw) => raw,
        HoursAnswer::Unavailable => "Hours not available".to_string(),
    }
}

fn services_display(outlet: &Outlet) -> String {
    if outlet.services.is_empty() {
        return "Services not listed".to_string();
    }
    outlet
        .services
        .iter()
        .map(|s| s.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopibot_calculator::SafeCalculator;
    use kopibot_core::{Material, ServiceTag};
    use kopibot_retrieval::AppliedFilters;

    fn composer() -> Composer {
        Composer::new("KopiGo Coffee")
    }

    fn product(name: &str, price: f64) -> Product {
        Product {
            name: name.to_string(),
            price: format!("RM {:.2}", price),
            numeric_price: price,
            regular_price: None,
            category: "tumbler".to_string(),
            description: None,
            capacity: Some("500ml".to_string()),
            material: Material::StainlessSteel,
            colors: vec![
                "black".into(),
                "white".into(),
                "green".into(),
                "blue".into(),
                "red".into(),
            ],
            features: vec![],
            collection: None,
            promotion: None,
            on_sale: false,
        }
    }

    fn outlet(name: &str) -> Outlet {
        Outlet {
            name: name.to_string(),
            address: "12, Jalan SS2/61, Petaling Jaya, Selangor".to_string(),
            opening_hours: Some(kopibot_core::OpeningHours::Raw("09:00 - 22:00".to_string())),
            services: vec![ServiceTag::DineIn, ServiceTag::Takeaway],
        }
    }

    #[test]
    fn discount_reply_contains_both_amounts() {
        let calc = SafeCalculator::default();
        let outcome = calc.evaluate("20% discount on RM79");
        let reply = composer().calculation("20% discount on RM79", &outcome);
        assert!(reply.contains("RM 15.80"), "reply: {}", reply);
        assert!(reply.contains("RM 63.20"), "reply: {}", reply);
    }

    #[test]
    fn total_reply_formats_currency() {
        let calc = SafeCalculator::default();
        let outcome = calc.evaluate("Total for 2 × RM39");
        let reply = composer().calculation("Total for 2 × RM39", &outcome);
        assert!(reply.contains("RM 78.00"), "reply: {}", reply);
    }

    #[test]
    fn sst_reply_breaks_down_tax_and_total() {
        let calc = SafeCalculator::default();
        let outcome = calc.evaluate("6% SST on RM55");
        let reply = composer().calculation("6% SST on RM55", &outcome);
        assert!(reply.contains("RM 3.30"), "reply: {}", reply);
        assert!(reply.contains("RM 58.30"), "reply: {}", reply);
    }

    #[test]
    fn calc_errors_use_targeted_templates() {
        let c = composer();
        let reply = c.calculation("what's 30% discnt of stuff", &Err(CalcError::InvalidExpression("x".into())));
        assert!(reply.contains('%'));

        let reply = c.calculation("sqrt of banana", &Err(CalcError::InvalidExpression("x".into())));
        assert!(reply.contains("square root"));

        let reply = c.calculation("5/0", &Err(CalcError::DivisionByZero));
        assert!(reply.to_lowercase().contains("zero"));
        // No raw error internals leak.
        assert!(!reply.contains("InvalidExpression"));
    }

    #[test]
    fn product_list_truncates_colors() {
        let products = vec![product("A", 10.0), product("B", 20.0)];
        let reply = composer().products("tumblers", &Slots::default(), &products, "Found 2", 10);
        assert!(reply.contains("(+2 more)"));
        assert!(reply.contains("1. **A**"));
        assert!(reply.contains("2. **B**"));
    }

    #[test]
    fn single_product_uses_dense_block() {
        let products = vec![product("Solo", 49.0)];
        let reply = composer().products("the cheapest", &Slots::default(), &products, "Found 1", 10);
        assert!(reply.contains("**Solo**"));
        assert!(reply.contains("Material: Stainless Steel"));
        assert!(!reply.contains("1. "));
    }

    #[test]
    fn empty_products_suggest_alternatives() {
        let reply = composer().products("xyz", &Slots::default(), &[], "none", 10);
        assert!(reply.to_lowercase().contains("no products"));
        assert!(reply.to_lowercase().contains("tumblers"));
    }

    #[test]
    fn outlet_list_reports_exact_total_beyond_display() {
        let outlets: Vec<Outlet> = (0..10).map(|i| outlet(&format!("Outlet {}", i))).collect();
        let result = OutletQueryResult {
            outlets,
            total: 80,
            filters: AppliedFilters {
                cities: vec!["kuala lumpur".to_string()],
                ..Default::default()
            },
        };
        let reply = composer().outlets("outlets in kl", &result, Weekday::Mon);
        assert!(reply.contains("Found 80"), "reply: {}", reply);
        assert!(reply.contains("Kuala Lumpur"));
        assert!(reply.contains("and 70 more"));
        assert!(reply.contains("Total: 80 outlets."));
    }

    #[test]
    fn empty_outlets_echo_filters() {
        let result = OutletQueryResult {
            outlets: vec![],
            total: 0,
            filters: AppliedFilters {
                cities: vec!["putrajaya".to_string()],
                services: vec![ServiceTag::DriveThru],
                ..Default::default()
            },
        };
        let reply = composer().outlets("drive-thru putrajaya", &result, Weekday::Mon);
        assert!(reply.contains("No outlets match"));
        assert!(reply.contains("putrajaya"));
        assert!(reply.contains("Drive-thru"));
    }

    #[test]
    fn opening_time_extracted_from_hours() {
        let result = OutletQueryResult {
            outlets: vec![outlet("Early Bird")],
            total: 1,
            filters: AppliedFilters {
                time_query: Some(TimeQuery::Opening),
                ..Default::default()
            },
        };
        let reply = composer().outlets("when does it open", &result, Weekday::Mon);
        assert!(reply.contains("opens at 9:00 AM"), "reply: {}", reply);
    }

    #[test]
    fn unparsed_hours_rendered_verbatim() {
        let mut o = outlet("Vague");
        o.opening_hours = Some(kopibot_core::OpeningHours::Raw("open till late".to_string()));
        let result = OutletQueryResult {
            outlets: vec![o],
            total: 1,
            filters: AppliedFilters {
                time_query: Some(TimeQuery::Closing),
                ..Default::default()
            },
        };
        let reply = composer().outlets("when does it close", &result, Weekday::Mon);
        assert!(reply.contains("open till late"));
    }

    #[test]
    fn refusal_never_echoes_payload() {
        let reply = composer().refusal();
        assert!(!reply.to_lowercase().contains("drop"));
    }
}
