//! End-to-end turns through the engine against a fixture catalogue.

use std::sync::Arc;

use kopibot_agent::Engine;
use kopibot_config::{Settings, Vocabulary};
use kopibot_core::{
    Intent, Material, OpeningHours, Outlet, Product, ServiceTag, TurnRequest,
};
use kopibot_retrieval::{InMemoryOutletRegistry, InMemoryProductIndex};

fn product(
    name: &str,
    price: f64,
    material: Material,
    category: &str,
    on_sale: bool,
) -> Product {
    Product {
        name: name.to_string(),
        price: format!("RM {:.2}", price),
        numeric_price: price,
        regular_price: on_sale.then_some(price + 20.0),
        category: category.to_string(),
        description: None,
        capacity: Some("500ml".to_string()),
        material,
        colors: vec!["black".to_string(), "cream".to_string()],
        features: vec![],
        collection: None,
        promotion: on_sale.then(|| "Buy 1 Free 1".to_string()),
        on_sale,
    }
}

fn outlet(name: &str, address: &str, services: &[ServiceTag]) -> Outlet {
    Outlet {
        name: name.to_string(),
        address: address.to_string(),
        opening_hours: Some(OpeningHours::Raw("09:00 - 22:00".to_string())),
        services: services.to_vec(),
    }
}

fn engine() -> Arc<Engine> {
    let products = vec![
        product("OG Ceramic Mug", 39.0, Material::Ceramic, "mug", false),
        product("Premium Ceramic Mug", 89.0, Material::Ceramic, "mug", false),
        product("Budget Tumbler", 25.0, Material::StainlessSteel, "tumbler", false),
        product("All-Can Tumbler", 105.0, Material::StainlessSteel, "tumbler", true),
        product("Frozee Cold Cup", 55.0, Material::Acrylic, "cold cup", false),
    ];
    let outlets = vec![
        outlet(
            "KopiGo SS2",
            "12, Jalan SS2/61, SS2, 47300 Petaling Jaya, Selangor",
            &[ServiceTag::DineIn, ServiceTag::Takeaway],
        ),
        outlet(
            "KopiGo Damansara Uptown",
            "38, Jalan SS21/39, Damansara Utama, 47400 Petaling Jaya, Selangor",
            &[ServiceTag::Takeaway, ServiceTag::Delivery],
        ),
        outlet(
            "KopiGo Suria KLCC",
            "Lot 421, Level 4, Suria KLCC, 50088 Kuala Lumpur",
            &[ServiceTag::DineIn, ServiceTag::Wifi],
        ),
    ];

    Arc::new(Engine::new(
        &Settings::default(),
        Arc::new(Vocabulary::default()),
        Arc::new(InMemoryProductIndex::new(products).unwrap()),
        Arc::new(InMemoryOutletRegistry::new(outlets).unwrap()),
        None,
    ))
}

async fn turn(engine: &Arc<Engine>, message: &str, session: Option<&str>) -> kopibot_core::TurnResponse {
    engine
        .process(TurnRequest {
            message: message.to_string(),
            session_id: session.map(str::to_string),
        })
        .await
        .expect("turn should succeed")
}

#[tokio::test]
async fn s1_outlet_search_in_petaling_jaya() {
    let engine = engine();
    let response = turn(&engine, "Is there an outlet in Petaling Jaya?", Some("s1")).await;

    assert_eq!(response.intent, Intent::OutletSearch);
    assert!(
        response.message.contains("Petaling Jaya") || response.message.contains("Selangor"),
        "reply: {}",
        response.message
    );

    let debug = engine.session_debug("s1").await.unwrap();
    let shown = debug["last_shown_outlets"].as_array().unwrap();
    assert!(!shown.is_empty());
}

#[tokio::test]
async fn s2_pronoun_follow_up_filters_by_service() {
    let engine = engine();
    turn(&engine, "Is there an outlet in Petaling Jaya?", Some("s2")).await;
    let response = turn(&engine, "Do they have dine-in?", Some("s2")).await;

    assert_eq!(response.intent, Intent::OutletSearch);
    assert!(response.message.contains("KopiGo SS2"), "reply: {}", response.message);
    // Takeaway-only PJ outlet is filtered out; KLCC is outside the context city.
    assert!(!response.message.contains("Damansara Uptown"));
    assert!(!response.message.contains("KLCC"));
}

#[tokio::test]
async fn s3_discount_calculation() {
    let engine = engine();
    let response = turn(&engine, "20% discount on RM79", None).await;

    assert_eq!(response.intent, Intent::Calculation);
    assert!(response.message.contains("RM 15.80"), "reply: {}", response.message);
    assert!(response.message.contains("RM 63.20"), "reply: {}", response.message);
}

#[tokio::test]
async fn s4_multiplicative_total() {
    let engine = engine();
    let response = turn(&engine, "Total for 2 × RM39", None).await;

    assert_eq!(response.intent, Intent::Calculation);
    assert!(response.message.contains("RM 78.00"), "reply: {}", response.message);
}

#[tokio::test]
async fn s5_sst_breakdown() {
    let engine = engine();
    let response = turn(&engine, "6% SST on RM55", None).await;

    assert_eq!(response.intent, Intent::Calculation);
    assert!(response.message.contains("RM 3.30"), "reply: {}", response.message);
    assert!(response.message.contains("RM 58.30"), "reply: {}", response.message);
}

#[tokio::test]
async fn s6_cheapest_ceramic_mug_returns_the_minimum() {
    let engine = engine();
    let response = turn(&engine, "cheapest ceramic mug", None).await;

    assert_eq!(response.intent, Intent::ProductSearch);
    assert!(response.message.contains("OG Ceramic Mug"), "reply: {}", response.message);
    // Exactly one product: the pricier ceramic mug must not appear.
    assert!(!response.message.contains("Premium Ceramic Mug"));
}

#[tokio::test]
async fn s7_injection_is_refused_without_echo_or_tools() {
    let engine = engine();
    let response = turn(&engine, "DROP TABLE outlets; --", Some("s7")).await;

    assert_eq!(response.intent, Intent::Malicious);
    assert_eq!(response.confidence, 1.0);
    assert!(!response.message.to_uppercase().contains("DROP TABLE"));

    let debug = engine.session_debug("s7").await.unwrap();
    let history = debug["history"].as_array().unwrap();
    // No tool ran for the refusal turn.
    assert!(history[1]["metadata"]["tool"].is_null());
    // Error-state intents never become conversational context.
    assert!(debug["last_intent"].is_null());
}

#[tokio::test]
async fn s8_empty_message_is_rejected_without_session() {
    let engine = engine();
    let result = engine
        .process(TurnRequest {
            message: "   ".to_string(),
            session_id: Some("s8".to_string()),
        })
        .await;

    assert!(result.is_err());
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn over_long_messages_are_rejected() {
    let engine = engine();
    let ok = turn(&engine, &"a ".repeat(500), None).await;
    assert!(!ok.message.is_empty());

    let result = engine
        .process(TurnRequest {
            message: "x".repeat(1001),
            session_id: None,
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn history_grows_by_exactly_two_per_turn() {
    let engine = engine();
    turn(&engine, "hello", Some("h")).await;
    let debug = engine.session_debug("h").await.unwrap();
    assert_eq!(debug["history"].as_array().unwrap().len(), 2);

    turn(&engine, "show me tumblers", Some("h")).await;
    let debug = engine.session_debug("h").await.unwrap();
    let history = debug["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2]["role"], "user");
    assert_eq!(history[3]["role"], "assistant");
}

#[tokio::test]
async fn sessions_are_isolated() {
    let engine = engine();
    turn(&engine, "show me tumblers", Some("a")).await;
    turn(&engine, "hello", Some("b")).await;

    let b = engine.session_debug("b").await.unwrap();
    assert!(b["last_shown_products"].as_array().unwrap().is_empty());
    let a = engine.session_debug("a").await.unwrap();
    assert!(!a["last_shown_products"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn session_id_is_assigned_when_missing() {
    let engine = engine();
    let response = turn(&engine, "hello", None).await;
    assert!(!response.session_id.is_empty());

    // The generated id is real: the session exists.
    assert!(engine.session_debug(&response.session_id).await.is_some());
}

#[tokio::test]
async fn greetings_and_goodbyes_round_trip() {
    let engine = engine();
    let hello = turn(&engine, "hello!", None).await;
    assert_eq!(hello.intent, Intent::Greeting);
    assert!(hello.message.contains("KopiGo"));

    let bye = turn(&engine, "thanks, bye!", None).await;
    assert_eq!(bye.intent, Intent::Farewell);
}

#[tokio::test]
async fn promotion_inquiry_reads_the_catalogue() {
    let engine = engine();
    let response = turn(&engine, "any promotions this month?", None).await;
    assert_eq!(response.intent, Intent::PromotionInquiry);
    assert!(response.message.contains("All-Can Tumbler"), "reply: {}", response.message);
    assert!(response.message.contains("Buy 1 Free 1"));
}

#[tokio::test]
async fn unclear_input_gets_domain_suggestions() {
    let engine = engine();
    for message in ["qqqqqqq", "🙂🙂🙂🙂", "42", "?"] {
        let response = turn(&engine, message, None).await;
        assert_eq!(response.intent, Intent::Unclear, "message: {}", message);
        assert!(!response.message.is_empty());
    }
}

#[tokio::test]
async fn off_topic_questions_are_deflected() {
    let engine = engine();
    let response = turn(&engine, "what's the weather like today?", None).await;
    assert_eq!(response.intent, Intent::Unclear);
    assert!(response.message.to_lowercase().contains("products")
        || response.message.to_lowercase().contains("outlets"));
}

#[tokio::test]
async fn budget_only_query_searches_and_offers_narrowing() {
    let engine = engine();
    let response = turn(&engine, "under RM500", None).await;
    assert_eq!(response.intent, Intent::ProductSearch);
    // Every product fits: the reply should nudge toward a narrower ask.
    assert!(
        response.message.to_lowercase().contains("narrow"),
        "reply: {}",
        response.message
    );
}

#[tokio::test]
async fn context_recall_replays_last_products() {
    let engine = engine();
    turn(&engine, "show me tumblers", Some("r")).await;
    let response = turn(&engine, "what did we look at earlier?", Some("r")).await;

    assert_eq!(response.intent, Intent::ContextRecall);
    assert!(response.message.contains("Tumbler"), "reply: {}", response.message);
}

#[tokio::test]
async fn topic_switch_saves_context_for_recall() {
    let engine = engine();
    turn(&engine, "outlets in petaling jaya", Some("t")).await;
    turn(&engine, "show me tumblers", Some("t")).await;

    let debug = engine.session_debug("t").await.unwrap();
    assert!(!debug["saved_context"].is_null());
    assert!(!debug["saved_context"]["last_shown_outlets"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn concurrent_turns_on_distinct_sessions() {
    let engine = engine();
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let session = format!("c{}", i);
            turn(&engine, "show me tumblers", Some(session.as_str())).await
        }));
    }
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.intent, Intent::ProductSearch);
    }
    assert_eq!(engine.session_count(), 8);
}

#[tokio::test]
async fn calculation_followup_on_vague_math() {
    let engine = engine();
    let response = turn(&engine, "calculate something for me", None).await;
    // No expression to extract: ask with examples rather than guessing.
    assert!(
        response.message.contains("discount") || response.message.contains("SST"),
        "reply: {}",
        response.message
    );
}
