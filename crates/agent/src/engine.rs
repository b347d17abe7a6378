//! The turn controller (C9).
//!
//! Orchestrates one turn: validate, look up the session, classify,
//! extract slots, plan, execute tools under the turn deadline, compose,
//! persist. Tool failures and panics never reach the caller; the only
//! error the transport sees is [`EngineError::InvalidInput`].
//!
//! Cancellation semantics: if the deadline expires before composition,
//! the user turn stays recorded (so replay shows the message), but the
//! assistant turn is not appended and `last_intent` is not updated.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc, Weekday};
use futures::FutureExt;
use tokio::time::Instant;

use kopibot_calculator::SafeCalculator;
use kopibot_config::{Settings, Vocabulary};
use kopibot_core::{
    Action, EngineError, Intent, OutletRegistry, ProductIndex, SemanticIndex, Slots, Turn,
    TurnMetadata, TurnRequest, TurnResponse,
};
use kopibot_retrieval::{OutletEngine, ProductRetriever};
use kopibot_tools::{standard_registry, ToolExecutor, ToolInput, ToolOutput};

use crate::composer::Composer;
use crate::intent::{IntentClassifier, SessionContextView};
use crate::memory::{SessionMemory, SessionState};
use crate::planner::{Planner, PlannerContext};
use crate::slots::SlotExtractor;

pub struct Engine {
    classifier: IntentClassifier,
    extractor: SlotExtractor,
    planner: Planner,
    composer: Arc<Composer>,
    memory: SessionMemory,
    tools: Arc<dyn ToolExecutor>,
    turn_deadline: Duration,
    max_message_chars: usize,
}

impl Engine {
    /// Build a complete engine from settings and catalogue snapshots.
    /// The engine owns its session memory; callers own the engine.
    pub fn new(
        settings: &Settings,
        vocabulary: Arc<Vocabulary>,
        products: Arc<dyn ProductIndex>,
        outlets: Arc<dyn OutletRegistry>,
        semantic: Option<Arc<dyn SemanticIndex>>,
    ) -> Self {
        let calculator = Arc::new(
            SafeCalculator::new(settings.calculator.sst_rate).with_catalogue_nouns(
                vocabulary
                    .product_nouns
                    .iter()
                    .chain(vocabulary.outlet_nouns.iter())
                    .cloned()
                    .collect(),
            ),
        );

        let mut retriever = ProductRetriever::new(products)
            .with_fuzzy_threshold(settings.retrieval.fuzzy_threshold);
        if let Some(semantic) = semantic {
            retriever = retriever.with_semantic(semantic);
        }
        let retriever = Arc::new(retriever);

        let outlet_engine = Arc::new(OutletEngine::new(outlets, vocabulary.clone()));
        let composer = Arc::new(Composer::new(settings.engine.chain_name.clone()));

        let tools: Arc<dyn ToolExecutor> = Arc::new(standard_registry(
            retriever.clone(),
            outlet_engine,
            calculator.clone(),
        ));

        let planner = Planner::new(
            vocabulary.clone(),
            calculator,
            retriever,
            composer.clone(),
            settings.retrieval.default_k,
        );

        Self {
            classifier: IntentClassifier::new(vocabulary.clone()),
            extractor: SlotExtractor::new(vocabulary),
            planner,
            composer,
            memory: SessionMemory::new(Duration::from_secs(settings.engine.session_timeout_secs)),
            tools,
            turn_deadline: Duration::from_secs(settings.engine.turn_deadline_secs),
            max_message_chars: settings.engine.max_message_chars,
        }
    }

    /// Process one turn. Validation failures are the only errors the
    /// caller sees; everything downstream resolves to a reply.
    pub async fn process(&self, request: TurnRequest) -> Result<TurnResponse, EngineError> {
        let message = request.message.trim().to_string();
        if message.is_empty() {
            tracing::warn!("rejected empty message");
            return Err(EngineError::InvalidInput("message must not be empty".into()));
        }
        if message.chars().count() > self.max_message_chars {
            tracing::warn!(
                chars = message.chars().count(),
                "rejected over-long message"
            );
            return Err(EngineError::InvalidInput(format!(
                "message exceeds {} characters",
                self.max_message_chars
            )));
        }

        let turn = AssertUnwindSafe(self.run_turn(&message, request.session_id.as_deref()));
        match turn.catch_unwind().await {
            Ok(response) => Ok(response),
            Err(_panic) => {
                // A panic inside the turn becomes an internal fallback;
                // the caller still gets a well-formed reply.
                tracing::error!("turn panicked; returning fallback reply");
                Ok(TurnResponse {
                    message: self.composer.fallback(),
                    session_id: request
                        .session_id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    intent: Intent::Unclear,
                    confidence: 0.0,
                })
            }
        }
    }

    async fn run_turn(&self, message: &str, session_id: Option<&str>) -> TurnResponse {
        let deadline = Instant::now() + self.turn_deadline;
        let today = Utc::now().weekday();

        let session = self.memory.get_or_create(session_id);
        let session_id = session.id.clone();
        let mut state = session.lock().await;

        let context_view = SessionContextView {
            last_intent: state.last_intent,
            turn_count: state.history.len(),
        };

        state.push_turn(Turn::user(message));

        let classification = self.classifier.classify_detailed(message, &context_view);
        let mut slots = self.extractor.extract(message);

        // "Do they have dine-in?" style follow-ups inherit the location
        // the conversation is already in.
        if classification.intent == Intent::OutletSearch
            && slots.locations.is_empty()
            && (!slots.services.is_empty() || slots.time_query.is_some())
        {
            if let Some(location) = &state.current_context_location {
                slots.locations.insert(location.clone());
            }
        }
        let slots = slots;

        tracing::info!(
            session_id = %session_id,
            intent = %classification.intent,
            confidence = classification.confidence,
            "turn classified"
        );

        self.absorb_slots(&mut state, &slots);

        let planner_context = PlannerContext {
            last_intent: state.last_intent,
            last_shown_products: state.last_shown_products.clone(),
            last_shown_outlets: state.last_shown_outlets.clone(),
            saved_context: state.saved_context.clone(),
        };

        let plan = self
            .planner
            .plan(&classification, &slots, message, &planner_context, today);

        if plan.save_context {
            state.save_snapshot();
        }

        let mut parts: Vec<String> = Vec::new();
        let mut tool_used: Option<String> = None;
        let mut shown_products = Vec::new();
        let mut shown_outlets = Vec::new();

        for action in plan.actions {
            match action {
                Action::ProvideAnswer(text)
                | Action::AskFollowup(text)
                | Action::RequestClarification(text)
                | Action::Reject(text) => parts.push(text),

                tool_action => {
                    let name = tool_action.tool_name().unwrap_or("unknown");
                    let input = match to_tool_input(tool_action) {
                        Some(input) => input,
                        None => continue,
                    };

                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        // Deadline already gone: abort without touching
                        // assistant-side state.
                        session.touch();
                        return TurnResponse {
                            message: self.composer.fallback(),
                            session_id,
                            intent: classification.intent,
                            confidence: 0.0,
                        };
                    }

                    match tokio::time::timeout(remaining, self.tools.execute(name, input)).await
                    {
                        Err(_deadline_elapsed) => {
                            tracing::warn!(tool = name, "turn deadline expired mid-tool");
                            session.touch();
                            return TurnResponse {
                                message: self.composer.fallback(),
                                session_id,
                                intent: classification.intent,
                                confidence: 0.0,
                            };
                        }
                        Ok(Err(error)) => {
                            // Tool timeouts and failures never poison the
                            // session; the turn resolves to a fallback.
                            tracing::error!(tool = name, error = %error, "tool failed");
                            parts.push(self.composer.fallback());
                        }
                        Ok(Ok(output)) => {
                            tool_used = Some(name.to_string());
                            match &output {
                                ToolOutput::Products { results, .. } => {
                                    shown_products = results.clone();
                                }
                                ToolOutput::Outlets { result, .. } => {
                                    shown_outlets = result.outlets.clone();
                                }
                                ToolOutput::Calculation { .. } => {}
                            }
                            parts.push(self.compose_output(output, &slots, today));
                        }
                    }
                }
            }
        }

        let reply = parts.join("\n\n");

        state.remember_products(&shown_products);
        state.remember_outlets(&shown_outlets);
        if classification.intent.is_conversational() {
            state.last_intent = Some(classification.intent);
        }

        state.push_turn(Turn::assistant(
            reply.clone(),
            classification.intent,
            TurnMetadata {
                confidence: Some(classification.confidence),
                tool: tool_used,
            },
        ));

        drop(state);
        session.touch();

        TurnResponse {
            message: reply,
            session_id,
            intent: classification.intent,
            confidence: classification.confidence,
        }
    }

    /// Fold this turn's slots into the session's durable preferences.
    fn absorb_slots(&self, state: &mut SessionState, slots: &Slots) {
        state.remember_entities(
            slots
                .locations
                .iter()
                .cloned()
                .chain(slots.landmarks.iter().cloned())
                .chain(slots.collections.iter().map(|c| c.label().to_string()))
                .chain(slots.keywords.iter().cloned()),
        );

        state.preferences.materials.extend(slots.materials.iter().copied());
        state.preferences.features.extend(slots.features.iter().copied());
        if slots.capacity.is_some() {
            state.preferences.capacity = slots.capacity;
        }
        if slots.budget.is_some() {
            state.budget_range = slots.budget;
        }
        if let Some(location) = slots.locations.iter().next() {
            state.current_context_location = Some(location.clone());
            if state.preferred_location.is_none() {
                state.preferred_location = Some(location.clone());
            }
        }
    }

    fn compose_output(&self, output: ToolOutput, slots: &Slots, today: Weekday) -> String {
        match output {
            ToolOutput::Products {
                query,
                results,
                summary,
                catalogue_size,
            } => self
                .composer
                .products(&query, slots, &results, &summary, catalogue_size),
            ToolOutput::Outlets { query, result } => self.composer.outlets(&query, &result, today),
            ToolOutput::Calculation {
                original_query,
                outcome,
            } => self.composer.calculation(&original_query, &outcome),
        }
    }

    /// Serialized session state for the admin debug endpoint.
    pub async fn session_debug(&self, session_id: &str) -> Option<serde_json::Value> {
        let session = self.memory.get(session_id)?;
        let state = session.lock().await;
        serde_json::to_value(&*state).ok()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.memory.session_ids()
    }

    pub fn session_count(&self) -> usize {
        self.memory.len()
    }
}

fn to_tool_input(action: Action) -> Option<ToolInput> {
    match action {
        Action::CallProductSearch { query, slots, k } => {
            Some(ToolInput::ProductSearch { query, slots, k })
        }
        Action::CallOutletSearch { query, slots, k } => {
            Some(ToolInput::OutletSearch { query, slots, k })
        }
        Action::CallCalculator { original_query } => {
            Some(ToolInput::Calculator { original_query })
        }
        _ => None,
    }
}
