use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use ai_client::{ChatModel, Completion, Message, ToolDefinition};
use cafescout_common::{
    last_resolved_location, CafeScoutError, Config, FilterState, FilterValue, Place, Role, Turn,
    FILTER_KEYS,
};

use crate::ranker::rank;
use crate::search::SearchAdapter;
use crate::session::SessionTable;

const SEARCH_TOOL: &str = "search_places";

const APOLOGY: &str =
    "I'm having trouble processing your request right now. Please try again in a moment.";

const CLARIFY_LOCATION: &str = "I need to know your location to help you find great places. \
     Could you share a city, neighborhood, or address?";

const SYSTEM_PROMPT: &str = "\
You are a friendly assistant that helps people find cafes and restaurants.

You have one tool, search_places, which searches for places near a location.
Call it ONLY when the user is asking for place recommendations: cafes, coffee
shops, restaurants, bakeries, study spots, places to eat or drink. Extract the
location from their message; for follow-ups, the location may come from
earlier in the conversation.

Do NOT call the tool for greetings, questions about your capabilities, or
questions about places you already recommended in this conversation — answer
those from the conversation context. Never invent names, ratings, or
addresses: the application presents the real listing details itself, so your
job on a search is only to decide the search parameters.

If the user asks a short question, give a short, friendly answer.";

// =============================================================================
// Decision
// =============================================================================

/// What to do with an inbound turn: run a search, or just talk.
#[derive(Debug, Clone)]
pub enum Decision {
    Search {
        location: String,
        place_type: String,
        query: Option<String>,
        /// User toggles merged with model-suggested filters (toggles win).
        filters: FilterState,
    },
    Respond {
        text: String,
    },
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    place_type: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    filters: Vec<String>,
}

// =============================================================================
// Intent resolution
// =============================================================================

/// Maps an utterance plus context to a `Decision` via the reasoning
/// collaborator. Every failure mode of that collaborator downgrades to a
/// `Respond`; nothing here returns an error to the caller.
pub struct IntentResolver {
    model: Arc<dyn ChatModel>,
    history_window: usize,
}

impl IntentResolver {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            model,
            history_window: config.history_window,
        }
    }

    pub async fn resolve(
        &self,
        utterance: &str,
        filters: &FilterState,
        history: &[Turn],
    ) -> Decision {
        let messages = self.context_window(utterance, filters, history);
        let tools = [search_tool_definition()];

        match self.model.complete(SYSTEM_PROMPT, &tools, &messages).await {
            Ok(Completion::Text(text)) => Decision::Respond { text },
            Ok(Completion::ToolCall { name, arguments }) => {
                self.sanitize_tool_call(&name, arguments, filters, history)
            }
            Err(e) => {
                warn!(error = %e, "Reasoning call failed, downgrading to apology");
                Decision::Respond {
                    text: APOLOGY.to_string(),
                }
            }
        }
    }

    /// The most recent `history_window` whole turns, then the current
    /// utterance with a compact summary of active toggles appended.
    fn context_window(
        &self,
        utterance: &str,
        filters: &FilterState,
        history: &[Turn],
    ) -> Vec<Message> {
        let start = history.len().saturating_sub(self.history_window);
        let mut messages: Vec<Message> = history[start..]
            .iter()
            .map(|turn| match turn.role {
                Role::User => Message::user(&turn.content),
                Role::Assistant => Message::assistant(&turn.content),
            })
            .collect();

        let summary = filters.prompt_summary();
        let current = if summary.is_empty() {
            utterance.to_string()
        } else {
            format!("{utterance}\n\nAdditional preferences: {summary}")
        };
        messages.push(Message::user(current));
        messages
    }

    /// Validate a tool call into a `Search`, or downgrade: unknown tool or
    /// unparseable arguments become an apology, a missing location (with no
    /// prior resolved location to fall back on) becomes a clarification.
    fn sanitize_tool_call(
        &self,
        name: &str,
        arguments: Value,
        filters: &FilterState,
        history: &[Turn],
    ) -> Decision {
        if name != SEARCH_TOOL {
            warn!(tool = name, "Model called an unknown tool");
            return Decision::Respond {
                text: APOLOGY.to_string(),
            };
        }

        let args: SearchArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "Malformed tool arguments");
                return Decision::Respond {
                    text: APOLOGY.to_string(),
                };
            }
        };

        let location = args
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .or_else(|| last_resolved_location(history).map(str::to_string));

        let Some(location) = location else {
            info!("Search requested without a location and no prior one known");
            return Decision::Respond {
                text: CLARIFY_LOCATION.to_string(),
            };
        };

        let place_type = args
            .place_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "cafe".to_string());

        // Model-suggested filters only fill in keys the user left neutral;
        // explicit toggles always win.
        let mut effective = filters.clone();
        for key in &args.filters {
            match effective.get(key) {
                Some(FilterValue::Neutral) => {
                    let _ = effective.set(key, FilterValue::Include);
                }
                Some(_) => {}
                None => debug!(key, "Ignoring unknown filter from model"),
            }
        }

        Decision::Search {
            location,
            place_type,
            query: args.query.filter(|q| !q.trim().is_empty()),
            filters: effective,
        }
    }
}

fn search_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_TOOL.to_string(),
        description: "Search for cafes and restaurants near a location, filtered by the \
                      user's preferences"
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City, neighborhood, or address to search around"
                },
                "place_type": {
                    "type": "string",
                    "description": "Kind of place to search for, e.g. cafe, restaurant, bakery",
                    "default": "cafe"
                },
                "query": {
                    "type": "string",
                    "description": "Optional free-text refinement, e.g. a cuisine or speciality"
                },
                "filters": {
                    "type": "array",
                    "items": { "type": "string", "enum": FILTER_KEYS },
                    "description": "Preference filters the user asked for in this message"
                }
            },
            "required": ["location"]
        }),
    }
}

// =============================================================================
// Recommender
// =============================================================================

/// Everything a completed turn hands back to the HTTP layer. The places,
/// location, and filter echo are only present when a search ran.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub places: Option<Vec<Place>>,
    pub location: Option<String>,
    pub filters: Option<FilterState>,
}

impl TurnOutcome {
    fn respond(text: impl Into<String>) -> Self {
        Self {
            response: text.into(),
            places: None,
            location: None,
            filters: None,
        }
    }
}

/// The request-to-recommendation pipeline: session lookup, intent
/// resolution, search, ranking, and deterministic reply composition.
pub struct Recommender {
    resolver: IntentResolver,
    adapter: SearchAdapter,
    sessions: SessionTable,
    max_places: usize,
}

impl Recommender {
    pub fn new(resolver: IntentResolver, adapter: SearchAdapter, config: &Config) -> Self {
        Self {
            resolver,
            adapter,
            sessions: SessionTable::new(config.session_capacity),
            max_places: config.max_places,
        }
    }

    /// Process one inbound chat turn start-to-finish. The conversation lock
    /// is held for the whole turn so concurrent requests for the same
    /// session cannot interleave appends.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        message: &str,
        filters: &FilterState,
    ) -> TurnOutcome {
        let conversation = self.sessions.get_or_create(session_id).await;
        let mut convo = conversation.lock().await;

        let decision = self.resolver.resolve(message, filters, &convo.turns).await;

        let outcome = match decision {
            Decision::Respond { text } => TurnOutcome::respond(text),
            Decision::Search {
                location,
                place_type,
                query,
                filters: effective,
            } => self.run_search(&location, &place_type, query.as_deref(), &effective).await,
        };

        convo.turns.push(Turn::user(message));
        let mut reply = Turn::assistant(&outcome.response);
        reply.places = outcome.places.clone();
        reply.location = outcome.location.clone();
        reply.filters = outcome.filters.clone();
        convo.turns.push(reply);
        convo.last_activity = Utc::now();

        outcome
    }

    /// Search + rank for a validated `Search` decision, with every failure
    /// folded into a user-facing reply.
    async fn run_search(
        &self,
        location: &str,
        place_type: &str,
        query: Option<&str>,
        filters: &FilterState,
    ) -> TurnOutcome {
        match self.adapter.search(location, place_type, query).await {
            Ok(found) => {
                let ranked = rank(found.places, filters, self.max_places);
                info!(
                    location = %found.location,
                    count = ranked.len(),
                    "Search complete"
                );
                TurnOutcome {
                    response: compose_summary(&ranked, &found.location),
                    places: Some(ranked),
                    location: Some(found.location),
                    filters: Some(filters.clone()),
                }
            }
            Err(CafeScoutError::LocationNotFound(loc)) => TurnOutcome::respond(format!(
                "I couldn't find \"{loc}\" on the map. Could you try a more specific \
                 address or a well-known area?"
            )),
            Err(e) => {
                warn!(error = %e, "Search failed");
                TurnOutcome::respond(APOLOGY)
            }
        }
    }

    /// Search + rank without the reasoning layer, for programmatic callers.
    pub async fn direct_search(
        &self,
        location: &str,
        place_type: &str,
        filters: &FilterState,
    ) -> Result<(String, Vec<Place>), CafeScoutError> {
        let found = self.adapter.search(location, place_type, None).await?;
        let ranked = rank(found.places, filters, self.max_places);
        Ok((found.location, ranked))
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }
}

/// Deterministic reply text from ranked results. The reasoning collaborator
/// never writes place facts, so ratings and addresses here are exactly what
/// the provider returned.
fn compose_summary(places: &[Place], location: &str) -> String {
    if places.is_empty() {
        return format!(
            "I couldn't find any places matching your criteria in {location}. \
             Try adjusting your filters or broadening the search area."
        );
    }

    let mut out = format!("Here are the top places I found in {location}:\n\n");
    for (i, place) in places.iter().enumerate() {
        let rating = match place.rating {
            Some(r) => format!("{r}/5"),
            None => "No rating yet".to_string(),
        };
        let reviews = place
            .user_ratings_total
            .map(|n| format!(" ({n} reviews)"))
            .unwrap_or_default();
        out.push_str(&format!(
            "{}. **{}**\n   📍 {}\n   ⭐ {}{}\n\n",
            i + 1,
            place.name,
            place.vicinity.as_deref().unwrap_or("Address not available"),
            rating,
            reviews,
        ));
    }
    out.trim_end().to_string()
}
