// Conversation orchestration: retrieve, ask the model with one callable
// tool, execute the lookup it requests, finalize. One run per question;
// no session state is kept across turns.


use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::index::Retrieved;
use crate::openai::{ChatCompleter, ChatMessage, Tool, ToolFunction};
use crate::Result;

pub const TOOL_NAME: &str = "get_summary_by_title";

pub const SYSTEM_PROMPT: &str = "\
Ești Smart Librarian, un bibliotecar AI.
Primești întrebări de la utilizatori despre ce cărți ar trebui să citească.
Ai acces la un \"BOOK_CONTEXT\" (rezultatele unui retriever semantic) și la un tool numit get_summary_by_title(title).
Sarcina ta:
1) Alege o singură carte din BOOK_CONTEXT care se potrivește cel mai bine întrebării.
2) Explică pe scurt de ce ai ales acea carte (2–4 propoziții).
3) Apelează tool-ul get_summary_by_title EXACT cu titlul ales (o singură chemare).
4) În răspunsul final, afișează titlul recomandat, motivarea, apoi secțiunea „Rezumat complet” cu conținutul returnat de tool.
IMPORTANT:
- Dacă BOOK_CONTEXT nu conține o potrivire bună, alege totuși cea mai apropiată și explică ipoteza.
- Nu inventa titluri care nu apar în BOOK_CONTEXT.
- Chemarea către tool trebuie să aibă exact parametrul: title=<titlul selectat>.
- Scrie în limba română.
";

/// The single tool offered to the model.
#[inline]
pub fn summary_tool() -> Tool {
    Tool {
        kind: "function".to_string(),
        function: ToolFunction {
            name: TOOL_NAME.to_string(),
            description: "Returnează rezumatul complet pentru un titlu exact de carte."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Titlul exact al cărții recomandate."
                    }
                },
                "required": ["title"],
                "additionalProperties": false
            }),
        },
    }
}

/// Render ranked retrieval results into the context block the prompt
/// refers to as BOOK_CONTEXT.
#[inline]
pub fn format_context(results: &[Retrieved]) -> String {
    let blocks: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(rank, r)| format!("[{}] Titlu: {}\n{}", rank + 1, r.title, r.document))
        .collect();
    blocks.join("\n---\n")
}

/// Runs the two-phase conversation for one question.
pub struct Librarian<'a> {
    chat: &'a dyn ChatCompleter,
    catalog: &'a Catalog,
}

impl<'a> Librarian<'a> {
    #[inline]
    pub fn new(chat: &'a dyn ChatCompleter, catalog: &'a Catalog) -> Self {
        Self { chat, catalog }
    }

    /// Produce the final answer text for a question given its retrieval
    /// results. Never returns an empty-handed tool error; lookup misses
    /// degrade to display text.
    #[inline]
    pub fn answer(&self, question: &str, retrieved: &[Retrieved]) -> Result<String> {
        let context = format_context(retrieved);
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Întrebare: {}\n\nBOOK_CONTEXT:\n{}",
                question, context
            )),
        ];

        let tools = [summary_tool()];
        let reply = self.chat.complete(&messages, Some(&tools))?;

        let tool_calls = reply.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            return Ok(self.fallback_answer(reply.content.unwrap_or_default(), retrieved));
        }

        // The prompt asks for exactly one call, but any number issued in
        // this turn is executed uniformly.
        messages.push(reply);
        for call in &tool_calls {
            let result = self.execute_tool(&call.function.name, &call.function.arguments);
            messages.push(ChatMessage::tool_result(call.id.clone(), result));
        }

        let final_reply = self.chat.complete(&messages, None)?;
        Ok(final_reply.content.unwrap_or_default())
    }

    fn execute_tool(&self, name: &str, arguments: &str) -> String {
        if name != TOOL_NAME {
            warn!("Model requested unknown tool '{}'", name);
            return format!("(Tool necunoscut: {})", name);
        }

        let title = serde_json::from_str::<serde_json::Value>(arguments)
            .ok()
            .and_then(|args| args.get("title").and_then(|t| t.as_str()).map(String::from));

        match title {
            Some(title) => {
                info!("Executing {} for title '{}'", TOOL_NAME, title);
                self.catalog.summary_by_title(&title)
            }
            None => {
                warn!("Tool call without a usable title argument: {}", arguments);
                "(Apel de tool fără parametrul title)".to_string()
            }
        }
    }

    /// The model skipped the tool protocol; attach the top retrieved
    /// title's full summary ourselves so the user still gets one.
    fn fallback_answer(&self, content: String, retrieved: &[Retrieved]) -> String {
        debug!("No tool call issued, appending summary for top retrieved title");
        let summary = retrieved
            .first()
            .map_or_else(
                || "(Nu există rezultate)".to_string(),
                |top| self.catalog.summary_by_title(&top.title),
            );
        format!("{}\n\n**Rezumat complet**\n{}", content, summary)
    }
}
