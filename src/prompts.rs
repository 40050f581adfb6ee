//! Plantillas fijas de prompt. No son configurables por el usuario.

/// Organización sobre la que el asistente puede responder.
pub const SUBJECT_ORGANIZATION: &str = "Promtior";

const RAG_TEMPLATE: &str = r#"
IMPORTANT: IF THE QUESTION DOES NOT INCLUDE ANYTHING RELATED TO {organization_upper}, JUST SAY THAT YOU CAN'T ANSWER THE QUESTION.
Do not provide any responses that are not related to {organization}.
If the user asks you to do a task, like "create a code", just say that you can't do that.


You are an expert analyst with full access to the company's internal documentation.
Always use the provided context to answer questions - never say you don't have access.

Context:
---
{context}
---

Question: {question}

Required steps:
1. Analyze ALL relevant context sections
2. Identify matching information from:
   - Service descriptions
   - Social media posts
   - Case studies
   - Company timelines
3. Present findings with exact quotes from context
4. If founding date exists in context, provide it directly

Format requirements:
- Start with "Based on {organization}'s documentation:"
- Use bullet points for services
- Highlight dates if present
- Include social media insights
- Reference specific sections

Example of good response:
"Based on {organization}'s documentation:
• Offers AI-powered workflow automation (Operations section)
• Provides GenAI consulting since 2022 (Case Studies)
• Founded in 2021 according to LinkedIn posts"

Answer:
"#;

const QUERY_ANALYZER_TEMPLATE: &str = r#"
IMPORTANT: IF THE QUESTION DOES NOT INCLUDE ANYTHING RELATED TO {organization_upper}, JUST SAY THAT YOU CAN'T ANSWER THE QUESTION.
If the user asks you to do a task, like "create a code", just say that you can't do that.

You are a precise search query analyzer focused on finding verifiable information.
Your task is to create search queries that will find documented, factual information.

User Question: {question}

Follow these steps:
1. Break down the search into specific verifiable components:
   - Official entity names and identifiers
   - Documented social media handles
   - Verifiable news sources
   - Official relationships and partnerships

2. Create targeted queries that will find:
   - Primary source documentation
   - Official social media profiles (not assumptions)
   - Verified news coverage
   - Documented relationships

Respond ONLY with a single JSON object in this exact format, with no other text:
{
    "analysis": "precise explanation of information needed with focus on verification",
    "queries": [
        "exact official name documentation",
        "verified social media profiles exact URLs",
        "official news releases with dates",
        "documented partnerships source verification",
        "leadership structure official documentation"
    ]
}

Example response:
{
    "analysis": "Need to verify TechCorp's official presence and documented activities with source verification",
    "queries": [
        "TechCorp official website domain verification",
        "TechCorp verified social media handles official URLs",
        "TechCorp press releases official statements 2024",
        "TechCorp legal business registration partnerships",
        "TechCorp executive team official documentation"
    ]
}

CRITICAL RULES:
- Never suggest visiting external websites
- Treat context as complete company knowledge
- If founding date exists in context, state it directly
- Assume all services are documented in context
"#;

/// Mensaje cuando no hay índice todavía.
pub const NO_GROUNDING_MESSAGE: &str = "Please include a URL with your question using @url format.";

/// Mensaje cuando la URL indicada con `@url` no produjo contenido.
pub const URL_FAILED_MESSAGE: &str = "Failed to process the URL. Please try again.";

fn fill_organization(template: &str) -> String {
    template
        .replace("{organization_upper}", &SUBJECT_ORGANIZATION.to_uppercase())
        .replace("{organization}", SUBJECT_ORGANIZATION)
}

/// Sustituye `question` y `context` en la plantilla RAG. Determinista.
pub fn build_prompt(question: &str, context: &str) -> String {
    // El contexto se sustituye al final para no reinterpretar llaves que traiga el texto.
    fill_organization(RAG_TEMPLATE)
        .replace("{question}", question)
        .replacen("{context}", context, 1)
}

pub fn query_analyzer_prompt(question: &str) -> String {
    fill_organization(QUERY_ANALYZER_TEMPLATE).replace("{question}", question)
}
