//! Prompts for the vision-analysis stage.
//!
//! Centralising the prompt here keeps the category table and the reply
//! schema in one place, and lets unit tests inspect the exact text sent to
//! the model without a provider.

/// Default number of page-text characters embedded in the analysis prompt.
pub const DEFAULT_CONTEXT_LIMIT: usize = 3500;

/// System message sent ahead of the screenshot.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a commercial poster art director. \
You read website screenshots, work out exactly what the business offers, and describe \
a poster scene that shows it. You always answer with a single JSON object and nothing else.";

/// Step-by-step instructions. The page text (if any) is appended after it.
const ANALYSIS_INSTRUCTIONS: &str = r##"Analyze this website screenshot and design the visual concept for a brand poster.

=== STEP 1: READ THE WEBSITE ===

1. Read every visible piece of text: headlines, menu items, buttons, taglines.
2. Decide what the website is FOR. Be specific.
   - WRONG: "It's a tech company"
   - RIGHT: "Team collaboration tool with chat, file sharing, task management and scheduling"
3. Brand name in English. Romanize non-Latin names: 무신사 → MUSINSA, 포커스허브 → FOCUSHUB, 쿠팡 → COUPANG.
4. Dominant colour: extract it from the logo or the main design elements as a hex code.
5. Mood: two or three words.

=== STEP 2: DESIGN THE POSTER SCENE ===

The poster must SHOW what the business DOES. Pick the closest category and use its objects:

| Category | Typical sites | Objects to show |
|---|---|---|
| Productivity | FocusHub, Notion, Slack | floating glass panels, folder icon, chat bubble, checklist, calendar |
| Fashion e-commerce | Musinsa, Zara | hoodies, sneakers, jackets on racks, clothing spread on a studio floor |
| Search / tech | Google, Naver | holographic search interface, flowing data streams, connected nodes |
| Delivery / logistics | Coupang, Amazon | flying boxes, conveyor systems, delivery trucks, speed lines |
| Food | Baemin, Starbucks | plated dishes, steaming cups, fresh ingredients, warm kitchen light |
| Fitness / corporate | Nike, Samsung | running shoes, gym equipment, glass towers, product close-ups |

List concrete objects, never abstract ideas.

=== STEP 3: OUTPUT ===

Return JSON ONLY, no other text, using exactly these keys:

{
  "brand_name": "ENGLISH name (romanized if needed)",
  "what_it_provides": "Specific description of the service or product (about 20 words)",
  "scene_description": "Concrete description of the objects in the poster (40+ words)",
  "color_palette": {
    "primary": "#hexcode",
    "secondary": ["#hex1", "#hex2"]
  },
  "mood": "2-3 word mood",
  "key_objects": ["object1", "object2", "object3", "object4"]
}"##;

/// Collapse every whitespace run to a single space and keep the first
/// `limit` characters.
pub fn truncate_context(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(limit)
        .collect()
}

/// Build the analysis prompt, appending the extracted page text when there
/// is any.
///
/// `extracted_text` is expected to be truncated already (see
/// [`truncate_context`]). The result is deterministic.
pub fn build_analysis_prompt(extracted_text: &str) -> String {
    let text = extracted_text.trim();
    if text.is_empty() {
        return ANALYSIS_INSTRUCTIONS.to_string();
    }
    format!(
        "{ANALYSIS_INSTRUCTIONS}\n\n=== PAGE TEXT (extracted from the site) ===\n{text}\n=== END PAGE TEXT ==="
    )
}
