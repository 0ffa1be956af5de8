use crate::models::{ContextBundle, MessagePart, ATTRACTIONS_KEY, WIKIPEDIA_KEY};

const PERSONA: &str = "You are a knowledgeable Singapore Tour Guide. Use the provided context \
     to give accurate, engaging responses, but maintain a natural conversational tone.";

/// Builds the outbound message sequence: persona, optional retrieved-context
/// system message, then the narrative user message. Never calls the model.
pub fn assemble(
    selected_place: &str,
    address: &str,
    bundle: &ContextBundle,
    lookback_text: Option<&str>,
    user_question: Option<&str>,
    image_data_uri: Option<&str>,
) -> Vec<MessagePart> {
    let mut parts = vec![MessagePart::system(PERSONA)];

    if let Some(context) = render_context(bundle) {
        parts.push(MessagePart::system(context));
    }

    let instructions = narrative_instructions(selected_place, address, lookback_text, user_question);
    match image_data_uri {
        Some(image) => parts.push(MessagePart::user_with_image(instructions, image)),
        None => parts.push(MessagePart::user(instructions)),
    }

    parts
}

fn render_context(bundle: &ContextBundle) -> Option<String> {
    if bundle.is_empty() {
        return None;
    }

    let mut lines: Vec<String> = Vec::new();
    for key in [WIKIPEDIA_KEY, ATTRACTIONS_KEY] {
        let snippets = bundle.snippets(key);
        if snippets.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(section_label(key).to_string());
        lines.extend(snippets.iter().cloned());
    }

    Some(lines.join("\n"))
}

fn section_label(key: &str) -> &'static str {
    match key {
        WIKIPEDIA_KEY => "Historical and Wikipedia Information:",
        ATTRACTIONS_KEY => "Local Attraction Information:",
        _ => "Additional Information:",
    }
}

fn narrative_instructions(
    selected_place: &str,
    address: &str,
    lookback_text: Option<&str>,
    user_question: Option<&str>,
) -> String {
    let past_messages = lookback_text.unwrap_or("");

    let mut prompt = format!(
        "Due to insufficient information in the provided context, if the location below differs \
         greatly from that context, completely disregard it and craft original content about the \
         provided location instead.\n\
         \n\
         You are a friendly Singapore Tour Guide giving a walking tour. If {selected_place} \
         matches with {address}, this means you are in a residential or developing area. \
         If both are the same, you might have talked about this location already. Here are past \
         messages you have sent: [{past_messages}]. \
         If empty, it means this is the first time you are talking about it. \
         If not empty, do not state the same thing again. Talk about something else about the area.\n\
         \n\
         For residential/developing areas:\n\
         - Focus exclusively on the neighborhood or district, disregarding unrelated context.\n\
         - Describe the most interesting aspects of the neighborhood or district you're in.\n\
         - Mention any nearby parks, nature areas, or community spaces.\n\
         - Include interesting facts about the area's development or future plans.\n\
         - Highlight what makes this area unique in Singapore.\n\
         \n\
         For tourist landmarks:\n\
         - Name and describe the specific landmark.\n\
         - Share its historical significance and background.\n\
         - Explain its cultural importance in Singapore.\n\
         - Describe unique architectural features.\n\
         - Include interesting facts that make it special.\n\
         \n\
         Start with \"You see [Point of interest/Area name]\" and keep the tone friendly and \
         conversational, as if speaking to tourists in person. Don't mention exact addresses or \
         coordinates. Use the context only if it directly mentions the landmark and matches the \
         provided location. If it does not match, ignore it entirely."
    );

    if let Some(question) = user_question {
        prompt.push_str(&format!(
            "\n\nThe user has asked a question here: {question} Answer what is given in the \
             user's text and describe in detail regarding history or context that is applicable."
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn bundle_with(key: &str, snippets: &[&str]) -> ContextBundle {
        let mut bundle = ContextBundle::with_keys([WIKIPEDIA_KEY, ATTRACTIONS_KEY]);
        for snippet in snippets {
            bundle.push_snippet(key, snippet.to_string(), 5);
        }
        bundle
    }

    #[test]
    fn empty_bundle_omits_context_message() {
        let bundle = ContextBundle::with_keys([WIKIPEDIA_KEY, ATTRACTIONS_KEY]);
        let parts = assemble("Esplanade", "Esplanade Dr", &bundle, None, None, None);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].role, Role::System);
        assert_eq!(parts[1].role, Role::User);
    }

    #[test]
    fn context_message_labels_nonempty_sections() {
        let bundle = bundle_with(WIKIPEDIA_KEY, &["The Esplanade opened in 2002."]);
        let parts = assemble("Esplanade", "Esplanade Dr", &bundle, None, None, None);

        assert_eq!(parts.len(), 3);
        let context = &parts[1].text;
        assert!(context.contains("Historical and Wikipedia Information:"));
        assert!(context.contains("The Esplanade opened in 2002."));
        assert!(!context.contains("Local Attraction Information:"));
    }

    #[test]
    fn question_and_image_reach_the_user_message() {
        let bundle = bundle_with(ATTRACTIONS_KEY, &["Gardens by the Bay fact."]);
        let parts = assemble(
            "Gardens by the Bay",
            "18 Marina Gardens Dr",
            &bundle,
            None,
            Some("What are the Supertrees made of?"),
            Some("data:image/jpeg;base64,abcd"),
        );

        let user = parts.last().unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.text.contains("What are the Supertrees made of?"));
        assert_eq!(user.image_data_uri.as_deref(), Some("data:image/jpeg;base64,abcd"));
    }

    #[test]
    fn lookback_text_is_injected_for_repeat_turns() {
        let bundle = ContextBundle::with_keys([WIKIPEDIA_KEY, ATTRACTIONS_KEY]);
        let parts = assemble(
            "Tiong Bahru, Singapore",
            "Tiong Bahru, Singapore",
            &bundle,
            Some("I told you about the bakery."),
            None,
            None,
        );

        let user = parts.last().unwrap();
        assert!(user.text.contains("[I told you about the bakery.]"));
    }
}
