//! Instruction text sent to the text-generation provider.

/// System instruction sent with every analysis request.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that analyzes journal entries for mood and emotional content. Always respond with valid JSON only.";

/// Title used when an entry has none.
pub const UNTITLED: &str = "Untitled";

/// Build the analysis prompt for one entry.
///
/// The output depends only on the inputs. Title and body are embedded as-is.
pub fn build_prompt(title: &str, body: &str) -> String {
    let title = if title.trim().is_empty() { UNTITLED } else { title };

    format!(
        "Analyze the following journal entry and return a JSON response with the following keys:\n\
         - 'mood': A single word describing the overall mood (e.g., Happy, Sad, Anxious, Excited, Reflective, etc.)\n\
         - 'mood_score': A number from 1-10 representing the emotional intensity (1=very negative, 10=very positive)\n\
         - 'top_emotions': An array of 2-4 emotion words that capture the main feelings expressed\n\
         - 'summary': A 1-2 sentence overview of the main themes or events described\n\
         \n\
         Journal Entry Title: {title}\n\
         \n\
         Journal Entry Content:\n\
         {body}\n\
         \n\
         Please respond ONLY with valid JSON in the exact format described above."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = build_prompt("Good Day", "Had a wonderful walk.");
        assert!(prompt.contains("Journal Entry Title: Good Day\n"));
        assert!(prompt.contains("Journal Entry Content:\nHad a wonderful walk.\n"));
    }

    #[test]
    fn test_prompt_names_all_keys() {
        let prompt = build_prompt("t", "b");
        for key in ["'mood'", "'mood_score'", "'top_emotions'", "'summary'"] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("1-10"));
        assert!(prompt.ends_with("Please respond ONLY with valid JSON in the exact format described above."));
    }

    #[test]
    fn test_blank_title_uses_placeholder() {
        assert!(build_prompt("", "body").contains("Journal Entry Title: Untitled\n"));
        assert!(build_prompt("   ", "body").contains("Journal Entry Title: Untitled\n"));
    }

    #[test]
    fn test_body_is_verbatim() {
        let body = "  line one\n\n\tline two  ";
        let prompt = build_prompt("Title", body);
        assert!(prompt.contains(&format!("Journal Entry Content:\n{body}\n")));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt("A", "B"), build_prompt("A", "B"));
    }
}
