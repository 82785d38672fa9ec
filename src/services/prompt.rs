/// Cuts document text to at most `max_chars` characters.
pub fn truncate_content(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &content[..byte_index],
        None => content,
    }
}

/// Prompt for the reasoning model: answer and show the steps.
pub fn reasoning_prompt(question: &str, content: &str, max_chars: usize) -> String {
    format!(
        "Based on this document content, please answer the question: \"{question}\"\n\n\
         Document content: {content}\n\n\
         Please think through this step by step and show your reasoning process.",
        question = question,
        content = truncate_content(content, max_chars),
    )
}

/// Prompt for direct answers, restricted to what the document says.
pub fn answer_prompt(question: &str, content: &str, max_chars: usize) -> String {
    format!(
        "You are a document assistant. Answer STRICTLY with information directly from the provided document content.\n\n\
         CRITICAL INSTRUCTIONS:\n\
         1. ONLY use information that is explicitly stated in the document content.\n\
         2. If the answer is not in the document, respond ONLY with \"I don't find information about that in the document.\"\n\
         3. DO NOT include ANY information from outside the document.\n\
         4. DO NOT include phrases like \"According to the document\", \"Based on the document\", or similar prefixes.\n\
         5. DO NOT include ANY disclaimers, introductions, or explanations.\n\
         6. Answer in plain text without any special formatting or markdown.\n\
         7. DO NOT make up or infer information not explicitly stated.\n\
         8. Keep answers concise and direct.\n\
         9. For mathematical content, preserve equations exactly as they appear.\n\n\
         Question: \"{question}\"\n\n\
         Document content: {content}",
        question = question,
        content = truncate_content(content, max_chars),
    )
}
