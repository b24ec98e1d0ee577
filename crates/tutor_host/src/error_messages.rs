/// Turn a failed request into the text of a bot turn.
///
/// The wording depends on what went wrong (credentials, rate limit, network,
/// quota), and the underlying error chain is included on one line. Debug
/// representations and backtraces are never included.
pub fn describe_request_error(error: &anyhow::Error) -> String {
    let detail = format!("{:#}", error);
    let lower = detail.to_lowercase();

    // API key issues
    if lower.contains("unauthorized")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("api key")
        || lower.contains("authentication")
    {
        return format!(
            "I couldn't connect to the AI service - there may be an issue with the API key.\n\n\
            Error: {}\n\n\
            Check GEMINI_API_KEY or the key in settings.json, then try again.",
            detail
        );
    }

    // Rate limiting
    if lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests")
    {
        return format!(
            "The AI service is temporarily busy. Please wait a moment and try again.\n\n\
            Error: {}",
            detail
        );
    }

    // Network issues
    if lower.contains("connection")
        || lower.contains("network")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("dns")
        || lower.contains("could not resolve")
    {
        return format!(
            "I'm having trouble reaching the AI service. Please check your network connection.\n\n\
            Error: {}",
            detail
        );
    }

    // Quota/billing issues
    if lower.contains("quota") || lower.contains("billing") || lower.contains("resource_exhausted")
    {
        return format!(
            "The AI service quota may have been exceeded.\n\n\
            Error: {}",
            detail
        );
    }

    format!(
        "Sorry, I ran into an issue. Here's what happened:\n\n{}\n\n\
        Send your message again to retry.",
        detail
    )
}
