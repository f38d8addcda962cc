/// Clean HTML in authored display text (exam titles, question prompts)
/// using the ammonia library.
///
/// Safe formatting tags (like <b>, <p>) are kept while dangerous tags
/// (like <script>, <iframe>) are removed together with their content, and
/// event-handler attributes (like onclick) are stripped.
///
/// Answer text must not pass through here: it is compared verbatim when
/// grading, and escaping would change it.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
