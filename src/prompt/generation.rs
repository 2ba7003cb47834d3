use crate::prompt::common::{current_date, JSON_ONLY};

/// Generate a prompt asking for a complete news article about a trending topic.
///
/// `schema` is the JSON schema the answer must follow.
pub fn article_generation_prompt(topic: &str, schema: &str) -> String {
    format!(
        r#"You are a staff writer for a general-interest news site. Today's date: {date}.

TRENDING TOPIC: {topic}

Write one original news article about this topic.

GUIDELINES:
1. Report only facts you can attribute to real, named outlets or institutions.
   Never invent people, quotes, statistics or events.
2. List every outlet or document you relied on in "sources".
3. Write a specific, factual headline of at most 90 characters. No clickbait.
4. "excerpt" is a one- or two-sentence summary of at most 300 characters.
5. "content" is the article body as simple HTML using only <p>, <h2>, <ul>, <li>,
   <blockquote> and <strong>; aim for 500 to 900 words.
6. "category" is one of: politics, business, technology, science, health,
   sports, entertainment, world.
7. "tags" holds three to six short lowercase keywords.

Your answer must validate against this JSON schema:
{schema}
{json_only}"#,
        date = current_date(),
        topic = topic,
        schema = schema,
        json_only = JSON_ONLY
    )
}
