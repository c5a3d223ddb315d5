//! Natural-language to SQL generation.
//!
//! Builds a single prompt holding the schema catalog and the user's question
//! and returns the model's raw answer. The answer is not validated; markdown
//! fences and comments are removed later by
//! [`prepare_statement`](crate::executor::prepare_statement).

use crate::{
    error::{AppResult, generation_error},
    llm::LlmClient,
    schema::SchemaCatalog
};

/// Render the generation prompt for `question` against `schema`
///
/// ```
/// use text_to_sql::{generator::build_prompt, schema::SchemaCatalog};
///
/// let schema = SchemaCatalog::from_rows(vec![(
///     "sales".to_string(),
///     "amount".to_string(),
///     "numeric".to_string()
/// )]);
/// let prompt = build_prompt(&schema, "total sales by year");
/// assert!(prompt.contains("Table: sales, Columns: amount"));
/// assert!(prompt.ends_with("total sales by year\n"));
/// ```
pub fn build_prompt(schema: &SchemaCatalog, question: &str) -> String {
    format!(
        "Here is the schema information for the database:\n\
         {schema}\n\n\
         Convert this natural language query into an optimized SQL query:\n\
         {question}\n",
        schema = schema.to_prompt(),
        question = question.trim()
    )
}

/// Generates SQL through an LLM client.
pub struct SqlGenerator {
    client: LlmClient
}

impl SqlGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self {
            client
        }
    }

    /// Ask the model for a SQL statement answering `question`
    ///
    /// # Errors
    ///
    /// Fails without any network call when the provider needs an API key and
    /// none is set; fails when the model returns an empty answer or the
    /// request itself fails.
    pub async fn generate(&self, question: &str, schema: &SchemaCatalog) -> AppResult<String> {
        let provider = self.client.provider();
        if provider.api_key().is_some_and(|key| key.trim().is_empty()) {
            tracing::error!("API key for provider '{}' is not set", provider.name());
            return Err(generation_error(format!(
                "API key for provider '{}' is not set",
                provider.name()
            )));
        }
        if question.trim().is_empty() {
            return Err(generation_error("question is empty"));
        }
        let prompt = build_prompt(schema, question);
        let response = self.client.complete(&prompt).await.map_err(|e| {
            tracing::error!("Error generating SQL query: {}", e);
            e
        })?;
        if response.trim().is_empty() {
            tracing::error!("No valid response received from the API.");
            return Err(generation_error("no valid response received from the model"));
        }
        Ok(response)
    }
}
